//! Import a single CSV file now, outside the polling schedule.

use clap::Parser;
use csvingest::alert::{Notifier, ReportStatus};
use csvingest::config::AlertConfig;
use csvingest::db::{migrate, Db};
use csvingest::ingest::ImportReport;
use csvingest::schedule::shutdown;
use csvingest::{logging, Config, ImportStatus, Importer};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "import")]
#[command(about = "Import one CSV file, resuming from its stored offset")]
struct Args {
    /// CSV file to import
    file: PathBuf,

    /// Do not send chat alerts
    #[arg(long)]
    no_alert: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_stderr();

    let args = Args::parse();
    let config = Config::load()?;

    let path = args
        .file
        .canonicalize()
        .with_context(|| format!("File not found: {}", args.file.display()))?;

    let db = Db::new(config.db_path(), &config.database.collection);
    let collection = config.database.collection.clone();
    db.with_connection(move |conn| migrate::run_migrations(conn, &collection))
        .await?;

    let alert_config = if args.no_alert {
        AlertConfig { webhook_url: None, ..config.alert.clone() }
    } else {
        config.alert.clone()
    };
    let notifier = Notifier::new(&alert_config)?;

    let cancel = CancellationToken::new();
    shutdown::listen(cancel.clone());

    let importer = Importer::new(&config, db, notifier, None);
    let mut offsets = importer.offset_store().read();

    match importer.import_file(&path, &mut offsets, &cancel).await {
        Ok(report) => {
            log::info!(
                "{}: {:?} (rows={}, inserted={}, skipped={}, failed={})",
                report.file_name,
                report.status,
                report.total_rows,
                report.outcome.inserted,
                report.outcome.skipped,
                report.outcome.failed
            );
            if report.status == ImportStatus::Interrupted {
                log::info!("Run again to resume from the stored offset");
            }
            Ok(())
        }
        Err(e) => {
            importer
                .notifier()
                .notify_report(&ImportReport::failed(&path), ReportStatus::Failed)
                .await;
            Err(e).with_context(|| format!("Import of {} failed", path.display()))
        }
    }
}
