use clap::Parser;
use csvingest::alert::Notifier;
use csvingest::db::{migrate, Db};
use csvingest::schedule::{shutdown, Scheduler, Tick};
use csvingest::{logging, Config, Importer};
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "csvingest")]
#[command(about = "Watch a directory for CSV exports and import them into the document database")]
struct Args {
    /// Import the newest eligible file once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;
    std::fs::create_dir_all(config.log_dir())
        .with_context(|| format!("Failed to create log dir {}", config.log_dir().display()))?;
    let progress_log = logging::init(&config)?;

    log::info!("Starting CSV importer...");
    log::info!("CSV dir: {}", config.csv_dir().display());
    log::info!("Database: {} (collection {})", config.db_path().display(), config.database.collection);
    log::info!("Batch size: {}", config.ingest.batch_size);

    let db = Db::new(config.db_path(), &config.database.collection);
    let collection = config.database.collection.clone();
    db.with_connection(move |conn| migrate::run_migrations(conn, &collection))
        .await?;
    log::info!("Database initialized");

    let notifier = Notifier::new(&config.alert)?;
    notifier.notify_started().await;

    let cancel = CancellationToken::new();
    shutdown::listen(cancel.clone());

    let importer = Importer::new(&config, db, notifier, Some(progress_log));
    let scheduler = Scheduler::new(&config, importer, cancel);

    if args.once {
        match scheduler.run_once().await {
            Tick::Imported(report) => log::info!("{} finished: {:?}", report.file_name, report.status),
            Tick::NoFile => log::info!("No *{} files found", config.ingest.file_suffix),
            Tick::Failed(path) => anyhow::bail!("Import of {} failed", path.display()),
            Tick::CoolingDown => {}
        }
        return Ok(());
    }

    scheduler.run().await;
    Ok(())
}
