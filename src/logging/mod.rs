//! Logger set-up: `YYYY-MM-DD HH:MM:SS,mmm [LEVEL] message` to stdout and the
//! progress log.

mod progress;

pub use progress::ProgressLog;

use std::io::{self, Write};

use crate::config::Config;
use crate::error::Result;

/// Writes every record to stdout and the progress log.
struct Tee {
    progress: ProgressLog,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // stdout is best effort; the progress log is the record of truth
        let _ = io::stdout().write_all(buf);
        self.progress.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stdout().flush();
        self.progress.flush()
    }
}

fn builder() -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    );
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            record.level(),
            record.args()
        )
    });
    builder
}

/// Initialise logging for the daemon and return the progress log handle so the
/// importer can trim it.
pub fn init(config: &Config) -> Result<ProgressLog> {
    let progress = ProgressLog::open(
        config.progress_log_path(),
        config.log.max_bytes,
        config.log.backups,
    )?;

    builder()
        .target(env_logger::Target::Pipe(Box::new(Tee {
            progress: progress.clone(),
        })))
        .init();

    Ok(progress)
}

/// Initialise stderr-only logging for the helper binaries.
pub fn init_stderr() {
    builder().target(env_logger::Target::Stderr).init();
}
