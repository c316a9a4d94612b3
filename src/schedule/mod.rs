//! Polling scheduler: one sequential loop that picks the newest export and
//! imports it, at most once per cooldown window.

pub mod shutdown;

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::alert::ReportStatus;
use crate::config::Config;
use crate::ingest::{pick_latest, ImportReport, ImportStatus, Importer, OffsetMap};

/// What a single scheduler pass did.
#[derive(Debug)]
pub enum Tick {
    /// The previous import finished less than a cooldown ago.
    CoolingDown,
    /// No eligible file in the watched directory.
    NoFile,
    Imported(ImportReport),
    /// The import returned an error; a `Failed` alert was sent.
    Failed(PathBuf),
}

/// Mutable loop state.
///
/// Lives only in memory: a restart forgets the last import time.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub last_import: Option<Instant>,
    pub offsets: OffsetMap,
}

pub struct Scheduler {
    importer: Importer,
    csv_dir: PathBuf,
    file_suffix: String,
    check_interval: Duration,
    cooldown: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(config: &Config, importer: Importer, cancel: CancellationToken) -> Self {
        Self {
            importer,
            csv_dir: config.csv_dir().to_path_buf(),
            file_suffix: config.ingest.file_suffix.clone(),
            check_interval: config.check_interval(),
            cooldown: config.cooldown(),
            cancel,
        }
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }

    /// Initial loop state: offsets are read once here and kept in memory.
    pub fn initial_state(&self) -> SchedulerState {
        SchedulerState {
            last_import: None,
            offsets: self.importer.offset_store().read(),
        }
    }

    /// Poll until cancelled.
    pub async fn run(&self) {
        let mut state = self.initial_state();
        log::info!(
            "Watching {} for *{} every {:?} (cooldown {:?})",
            self.csv_dir.display(),
            self.file_suffix,
            self.check_interval,
            self.cooldown
        );

        while !self.cancel.is_cancelled() {
            self.tick(&mut state).await;
            if sleep_or_cancel(self.check_interval, &self.cancel).await {
                break;
            }
        }

        log::info!("Scheduler stopped");
    }

    /// Single pass with fresh state, for `--once`.
    pub async fn run_once(&self) -> Tick {
        let mut state = self.initial_state();
        self.tick(&mut state).await
    }

    /// One pass of the loop without the trailing sleep.
    pub async fn tick(&self, state: &mut SchedulerState) -> Tick {
        if let Some(last) = state.last_import {
            if last.elapsed() < self.cooldown {
                return Tick::CoolingDown;
            }
        }

        let candidate = match pick_latest(&self.csv_dir, &self.file_suffix) {
            Ok(Some(c)) => c,
            Ok(None) => return Tick::NoFile,
            Err(e) => {
                log::warn!("Failed to scan {}: {}", self.csv_dir.display(), e);
                return Tick::NoFile;
            }
        };

        match self
            .importer
            .import_file(&candidate.path, &mut state.offsets, &self.cancel)
            .await
        {
            Ok(report) => {
                if report.status != ImportStatus::Interrupted {
                    state.last_import = Some(Instant::now());
                }
                Tick::Imported(report)
            }
            Err(e) => {
                // last_import stays put so the file is retried on the next poll
                let err = anyhow::Error::from(e);
                log::error!("Importer crashed on {}: {:#}", candidate.path.display(), err);
                self.importer
                    .notifier()
                    .notify_report(&ImportReport::failed(&candidate.path), ReportStatus::Failed)
                    .await;
                Tick::Failed(candidate.path)
            }
        }
    }
}

/// Sleep for `duration`; returns true if cancelled first.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_or_cancel_returns_early() {
        let token = CancellationToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(sleep_or_cancel(Duration::from_secs(30), &token).await);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_times_out() {
        let token = CancellationToken::new();
        assert!(!sleep_or_cancel(Duration::from_millis(10), &token).await);
    }
}
