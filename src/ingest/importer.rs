//! Resumable batch import of one CSV file.
//!
//! Rows are streamed from the stored offset, normalized, and written in
//! fixed-size unordered batches. The offset is persisted after every flushed
//! batch so an interrupted import resumes where it stopped. Already written
//! rows are never rolled back.

use chrono::Utc;
use csv::{ByteRecord, ReaderBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::alert::{Notifier, ReportStatus};
use crate::config::Config;
use crate::db::{bulk_insert_unordered, BulkWriteOutcome, Db};
use crate::error::Result;
use crate::ingest::housekeeping::{self, COMPLETION_MARKER};
use crate::ingest::normalize::{normalize_row, RowRecord};
use crate::ingest::offsets::{offset_key, OffsetMap, OffsetStore};
use crate::logging::ProgressLog;

/// How an import attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    /// Every row was consumed and the file was truncated to its header.
    Completed,
    /// Shutdown was requested; the offset points at the first unwritten row.
    Interrupted,
    /// One data row or fewer; nothing was written.
    NothingToImport,
    /// The attempt returned an error.
    Failed,
}

/// Result of one import attempt.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub file_name: String,
    pub total_rows: u64,
    pub outcome: BulkWriteOutcome,
    pub elapsed_secs: u64,
    pub status: ImportStatus,
}

impl ImportReport {
    /// Report used when an attempt fails before producing counts.
    pub fn failed(path: &Path) -> Self {
        Self {
            file_name: file_name(path),
            total_rows: 0,
            outcome: BulkWriteOutcome::default(),
            elapsed_secs: 0,
            status: ImportStatus::Failed,
        }
    }
}

/// Called with the offset key and new offset after each checkpoint is persisted.
pub type CheckpointFn = Arc<dyn Fn(&str, u64) + Send + Sync>;

/// Batch importer and the collaborators it writes to.
pub struct Importer {
    db: Db,
    store: OffsetStore,
    notifier: Notifier,
    progress_log: Option<ProgressLog>,
    batch_size: usize,
    progress_interval: usize,
    health_path: PathBuf,
    keep_completed: usize,
    on_checkpoint: Option<CheckpointFn>,
}

impl Importer {
    pub fn new(
        config: &Config,
        db: Db,
        notifier: Notifier,
        progress_log: Option<ProgressLog>,
    ) -> Self {
        Self {
            db,
            store: OffsetStore::new(config.offsets_path()),
            notifier,
            progress_log,
            batch_size: config.ingest.batch_size.max(1),
            progress_interval: config.ingest.progress_interval,
            health_path: config.health_path(),
            keep_completed: config.log.keep_completed,
            on_checkpoint: None,
        }
    }

    /// Observe every offset written after a flushed batch.
    pub fn on_checkpoint(mut self, f: impl Fn(&str, u64) + Send + Sync + 'static) -> Self {
        self.on_checkpoint = Some(Arc::new(f));
        self
    }

    pub fn offset_store(&self) -> &OffsetStore {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Import `path` starting at its offset in `offsets`.
    ///
    /// `offsets` is the in-memory copy of the offset map; every change is
    /// written through to the offset store.
    pub async fn import_file(
        &self,
        path: &Path,
        offsets: &mut OffsetMap,
        cancel: &CancellationToken,
    ) -> Result<ImportReport> {
        let key = offset_key(path);
        let name = file_name(path);

        let total_rows = count_rows(path)?;

        let mut offset = offsets.get(&key).copied().unwrap_or(0);
        if offset >= total_rows {
            if offset > 0 {
                log::info!(
                    "Offset {} for {} is past its {} rows; starting over",
                    offset,
                    name,
                    total_rows
                );
            }
            offset = 0;
            offsets.insert(key.clone(), 0);
            self.store.write(offsets)?;
        }

        if total_rows <= 1 {
            log::info!("Skipping {}: {} data row(s)", name, total_rows);
            return Ok(ImportReport {
                file_name: name,
                total_rows,
                outcome: BulkWriteOutcome::default(),
                elapsed_secs: 0,
                status: ImportStatus::NothingToImport,
            });
        }

        log::info!(
            "Importing {} ({} rows, resuming at row {})",
            name,
            total_rows,
            offset
        );

        let start = Instant::now();
        let mut processed = offset;
        let mut batch: Vec<RowRecord> = Vec::with_capacity(self.batch_size.min(100_000));
        let mut total = BulkWriteOutcome::default();
        let mut interrupted = false;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(decode_field)
            .collect();

        let mut record = ByteRecord::new();
        let mut index: u64 = 0;
        while reader.read_byte_record(&mut record)? {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            let i = index;
            index += 1;
            if i < offset {
                continue;
            }

            batch.push(normalize_row(&row_map(&headers, &record)));
            processed += 1;

            if self.progress_interval > 0 && processed % self.progress_interval as u64 == 0 {
                log::info!("Progress: {} {}/{} rows", name, processed, total_rows);
            }

            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut total, offsets, &key, processed)
                    .await?;
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut total, offsets, &key, processed)
                .await?;
        }

        let elapsed_secs = start.elapsed().as_secs();

        if interrupted {
            log::info!(
                "Import of {} interrupted at row {}/{}; will resume from there",
                name,
                processed,
                total_rows
            );
            return Ok(ImportReport {
                file_name: name,
                total_rows,
                outcome: total,
                elapsed_secs,
                status: ImportStatus::Interrupted,
            });
        }

        housekeeping::truncate_to_header(path)?;
        offsets.insert(key, 0);
        self.store.write(offsets)?;
        housekeeping::write_health_marker(&self.health_path, Utc::now())?;

        let report = ImportReport {
            file_name: name,
            total_rows,
            outcome: total,
            elapsed_secs,
            status: ImportStatus::Completed,
        };

        log::info!(
            "{}",
            housekeeping::completion_line(&report.file_name, total_rows, &report.outcome, elapsed_secs)
        );
        if report.outcome.failed > 0 {
            log::warn!(
                "{} rows of {} were rejected by the database for reasons other than duplicates: {}",
                report.outcome.failed,
                report.file_name,
                report.outcome.errors.join("; ")
            );
        }

        self.notifier
            .notify_report(&report, ReportStatus::Successful)
            .await;

        if let Some(progress_log) = &self.progress_log {
            if let Err(e) = progress_log.trim_completed(COMPLETION_MARKER, self.keep_completed) {
                log::warn!("Failed to trim progress log: {}", e);
            }
        }

        Ok(report)
    }

    async fn flush(
        &self,
        batch: &mut Vec<RowRecord>,
        total: &mut BulkWriteOutcome,
        offsets: &mut OffsetMap,
        key: &str,
        processed: u64,
    ) -> Result<()> {
        let docs = std::mem::take(batch);
        let outcome = bulk_insert_unordered(&self.db, docs).await?;
        log::debug!(
            "Flushed batch: inserted={} skipped={} failed={}",
            outcome.inserted,
            outcome.skipped,
            outcome.failed
        );
        total.merge(outcome);

        offsets.insert(key.to_string(), processed);
        self.store.write(offsets)?;
        if let Some(f) = &self.on_checkpoint {
            f(key, processed);
        }
        Ok(())
    }
}

/// Number of data rows (header excluded).
pub fn count_rows(path: &Path) -> Result<u64> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut record = ByteRecord::new();
    let mut n = 0;
    while reader.read_byte_record(&mut record)? {
        n += 1;
    }
    Ok(n)
}

/// Pair header names with field values; short rows leave trailing columns absent.
fn row_map(headers: &[String], record: &ByteRecord) -> HashMap<String, String> {
    headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.clone(), decode_field(v)))
        .collect()
}

/// UTF-8 decode that drops invalid byte sequences.
fn decode_field(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // valid_up_to marks a checked UTF-8 prefix
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    None => return out,
                }
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
