//! End-of-file side effects once a CSV has been fully imported.

use chrono::{DateTime, Utc};
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::db::BulkWriteOutcome;
use crate::error::Result;

/// Marker searched for when trimming the progress log.
pub const COMPLETION_MARKER: &str = "Import completed:";

/// Cut the file down to its header line so the export reads as consumed.
///
/// The header keeps its line terminator; an empty file stays empty.
pub fn truncate_to_header(path: &Path) -> Result<()> {
    let mut header = Vec::new();
    {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::new(file);
        reader.read_until(b'\n', &mut header)?;
    }
    std::fs::write(path, header)?;
    Ok(())
}

/// Record a successful import as `OK <rfc3339 timestamp>`.
pub fn write_health_marker(path: &Path, at: DateTime<Utc>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, format!("OK {}", at.to_rfc3339()))?;
    Ok(())
}

pub fn completion_line(
    file_name: &str,
    total_rows: u64,
    outcome: &BulkWriteOutcome,
    elapsed_secs: u64,
) -> String {
    let mut line = format!(
        "{} {} | Total rows: {} | Inserted: {} | Skipped: {} | Time elapsed: {}s",
        COMPLETION_MARKER, file_name, total_rows, outcome.inserted, outcome.skipped, elapsed_secs
    );
    if outcome.failed > 0 {
        line.push_str(&format!(" | Failed: {}", outcome.failed));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_keeps_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a_session.csv");
        fs::write(&path, "company-phone-number,subject\n5551234567,x\n5551234568,y\n").unwrap();

        truncate_to_header(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "company-phone-number,subject\n");
    }

    #[test]
    fn test_truncate_header_without_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a_session.csv");
        fs::write(&path, "company-phone-number,subject").unwrap();

        truncate_to_header(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "company-phone-number,subject");
    }

    #[test]
    fn test_truncate_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a_session.csv");
        fs::write(&path, "").unwrap();

        truncate_to_header(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_health_marker() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("health.ok");
        let at = Utc::now();

        write_health_marker(&path, at).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("OK {}", at.to_rfc3339()));
    }

    #[test]
    fn test_completion_line() {
        let outcome = BulkWriteOutcome { inserted: 2, skipped: 1, ..Default::default() };
        assert_eq!(
            completion_line("a_session.csv", 3, &outcome, 4),
            "Import completed: a_session.csv | Total rows: 3 | Inserted: 2 | Skipped: 1 | Time elapsed: 4s"
        );

        let failed = BulkWriteOutcome { inserted: 2, failed: 1, ..Default::default() };
        assert!(completion_line("a", 3, &failed, 0).ends_with(" | Failed: 1"));
    }
}
