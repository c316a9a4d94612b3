//! Message formatting for chat alerts.

use chrono::{DateTime, FixedOffset};
use std::fmt;

use crate::ingest::ImportReport;

pub const INFO_ICON: &str = "ℹ️";

/// Outcome shown on the last line of an import report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Successful,
    Failed,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Successful => write!(f, "Successful"),
            ReportStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Chat markup wrapper: bold title, rule, body.
pub fn envelope(icon: &str, title: &str, body: &str) -> String {
    format!("[B]{} {}[/B]\n[HR]\n{}", icon, title, body)
}

/// `1234567` -> `1,234,567`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn report_title(file_name: &str) -> String {
    format!("CSV Import Report: {}", file_name)
}

pub fn report_body(
    report: &ImportReport,
    status: ReportStatus,
    now: DateTime<FixedOffset>,
    zone_label: &str,
    host: &str,
) -> String {
    let mut lines = vec![
        "📦 CSV Import Report".to_string(),
        format!("🕐 Time: {} {}", now.format("%Y-%m-%d %H:%M:%S"), zone_label),
        format!("👤 Host: {}", host),
        format!("📄 File: {}", report.file_name),
        format!("📊 Total Rows: {}", thousands(report.total_rows)),
        format!("💾 Inserted: {}", thousands(report.outcome.inserted as u64)),
        format!("⚠️ Skipped: {}", thousands(report.outcome.skipped as u64)),
    ];
    if report.outcome.failed > 0 {
        lines.push(format!("❌ Failed Writes: {}", thousands(report.outcome.failed as u64)));
    }
    lines.push(format!("⏱️ Time Elapsed: {}s", report.elapsed_secs));
    lines.push(format!("✅ Status: {}", status));
    lines.join("\n")
}
