//! Best-effort chat webhook alerts.
//!
//! Nothing in here can fail an import: every delivery problem is logged as a
//! warning and dropped.

pub mod report;

pub use report::ReportStatus;

use chrono::{FixedOffset, Utc};
use reqwest::Client;
use std::time::Duration;

use crate::config::AlertConfig;
use crate::error::{Result, CsvIngestError};
use crate::ingest::ImportReport;

/// Chat webhook client
pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
    chat_id: String,
    display_offset: FixedOffset,
    zone_label: String,
    host: String,
}

impl Notifier {
    pub fn new(config: &AlertConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CsvIngestError::Alert(format!("failed to build HTTP client: {}", e)))?;

        let display_offset = FixedOffset::east_opt(config.utc_offset_hours * 3600).ok_or_else(|| {
            CsvIngestError::Config(format!("invalid UTC offset: {}h", config.utc_offset_hours))
        })?;

        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
            chat_id: config.chat_id.clone(),
            display_offset,
            zone_label: config.zone_label.clone(),
            host: hostname(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Post a titled message. Failures are logged and swallowed.
    pub async fn notify_plain(&self, title: &str, body: &str) {
        let message = report::envelope(report::INFO_ICON, title, body);
        if let Err(e) = self.send(&message).await {
            log::warn!("Failed to send alert: {}", e);
        }
    }

    /// Post the fixed-template import report for one file.
    pub async fn notify_report(&self, report: &ImportReport, status: ReportStatus) {
        let now = Utc::now().with_timezone(&self.display_offset);
        let body = report::report_body(report, status, now, &self.zone_label, &self.host);
        self.notify_plain(&report::report_title(&report.file_name), &body)
            .await;
    }

    pub async fn notify_started(&self) {
        let body = format!("CSV Importer process has started on host {}.", self.host);
        self.notify_plain("CSV Importer Started", &body).await;
    }

    async fn send(&self, message: &str) -> Result<()> {
        let url = match &self.webhook_url {
            Some(url) => url,
            None => {
                log::debug!("No alert webhook configured; dropping alert");
                return Ok(());
            }
        };

        let response = self
            .client
            .get(url)
            .query(&[
                ("DIALOG_ID", self.chat_id.as_str()),
                ("MESSAGE", message),
                ("SYSTEM", "Y"),
            ])
            .send()
            .await
            .map_err(|e| CsvIngestError::Alert(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CsvIngestError::Alert(format!("webhook returned {}", status)));
        }
        Ok(())
    }
}

/// Host name shown in alerts.
fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
