use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub database: DatabaseConfig,
    pub alert: AlertConfig,
    pub log: LogConfig,
}

/// Directory scanning and batching
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory polled for CSV exports.
    pub csv_dir: PathBuf,
    /// Only files whose name ends with this suffix are eligible.
    pub file_suffix: String,
    pub batch_size: usize,
    pub check_interval_secs: u64,
    /// Minimum time between two completed imports.
    pub cooldown_secs: u64,
    /// Emit a progress line every N processed rows.
    pub progress_interval: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("/app/csv_files"),
            file_suffix: "_session.csv".to_string(),
            batch_size: 10_000,
            check_interval_secs: 10,
            cooldown_secs: 7 * 3600,
            progress_interval: 100_000,
        }
    }
}

/// Document database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub db_path: PathBuf,
    /// Name of the collection (table) rows are written to.
    pub collection: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("/app/data/ingest.db"),
            collection: "mycollection".to_string(),
        }
    }
}

/// Chat webhook configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Alerts are only logged when unset.
    pub webhook_url: Option<String>,
    pub chat_id: String,
    pub timeout_secs: u64,
    /// Offset used when rendering report timestamps.
    pub utc_offset_hours: i32,
    pub zone_label: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            chat_id: "chat2249".to_string(),
            timeout_secs: 5,
            utc_offset_hours: 5,
            zone_label: "PKT".to_string(),
        }
    }
}

/// Log directory and progress log rotation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub max_bytes: u64,
    pub backups: usize,
    /// Number of "Import completed:" entries kept when the progress log is trimmed.
    pub keep_completed: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/app/logs"),
            max_bytes: 5 * 1024 * 1024,
            backups: 5,
            keep_completed: 5,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Loads environment variables from .env file (if present), then reads the
    /// TOML file named by `CSVINGEST_CONFIG` (if set), then applies environment
    /// overrides and validates the result.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let file_content = match std::env::var("CSVINGEST_CONFIG") {
            Ok(path) => {
                let path = PathBuf::from(path);
                Some(
                    std::fs::read_to_string(&path).with_context(|| {
                        format!("Failed to read config file: {}", path.display())
                    })?,
                )
            }
            Err(_) => None,
        };

        Self::from_sources(file_content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a configuration from optional TOML content and an environment lookup.
    pub fn from_sources<F>(file_content: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match file_content {
            Some(content) => toml::from_str(content).context("Failed to parse config file")?,
            None => Config::default(),
        };

        config.apply_env_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CSV_DIR") {
            self.ingest.csv_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CSV_SUFFIX") {
            self.ingest.file_suffix = v;
        }
        if let Some(v) = parse_var(lookup, "BATCH_SIZE")? {
            self.ingest.batch_size = v;
        }
        if let Some(v) = parse_var(lookup, "CHECK_INTERVAL")? {
            self.ingest.check_interval_secs = v;
        }
        if let Some(v) = parse_var(lookup, "COOLDOWN")? {
            self.ingest.cooldown_secs = v;
        }
        if let Some(v) = parse_var(lookup, "LIVE_PROGRESS_INTERVAL")? {
            self.ingest.progress_interval = v;
        }
        if let Some(v) = lookup("DB_PATH") {
            self.database.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DB_COLLECTION") {
            self.database.collection = v;
        }
        if let Some(v) = lookup("ALERT_WEBHOOK_URL") {
            self.alert.webhook_url = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Some(v) = lookup("ALERT_CHAT_ID") {
            self.alert.chat_id = v;
        }
        if let Some(v) = parse_var(lookup, "ALERT_TIMEOUT")? {
            self.alert.timeout_secs = v;
        }
        if let Some(v) = parse_var(lookup, "ALERT_UTC_OFFSET_HOURS")? {
            self.alert.utc_offset_hours = v;
        }
        if let Some(v) = lookup("ALERT_ZONE_LABEL") {
            self.alert.zone_label = v;
        }
        if let Some(v) = lookup("LOG_DIR") {
            self.log.log_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            anyhow::bail!("ingest.batch_size must be greater than 0");
        }

        if self.ingest.check_interval_secs == 0 {
            anyhow::bail!("ingest.check_interval_secs must be greater than 0");
        }

        if self.ingest.file_suffix.is_empty() {
            anyhow::bail!("ingest.file_suffix must not be empty");
        }

        let collection = &self.database.collection;
        if collection.is_empty()
            || !collection.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!(
                "database.collection must contain only ASCII letters, digits and '_': {:?}",
                collection
            );
        }

        if !(-14..=14).contains(&self.alert.utc_offset_hours) {
            anyhow::bail!("alert.utc_offset_hours must be between -14 and 14");
        }

        Ok(())
    }

    pub fn csv_dir(&self) -> &Path {
        &self.ingest.csv_dir
    }

    pub fn db_path(&self) -> &Path {
        &self.database.db_path
    }

    pub fn log_dir(&self) -> &Path {
        &self.log.log_dir
    }

    /// JSON map of file path to next row index.
    pub fn offsets_path(&self) -> PathBuf {
        self.log.log_dir.join("offset.json")
    }

    pub fn health_path(&self) -> PathBuf {
        self.log.log_dir.join("health.ok")
    }

    pub fn progress_log_path(&self) -> PathBuf {
        self.log.log_dir.join("progress.log")
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.ingest.check_interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.ingest.cooldown_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(None, env(&[])).unwrap();
        assert_eq!(config.ingest.batch_size, 10_000);
        assert_eq!(config.ingest.check_interval_secs, 10);
        assert_eq!(config.ingest.cooldown_secs, 25_200);
        assert_eq!(config.ingest.file_suffix, "_session.csv");
        assert_eq!(config.database.collection, "mycollection");
        assert_eq!(config.alert.utc_offset_hours, 5);
        assert!(config.alert.webhook_url.is_none());
        assert_eq!(config.offsets_path(), PathBuf::from("/app/logs/offset.json"));
        assert_eq!(config.health_path(), PathBuf::from("/app/logs/health.ok"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_sources(
            None,
            env(&[
                ("BATCH_SIZE", "500"),
                ("CHECK_INTERVAL", "3"),
                ("DB_COLLECTION", "complaints"),
                ("LOG_DIR", "/tmp/logs"),
                ("ALERT_WEBHOOK_URL", "http://localhost:9/hook"),
            ]),
        )
        .unwrap();
        assert_eq!(config.ingest.batch_size, 500);
        assert_eq!(config.check_interval(), Duration::from_secs(3));
        assert_eq!(config.database.collection, "complaints");
        assert_eq!(config.progress_log_path(), PathBuf::from("/tmp/logs/progress.log"));
        assert_eq!(config.alert.webhook_url.as_deref(), Some("http://localhost:9/hook"));
    }

    #[test]
    fn test_file_then_env() {
        let toml = r#"
[ingest]
csv_dir = "/data/in"
batch_size = 250

[database]
collection = "from_file"
"#;
        let config = Config::from_sources(Some(toml), env(&[("BATCH_SIZE", "42")])).unwrap();
        assert_eq!(config.csv_dir(), Path::new("/data/in"));
        assert_eq!(config.ingest.batch_size, 42);
        assert_eq!(config.database.collection, "from_file");
        // untouched sections keep their defaults
        assert_eq!(config.log.keep_completed, 5);
    }

    #[test]
    fn test_invalid_numeric_override() {
        let err = Config::from_sources(None, env(&[("BATCH_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("BATCH_SIZE"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(Config::from_sources(None, env(&[("BATCH_SIZE", "0")])).is_err());
    }

    #[test]
    fn test_collection_name_validated() {
        let err = Config::from_sources(None, env(&[("DB_COLLECTION", "bad; drop")])).unwrap_err();
        assert!(err.to_string().contains("database.collection"));
    }

    #[test]
    fn test_empty_webhook_means_disabled() {
        let config = Config::from_sources(None, env(&[("ALERT_WEBHOOK_URL", "  ")])).unwrap();
        assert!(config.alert.webhook_url.is_none());
    }
}
