pub mod config;
pub mod error;
pub mod db;
pub mod ingest;
pub mod alert;
pub mod logging;
pub mod schedule;

pub use config::Config;
pub use error::{CsvIngestError, Result};
pub use ingest::{ImportReport, ImportStatus, Importer};
pub use schedule::Scheduler;
