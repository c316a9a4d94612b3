//! Per-file resume checkpoints.
//!
//! A single JSON object mapping absolute file path to the index of the next
//! data row to import. One process and one task own this file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub type OffsetMap = BTreeMap<String, u64>;

/// JSON-file backed offset map.
#[derive(Debug, Clone)]
pub struct OffsetStore {
    path: PathBuf,
}

impl OffsetStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted map.
    ///
    /// A missing, unreadable or corrupt file means "no progress" and yields an
    /// empty map.
    pub fn read(&self) -> OffsetMap {
        if !self.path.exists() {
            log::info!("Offset file not found. Starting from scratch");
            return OffsetMap::new();
        }

        let parsed = std::fs::read_to_string(&self.path)
            .map_err(crate::error::CsvIngestError::Io)
            .and_then(|s| serde_json::from_str::<OffsetMap>(&s).map_err(Into::into));

        match parsed {
            Ok(map) => map,
            Err(e) => {
                log::warn!("Failed to read offset file {}: {}", self.path.display(), e);
                OffsetMap::new()
            }
        }
    }

    /// Replace the persisted map.
    ///
    /// Written to a sibling temp file and renamed over the original so a crash
    /// mid-write leaves the previous map intact.
    pub fn write(&self, offsets: &OffsetMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string(offsets)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Offset map key for a CSV file: its canonical absolute path.
///
/// Falls back to joining the working directory when the file cannot be
/// resolved, so relative and absolute spellings of one file share a key.
pub fn offset_key(path: &Path) -> String {
    let resolved = match path.canonicalize() {
        Ok(p) => p,
        Err(_) if path.is_relative() => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    };
    resolved.to_string_lossy().into_owned()
}
