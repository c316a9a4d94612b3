use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use crate::error::Result;

/// A CSV export eligible for import
#[derive(Debug, Clone)]
pub struct CsvCandidate {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub file_size: u64,
}

/// List files directly inside `dir` whose name ends with `suffix`.
///
/// Sub-directories are not descended into. Unreadable entries are skipped.
pub fn list_candidates(dir: &Path, suffix: &str) -> Result<Vec<CsvCandidate>> {
    if !dir.is_dir() {
        return Err(crate::error::CsvIngestError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("CSV directory not found: {}", dir.display()),
        )));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .file_name()
            .to_str()
            .map(|name| name.ends_with(suffix))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        files.push(CsvCandidate {
            path: entry.path().to_path_buf(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            file_size: metadata.len(),
        });
    }

    Ok(files)
}

/// Most recently modified file in `dir` ending with `suffix`, if any.
///
/// Ties on modification time resolve to directory listing order.
pub fn pick_latest(dir: &Path, suffix: &str) -> Result<Option<CsvCandidate>> {
    let mut files = list_candidates(dir, suffix)?;
    // stable sort keeps listing order among equal mtimes
    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(files.into_iter().next())
}
