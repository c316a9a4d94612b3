//! Size-rotated progress log that can also be trimmed to recent imports.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    size: u64,
}

impl RotatingFile {
    fn open(path: &Path, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let file = open_append(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            backups,
            file,
            size,
        })
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    /// progress.log -> progress.log.1 -> ... -> progress.log.<backups>, oldest dropped.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups == 0 {
            self.file = File::create(&self.path)?;
            self.size = 0;
            return Ok(());
        }

        for n in (1..self.backups).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        std::fs::rename(&self.path, self.backup_path(1))?;
        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }

    fn write_record(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.max_bytes > 0 && self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(())
    }

    fn trim_completed(&mut self, marker: &str, keep: usize) -> io::Result<bool> {
        self.file.flush()?;
        let bytes = std::fs::read(&self.path)?;
        let content = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = content.split_inclusive('\n').collect();

        let completed: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.contains(marker))
            .map(|(i, _)| i)
            .collect();

        if completed.len() <= keep {
            return Ok(false);
        }

        // keep == 0 empties the file
        let keep_from = if keep == 0 {
            lines.len()
        } else {
            completed[completed.len() - keep]
        };
        let retained: String = lines[keep_from..].concat();

        std::fs::write(&self.path, retained.as_bytes())?;
        self.file = open_append(&self.path)?;
        self.size = retained.len() as u64;
        Ok(true)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Shared handle to the progress log file.
///
/// Clones write to the same file, so the logger and the importer can hold one
/// each.
#[derive(Clone)]
pub struct ProgressLog {
    inner: Arc<Mutex<RotatingFile>>,
}

impl ProgressLog {
    pub fn open<P: AsRef<Path>>(path: P, max_bytes: u64, backups: usize) -> Result<Self> {
        let file = RotatingFile::open(path.as_ref(), max_bytes, backups)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotatingFile> {
        // a panic mid-write leaves the file usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Keep only the last `keep` lines containing `marker` and everything after
    /// the oldest of them. Returns whether the file was rewritten.
    pub fn trim_completed(&self, marker: &str, keep: usize) -> Result<bool> {
        Ok(self.lock().trim_completed(marker, keep)?)
    }
}

impl Write for ProgressLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write_record(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_appends_to_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("progress.log");
        fs::write(&path, "earlier\n").unwrap();

        let mut log = ProgressLog::open(&path, 1024, 2).unwrap();
        log.write_all(b"later\n").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn test_rotation_by_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("progress.log");

        let mut log = ProgressLog::open(&path, 10, 2).unwrap();
        log.write_all(b"aaaaaaaa\n").unwrap(); // 9 bytes
        log.write_all(b"bbbbbbbb\n").unwrap(); // would exceed 10, rotates first
        log.write_all(b"cccccccc\n").unwrap();
        log.write_all(b"dddddddd\n").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "dddddddd\n");
        assert_eq!(fs::read_to_string(temp_dir.path().join("progress.log.1")).unwrap(), "cccccccc\n");
        assert_eq!(fs::read_to_string(temp_dir.path().join("progress.log.2")).unwrap(), "bbbbbbbb\n");
        // only `backups` historical copies are kept
        assert!(!temp_dir.path().join("progress.log.3").exists());
    }

    #[test]
    fn test_trim_keeps_last_completions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("progress.log");
        let mut content = String::new();
        for i in 0..7 {
            content.push_str(&format!("noise {}\n", i));
            content.push_str(&format!("Import completed: f{}.csv\n", i));
        }
        fs::write(&path, &content).unwrap();

        let mut log = ProgressLog::open(&path, 0, 0).unwrap();
        assert!(log.trim_completed("Import completed:", 5).unwrap());

        let trimmed = fs::read_to_string(&path).unwrap();
        assert!(trimmed.starts_with("Import completed: f2.csv\n"));
        assert_eq!(trimmed.matches("Import completed:").count(), 5);
        assert!(trimmed.contains("noise 6\n"));

        // writes after trimming append to the rewritten file
        log.write_all(b"after\n").unwrap();
        log.flush().unwrap();
        assert!(fs::read_to_string(&path).unwrap().ends_with("Import completed: f6.csv\nafter\n"));
    }

    #[test]
    fn test_trim_noop_when_few_completions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("progress.log");
        fs::write(&path, "start\nImport completed: a.csv\n").unwrap();

        let log = ProgressLog::open(&path, 0, 0).unwrap();
        assert!(!log.trim_completed("Import completed:", 5).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "start\nImport completed: a.csv\n");
    }
}
