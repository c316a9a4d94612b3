use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;
use crate::error::{Result, CsvIngestError};

pub mod bulk;
pub mod migrate;

pub use bulk::{BulkWriteOutcome, bulk_insert_unordered, count_documents};

/// Handle to the document database and the collection rows are written to.
///
/// Constructed once at start-up and passed to the importer and scheduler.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
    collection: String,
}

impl Db {
    /// Create a new database handle for `collection`
    pub fn new<P: AsRef<Path>>(db_path: P, collection: &str) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            collection: collection.to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = open_connection(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| CsvIngestError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("database task join: {}", e),
        )))?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path).map_err(CsvIngestError::Database)?;

    // WAL keeps readers (the offsets tool, ad-hoc queries) from blocking the importer
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA busy_timeout = 10000;"
    )?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_db_connection() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");
        let db = Db::new(&db_path, "rows");

        let result = db.with_connection(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", [])
                .map_err(CsvIngestError::Database)?;
            Ok(())
        }).await;

        assert!(result.is_ok());
        assert!(db_path.exists());
        assert_eq!(db.collection(), "rows");
    }

    #[tokio::test]
    async fn test_pragmas_set() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"), "rows");

        db.with_connection(|conn| {
            let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
            assert_eq!(journal_mode.to_uppercase(), "WAL");

            let busy_timeout: i64 = conn.query_row("PRAGMA busy_timeout", [], |row| row.get(0))?;
            assert_eq!(busy_timeout, 10000);

            Ok::<(), CsvIngestError>(())
        }).await.unwrap();
    }
}
