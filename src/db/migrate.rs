use rusqlite::{Connection, params};
use crate::error::{Result, CsvIngestError};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    /// `{collection}` is replaced by the collection name.
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_collection",
        sql: r#"
            CREATE TABLE IF NOT EXISTS "{collection}" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_phone_number TEXT NOT NULL,
                created_date TEXT,
                violation_date TEXT,
                consumer_city TEXT,
                consumer_state TEXT,
                consumer_area_code TEXT,
                subject TEXT NOT NULL,
                tag TEXT NOT NULL,
                ingested_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "002_unique_complaint",
        sql: r#"
            CREATE UNIQUE INDEX IF NOT EXISTS "idx_{collection}_unique_complaint"
                ON "{collection}" (company_phone_number, created_date, violation_date);
        "#,
    },
    Migration {
        version: 3,
        name: "003_ingested_at",
        sql: r#"
            CREATE INDEX IF NOT EXISTS "idx_{collection}_ingested_at"
                ON "{collection}" (ingested_at);
        "#,
    },
];

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            collection TEXT NOT NULL,
            version INTEGER NOT NULL,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (collection, version)
        )",
        [],
    )?;
    Ok(())
}

/// Get list of migrations applied to `collection`
pub fn get_applied_migrations(conn: &Connection, collection: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM schema_migrations WHERE collection = ?1 ORDER BY version",
    )?;
    let names: Vec<String> = stmt
        .query_map([collection], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(CsvIngestError::Database)?;
    Ok(names)
}

/// Run all pending migrations for `collection`
pub fn run_migrations(conn: &mut Connection, collection: &str) -> Result<()> {
    if collection.is_empty() || !collection.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CsvIngestError::InvalidInput(format!(
            "invalid collection name: {:?}",
            collection
        )));
    }

    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn, collection)?;

    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            log::debug!("Migration {} already applied to {}, skipping", migration.name, collection);
            continue;
        }

        log::info!(
            "Applying migration: {} (version {}) to {}",
            migration.name,
            migration.version,
            collection
        );

        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql.replace("{collection}", collection))?;
        tx.execute(
            "INSERT INTO schema_migrations (collection, version, name) VALUES (?1, ?2, ?3)",
            params![collection, migration.version, migration.name],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([kind], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .unwrap();
        names
    }

    #[test]
    fn test_full_migration_schema() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        run_migrations(&mut conn, "complaints").unwrap();

        let tables = names(&conn, "table");
        assert!(tables.contains(&"complaints".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));

        let indexes = names(&conn, "index");
        assert!(indexes.contains(&"idx_complaints_unique_complaint".to_string()));
        assert!(indexes.contains(&"idx_complaints_ingested_at".to_string()));

        let applied = get_applied_migrations(&conn, "complaints").unwrap();
        assert_eq!(applied.len(), MIGRATIONS.len());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        run_migrations(&mut conn, "rows").unwrap();
        run_migrations(&mut conn, "rows").unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations WHERE collection = 'rows'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_migrations_tracked_per_collection() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        run_migrations(&mut conn, "first").unwrap();
        run_migrations(&mut conn, "second").unwrap();

        let tables = names(&conn, "table");
        assert!(tables.contains(&"first".to_string()));
        assert!(tables.contains(&"second".to_string()));
    }

    #[test]
    fn test_rejects_unsafe_collection_name() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        let err = run_migrations(&mut conn, "x\"; DROP TABLE y; --").unwrap_err();
        assert!(matches!(err, CsvIngestError::InvalidInput(_)));
    }
}
