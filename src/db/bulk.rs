//! Unordered bulk insert into the document collection.
//!
//! Every document in a batch is attempted even when an earlier one fails, so a
//! duplicate-key rejection never blocks the rest of the batch.

use rusqlite::{ffi, params};

use crate::db::Db;
use crate::error::{Result, CsvIngestError};
use crate::ingest::RowRecord;

/// Per-document error messages kept in an outcome.
const MAX_ERROR_SAMPLES: usize = 10;

/// Tally of one or more bulk writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteOutcome {
    pub inserted: usize,
    /// Documents rejected by the collection's unique index.
    pub skipped: usize,
    /// Documents rejected for any other reason.
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BulkWriteOutcome {
    pub fn merge(&mut self, other: BulkWriteOutcome) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        for e in other.errors {
            if self.errors.len() >= MAX_ERROR_SAMPLES {
                break;
            }
            self.errors.push(e);
        }
    }
}

fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

/// Insert `docs` into the collection as one unordered bulk write.
///
/// Returns `Err` only when the batch as a whole could not be attempted or
/// committed; individual rejections are reported in the outcome.
pub async fn bulk_insert_unordered(db: &Db, docs: Vec<RowRecord>) -> Result<BulkWriteOutcome> {
    if docs.is_empty() {
        return Ok(BulkWriteOutcome::default());
    }

    let collection = db.collection().to_string();
    db.with_connection(move |conn| {
        let mut outcome = BulkWriteOutcome::default();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                r#"
                INSERT INTO "{}" (
                    company_phone_number, created_date, violation_date,
                    consumer_city, consumer_state, consumer_area_code,
                    subject, tag, ingested_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                collection
            ))?;

            for (idx, doc) in docs.iter().enumerate() {
                let res = stmt.execute(params![
                    doc.company_phone_number,
                    doc.created_date,
                    doc.violation_date,
                    doc.consumer_city,
                    doc.consumer_state,
                    doc.consumer_area_code,
                    doc.subject,
                    doc.tag,
                    doc.ingested_at.to_rfc3339(),
                ]);

                match res {
                    Ok(_) => outcome.inserted += 1,
                    Err(e) if is_duplicate_key(&e) => outcome.skipped += 1,
                    Err(e) => {
                        outcome.failed += 1;
                        if outcome.errors.len() < MAX_ERROR_SAMPLES {
                            outcome.errors.push(format!("document {}: {}", idx, e));
                        }
                    }
                }
            }
        }
        tx.commit()?;
        Ok::<BulkWriteOutcome, CsvIngestError>(outcome)
    })
    .await
}

/// Number of documents currently stored in the collection.
pub async fn count_documents(db: &Db) -> Result<usize> {
    let collection = db.collection().to_string();
    db.with_connection(move |conn| {
        let count: i64 = conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "{}""#, collection),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    })
    .await
}
