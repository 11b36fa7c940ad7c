//! SQLite record store
//!
//! Records land in a single `records` table keyed by URL. A URL that is
//! already present is ignored, so replaying a batch never duplicates rows.

use crate::extract::ExtractedRecord;
use crate::output::traits::{OutputResult, RecordStore};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQL schema for the record database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    price TEXT NOT NULL,
    condition TEXT NOT NULL,
    description TEXT NOT NULL,
    post_date TEXT NOT NULL,
    scraped_at TEXT NOT NULL
);
"#;

const INSERT_SQL: &str = "INSERT OR IGNORE INTO records \
     (url, title, price, condition, description, post_date, scraped_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// SQLite record store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the record database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Database opened and schema initialized
    /// * `Err(OutputError)` - Failed to open database
    pub fn open(path: impl AsRef<Path>) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }
}

impl RecordStore for SqliteStore {
    /// Writes the whole batch in one transaction
    fn write_batch(&mut self, records: &[ExtractedRecord]) -> OutputResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            for r in records {
                stmt.execute(params![
                    r.url,
                    r.title,
                    r.price,
                    r.condition,
                    r.description,
                    r.post_date,
                    r.scraped_at
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> OutputResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}
