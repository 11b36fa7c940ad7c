//! Record store trait and output errors
//!
//! A record store is the durable tabular target of the batch sink. Stores are
//! written one batch at a time and are never read during a run.

use crate::extract::ExtractedRecord;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Durable destination for extracted records
pub trait RecordStore: Send {
    /// Persists a batch of records
    ///
    /// The batch is on durable storage when this returns `Ok`.
    fn write_batch(&mut self, records: &[ExtractedRecord]) -> OutputResult<()>;

    /// Number of records the store currently holds
    fn count(&self) -> OutputResult<usize>;

    /// Short backend name for logs
    fn kind(&self) -> &'static str;
}
