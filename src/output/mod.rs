//! Output module for persisting harvested records
//!
//! This module handles:
//! - Buffering records and flushing them in fixed-size batches
//! - Writing batches to a CSV or SQLite record store
//! - Recording and printing run statistics

mod csv_output;
mod sink;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_output::CsvStore;
pub use sink::BatchSink;
pub use sqlite_output::SqliteStore;
pub use stats::{print_run_stats, RunStats};
pub use traits::{OutputError, OutputResult, RecordStore};

use crate::config::OutputFormat;
use std::path::Path;

/// Opens the record store of the given format at `path`
///
/// # Arguments
///
/// * `format` - Backend to use
/// * `path` - File holding the records; created if missing
///
/// # Returns
///
/// * `Ok(Box<dyn RecordStore>)` - Store ready for batches
/// * `Err(OutputError)` - Failed to open or initialize the file
pub fn open_store(format: OutputFormat, path: &Path) -> OutputResult<Box<dyn RecordStore>> {
    let store: Box<dyn RecordStore> = match format {
        OutputFormat::Csv => Box::new(CsvStore::open(path)?),
        OutputFormat::Sqlite => Box::new(SqliteStore::open(path)?),
    };
    tracing::debug!("Opened {} record store at {}", store.kind(), path.display());
    Ok(store)
}
