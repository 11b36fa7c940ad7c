//! CSV record store
//!
//! Records are appended to a single CSV file. The header row is written once,
//! when the file is missing or empty, so a resumed run keeps appending below
//! the rows of previous runs.

use crate::extract::{ExtractedRecord, RECORD_COLUMNS};
use crate::output::traits::{OutputResult, RecordStore};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub struct CsvStore {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvStore {
    /// Opens the CSV file for appending, writing the header if needed
    pub fn open(path: impl AsRef<Path>) -> OutputResult<Self> {
        let path = path.as_ref().to_path_buf();
        let needs_header = std::fs::metadata(&path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(RECORD_COLUMNS)?;
            writer.flush()?;
        }

        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for CsvStore {
    fn write_batch(&mut self, records: &[ExtractedRecord]) -> OutputResult<()> {
        for record in records {
            self.writer.serialize(record)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn count(&self) -> OutputResult<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;

        let mut rows = 0;
        for row in reader.records() {
            row?;
            rows += 1;
        }
        Ok(rows)
    }

    fn kind(&self) -> &'static str {
        "csv"
    }
}
