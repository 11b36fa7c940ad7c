//! Resume ledger
//!
//! Tracks which item URLs already produced a record, across runs.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Durable record of processed item URLs
///
/// The ledger is a newline-delimited file of URLs, loaded into memory once
/// when opened. Lookups are served from memory. Every newly recorded URL is
/// appended and flushed before `record` returns, so a URL is on disk as soon
/// as its record has been handed to the sink.
#[derive(Debug)]
pub struct ResumeLedger {
    path: PathBuf,
    processed: Mutex<HashSet<String>>,
    writer: Mutex<File>,
}

impl ResumeLedger {
    /// Opens (or creates) the ledger at `path` and loads its entries
    ///
    /// Blank lines and surrounding whitespace are ignored.
    ///
    /// # Returns
    ///
    /// * `Ok(ResumeLedger)` - Ledger loaded, ready for appends
    /// * `Err(io::Error)` - The file could not be read or opened for append
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut processed = HashSet::new();

        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    let url = line.trim();
                    if !url.is_empty() {
                        processed.insert(url.to_string());
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let writer = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!("Loaded {} processed URLs from {}", processed.len(), path.display());

        Ok(Self {
            path,
            processed: Mutex::new(processed),
            writer: Mutex::new(writer),
        })
    }

    pub fn contains(&self, url: &str) -> bool {
        self.processed().contains(url)
    }

    /// Records a URL as processed
    ///
    /// Idempotent: recording a URL already present does nothing and returns
    /// `Ok(false)`. A new URL is appended and flushed to disk before returning
    /// `Ok(true)`. If the write fails the URL is removed from memory again so
    /// a retry can record it.
    pub fn record(&self, url: &str) -> io::Result<bool> {
        if !self.processed().insert(url.to_string()) {
            return Ok(false);
        }

        let written = {
            let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
            writeln!(writer, "{}", url).and_then(|_| writer.flush())
        };

        match written {
            Ok(()) => Ok(true),
            Err(e) => {
                self.processed().remove(url);
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.processed().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn processed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.processed.lock().unwrap_or_else(|e| e.into_inner())
    }
}
