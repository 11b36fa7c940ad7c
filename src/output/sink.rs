//! Batched record sink
//!
//! Workers submit records one at a time. The sink buffers them and writes a
//! batch of exactly `batch_size` records to the store each time the buffer
//! fills up. Whatever is left is written by `drain`.

use crate::extract::ExtractedRecord;
use crate::output::traits::{OutputResult, RecordStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

pub struct BatchSink {
    batch_size: usize,
    buffer: Mutex<Vec<ExtractedRecord>>,
    store: Mutex<Box<dyn RecordStore>>,
    flushes: AtomicUsize,
    written: AtomicUsize,
}

impl BatchSink {
    pub fn new(store: Box<dyn RecordStore>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            buffer: Mutex::new(Vec::with_capacity(batch_size)),
            store: Mutex::new(store),
            flushes: AtomicUsize::new(0),
            written: AtomicUsize::new(0),
        }
    }

    /// Buffers a record, flushing one full batch if the buffer reached the
    /// batch size
    ///
    /// If the flush fails the batch is put back at the front of the buffer
    /// and the error is returned.
    pub fn submit(&self, record: ExtractedRecord) -> OutputResult<()> {
        let batch = {
            let mut buffer = self.buffer();
            buffer.push(record);
            if buffer.len() >= self.batch_size {
                Some(buffer.drain(..self.batch_size).collect::<Vec<_>>())
            } else {
                None
            }
        };

        match batch {
            Some(batch) => self.flush(batch),
            None => Ok(()),
        }
    }

    /// Flushes every buffered record
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of records written (0 when the buffer was empty)
    /// * `Err(OutputError)` - The store rejected the batch; records stay buffered
    pub fn drain(&self) -> OutputResult<usize> {
        let batch: Vec<_> = self.buffer().drain(..).collect();
        let count = batch.len();
        if count == 0 {
            return Ok(0);
        }

        self.flush(batch)?;
        Ok(count)
    }

    /// Records waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer().len()
    }

    /// Number of successful flushes so far
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of records written to the store so far
    pub fn written(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }

    /// Number of records the underlying store holds
    pub fn persisted(&self) -> OutputResult<usize> {
        self.store().count()
    }

    fn flush(&self, batch: Vec<ExtractedRecord>) -> OutputResult<()> {
        let result = {
            let mut store = self.store();
            let result = store.write_batch(&batch);
            if result.is_ok() {
                tracing::debug!("Flushed {} records to {} store", batch.len(), store.kind());
            }
            result
        };

        match result {
            Ok(()) => {
                self.flushes.fetch_add(1, Ordering::SeqCst);
                self.written.fetch_add(batch.len(), Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to flush {} records: {}", batch.len(), e);
                self.buffer().splice(0..0, batch);
                Err(e)
            }
        }
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<ExtractedRecord>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self) -> MutexGuard<'_, Box<dyn RecordStore>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}
