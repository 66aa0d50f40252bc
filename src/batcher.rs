// src/batcher.rs
//
// Sink Batcher (component G): accumulates records up to `batch_size` and
// flushes them to the sink as a single bulk operation.

use std::sync::Arc;

use tracing::warn;

use crate::cert::CertificateRecord;
use crate::sink::Sink;

pub struct Batcher {
    sink: Arc<dyn Sink>,
    collection: String,
    batch_size: usize,
    buffer: Vec<CertificateRecord>,
}

impl Batcher {
    pub fn new(sink: Arc<dyn Sink>, collection: String, batch_size: usize) -> Self {
        Self {
            sink,
            collection,
            batch_size,
            buffer: Vec::new(),
        }
    }

    /// Buffers a record, flushing immediately if the buffer has reached
    /// `batch_size`.
    pub async fn add(&mut self, record: CertificateRecord) {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush().await;
        }
    }

    /// Flushes whatever is buffered as a single bulk operation. A
    /// transport error discards the whole batch with a warning; a partial
    /// failure is logged but not retried — at-least-once delivery is not
    /// offered, the Seen-Cache is what prevents obvious duplicates on
    /// re-runs.
    pub async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        let count = batch.len();
        match self.sink.bulk_index(&self.collection, &batch).await {
            Ok((success, failed)) => {
                if failed > 0 {
                    warn!(success, failed, "sink reported partial batch failure");
                }
            }
            Err(err) => {
                warn!(%err, dropped = count, "sink bulk_index failed, dropping batch");
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
