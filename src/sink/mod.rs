pub mod postgres;

use async_trait::async_trait;

use crate::cert::CertificateRecord;

/// A single-method abstraction over the downstream document store,
/// generalizing the teacher's `DatabaseBackend` trait (`database/mod.rs`)
/// down to the one operation this system needs: bulk ingestion.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Indexes a batch of records into `collection`, returning the number
    /// that succeeded and the number that failed. A transport-level
    /// failure (the whole call erroring out) is reported as `Err` so the
    /// caller can drop the batch; a partial failure inside a successful
    /// call is reported via the returned counts.
    async fn bulk_index(
        &self,
        collection: &str,
        records: &[CertificateRecord],
    ) -> anyhow::Result<(usize, usize)>;
}

pub use postgres::PostgresSink;
