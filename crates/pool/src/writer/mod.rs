//! Storage-side collaborator of the pool
//!
//! The pool never persists anything itself. Each accepted [`Batch`] is handed
//! to a [`BatchWriter`] by exactly one worker; the writer's result is
//! forwarded to the supervisor and never retried.

mod memory;

pub use memory::InMemoryBatchWriter;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::worker::WorkerId;

/// An ordered group of records persisted as one unit
///
/// The batch size used for admission control is the record count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<R> {
    records: Vec<R>,
}

impl<R> Batch<R> {
    /// Create a batch from records
    pub fn new(records: Vec<R>) -> Self {
        Self { records }
    }

    /// Number of records in the batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in submission order
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Take the records out of the batch
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R> From<Vec<R>> for Batch<R> {
    fn from(records: Vec<R>) -> Self {
        Self::new(records)
    }
}

/// Error reported by a write attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// The storage backend rejected or failed the write
    #[error("backend error: {0}")]
    Backend(String),

    /// The writer gave up because the worker was closed
    #[error("write cancelled")]
    Cancelled,

    /// The writer panicked
    #[error("writer panicked: {0}")]
    Panicked(String),
}

impl WriteError {
    /// Wrap any backend error
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Context handed to the writer for one write attempt
///
/// Carries the worker's cancellation hook. Closing the worker cancels the
/// context; a writer that honours it should wind down its attempt and
/// return, the worker reports completion either way.
///
/// ```ignore
/// tokio::select! {
///     result = client.insert(batch.records()) => result.map_err(WriteError::backend),
///     _ = ctx.cancelled() => Err(WriteError::Cancelled),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct WriteContext {
    worker_id: WorkerId,
    cancel: CancellationToken,
}

impl WriteContext {
    /// Create a context for a worker
    pub fn new(worker_id: WorkerId, cancel: CancellationToken) -> Self {
        Self { worker_id, cancel }
    }

    /// Id of the worker running this write
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Check if the worker has been asked to close
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the worker has been asked to close
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Durable sink for batches
///
/// Implementations are shared by every worker of a pool and called
/// concurrently.
#[async_trait]
pub trait BatchWriter<R: Send + Sync>: Send + Sync {
    /// Persist one batch
    async fn write(&self, batch: &Batch<R>, ctx: &WriteContext) -> Result<(), WriteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_from_vec() {
        let batch: Batch<u32> = vec![3, 1, 2].into();
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert_eq!(batch.records(), &[3, 1, 2]);
        assert_eq!(batch.into_records(), vec![3, 1, 2]);
    }

    #[test]
    fn test_empty_batch() {
        let batch: Batch<u32> = Batch::new(vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn test_write_error_backend() {
        let err = WriteError::backend("connection refused");
        assert_eq!(err, WriteError::Backend("connection refused".into()));
        assert_eq!(err.to_string(), "backend error: connection refused");
    }

    #[tokio::test]
    async fn test_context_cancellation() {
        let token = CancellationToken::new();
        let ctx = WriteContext::new(WorkerId::new(9), token.clone());

        assert_eq!(ctx.worker_id(), WorkerId::new(9));
        assert!(!ctx.is_cancelled());

        token.cancel();

        assert!(ctx.is_cancelled());
        ctx.cancelled().await;
    }
}
