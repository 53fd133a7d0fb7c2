//! In-memory implementation of BatchWriter for testing and load runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{Batch, BatchWriter, WriteContext, WriteError};

/// In-memory implementation of BatchWriter
///
/// Keeps a copy of every successfully written batch. Optional behaviours:
///
/// - **latency**: each write sleeps before completing
/// - **failure**: each write fails with a backend error
/// - **gated**: each write waits for a [`release`](Self::release) permit or
///   for the worker to be closed, whichever comes first
///
/// # Example
///
/// ```
/// use writepool::InMemoryBatchWriter;
///
/// let writer = InMemoryBatchWriter::<u64>::new();
/// assert_eq!(writer.written_batches(), 0);
/// ```
pub struct InMemoryBatchWriter<R> {
    written: Mutex<Vec<Vec<R>>>,
    latency: Option<Duration>,
    failure: Option<String>,
    gate: Option<Semaphore>,
    attempts: AtomicUsize,
    cancellations: AtomicUsize,
}

impl<R> Default for InMemoryBatchWriter<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> InMemoryBatchWriter<R> {
    /// Create a writer that accepts every batch immediately
    pub fn new() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            latency: None,
            failure: None,
            gate: None,
            attempts: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
        }
    }

    /// Delay every write
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every write with a backend error
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Hold every write until released or cancelled
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let `count` held writes proceed
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Number of write attempts started
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of write attempts that observed cancellation
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Number of batches stored
    pub fn written_batches(&self) -> usize {
        self.written.lock().len()
    }

    /// Number of records stored across all batches
    pub fn written_records(&self) -> usize {
        self.written.lock().iter().map(Vec::len).sum()
    }

    /// Take the stored batches, leaving the writer empty
    pub fn take_written(&self) -> Vec<Vec<R>> {
        std::mem::take(&mut *self.written.lock())
    }
}

#[async_trait]
impl<R> BatchWriter<R> for InMemoryBatchWriter<R>
where
    R: Clone + Send + Sync,
{
    async fn write(&self, batch: &Batch<R>, ctx: &WriteContext) -> Result<(), WriteError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            tokio::select! {
                permit = gate.acquire() => {
                    if let Ok(permit) = permit {
                        permit.forget();
                    }
                }
                _ = ctx.cancelled() => {
                    self.cancellations.fetch_add(1, Ordering::SeqCst);
                    return Err(WriteError::Cancelled);
                }
            }
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if ctx.is_cancelled() {
            self.cancellations.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(message) = &self.failure {
            return Err(WriteError::Backend(message.clone()));
        }

        self.written.lock().push(batch.records().to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::worker::WorkerId;

    fn context() -> (WriteContext, CancellationToken) {
        let token = CancellationToken::new();
        (WriteContext::new(WorkerId::new(1), token.clone()), token)
    }

    #[tokio::test]
    async fn test_stores_batches() {
        let writer = InMemoryBatchWriter::<i32>::new();
        let (ctx, _token) = context();

        writer.write(&vec![1, 2, 3].into(), &ctx).await.unwrap();
        writer.write(&vec![4].into(), &ctx).await.unwrap();

        assert_eq!(writer.attempts(), 2);
        assert_eq!(writer.written_batches(), 2);
        assert_eq!(writer.written_records(), 4);
        assert_eq!(writer.take_written(), vec![vec![1, 2, 3], vec![4]]);
        assert_eq!(writer.written_batches(), 0);
    }

    #[tokio::test]
    async fn test_failing_writer() {
        let writer = InMemoryBatchWriter::<i32>::new().failing("disk full");
        let (ctx, _token) = context();

        let err = writer.write(&vec![1].into(), &ctx).await.unwrap_err();
        assert_eq!(err, WriteError::Backend("disk full".into()));
        assert_eq!(writer.written_batches(), 0);
    }

    #[tokio::test]
    async fn test_gated_writer_waits_for_release() {
        let writer = Arc::new(InMemoryBatchWriter::<i32>::new().gated());
        let (ctx, _token) = context();

        let task = {
            let writer = Arc::clone(&writer);
            tokio::spawn(async move { writer.write(&vec![1, 2].into(), &ctx).await })
        };

        tokio::task::yield_now().await;
        assert_eq!(writer.written_batches(), 0);

        writer.release(1);
        task.await.unwrap().unwrap();
        assert_eq!(writer.written_batches(), 1);
    }

    #[tokio::test]
    async fn test_gated_writer_returns_on_cancel() {
        let writer = InMemoryBatchWriter::<u8>::new().gated();
        let (ctx, token) = context();
        token.cancel();

        let err = writer.write(&vec![1].into(), &ctx).await.unwrap_err();
        assert_eq!(err, WriteError::Cancelled);
        assert_eq!(writer.cancellations(), 1);
        assert_eq!(writer.written_batches(), 0);
    }

    #[tokio::test]
    async fn test_latency() {
        tokio::time::pause();
        let writer = InMemoryBatchWriter::<i32>::new().with_latency(Duration::from_secs(5));
        let (ctx, _token) = context();

        let start = tokio::time::Instant::now();
        writer.write(&vec![1].into(), &ctx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
