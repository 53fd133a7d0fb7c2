//! One asynchronous worker per accepted batch

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::id::WorkerId;
use super::pool::PoolEvent;
use crate::registry::HeapWorker;
use crate::writer::{Batch, BatchWriter, WriteContext, WriteError};

/// Completion notice a worker sends to the supervisor, exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCompletion {
    /// Worker that finished
    pub worker_id: WorkerId,

    /// Records in the worker's batch
    pub batch_size: usize,

    /// What the writer reported
    pub outcome: Result<(), WriteError>,
}

/// A worker that owns one batch until it has been handed to the writer
pub(crate) struct WriteWorker<R: Send + Sync + 'static> {
    id: WorkerId,
    batch: Batch<R>,
    writer: Arc<dyn BatchWriter<R>>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<PoolEvent<R>>,
}

impl<R: Send + Sync + 'static> WriteWorker<R> {
    pub(crate) fn new(
        id: WorkerId,
        batch: Batch<R>,
        writer: Arc<dyn BatchWriter<R>>,
        events: mpsc::UnboundedSender<PoolEvent<R>>,
    ) -> Self {
        Self {
            id,
            batch,
            writer,
            cancel: CancellationToken::new(),
            events,
        }
    }

    /// Start the write on the runtime and return the supervisor's handle
    pub(crate) fn spawn(self) -> WorkerHandle {
        let id = self.id;
        let batch_size = self.batch.len();
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());

        WorkerHandle {
            id,
            batch_size,
            cancel,
            join: Some(join),
        }
    }

    async fn run(self) {
        let ctx = WriteContext::new(self.id, self.cancel.clone());
        let batch_size = self.batch.len();

        let outcome = AssertUnwindSafe(self.writer.write(&self.batch, &ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(WriteError::Panicked(panic_message(panic.as_ref()))));

        let completion = WorkerCompletion {
            worker_id: self.id,
            batch_size,
            outcome,
        };

        if self
            .events
            .send(PoolEvent::WorkerCompleted(completion))
            .is_err()
        {
            debug!(worker_id = %self.id, "Pool loop has exited, completion not delivered");
        }
    }
}

/// Supervisor-side handle of a running worker
pub(crate) struct WorkerHandle {
    id: WorkerId,
    batch_size: usize,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Records in the worker's batch
    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[async_trait]
impl HeapWorker for WorkerHandle {
    fn id(&self) -> WorkerId {
        self.id
    }

    async fn close(&mut self) {
        self.cancel.cancel();

        // The task sends its completion before it ends
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!(worker_id = %self.id, error = %e, "Worker task ended abnormally");
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::InMemoryBatchWriter;

    struct PanickingWriter;

    #[async_trait]
    impl BatchWriter<u32> for PanickingWriter {
        async fn write(&self, _batch: &Batch<u32>, _ctx: &WriteContext) -> Result<(), WriteError> {
            panic!("backend exploded");
        }
    }

    fn completion_of(event: PoolEvent<u32>) -> WorkerCompletion {
        match event {
            PoolEvent::WorkerCompleted(completion) => completion,
            _ => panic!("expected a completion"),
        }
    }

    #[tokio::test]
    async fn test_worker_reports_success() {
        let writer = Arc::new(InMemoryBatchWriter::<u32>::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = WriteWorker::new(WorkerId::new(1), vec![1, 2, 3].into(), writer.clone(), tx)
            .spawn();
        assert_eq!(handle.id(), WorkerId::new(1));
        assert_eq!(handle.batch_size(), 3);

        let completion = completion_of(rx.recv().await.unwrap());
        assert_eq!(
            completion,
            WorkerCompletion {
                worker_id: WorkerId::new(1),
                batch_size: 3,
                outcome: Ok(()),
            }
        );
        assert_eq!(writer.written_records(), 3);

        // Exactly one completion: the worker's sender is gone afterwards
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_worker_forwards_write_error() {
        let writer = Arc::new(InMemoryBatchWriter::<u32>::new().failing("timeout"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        WriteWorker::new(WorkerId::new(2), vec![1].into(), writer.clone(), tx).spawn();

        let completion = completion_of(rx.recv().await.unwrap());
        assert_eq!(completion.outcome, Err(WriteError::Backend("timeout".into())));
        assert_eq!(writer.attempts(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_panicking_writer_still_completes() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        WriteWorker::new(WorkerId::new(3), vec![7].into(), Arc::new(PanickingWriter), tx).spawn();

        let completion = completion_of(rx.recv().await.unwrap());
        assert_eq!(
            completion.outcome,
            Err(WriteError::Panicked("backend exploded".into()))
        );
    }

    #[tokio::test]
    async fn test_close_cancels_and_waits_for_completion() {
        let writer = Arc::new(InMemoryBatchWriter::<u32>::new().gated());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handle =
            WriteWorker::new(WorkerId::new(4), vec![1, 2].into(), writer.clone(), tx).spawn();

        handle.close().await;

        // Completion was sent before close returned
        let completion = completion_of(rx.try_recv().unwrap());
        assert_eq!(completion.worker_id, WorkerId::new(4));
        assert_eq!(completion.outcome, Err(WriteError::Cancelled));
        assert_eq!(writer.cancellations(), 1);
    }

    #[tokio::test]
    async fn test_completion_dropped_when_pool_gone() {
        let writer = Arc::new(InMemoryBatchWriter::<u32>::new());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let mut handle =
            WriteWorker::new(WorkerId::new(5), vec![1].into(), writer.clone(), tx).spawn();
        handle.close().await;

        assert_eq!(writer.attempts(), 1);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(17u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
