//! Write worker pool
//!
//! One supervisor task owns the pending record count, the worker registry and
//! the id sequence. Producers, workers and the shutdown call all reach it
//! through a single channel, so events are handled one at a time in arrival
//! order and no pool state sits behind a lock.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::admission::admit;
use super::id::{WorkerId, WorkerIdSequence};
use super::write_worker::{WorkerCompletion, WorkerHandle, WriteWorker};
use crate::config::WritePoolConfig;
use crate::metrics::PoolMetrics;
use crate::registry::{HeapWorker, RegistryError, WorkerHeap};
use crate::writer::{Batch, BatchWriter};

/// Write pool errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The supervisor loop is no longer running
    #[error("write pool is closed")]
    Closed,

    /// Pool bookkeeping reached an impossible state; the pool stopped itself
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// The supervisor task panicked or was aborted
    #[error("supervisor task failed: {0}")]
    SupervisorFailed(String),
}

impl From<RegistryError> for PoolError {
    fn from(err: RegistryError) -> Self {
        Self::InvariantViolation(err.to_string())
    }
}

/// Point-in-time view of the pool, answered by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Records accepted and not yet completed
    pub pending_records: usize,

    /// Workers currently registered
    pub active_workers: usize,

    /// Earliest-started active worker
    pub oldest_worker_id: Option<WorkerId>,

    /// How long the earliest-started active worker has been running
    pub oldest_worker_age: Option<Duration>,
}

/// Everything the supervisor reacts to
pub(crate) enum PoolEvent<R> {
    /// A producer submitted a batch
    Submit(Batch<R>),

    /// A worker finished its write
    WorkerCompleted(WorkerCompletion),

    /// Someone asked for a stats snapshot
    Stats(oneshot::Sender<PoolStats>),

    /// Close every worker and stop; the sender fires once that is done
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable submission handle for producers
pub struct BatchSender<R> {
    events: mpsc::UnboundedSender<PoolEvent<R>>,
}

impl<R> Clone for BatchSender<R> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<R> BatchSender<R> {
    /// Hand a batch to the pool without waiting
    ///
    /// Acceptance is decided by the supervisor; a batch over capacity is
    /// dropped and only shows up in metrics and logs. Fails with
    /// [`PoolError::Closed`] once the pool has shut down.
    pub fn submit_batch(&self, batch: impl Into<Batch<R>>) -> Result<(), PoolError> {
        self.events
            .send(PoolEvent::Submit(batch.into()))
            .map_err(|_| PoolError::Closed)
    }
}

/// Pool of write workers with admission control
///
/// # Example
///
/// ```ignore
/// use writepool::{WritePoolConfig, WriteWorkerPool};
///
/// let config = WritePoolConfig::default().with_max_pending_records(1000);
/// let pool = WriteWorkerPool::start(config, writer);
///
/// // Producers can hold their own handles
/// let sender = pool.sender();
/// sender.submit_batch(spans)?;
///
/// let stats = pool.stats().await?;
/// println!("{} records pending", stats.pending_records);
///
/// // Close every in-flight worker and stop the supervisor
/// pool.shutdown().await?;
/// ```
pub struct WriteWorkerPool<R> {
    config: WritePoolConfig,
    metrics: PoolMetrics,
    sender: BatchSender<R>,
    supervisor: JoinHandle<Result<(), PoolError>>,
}

impl<R: Send + Sync + 'static> WriteWorkerPool<R> {
    /// Start a pool with its own metric handles
    pub fn start(config: WritePoolConfig, writer: Arc<dyn BatchWriter<R>>) -> Self {
        Self::start_with_metrics(config, writer, PoolMetrics::new())
    }

    /// Start a pool that reports into the given metric handles
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_with_metrics(
        config: WritePoolConfig,
        writer: Arc<dyn BatchWriter<R>>,
        metrics: PoolMetrics,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(config.clone(), writer, metrics.clone(), &events_tx);
        let supervisor = tokio::spawn(supervisor.run(events_rx));

        Self {
            config,
            metrics,
            sender: BatchSender { events: events_tx },
            supervisor,
        }
    }

    /// Get a submission handle for a producer
    pub fn sender(&self) -> BatchSender<R> {
        self.sender.clone()
    }

    /// Hand a batch to the pool without waiting
    pub fn submit_batch(&self, batch: impl Into<Batch<R>>) -> Result<(), PoolError> {
        self.sender.submit_batch(batch)
    }

    /// Ask the supervisor for a stats snapshot
    ///
    /// The reply reflects every event sent before this call.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<PoolStats, PoolError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .events
            .send(PoolEvent::Stats(reply_tx))
            .map_err(|_| PoolError::Closed)?;
        reply_rx.await.map_err(|_| PoolError::Closed)
    }

    /// Metric handles of this pool
    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    /// Configuration the pool was started with
    pub fn config(&self) -> &WritePoolConfig {
        &self.config
    }

    /// Close every active worker and stop the supervisor
    ///
    /// Returns once each active worker has been signalled, has reported
    /// completion, and the supervisor loop has exited. Batches submitted
    /// after the shutdown request are dropped.
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<(), PoolError> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.events.send(PoolEvent::Shutdown(done_tx)).is_ok() {
            // Dropped unanswered if the loop stops for another reason
            let _ = done_rx.await;
        }

        match self.supervisor.await {
            Ok(result) => result,
            Err(e) => Err(PoolError::SupervisorFailed(e.to_string())),
        }
    }
}

/// Owner of all mutable pool state
struct Supervisor<R: Send + Sync + 'static> {
    config: WritePoolConfig,
    writer: Arc<dyn BatchWriter<R>>,
    metrics: PoolMetrics,
    // Weak so that dropping every external handle lets the loop end
    events: mpsc::WeakUnboundedSender<PoolEvent<R>>,
    registry: WorkerHeap<WorkerHandle>,
    ids: WorkerIdSequence,
    pending_records: usize,
}

impl<R: Send + Sync + 'static> Supervisor<R> {
    fn new(
        config: WritePoolConfig,
        writer: Arc<dyn BatchWriter<R>>,
        metrics: PoolMetrics,
        events: &mpsc::UnboundedSender<PoolEvent<R>>,
    ) -> Self {
        let registry = WorkerHeap::with_capacity(config.registry_capacity);
        Self {
            config,
            writer,
            metrics,
            events: events.downgrade(),
            registry,
            ids: WorkerIdSequence::new(),
            pending_records: 0,
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<PoolEvent<R>>,
    ) -> Result<(), PoolError> {
        info!(
            max_pending_records = self.config.max_pending_records,
            "Write pool started"
        );

        loop {
            self.metrics.pending_records().set(self.pending_records as u64);

            let Some(event) = events.recv().await else {
                debug!("All pool handles dropped");
                self.registry.close_all().await;
                break;
            };

            match self.handle_event(event).await {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break,
                Err(e) => {
                    error!(
                        error = %e,
                        active_workers = self.registry.len(),
                        pending_records = self.pending_records,
                        "Write pool stopping on internal invariant violation"
                    );
                    self.registry.close_all().await;
                    return Err(e);
                }
            }
        }

        info!("Write pool stopped");
        Ok(())
    }

    async fn handle_event(&mut self, event: PoolEvent<R>) -> Result<ControlFlow<()>, PoolError> {
        match event {
            PoolEvent::Submit(batch) => self.handle_submit(batch)?,
            PoolEvent::WorkerCompleted(completion) => self.handle_completion(completion)?,
            PoolEvent::Stats(reply) => {
                // Caller may have given up waiting
                let _ = reply.send(self.stats());
            }
            PoolEvent::Shutdown(done) => {
                info!(
                    active_workers = self.registry.len(),
                    pending_records = self.pending_records,
                    "Closing active workers"
                );
                self.registry.close_all().await;
                let _ = done.send(());
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn handle_submit(&mut self, batch: Batch<R>) -> Result<(), PoolError> {
        let batch_size = batch.len();

        if !admit(
            self.pending_records,
            batch_size,
            self.config.max_pending_records,
        ) {
            self.metrics.discarded_records().inc_by(batch_size as u64);
            warn!(
                batch_size,
                pending_record_count = self.pending_records,
                max_pending_record_count = self.config.max_pending_records,
                "Discarding batch due to exceeding pending record count"
            );
            return Ok(());
        }

        let Some(events) = self.events.upgrade() else {
            // No worker could report back once every handle is gone
            self.metrics.discarded_records().inc_by(batch_size as u64);
            warn!(
                batch_size,
                pending_record_count = self.pending_records,
                max_pending_record_count = self.config.max_pending_records,
                "Discarding batch because all pool handles were dropped"
            );
            return Ok(());
        };

        let registry = &self.registry;
        let worker_id = self
            .ids
            .next_free(|id| registry.contains(id))
            .ok_or_else(|| {
                PoolError::InvariantViolation(format!(
                    "worker id space exhausted with {} active workers",
                    registry.len()
                ))
            })?;

        self.spawn_worker(worker_id, batch, events)?;
        self.pending_records += batch_size;

        debug!(
            %worker_id,
            batch_size,
            pending_records = self.pending_records,
            "Batch accepted"
        );
        Ok(())
    }

    /// Start a worker and register it; nothing is spawned for an id already in use
    fn spawn_worker(
        &mut self,
        worker_id: WorkerId,
        batch: Batch<R>,
        events: mpsc::UnboundedSender<PoolEvent<R>>,
    ) -> Result<(), PoolError> {
        if self.registry.contains(worker_id) {
            return Err(RegistryError::DuplicateWorker(worker_id).into());
        }

        let handle = WriteWorker::new(worker_id, batch, Arc::clone(&self.writer), events).spawn();
        self.registry.add(handle)?;
        Ok(())
    }

    fn handle_completion(&mut self, completion: WorkerCompletion) -> Result<(), PoolError> {
        let WorkerCompletion {
            worker_id,
            batch_size,
            outcome,
        } = completion;

        if let Err(e) = &outcome {
            warn!(%worker_id, batch_size, error = %e, "Batch write failed");
        }

        self.pending_records = self.pending_records.checked_sub(batch_size).ok_or_else(|| {
            PoolError::InvariantViolation(format!(
                "worker {} completed {} records with only {} pending",
                worker_id, batch_size, self.pending_records
            ))
        })?;

        match self.registry.remove(worker_id) {
            Ok(handle) => {
                debug!(
                    worker_id = %handle.id(),
                    batch_size = handle.batch_size(),
                    pending_records = self.pending_records,
                    "Worker completed"
                );
                Ok(())
            }
            Err(e) if e.is_invariant_violation() => Err(e.into()),
            Err(e) => {
                error!(%worker_id, error = %e, "Could not remove worker");
                Ok(())
            }
        }
    }

    fn stats(&self) -> PoolStats {
        let oldest = self.registry.peek();
        PoolStats {
            pending_records: self.pending_records,
            active_workers: self.registry.len(),
            oldest_worker_id: oldest.map(|(worker, _)| worker.id()),
            oldest_worker_age: oldest.map(|(_, started_at)| started_at.elapsed()),
        }
    }
}
