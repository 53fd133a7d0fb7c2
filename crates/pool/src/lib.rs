//! # Bounded Write Pool
//!
//! An admission-controlled pool of asynchronous batch writers for telemetry
//! records.
//!
//! ## Features
//!
//! - **Admission control**: the total number of in-flight records is capped;
//!   batches that would exceed the cap are dropped and counted
//! - **Single-owner supervisor**: one task owns every piece of mutable pool
//!   state, all interaction happens over a channel
//! - **Indexed worker registry**: in-flight workers live in a min-heap keyed by
//!   start time with O(log n) removal by worker id
//! - **Coordinated shutdown**: every active worker is signalled to close and
//!   awaited before shutdown returns
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  submit_batch   ┌──────────────────────────────────────┐
//! │   Producers  │ ──────────────► │              Supervisor              │
//! └──────────────┘                 │  admission ─► WorkerHeap ─► spawn    │
//!                                  │  pending_records, WorkerIdSequence   │
//!                                  └──────────────────────────────────────┘
//!                                        ▲                    │
//!                                        │ WorkerCompleted    ▼
//!                                  ┌──────────────────────────────────────┐
//!                                  │     WriteWorker (one per batch)      │
//!                                  │     BatchWriter::write(batch, ctx)   │
//!                                  └──────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use writepool::{InMemoryBatchWriter, WritePoolConfig, WriteWorkerPool};
//!
//! # async fn run() -> Result<(), writepool::PoolError> {
//! let writer = Arc::new(InMemoryBatchWriter::<u64>::new());
//! let config = WritePoolConfig::default().with_max_pending_records(10_000);
//! let pool = WriteWorkerPool::<u64>::start(config, writer);
//!
//! pool.submit_batch(vec![1, 2, 3])?;
//!
//! pool.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod metrics;
pub mod registry;
pub mod worker;
pub mod writer;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::WritePoolConfig;
    pub use crate::metrics::{MetricsSnapshot, PoolMetrics};
    pub use crate::worker::{BatchSender, PoolError, PoolStats, WorkerId, WriteWorkerPool};
    pub use crate::writer::{Batch, BatchWriter, InMemoryBatchWriter, WriteContext, WriteError};
}

// Re-export key types at crate root
pub use config::WritePoolConfig;
pub use metrics::{Counter, Gauge, MetricsSnapshot, PoolMetrics};
pub use registry::{HeapWorker, RegistryError, WorkerHeap};
pub use worker::{
    admit, BatchSender, PoolError, PoolStats, WorkerCompletion, WorkerId, WorkerIdSequence,
    WriteWorkerPool,
};
pub use writer::{Batch, BatchWriter, InMemoryBatchWriter, WriteContext, WriteError};
