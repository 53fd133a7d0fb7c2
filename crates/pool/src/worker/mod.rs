//! Write workers and the pool that supervises them
//!
//! This module provides:
//! - [`WriteWorkerPool`] - Supervisor of in-flight batch writes
//! - [`admit`] - Pending record admission check
//! - [`WorkerId`] / [`WorkerIdSequence`] - Worker identities
//!
//! # Lifecycle of a batch
//!
//! ```text
//!  submit_batch ──► admit? ──no──► discarded_record_count += size, warn
//!                     │
//!                    yes
//!                     ▼
//!            WorkerHeap::add, pending += size, spawn WriteWorker
//!                     │
//!                     ▼
//!            BatchWriter::write (success or error, never retried)
//!                     │
//!                     ▼
//!            WorkerCompleted ──► pending -= size, WorkerHeap::remove
//! ```

mod admission;
mod id;
mod pool;
mod write_worker;

pub use admission::admit;
pub use id::{WorkerId, WorkerIdSequence};
pub use pool::{BatchSender, PoolError, PoolStats, WriteWorkerPool};
pub use write_worker::WorkerCompletion;
