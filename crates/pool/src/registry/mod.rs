//! Registry of in-flight workers
//!
//! This module provides:
//! - [`WorkerHeap`] - Indexed min-heap of workers keyed by start time
//! - [`HeapWorker`] - What the heap needs from a worker (identity and close hook)
//! - [`RegistryError`] - Lookup failures and internal invariant violations
//!
//! # Layout
//!
//! ```text
//!   entries (binary min-heap by started_at)     indexes (id -> position)
//!   ┌────┬────┬────┬────┬────┐                  ┌──────┬─────┐
//!   │ w3 │ w7 │ w5 │ w9 │ w8 │                  │  w3  │  0  │
//!   └────┴────┴────┴────┴────┘                  │  w7  │  1  │
//!     0    1    2    3    4                     │  ... │ ... │
//!                                               └──────┴─────┘
//! ```
//!
//! Every swap in the entry array rewrites the position of both swapped
//! workers, so the two structures never drift apart.

mod heap;

pub use heap::{HeapWorker, WorkerHeap};

use crate::worker::WorkerId;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No worker with this id is registered
    #[error("worker {0} not found in registry")]
    WorkerNotFound(WorkerId),

    /// A worker with this id is already registered
    #[error("worker {0} is already registered")]
    DuplicateWorker(WorkerId),

    /// The id -> position mapping disagrees with the entry array
    #[error("registry index corrupted: worker {id} mapped to position {index}")]
    IndexCorrupted { id: WorkerId, index: usize },

    /// An entry starts earlier than its parent
    #[error("registry heap order violated at position {index}")]
    HeapOrderViolated { index: usize },
}

impl RegistryError {
    /// Whether this error means the registry's internal state is broken
    ///
    /// `WorkerNotFound` is an ordinary lookup miss; everything else can only
    /// happen through a bookkeeping bug.
    pub fn is_invariant_violation(&self) -> bool {
        !matches!(self, Self::WorkerNotFound(_))
    }
}
