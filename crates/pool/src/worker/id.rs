//! Worker identities

use serde::{Deserialize, Serialize};

/// Identity of an in-flight worker
///
/// Ids are handed out by [`WorkerIdSequence`] and are unique among the
/// workers that are active at the same time. Zero is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Wrap a raw id
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw id
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic worker id allocator that wraps back to 1 after its maximum
#[derive(Debug, Clone)]
pub struct WorkerIdSequence {
    next: u32,
    max: u32,
}

impl Default for WorkerIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerIdSequence {
    /// Create a sequence spanning `1..=u32::MAX`
    pub fn new() -> Self {
        Self::with_max(u32::MAX)
    }

    /// Create a sequence spanning `1..=max`
    pub fn with_max(max: u32) -> Self {
        Self {
            next: 1,
            max: max.max(1),
        }
    }

    /// Size of the id space
    pub fn capacity(&self) -> u32 {
        self.max
    }

    /// Take the next id in sequence, wrapping after the maximum
    pub fn next_id(&mut self) -> WorkerId {
        let id = self.next;
        self.next = if id >= self.max { 1 } else { id + 1 };
        WorkerId(id)
    }

    /// Take the next id in sequence that is not in use
    ///
    /// Ids for which `in_use` returns true are skipped. Returns `None` only
    /// when every id in the space is in use.
    pub fn next_free(&mut self, in_use: impl Fn(WorkerId) -> bool) -> Option<WorkerId> {
        for _ in 0..self.max {
            let id = self.next_id();
            if !in_use(id) {
                return Some(id);
            }
        }
        None
    }
}
