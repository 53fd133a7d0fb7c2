//! Indexed min-heap of in-flight workers

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::Instant;

use super::RegistryError;
use crate::worker::WorkerId;

/// A worker that can be tracked by [`WorkerHeap`]
#[async_trait]
pub trait HeapWorker: Send {
    /// Stable identity, used as the index key
    fn id(&self) -> WorkerId;

    /// Signal the worker to stop and wait until it has reported completion
    async fn close(&mut self);
}

struct HeapEntry<W> {
    started_at: Instant,
    worker: W,
}

/// Min-heap of workers keyed by start time, with removal by id
///
/// The root is always the worker that started earliest. `add` and `remove`
/// are O(log n); `contains` and position lookups are O(1).
///
/// # Example
///
/// ```ignore
/// let mut heap = WorkerHeap::with_capacity(100);
/// heap.add(worker)?;
///
/// if let Some((oldest, started_at)) = heap.peek() {
///     println!("worker {} running since {:?}", oldest.id(), started_at);
/// }
///
/// heap.remove(worker_id)?;
/// ```
pub struct WorkerHeap<W> {
    entries: Vec<HeapEntry<W>>,
    indexes: HashMap<WorkerId, usize>,
}

impl<W: HeapWorker> Default for WorkerHeap<W> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<W: HeapWorker> WorkerHeap<W> {
    /// Create an empty heap with room for `capacity` workers
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            indexes: HashMap::with_capacity(capacity),
        }
    }

    /// Register a worker, keyed by the current time
    pub fn add(&mut self, worker: W) -> Result<(), RegistryError> {
        self.add_at(worker, Instant::now())
    }

    /// Register a worker with an explicit start time
    pub fn add_at(&mut self, worker: W, started_at: Instant) -> Result<(), RegistryError> {
        let id = worker.id();
        if self.indexes.contains_key(&id) {
            return Err(RegistryError::DuplicateWorker(id));
        }

        let index = self.entries.len();
        self.entries.push(HeapEntry { started_at, worker });
        self.indexes.insert(id, index);
        self.sift_up(index);
        Ok(())
    }

    /// Remove a worker by id and hand it back
    pub fn remove(&mut self, id: WorkerId) -> Result<W, RegistryError> {
        let index = *self
            .indexes
            .get(&id)
            .ok_or(RegistryError::WorkerNotFound(id))?;

        match self.entries.get(index) {
            Some(entry) if entry.worker.id() == id => {}
            _ => return Err(RegistryError::IndexCorrupted { id, index }),
        }

        let last = self.entries.len() - 1;
        if index != last {
            self.swap(index, last);
        }

        let entry = self
            .entries
            .pop()
            .ok_or(RegistryError::IndexCorrupted { id, index })?;
        self.indexes.remove(&id);

        // The entry moved into the hole may belong above or below it
        if index < self.entries.len() && !self.sift_down(index) {
            self.sift_up(index);
        }

        Ok(entry.worker)
    }

    /// The earliest-started worker and its start time
    pub fn peek(&self) -> Option<(&W, Instant)> {
        self.entries
            .first()
            .map(|entry| (&entry.worker, entry.started_at))
    }

    /// Whether a worker with this id is registered
    pub fn contains(&self, id: WorkerId) -> bool {
        self.indexes.contains_key(&id)
    }

    /// Number of registered workers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no workers are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over workers in heap order (not sorted)
    pub fn iter(&self) -> impl Iterator<Item = (&W, Instant)> {
        self.entries
            .iter()
            .map(|entry| (&entry.worker, entry.started_at))
    }

    /// Close every registered worker concurrently
    ///
    /// Entries are left in place; a heap that has been closed is not meant to
    /// be used again.
    pub async fn close_all(&mut self) {
        join_all(self.entries.iter_mut().map(|entry| entry.worker.close())).await;
    }

    /// Check the id mapping and heap order against the entry array
    pub fn verify(&self) -> Result<(), RegistryError> {
        for (index, entry) in self.entries.iter().enumerate() {
            let id = entry.worker.id();
            if self.indexes.get(&id) != Some(&index) {
                return Err(RegistryError::IndexCorrupted { id, index });
            }
            if index > 0 && self.less(index, (index - 1) / 2) {
                return Err(RegistryError::HeapOrderViolated { index });
            }
        }

        // Every entry maps correctly, so any extra id points at a foreign slot
        let stale = self.indexes.iter().find(|(id, index)| {
            self.entries.get(**index).map(|entry| entry.worker.id()) != Some(**id)
        });
        if let Some((&id, &index)) = stale {
            return Err(RegistryError::IndexCorrupted { id, index });
        }
        Ok(())
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.entries[i].started_at < self.entries[j].started_at
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.entries.swap(i, j);
        self.indexes.insert(self.entries[i].worker.id(), i);
        self.indexes.insert(self.entries[j].worker.id(), j);
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.less(index, parent) {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    /// Returns whether the entry moved
    fn sift_down(&mut self, start: usize) -> bool {
        let len = self.entries.len();
        let mut index = start;
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, index) {
                break;
            }
            self.swap(index, child);
            index = child;
        }
        index > start
    }
}
