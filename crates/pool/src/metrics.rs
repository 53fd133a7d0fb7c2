//! Pool metrics
//!
//! Handles are owned per pool instance rather than registered in a
//! process-wide registry, so any number of pools can coexist. A handle is a
//! cheap clone sharing one atomic cell; hand clones to an exporter to
//! publish the values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Metric name of the discarded record counter
pub const DISCARDED_RECORD_COUNT: &str = "discarded_record_count";

/// Metric name of the pending record gauge
pub const PENDING_RECORD_COUNT: &str = "pending_record_count";

/// Monotonic counter
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the counter
    pub fn inc_by(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time gauge
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicU64>,
}

impl Gauge {
    /// Create a gauge at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the gauge value
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metric handles for one pool
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    discarded_records: Counter,
    pending_records: Gauge,
}

impl PoolMetrics {
    /// Create a fresh set of handles
    pub fn new() -> Self {
        Self::default()
    }

    /// Records dropped by admission control
    pub fn discarded_records(&self) -> &Counter {
        &self.discarded_records
    }

    /// Records accepted but not yet written, sampled once per supervisor iteration
    pub fn pending_records(&self) -> &Gauge {
        &self.pending_records
    }

    /// Read both metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            discarded_record_count: self.discarded_records.get(),
            pending_record_count: self.pending_records.get(),
        }
    }
}

/// Values of the pool metrics at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub discarded_record_count: u64,
    pub pending_record_count: u64,
}
