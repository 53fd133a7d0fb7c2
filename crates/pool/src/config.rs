//! Write pool configuration

use std::env;

use serde::{Deserialize, Serialize};

/// Default initial capacity of the worker registry
pub const DEFAULT_REGISTRY_CAPACITY: usize = 100;

/// Write pool configuration
///
/// # Example
///
/// ```
/// use writepool::WritePoolConfig;
///
/// let config = WritePoolConfig::default()
///     .with_max_pending_records(50_000)
///     .with_registry_capacity(256);
/// assert!(config.admission_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WritePoolConfig {
    /// Ceiling on records accepted but not yet written
    /// (0 or negative disables admission control)
    pub max_pending_records: i64,

    /// Initial capacity of the worker registry
    pub registry_capacity: usize,
}

impl Default for WritePoolConfig {
    fn default() -> Self {
        Self {
            max_pending_records: 0,
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
        }
    }
}

impl WritePoolConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `WRITE_POOL_MAX_PENDING_RECORDS`: pending record ceiling (default: 0, unlimited)
    /// - `WRITE_POOL_REGISTRY_CAPACITY`: initial registry capacity (default: 100)
    pub fn from_env() -> Self {
        let max_pending_records = env::var("WRITE_POOL_MAX_PENDING_RECORDS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);

        let registry_capacity = env::var("WRITE_POOL_REGISTRY_CAPACITY")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_REGISTRY_CAPACITY);

        Self {
            max_pending_records,
            registry_capacity,
        }
    }

    /// Set the pending record ceiling
    pub fn with_max_pending_records(mut self, max: i64) -> Self {
        self.max_pending_records = max;
        self
    }

    /// Set the initial registry capacity
    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    /// Whether batches can be rejected for capacity
    pub fn admission_enabled(&self) -> bool {
        self.max_pending_records > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WritePoolConfig::default();
        assert_eq!(config.max_pending_records, 0);
        assert_eq!(config.registry_capacity, 100);
        assert!(!config.admission_enabled());
    }

    #[test]
    fn test_config_builder() {
        let config = WritePoolConfig::default()
            .with_max_pending_records(1000)
            .with_registry_capacity(8);

        assert_eq!(config.max_pending_records, 1000);
        assert_eq!(config.registry_capacity, 8);
        assert!(config.admission_enabled());
    }

    #[test]
    fn test_negative_limit_disables_admission() {
        let config = WritePoolConfig::default().with_max_pending_records(-5);
        assert!(!config.admission_enabled());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: WritePoolConfig =
            serde_json::from_str(r#"{"max_pending_records": 2500}"#).unwrap();
        assert_eq!(config.max_pending_records, 2500);
        assert_eq!(config.registry_capacity, DEFAULT_REGISTRY_CAPACITY);
    }

    #[test]
    fn test_from_env() {
        // Only this test touches these variables
        env::set_var("WRITE_POOL_MAX_PENDING_RECORDS", " 750 ");
        env::set_var("WRITE_POOL_REGISTRY_CAPACITY", "not-a-number");

        let config = WritePoolConfig::from_env();

        env::remove_var("WRITE_POOL_MAX_PENDING_RECORDS");
        env::remove_var("WRITE_POOL_REGISTRY_CAPACITY");

        assert_eq!(config.max_pending_records, 750);
        assert_eq!(config.registry_capacity, DEFAULT_REGISTRY_CAPACITY);
    }
}
