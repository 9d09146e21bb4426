//! Configuration for the commit log
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};

/// Default segment size before rotation (20 MiB)
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 20 * 1024 * 1024;

/// Default period between retention sweeps (12 hours)
pub const DEFAULT_COMPACTION_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Default maximum record age (7 days)
pub const DEFAULT_RETENTION_POLICY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Main configuration for a commit log instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Segment Configuration
    // -------------------------------------------------------------------------
    /// Max size of a segment data file (in bytes) before a new one is rolled
    pub max_segment_size: u64,

    /// Sync strategy: how often to fsync segment files
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Retention Configuration
    // -------------------------------------------------------------------------
    /// Wall-clock period between background retention sweeps
    pub compaction_interval: Duration,

    /// Max age of a record before its segment becomes eligible for deletion
    pub retention_policy: Duration,

    /// Spawn the background compaction worker on open
    pub background_compaction: bool,
}

/// Segment sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStrategy {
    /// Only fsync on explicit `sync()` / `close()` and on rotation
    OnClose,

    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced appends (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            sync_strategy: SyncStrategy::OnClose,
            compaction_interval: DEFAULT_COMPACTION_INTERVAL,
            retention_policy: DEFAULT_RETENTION_POLICY,
            background_compaction: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the log cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(LogError::Config(
                "max_segment_size must be greater than zero".to_string(),
            ));
        }

        if self.background_compaction && self.compaction_interval.is_zero() {
            return Err(LogError::Config(
                "compaction_interval must be non-zero when background compaction is enabled"
                    .to_string(),
            ));
        }

        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(LogError::Config(
                "EveryNEntries sync strategy needs a count greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the segment rotation threshold (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the segment sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the period between background retention sweeps
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = interval;
        self
    }

    /// Set the maximum record age
    pub fn retention_policy(mut self, retention: Duration) -> Self {
        self.config.retention_policy = retention;
        self
    }

    /// Enable or disable the background compaction worker
    pub fn background_compaction(mut self, enabled: bool) -> Self {
        self.config.background_compaction = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();

        assert_eq!(config.max_segment_size, 20 * 1024 * 1024);
        assert_eq!(config.compaction_interval, Duration::from_secs(43_200));
        assert_eq!(config.retention_policy, Duration::from_secs(604_800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_segment_size_rejected() {
        let config = Config::builder().max_segment_size(0).build();

        assert!(matches!(config.validate(), Err(LogError::Config(_))));
    }

    #[test]
    fn test_zero_interval_only_rejected_with_worker() {
        let with_worker = Config::builder()
            .compaction_interval(Duration::ZERO)
            .build();
        assert!(with_worker.validate().is_err());

        let without_worker = Config::builder()
            .compaction_interval(Duration::ZERO)
            .background_compaction(false)
            .build();
        assert!(without_worker.validate().is_ok());
    }

    #[test]
    fn test_zero_sync_count_rejected() {
        let config = Config::builder()
            .sync_strategy(SyncStrategy::EveryNEntries { count: 0 })
            .build();

        assert!(config.validate().is_err());
    }
}
