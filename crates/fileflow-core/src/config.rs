//! Indexing configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default number of files per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of concurrent fingerprinting workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Source of the tunables the indexing engine needs.
pub trait ConfigProvider: Send + Sync {
    /// Files per batch (one checkpoint write per batch).
    fn batch_size(&self) -> usize;

    /// Maximum concurrent fingerprinting tasks.
    fn worker_count(&self) -> usize;

    /// Glob patterns, matched against relative paths, to leave out of a scan.
    fn ignore_patterns(&self) -> &[String] {
        &[]
    }
}

/// In-memory indexing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct IndexConfig {
    /// Files per batch.
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of worker threads.
    #[builder(default = "DEFAULT_WORKER_COUNT")]
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Patterns to ignore (glob syntax, relative to the scan root).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

impl IndexConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.batch_size == Some(0) {
            return Err("Batch size must be at least 1".to_string());
        }
        if self.worker_count == Some(0) {
            return Err("Worker count must be at least 1".to_string());
        }
        Ok(())
    }
}

impl IndexConfig {
    /// Create a new config builder.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
            ignore_patterns: Vec::new(),
        }
    }
}

impl ConfigProvider for IndexConfig {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = IndexConfig::builder()
            .batch_size(25usize)
            .worker_count(2usize)
            .ignore_patterns(vec!["*.log".to_string()])
            .build()
            .unwrap();

        assert_eq!(config.batch_size(), 25);
        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.ignore_patterns(), ["*.log".to_string()]);
    }

    #[test]
    fn test_config_defaults() {
        let config = IndexConfig::builder().build().unwrap();
        assert_eq!(config, IndexConfig::default());
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.worker_count, 4);
    }

    #[test]
    fn test_config_rejects_zero() {
        assert!(IndexConfig::builder().batch_size(0usize).build().is_err());
        assert!(IndexConfig::builder().worker_count(0usize).build().is_err());
    }
}
