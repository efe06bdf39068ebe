use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

use crate::mapping::MappingPolicy;

/// Entities per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Errors from loading or validating a [`RelocateConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,
    #[error("worker_threads must be at least 1")]
    ZeroWorkers,
}

/// Relocation scheduler configuration.
///
/// Every field has a default, so a YAML file only needs the keys it changes:
///
/// ```yaml
/// batch_size: 50
/// mapping: strict
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelocateConfig {
    /// Entities per batch, and so per authoritative-thread relocation task.
    ///
    /// Smaller batches shrink the burst of work each authoritative task does
    /// but cost more dispatch overhead per entity.
    pub batch_size: usize,
    /// Worker threads that iterate batches.
    pub worker_threads: usize,
    /// How a destination list is matched against the entity list.
    pub mapping: MappingPolicy,
    /// Schedule region prefetch ahead of each batch. When off, regions are
    /// loaded lazily by the relocation task itself.
    pub prefetch: bool,
}

impl Default for RelocateConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            worker_threads: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            mapping: MappingPolicy::default(),
            prefetch: true,
        }
    }
}

impl RelocateConfig {
    /// Parse from YAML and validate.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    /// Batch size as a non-zero value.
    pub fn batch_size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.batch_size).ok_or(ConfigError::ZeroBatchSize)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_mapping(mut self, mapping: MappingPolicy) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }
}
