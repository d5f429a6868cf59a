//! Basket Pairs Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.basket-pairs/config.toml`
//! - Local config: `.basket-pairs/config.toml` (in the working directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default cache capacity in entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default estimate of one persisted row in bytes.
pub const DEFAULT_ROW_BYTES: u64 = 100;

/// Default directory for intermediate shard files.
pub const DEFAULT_WORK_DIR: &str = "cache";

/// Default number of shard files kept open at once.
pub const DEFAULT_MAX_OPEN_SHARDS: usize = 64;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration for basket-pairs.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct BasketConfig {
    /// Counting configuration
    pub aggregation: AggregationConfig,

    /// Intermediate storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Counting configuration.
///
/// # Example TOML
///
/// ```toml
/// [aggregation]
/// cache_capacity = 10000
/// row_bytes = 100
/// approach = "task"  # or "baseline"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    /// Pairs held in memory before spilling to shards
    pub cache_capacity: usize,

    /// Estimated bytes per persisted row; with the capacity this sets the
    /// shard size budget
    pub row_bytes: u64,

    /// Which counting pipeline to run
    pub approach: Approach,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            row_bytes: DEFAULT_ROW_BYTES,
            approach: Approach::default(),
        }
    }
}

/// Counting pipeline selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Approach {
    /// Bounded cache with sharded spill files (default)
    #[default]
    Task,
    /// SQLite self-join reference
    Baseline,
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Baseline => write!(f, "baseline"),
        }
    }
}

impl std::str::FromStr for Approach {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "baseline" => Ok(Self::Baseline),
            _ => Err(ConfigError::UnknownApproach(s.to_string())),
        }
    }
}

/// Intermediate storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding per-run shard directories (relative to the
    /// working directory unless absolute)
    pub work_dir: PathBuf,

    /// Shard files kept open for appending at once
    pub max_open_shards: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            max_open_shards: DEFAULT_MAX_OPEN_SHARDS,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override cache capacity
    pub cache_capacity: Option<usize>,

    /// Override row size estimate
    pub row_bytes: Option<u64>,

    /// Override counting pipeline
    pub approach: Option<Approach>,

    /// Override shard work directory
    pub work_dir: Option<PathBuf>,

    /// Override open shard handle limit
    pub max_open_shards: Option<usize>,

    /// Override log level
    pub log_level: Option<String>,
}

impl BasketConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(capacity) = overrides.cache_capacity {
            self.aggregation.cache_capacity = capacity;
        }

        if let Some(row_bytes) = overrides.row_bytes {
            self.aggregation.row_bytes = row_bytes;
        }

        if let Some(approach) = overrides.approach {
            self.aggregation.approach = approach;
        }

        if let Some(ref dir) = overrides.work_dir {
            self.storage.work_dir = dir.clone();
        }

        if let Some(limit) = overrides.max_open_shards {
            self.storage.max_open_shards = limit;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregation.cache_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "aggregation.cache_capacity",
                "must be at least 1",
            ));
        }
        if self.aggregation.row_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "aggregation.row_bytes",
                "must be at least 1",
            ));
        }
        if self.storage.max_open_shards == 0 {
            return Err(ConfigError::invalid_value(
                "storage.max_open_shards",
                "must be at least 1",
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}'. Valid values: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        Ok(())
    }

    /// Get the effective work directory relative to `base`.
    pub fn work_dir(&self, base: &Path) -> PathBuf {
        if self.storage.work_dir.is_absolute() {
            self.storage.work_dir.clone()
        } else {
            base.join(&self.storage.work_dir)
        }
    }
}
