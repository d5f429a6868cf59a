//! Error types for the pair counting engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::shard::ShardId;

/// Errors that can occur while counting basket pairs.
///
/// Every variant is fatal for the run that produced it; nothing in the
/// engine retries.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An input record could not be parsed into (basket id, item id)
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    /// A shard create/append/read/rename/remove/sync failed
    #[error("shard storage {op} failed for '{target}': {source}")]
    Storage {
        op: &'static str,
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// A persisted shard line did not decode into a triple
    #[error("corrupt shard {shard}: {reason}")]
    CorruptShard { shard: ShardId, reason: String },

    /// Cache capacity below one entry
    #[error("cache capacity must be at least 1, got {capacity}")]
    CapacityMisconfiguration { capacity: usize },

    /// Per-record byte estimate of zero
    #[error("row size estimate must be at least 1 byte")]
    InvalidRowSize,

    /// Failed to read the input stream
    #[error("failed to read input: {0}")]
    Input(#[source] std::io::Error),

    /// Failed to write the output table
    #[error("failed to write output '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The SQLite reference pipeline failed
    #[error("baseline query failed: {0}")]
    Baseline(#[from] rusqlite::Error),
}

impl CoreError {
    /// Create a new MalformedRecord error.
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    /// Create a new Storage error.
    pub fn storage(op: &'static str, target: impl ToString, source: std::io::Error) -> Self {
        Self::Storage {
            op,
            target: target.to_string(),
            source,
        }
    }

    /// Create a new CorruptShard error.
    pub fn corrupt(shard: ShardId, reason: impl Into<String>) -> Self {
        Self::CorruptShard {
            shard,
            reason: reason.into(),
        }
    }

    /// Create a new Output error.
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }

    /// Whether this error originated in shard storage.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::CorruptShard { .. })
    }
}

/// Result alias used throughout basket-core.
pub type Result<T> = std::result::Result<T, CoreError>;
