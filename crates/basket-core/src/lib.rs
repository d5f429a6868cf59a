//! Basket Core - External-memory counting of product pairs per basket
//!
//! This crate provides the counting engine behind `basket-pairs`:
//! - Grouping of contiguous records into baskets and lazy pair expansion
//! - A bounded LRU aggregation cache that spills evicted counts to shards
//! - Deterministic shard routing with recursive splitting of oversized shards
//! - In-memory merge of each final shard into output rows
//! - A SQLite reference pipeline for cross-checking results

pub mod baseline;
pub mod basket;
pub mod cache;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod shard;

// Re-exports for convenience
pub use basket::{Basket, BasketAccumulator, ItemId, PairKey, Pairs, Record};
pub use cache::{BoundedCache, CacheMetrics};
pub use error::{CoreError, Result};
pub use pipeline::{PairCounter, RunStats};

// Storage re-exports
pub use shard::{
    initial_scale, merge, route, FsShardStore, MemoryShardStore, MergeStats, ShardId,
    ShardReader, ShardStore, SplitStats, Splitter, Triple, MAX_SCALE,
};

// I/O re-exports
pub use baseline::{BaselineCounter, BaselineStats};
pub use input::RecordReader;
pub use output::{PairTableWriter, OUTPUT_HEADER};
