//! Sharded Spill Storage
//!
//! Partial pair counts that fall out of the aggregation cache are appended to
//! shards on disk. A shard groups every key that routes to the same bucket at
//! a given scale, so a key's partial counts never straddle two live shards.
//!
//! # Architecture
//!
//! ```text
//! router::route(key, scale) -> ShardId
//! ShardStore (trait)
//! ├── FsShardStore      (one text file per shard, LRU of open handles)
//! └── MemoryShardStore  (in-memory, for tests)
//!
//! Post-pass:
//! ├── Splitter (re-route oversized shards one scale finer)
//! └── merge    (sum each shard in memory, emit rows, delete)
//!
//! Run directory:
//! └── basket-shards-XXXXXX/s{scale}-{bucket}.shard
//! ```

pub mod fs;
pub mod memory;
pub mod merger;
pub mod router;
pub mod splitter;
pub mod store;

// Re-exports
pub use fs::FsShardStore;
pub use memory::MemoryShardStore;
pub use merger::{merge, MergeStats};
pub use router::{initial_scale, route, ShardId, MAX_SCALE};
pub use splitter::{SplitStats, Splitter};
pub use store::{ShardReader, ShardStore, Triple};
