//! Re-partitioning of oversized shards.
//!
//! Works a queue of shards pending a size check. An oversized shard is read
//! back through a fresh aggregation cache keyed one scale finer, its children
//! are synced, and only then is the shard removed. Children go back on the
//! queue, so a lineage keeps splitting until it fits or reaches scale 0.

use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, warn};

use super::router::{route, ShardId};
use super::store::{ShardStore, Triple};
use crate::basket::PairKey;
use crate::cache::BoundedCache;
use crate::error::Result;

/// Counters for one split pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitStats {
    /// Shards whose size was checked
    pub checked: u64,
    /// Shards replaced by finer children
    pub split: u64,
    /// Child shards written while splitting
    pub children: u64,
    /// Shards left over threshold at scale 0
    pub oversized: u64,
    /// Finest scale reached, if any split happened
    pub finest_scale: Option<u8>,
}

/// Splits shards until each is within `threshold` bytes or at scale 0.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    threshold: u64,
    cache_capacity: usize,
}

impl Splitter {
    pub fn new(threshold: u64, cache_capacity: usize) -> Self {
        Self {
            threshold,
            cache_capacity,
        }
    }

    /// Size budget per shard in bytes.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Check every shard in `store`, splitting the oversized ones.
    pub fn run<S: ShardStore>(&self, store: &mut S) -> Result<SplitStats> {
        let mut stats = SplitStats::default();
        let mut pending: VecDeque<ShardId> = store.list_ids()?.into_iter().collect();

        while let Some(shard) = pending.pop_front() {
            stats.checked += 1;
            let size = store.size(shard)?;
            if size <= self.threshold {
                continue;
            }
            if shard.scale() == 0 {
                warn!(
                    "Shard {} is {} bytes (limit {}) at scale 0; merging it as-is",
                    shard, size, self.threshold
                );
                stats.oversized += 1;
                continue;
            }

            let children = self.split_shard(store, shard)?;
            debug!(
                "Split {} ({} bytes) into {} shard(s) at scale {}",
                shard,
                size,
                children.len(),
                shard.scale() - 1
            );
            stats.split += 1;
            stats.children += children.len() as u64;
            stats.finest_scale = Some(
                stats
                    .finest_scale
                    .map_or(shard.scale() - 1, |s| s.min(shard.scale() - 1)),
            );
            pending.extend(children);
        }

        Ok(stats)
    }

    /// Re-route one shard at the next finer scale and remove it.
    ///
    /// Returns the ids of the children written.
    pub fn split_shard<S: ShardStore>(
        &self,
        store: &mut S,
        shard: ShardId,
    ) -> Result<BTreeSet<ShardId>> {
        let scale = shard.scale().saturating_sub(1);
        let triples = store.read(shard)?;
        let mut children = BTreeSet::new();

        {
            let mut cache =
                BoundedCache::new(self.cache_capacity, |key: &PairKey, count: &u64| {
                    let child = route(*key, scale);
                    children.insert(child);
                    store.append(child, Triple::new(*key, *count))
                })?;
            for triple in triples {
                let triple = triple?;
                let partial = cache.get_or(&triple.key, 0);
                cache.set(triple.key, partial + triple.count)?;
            }
            cache.finish()?;
        }

        // Children must be durable before the parent disappears
        store.sync()?;
        store.remove(shard)?;
        Ok(children)
    }
}
