//! Pair counting pipeline.
//!
//! Three strictly sequential phases, each ending with a store sync:
//!
//! 1. **Bucketize**: group records into baskets, expand each basket into pair
//!    updates, and aggregate them in a bounded cache that spills evicted
//!    partial counts to the shard the key routes to.
//! 2. **Split**: re-partition any shard larger than the size budget.
//! 3. **Merge**: sum each shard in memory and emit one row per pair.

use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::basket::{Basket, BasketAccumulator, PairKey, Record};
use crate::cache::{BoundedCache, CacheMetrics};
use crate::error::{CoreError, Result};
use crate::shard::{self, initial_scale, route, ShardStore, Splitter, Triple};

/// Statistics for one counting run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub records: u64,
    pub baskets: u64,
    pub pair_updates: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub initial_scale: u8,
    pub shards_written: u64,
    pub shards_split: u64,
    pub oversized_shards: u64,
    pub output_rows: u64,
    pub bucketize_ms: u64,
    pub split_ms: u64,
    pub merge_ms: u64,
    pub elapsed_ms: u64,
}

impl RunStats {
    /// Cache hit rate during bucketizing
    pub fn cache_hit_rate(&self) -> f64 {
        CacheMetrics {
            hits: self.cache_hits,
            misses: self.cache_misses,
            evictions: self.cache_evictions,
        }
        .hit_rate()
    }
}

/// Counts how many baskets contain each product pair within a bounded memory
/// budget.
#[derive(Debug, Clone, Copy)]
pub struct PairCounter {
    cache_capacity: usize,
    row_bytes: u64,
}

impl PairCounter {
    /// Create a counter holding at most `cache_capacity` pairs in memory.
    ///
    /// `row_bytes` estimates the persisted size of one pair and sets the
    /// shard size budget together with the capacity.
    pub fn new(cache_capacity: usize, row_bytes: u64) -> Result<Self> {
        if cache_capacity == 0 {
            return Err(CoreError::CapacityMisconfiguration {
                capacity: cache_capacity,
            });
        }
        if row_bytes == 0 {
            return Err(CoreError::InvalidRowSize);
        }
        Ok(Self {
            cache_capacity,
            row_bytes,
        })
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn row_bytes(&self) -> u64 {
        self.row_bytes
    }

    /// Scale used to route spilled pairs during bucketizing.
    pub fn initial_scale(&self) -> u8 {
        initial_scale(self.cache_capacity)
    }

    /// Largest shard, in bytes, that is merged without splitting.
    pub fn split_threshold(&self) -> u64 {
        (self.cache_capacity as u64).saturating_mul(self.row_bytes)
    }

    /// Run all three phases over `records`, emitting one row per pair.
    ///
    /// The store should start empty; shards already in it are merged into
    /// the result.
    pub fn run<I, S, F>(&self, records: I, store: &mut S, emit: F) -> Result<RunStats>
    where
        I: IntoIterator<Item = Result<Record>>,
        S: ShardStore,
        F: FnMut(PairKey, u64) -> Result<()>,
    {
        let started = Instant::now();
        let mut stats = RunStats {
            initial_scale: self.initial_scale(),
            ..RunStats::default()
        };

        let phase = Instant::now();
        let metrics = self.bucketize(records, store, &mut stats)?;
        stats.cache_hits = metrics.hits;
        stats.cache_misses = metrics.misses;
        stats.cache_evictions = metrics.evictions;
        stats.shards_written = store.list_ids()?.len() as u64;
        stats.bucketize_ms = phase.elapsed().as_millis() as u64;
        info!(
            "Bucketized {} records into {} baskets, {} pair updates, {} shards ({} ms)",
            stats.records,
            stats.baskets,
            stats.pair_updates,
            stats.shards_written,
            stats.bucketize_ms
        );

        let phase = Instant::now();
        let splitter = Splitter::new(self.split_threshold(), self.cache_capacity);
        let split = splitter.run(store)?;
        stats.shards_split = split.split;
        stats.oversized_shards = split.oversized;
        stats.split_ms = phase.elapsed().as_millis() as u64;
        info!(
            "Checked {} shards, split {} ({} ms)",
            split.checked, split.split, stats.split_ms
        );

        let phase = Instant::now();
        let merged = shard::merge(store, emit)?;
        stats.output_rows = merged.rows;
        stats.merge_ms = phase.elapsed().as_millis() as u64;
        info!(
            "Merged {} shards into {} rows ({} ms)",
            merged.shards, merged.rows, stats.merge_ms
        );

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(stats)
    }

    fn bucketize<I, S>(
        &self,
        records: I,
        store: &mut S,
        stats: &mut RunStats,
    ) -> Result<CacheMetrics>
    where
        I: IntoIterator<Item = Result<Record>>,
        S: ShardStore,
    {
        let scale = self.initial_scale();
        debug!(
            "Bucketizing with capacity {} at scale {}",
            self.cache_capacity, scale
        );

        let metrics = {
            let mut cache =
                BoundedCache::new(self.cache_capacity, |key: &PairKey, count: &u64| {
                    store.append(route(*key, scale), Triple::new(*key, *count))
                })?;
            let mut baskets = BasketAccumulator::new();

            for record in records {
                let record = record?;
                stats.records += 1;
                if let Some(basket) = baskets.push(record) {
                    count_basket(&mut cache, basket, stats)?;
                }
            }
            if let Some(basket) = baskets.finish() {
                count_basket(&mut cache, basket, stats)?;
            }

            cache.finish()?
        };

        store.sync()?;
        Ok(metrics)
    }
}

fn count_basket<F>(
    cache: &mut BoundedCache<PairKey, u64, F>,
    basket: Basket,
    stats: &mut RunStats,
) -> Result<()>
where
    F: FnMut(&PairKey, &u64) -> Result<()>,
{
    stats.baskets += 1;
    for key in basket.pairs() {
        let partial = cache.get_or(&key, 0);
        cache.set(key, partial + 1)?;
        stats.pair_updates += 1;
    }
    Ok(())
}
