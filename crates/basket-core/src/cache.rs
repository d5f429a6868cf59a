//! Bounded Aggregation Cache
//!
//! A fixed-capacity LRU map whose evictions are handed to a caller-supplied
//! callback before the entry is dropped. The cache knows nothing about where
//! evicted entries go; the pipeline plugs in a closure that appends them to
//! shard storage.
//!
//! Recency ordering and O(1) promotion/eviction come from [`lru::LruCache`].

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

use crate::error::{CoreError, Result};

/// Cache metrics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Lookups that found a resident key
    pub hits: u64,
    /// Lookups that fell back to the default
    pub misses: u64,
    /// Entries handed to the eviction callback
    pub evictions: u64,
}

impl CacheMetrics {
    /// Get hit rate as a fraction (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Fixed-capacity LRU map with an eviction callback.
///
/// Contract:
/// - `get_or` and `set` both mark a key most-recently-used.
/// - Inserting a new key into a full cache first evicts the
///   least-recently-used entry through the callback.
/// - The callback sees the entry while it is still resident; if it fails,
///   the error is returned and the entry stays in the cache.
pub struct BoundedCache<K, V, F>
where
    K: Hash + Eq,
    F: FnMut(&K, &V) -> Result<()>,
{
    entries: LruCache<K, V>,
    on_evict: F,
    metrics: CacheMetrics,
}

impl<K, V, F> BoundedCache<K, V, F>
where
    K: Hash + Eq,
    F: FnMut(&K, &V) -> Result<()>,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// Fails with [`CoreError::CapacityMisconfiguration`] when `capacity` is 0.
    pub fn new(capacity: usize, on_evict: F) -> Result<Self> {
        let cap =
            NonZeroUsize::new(capacity).ok_or(CoreError::CapacityMisconfiguration { capacity })?;
        Ok(Self {
            entries: LruCache::new(cap),
            on_evict,
            metrics: CacheMetrics::default(),
        })
    }

    /// Return the value for `key`, or `default` when absent.
    pub fn get_or(&mut self, key: &K, default: V) -> V
    where
        V: Clone,
    {
        match self.entries.get(key) {
            Some(value) => {
                self.metrics.hits += 1;
                value.clone()
            }
            None => {
                self.metrics.misses += 1;
                default
            }
        }
    }

    /// Insert or update `key`, evicting the least-recently-used entry first
    /// when a new key arrives at capacity.
    pub fn set(&mut self, key: K, value: V) -> Result<()> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return Ok(());
        }
        if self.entries.len() >= self.entries.cap().get() {
            self.evict_lru()?;
        }
        self.entries.put(key, value);
        Ok(())
    }

    /// Evict every entry, least-recently-used first.
    pub fn flush(&mut self) -> Result<()> {
        while !self.entries.is_empty() {
            self.evict_lru()?;
        }
        Ok(())
    }

    /// Flush and return the final metrics.
    pub fn finish(mut self) -> Result<CacheMetrics> {
        self.flush()?;
        Ok(self.metrics)
    }

    /// Check if a key is resident, without touching recency
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Get a snapshot of cache metrics
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics
    }

    fn evict_lru(&mut self) -> Result<()> {
        if let Some((key, value)) = self.entries.peek_lru() {
            (self.on_evict)(key, value)?;
        }
        if self.entries.pop_lru().is_some() {
            self.metrics.evictions += 1;
        }
        Ok(())
    }
}
