//! In-memory shard store, used by tests and small inputs.

use std::collections::{BTreeMap, BTreeSet};

use super::router::ShardId;
use super::store::{ShardReader, ShardStore, Triple};
use crate::error::{CoreError, Result};

/// Shard store holding every triple in memory.
#[derive(Debug, Default)]
pub struct MemoryShardStore {
    shards: BTreeMap<ShardId, Vec<Triple>>,
    bytes: BTreeMap<ShardId, u64>,
}

impl MemoryShardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triples currently stored in `shard`, in append order.
    pub fn triples(&self, shard: ShardId) -> &[Triple] {
        self.shards.get(&shard).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total encoded bytes across all shards.
    pub fn total_bytes(&self) -> u64 {
        self.bytes.values().sum()
    }
}

impl ShardStore for MemoryShardStore {
    fn append(&mut self, shard: ShardId, triple: Triple) -> Result<()> {
        self.shards.entry(shard).or_default().push(triple);
        *self.bytes.entry(shard).or_default() += triple.encoded_len();
        Ok(())
    }

    fn size(&mut self, shard: ShardId) -> Result<u64> {
        Ok(self.bytes.get(&shard).copied().unwrap_or(0))
    }

    fn list_ids(&mut self) -> Result<BTreeSet<ShardId>> {
        Ok(self.shards.keys().copied().collect())
    }

    fn read(&mut self, shard: ShardId) -> Result<ShardReader> {
        let triples = self.triples(shard).to_vec();
        Ok(Box::new(triples.into_iter().map(Ok::<Triple, CoreError>)))
    }

    fn rename(&mut self, from: ShardId, to: ShardId) -> Result<()> {
        let triples = self.shards.remove(&from).ok_or_else(|| {
            CoreError::storage(
                "rename",
                from,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such shard"),
            )
        })?;
        let bytes = self.bytes.remove(&from).unwrap_or(0);
        self.shards.insert(to, triples);
        self.bytes.insert(to, bytes);
        Ok(())
    }

    fn remove(&mut self, shard: ShardId) -> Result<()> {
        self.shards.remove(&shard);
        self.bytes.remove(&shard);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}
