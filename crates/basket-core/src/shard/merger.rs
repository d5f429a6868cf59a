//! Final merge of shards into output rows.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::store::ShardStore;
use crate::basket::PairKey;
use crate::error::Result;

/// Counters for the merge phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub shards: u64,
    pub triples: u64,
    pub rows: u64,
}

/// Sum every shard's triples per key, emit one row per key, and delete the
/// shard once its rows are out.
///
/// Shards are visited in id order and rows within a shard in key order. A key
/// lives in exactly one shard, so each key is emitted once.
pub fn merge<S, F>(store: &mut S, mut emit: F) -> Result<MergeStats>
where
    S: ShardStore,
    F: FnMut(PairKey, u64) -> Result<()>,
{
    let mut stats = MergeStats::default();

    for shard in store.list_ids()? {
        let mut totals: BTreeMap<PairKey, u64> = BTreeMap::new();
        for triple in store.read(shard)? {
            let triple = triple?;
            *totals.entry(triple.key).or_default() += triple.count;
            stats.triples += 1;
        }
        debug!("Merged shard {} into {} row(s)", shard, totals.len());

        for (key, count) in totals {
            emit(key, count)?;
            stats.rows += 1;
        }
        store.remove(shard)?;
        stats.shards += 1;
    }

    store.sync()?;
    Ok(stats)
}
