//! Shard storage abstraction.
//!
//! Shards are append-only sequences of `(a, b, count)` triples. A key may
//! appear in several triples of the same shard; its total is the sum.
//! Triples are encoded as one text line `a,b,count\n`, and a shard's size is
//! the byte length of that encoding regardless of the backing store.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use super::router::ShardId;
use crate::basket::PairKey;
use crate::error::{CoreError, Result};

/// One persisted partial count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triple {
    pub key: PairKey,
    pub count: u64,
}

impl Triple {
    pub fn new(key: PairKey, count: u64) -> Self {
        Self { key, count }
    }

    /// Append the line encoding (with trailing newline) to `buf`.
    pub fn encode_into(&self, buf: &mut String) {
        // Writing to a String cannot fail
        let _ = writeln!(buf, "{},{},{}", self.key.a(), self.key.b(), self.count);
    }

    /// Length in bytes of the line encoding.
    pub fn encoded_len(&self) -> u64 {
        (decimal_len(u64::from(self.key.a()))
            + decimal_len(u64::from(self.key.b()))
            + decimal_len(self.count)
            + 3) as u64
    }

    /// Decode one line (without its newline).
    pub fn decode(line: &str, shard: ShardId) -> Result<Self> {
        let mut fields = line.split(',');
        let (Some(a), Some(b), Some(count), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(CoreError::corrupt(
                shard,
                format!("expected 3 fields in '{}'", line),
            ));
        };
        let parse_item = |s: &str| {
            s.parse::<u32>()
                .map_err(|e| CoreError::corrupt(shard, format!("bad item '{}': {}", s, e)))
        };
        let a = parse_item(a)?;
        let b = parse_item(b)?;
        if a > b {
            return Err(CoreError::corrupt(
                shard,
                format!("unordered pair {},{}", a, b),
            ));
        }
        let count = count
            .parse::<u64>()
            .map_err(|e| CoreError::corrupt(shard, format!("bad count '{}': {}", count, e)))?;
        Ok(Self {
            key: PairKey::new(a, b),
            count,
        })
    }
}

fn decimal_len(mut n: u64) -> usize {
    let mut len = 1;
    while n >= 10 {
        n /= 10;
        len += 1;
    }
    len
}

/// Owned iterator over a shard's triples.
///
/// Owning its source means the store stays free for appends while a shard
/// is being drained.
pub type ShardReader = Box<dyn Iterator<Item = Result<Triple>>>;

/// Durable append-only storage for shards.
///
/// Appends may be buffered; [`ShardStore::sync`] is the barrier after which
/// every earlier append is durable and visible to `size` and `read`.
pub trait ShardStore {
    /// Append a triple, creating the shard if absent.
    fn append(&mut self, shard: ShardId, triple: Triple) -> Result<()>;

    /// Encoded size of the shard in bytes; 0 if absent.
    fn size(&mut self, shard: ShardId) -> Result<u64>;

    /// Every live shard.
    fn list_ids(&mut self) -> Result<BTreeSet<ShardId>>;

    /// Read all triples of a shard.
    fn read(&mut self, shard: ShardId) -> Result<ShardReader>;

    /// Move a shard's content to a new id, replacing any shard there.
    fn rename(&mut self, from: ShardId, to: ShardId) -> Result<()>;

    /// Delete a shard. Removing an absent shard is not an error.
    fn remove(&mut self, shard: ShardId) -> Result<()>;

    /// Make every earlier append durable and visible.
    fn sync(&mut self) -> Result<()>;
}
