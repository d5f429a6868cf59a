//! Deterministic routing of pair keys to shards.
//!
//! A scale factor `s` splits into `p1 = s / 2` bits masked off the low end of
//! `a` and `p2 = s - p1` bits masked off the low end of `b`. The masked `a`
//! forms the high 32 bits of the bucket, the masked `b` the low 32 bits.
//! Lowering the scale by one exposes exactly one more bit, so a shard at
//! scale `s` splits into at most two shards at `s - 1`, and any key in one of
//! those children coarsens back to its parent.

use std::fmt;
use std::str::FromStr;

use crate::basket::{ItemId, PairKey};

/// Largest meaningful scale factor: both 32-bit halves fully masked.
pub const MAX_SCALE: u8 = 64;

const HALF_BITS: u32 = ItemId::BITS;

/// Identifier of one shard: the bucket a key routes to at a given scale.
///
/// Carrying the scale keeps a parent shard and its children distinct even
/// when their buckets are numerically equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId {
    scale: u8,
    bucket: u64,
}

impl ShardId {
    pub fn new(scale: u8, bucket: u64) -> Self {
        Self { scale, bucket }
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn bucket(&self) -> u64 {
        self.bucket
    }

    /// Re-mask this shard's bucket at a coarser (or equal) scale.
    ///
    /// Returns `None` when `scale` is finer than the shard's own scale.
    pub fn coarsen(&self, scale: u8) -> Option<ShardId> {
        if scale < self.scale {
            return None;
        }
        let a = (self.bucket >> HALF_BITS) as ItemId;
        let b = self.bucket as ItemId;
        Some(compose(a, b, scale))
    }

    /// File name used by the file-system store.
    pub fn file_name(&self) -> String {
        format!("{}.shard", self)
    }

    /// Parse a file name produced by [`ShardId::file_name`].
    pub fn from_file_name(name: &str) -> Option<ShardId> {
        name.strip_suffix(".shard")?.parse().ok()
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{:02}-{:016x}", self.scale, self.bucket)
    }
}

impl FromStr for ShardId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('s')
            .ok_or_else(|| format!("shard id '{}' must start with 's'", s))?;
        let (scale, bucket) = rest
            .split_once('-')
            .ok_or_else(|| format!("shard id '{}' is missing '-'", s))?;
        if bucket.len() != 16 {
            return Err(format!("shard id '{}' must have a 16 digit bucket", s));
        }
        let scale: u8 = scale
            .parse()
            .map_err(|e| format!("bad scale in '{}': {}", s, e))?;
        if scale > MAX_SCALE {
            return Err(format!("scale {} exceeds {}", scale, MAX_SCALE));
        }
        let bucket =
            u64::from_str_radix(bucket, 16).map_err(|e| format!("bad bucket in '{}': {}", s, e))?;
        Ok(ShardId { scale, bucket })
    }
}

/// Route a pair key to its shard at `scale`.
pub fn route(key: PairKey, scale: u8) -> ShardId {
    compose(key.a(), key.b(), scale)
}

fn compose(a: ItemId, b: ItemId, scale: u8) -> ShardId {
    let scale = scale.min(MAX_SCALE);
    let p1_bits = u32::from(scale / 2);
    let p2_bits = u32::from(scale) - p1_bits;
    let a = mask_low(a, p1_bits);
    let b = mask_low(b, p2_bits);
    ShardId {
        scale,
        bucket: (u64::from(a) << HALF_BITS) | u64::from(b),
    }
}

/// Starting scale for a cache of `capacity` entries: the bit length of the
/// capacity, so a fresh shard holds on the order of `capacity` distinct keys.
pub fn initial_scale(capacity: usize) -> u8 {
    let bits = usize::BITS - capacity.leading_zeros();
    bits.min(u32::from(MAX_SCALE)) as u8
}

fn mask_low(value: ItemId, bits: u32) -> ItemId {
    if bits >= HALF_BITS {
        0
    } else {
        (value >> bits) << bits
    }
}
