//! The `Slab` and `Slice` value types: the (m, n)-coded unit and a logical window into it.

use std::sync::Arc;

use crate::crypto::SlabKey;
use crate::sector::{align_down, align_up, Sector, LEAF_SIZE, SECTOR_SIZE};

/// The unit of erasure coding: a symmetric key, the code's `m`, and exactly `n` shard
/// slots (by position, not host identity).
///
/// `shards[i]` is `None` only transiently during migration; a slab handed back from
/// `UploadFromReader` or read back from a persistence layer always has every slot
/// populated.
#[derive(Clone, Debug)]
pub struct Slab {
    pub key: SlabKey,
    pub min_shards: usize,
    pub shards: Vec<Option<Sector>>,
}

impl Slab {
    pub fn new(key: SlabKey, min_shards: usize, shards: Vec<Option<Sector>>) -> Self {
        let slab = Self {
            key,
            min_shards,
            shards,
        };
        debug_assert!(slab.min_shards >= 1 && slab.min_shards <= slab.shards.len());
        debug_assert!(slab.distinct_hosts(), "shards must sit on distinct hosts");
        slab
    }

    /// Total shard count, `n`.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Bytes of plaintext this slab stores: `m * SectorSize`.
    pub fn plaintext_len(&self) -> u64 {
        (self.min_shards * SECTOR_SIZE) as u64
    }

    fn distinct_hosts(&self) -> bool {
        let mut hosts: Vec<_> = self.shards.iter().flatten().map(|s| s.host).collect();
        let before = hosts.len();
        hosts.sort_by_key(|h| h.0);
        hosts.dedup();
        hosts.len() == before
    }
}

/// A logical `[offset, offset + length)` window into a slab's reconstructed plaintext.
///
/// An object is an ordered list of slices; consecutive slices may reference distinct
/// slabs, so `slab` is a shared (`Arc`) reference rather than an owned value.
#[derive(Clone, Debug)]
pub struct Slice {
    pub slab: Arc<Slab>,
    pub offset: u64,
    pub length: u64,
}

impl Slice {
    pub fn new(slab: Arc<Slab>, offset: u64, length: u64) -> Self {
        debug_assert!(offset + length <= slab.plaintext_len());
        Self {
            slab,
            offset,
            length,
        }
    }

    /// Splits this slice's `[offset, offset + length)` window, expressed in plaintext
    /// bytes across the whole slab, into one [`ShardRange`] per data shard it touches.
    /// Almost always exactly one entry — the common case for a ranged read — since a
    /// shard holds a full `SectorSize` worth of plaintext; more than one only when the
    /// slice spans a shard boundary (e.g. a slice covering an entire multi-shard slab).
    pub fn shard_ranges(&self) -> Vec<ShardRange> {
        let sector_size = SECTOR_SIZE as u64;
        let mut out = Vec::new();
        let mut pos = self.offset;
        let end = self.offset + self.length;
        while pos < end {
            let shard_index = (pos / sector_size) as usize;
            let shard_end = (shard_index as u64 + 1) * sector_size;
            let chunk_end = end.min(shard_end);
            out.push(ShardRange {
                shard_index,
                local_offset: pos - shard_index as u64 * sector_size,
                local_length: chunk_end - pos,
            });
            pos = chunk_end;
        }
        out
    }

    /// Trims this slice to the `[offset, offset + length)` byte sub-window, expressed
    /// in bytes relative to the slice's own start. Used by `DownloadRange` to adjust
    /// the first/last retained slice of a trimmed slice list.
    pub fn trimmed(&self, rel_offset: u64, rel_length: u64) -> Slice {
        debug_assert!(rel_offset + rel_length <= self.length);
        Slice {
            slab: self.slab.clone(),
            offset: self.offset + rel_offset,
            length: rel_length,
        }
    }
}

/// One per-shard piece of a [`Slice`]: which data-shard index holds these bytes, and
/// the `[local_offset, local_offset + local_length)` window within that shard's own
/// `[0, SectorSize)` span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardRange {
    pub shard_index: usize,
    pub local_offset: u64,
    pub local_length: u64,
}

impl ShardRange {
    /// The minimal `[start, end)` byte region of this shard that must be fetched,
    /// aligned outward to `LEAF_SIZE`.
    pub fn sector_region(&self) -> (u64, u64) {
        let start = align_down(self.local_offset, LEAF_SIZE as u64);
        let end = align_up(self.local_offset + self.local_length, LEAF_SIZE as u64);
        (start, end)
    }
}
