//! Fixed-size sector framing and the Merkle root that addresses a sector.
//!
//! A sector is the unit a single host stores; its root is what `HostSession::upload_sector`
//! returns and `HostSession::download_sector` is expected to verify against.

use sha2::{Digest, Sha256};

use crate::types::{Hash256, PublicKey};

/// Protocol-fixed size of a sector's plaintext, in bytes.
pub const SECTOR_SIZE: usize = 4 * 1024 * 1024;

/// Merkle-leaf unit used when computing a sector's root and when trimming a download
/// request to the minimal covering byte region.
pub const LEAF_SIZE: usize = 64;

/// A unit of data stored by exactly one host, addressed by the Merkle root of its bytes.
///
/// Immutable once created; `host`/`root` together let the engine verify *who* is
/// supposed to be serving a shard without re-deriving it from the slab's shard index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sector {
    pub host: PublicKey,
    pub root: Hash256,
}

impl Sector {
    pub fn new(host: PublicKey, root: Hash256) -> Self {
        Self { host, root }
    }
}

/// Computes the Merkle root of `data` over `LEAF_SIZE`-byte leaves.
///
/// `data` must be exactly `SECTOR_SIZE` bytes long (callers always pad shards up to
/// sector size before uploading, per the erasure coder's contract). Leaves are hashed
/// with a `0x00` domain tag, internal nodes with `0x01`, following the classic
/// second-preimage-resistant tree hash construction.
pub fn merkle_root(data: &[u8]) -> Hash256 {
    debug_assert_eq!(data.len(), SECTOR_SIZE, "sector bytes must be sector-sized");

    let mut level: Vec<[u8; 32]> = data
        .chunks(LEAF_SIZE)
        .map(|leaf| {
            let mut hasher = Sha256::new();
            hasher.update([0x00]);
            hasher.update(leaf);
            hasher.finalize().into()
        })
        .collect();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update([0x01]);
                hasher.update(pair[0]);
                hasher.update(pair.get(1).unwrap_or(&pair[0]));
                hasher.finalize().into()
            })
            .collect();
    }

    Hash256(level[0])
}

/// Rounds `value` down to the nearest multiple of `align` (`align` must be a power of two).
pub fn align_down(value: u64, align: u64) -> u64 {
    value - (value % align)
}

/// Rounds `value` up to the nearest multiple of `align` (`align` must be a power of two).
pub fn align_up(value: u64, align: u64) -> u64 {
    align_down(value + align - 1, align)
}
