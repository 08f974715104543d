//! Systematic Reed–Solomon (m, n) erasure coder.
//!
//! Built on `reed-solomon-simd`, the same crate the retrieval pack's own
//! `ab-erasure-coding` uses for an identical systematic-code contract: the first `m`
//! shards are exactly the `m` equal-sized pieces of the input, the remaining `n - m`
//! are parity computed from them.

use std::collections::BTreeMap;
use std::io::Write;

use thiserror::Error;

use crate::sector::SECTOR_SIZE;

#[derive(Debug, Error)]
pub enum CodingError {
    #[error("insufficient shards: need {needed}, have {have}")]
    InsufficientShards { needed: usize, have: usize },

    #[error("reed-solomon error: {0}")]
    ReedSolomon(#[from] reed_solomon_simd::Error),

    #[error("invalid (m, n): m={m}, n={n}")]
    InvalidParameters { m: usize, n: usize },

    #[error("writer error: {0}")]
    Io(#[from] std::io::Error),
}

/// A configured (m, n) Reed–Solomon code over `SECTOR_SIZE`-byte shards.
#[derive(Clone, Copy, Debug)]
pub struct ErasureCoder {
    pub m: usize,
    pub n: usize,
}

impl ErasureCoder {
    pub fn new(m: usize, n: usize) -> Result<Self, CodingError> {
        if m == 0 || m > n {
            return Err(CodingError::InvalidParameters { m, n });
        }
        Ok(Self { m, n })
    }

    /// Splits `buf` (already zero-padded to exactly `m * SECTOR_SIZE` bytes by the
    /// caller) into the `m` data shards and computes the `n - m` parity shards.
    pub fn encode(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>, CodingError> {
        debug_assert_eq!(buf.len(), self.m * SECTOR_SIZE);

        let mut shards: Vec<Vec<u8>> = buf.chunks(SECTOR_SIZE).map(|c| c.to_vec()).collect();
        if self.n > self.m {
            let parity = reed_solomon_simd::encode(
                self.m,
                self.n - self.m,
                shards.iter().map(|s| s.as_slice()),
            )?;
            shards.extend(parity);
        }
        Ok(shards)
    }

    /// Populates every entry of `shards[0..n]` given any `>= m` populated entries.
    ///
    /// Missing *data* shards (index `< m`) are recovered via Reed–Solomon decoding.
    /// Missing *parity* shards (index `>= m`) are simply recomputed from the now-complete
    /// data shards by calling [`Self::encode`] again — deterministic, so a parity shard
    /// recovered this way is byte-identical to the one originally placed for that index.
    pub fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), CodingError> {
        assert_eq!(shards.len(), self.n, "shard slice must have exactly n entries");

        let present = shards.iter().filter(|s| s.is_some()).count();
        if present < self.m {
            return Err(CodingError::InsufficientShards {
                needed: self.m,
                have: present,
            });
        }

        let data_complete = shards[..self.m].iter().all(Option::is_some);
        if !data_complete {
            let original = shards[..self.m]
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_deref().map(|b| (i, b)));
            let recovery = shards[self.m..]
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_deref().map(|b| (i, b)));

            let restored: BTreeMap<usize, Vec<u8>> =
                reed_solomon_simd::decode(self.m, self.n - self.m, original, recovery)?;
            for (index, bytes) in restored {
                shards[index] = Some(bytes);
            }
        }

        if self.n > self.m && shards[self.m..].iter().any(Option::is_none) {
            let data_refs: Vec<&[u8]> = shards[..self.m]
                .iter()
                .map(|s| s.as_deref().expect("data shards complete above"))
                .collect();
            let parity = reed_solomon_simd::encode(self.m, self.n - self.m, data_refs)?;
            for (offset, bytes) in parity.into_iter().enumerate() {
                let slot = &mut shards[self.m + offset];
                if slot.is_none() {
                    *slot = Some(bytes);
                }
            }
        }

        Ok(())
    }

    /// Writes exactly `length` bytes to `writer`, taken from the `[offset, offset + length)`
    /// window of the concatenated data shards (`shards[0..m]`, which must already be
    /// fully populated — e.g. by [`Self::reconstruct`]).
    pub fn recover(
        &self,
        writer: &mut impl Write,
        shards: &[Option<Vec<u8>>],
        offset: u64,
        length: u64,
    ) -> Result<(), CodingError> {
        if length == 0 {
            return Ok(());
        }

        let start = offset as usize;
        let end = start + length as usize;
        let mut remaining = (start, end);
        let mut pos = 0usize;

        for shard in &shards[..self.m] {
            let bytes = shard.as_deref().ok_or(CodingError::InsufficientShards {
                needed: self.m,
                have: shards[..self.m].iter().filter(|s| s.is_some()).count(),
            })?;
            let shard_start = pos;
            let shard_end = pos + bytes.len();
            pos = shard_end;

            let lo = remaining.0.max(shard_start);
            let hi = remaining.1.min(shard_end);
            if lo < hi {
                writer.write_all(&bytes[lo - shard_start..hi - shard_start])?;
            }
            if shard_end >= remaining.1 {
                break;
            }
        }

        Ok(())
    }
}
