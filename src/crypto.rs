//! Per-slab symmetric key and the shard-indexed stream cipher built on it.
//!
//! A fresh 32-byte key is generated per slab. Each shard gets its own keystream by
//! hashing `(slab key, shard index)` into a ChaCha20 key with SHA-256 before encrypting
//! — domain separation by index rather than by nonce, so the nonce itself can stay
//! fixed (it is never reused under the same ChaCha20 key, since each derived key is
//! unique to one `(slab, shard index)` pair).

use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::ChaCha20;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

const STREAM_NONCE: [u8; 12] = *b"slab-engine!";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("shard index {0} out of range for a 256-shard code")]
    ShardIndexOutOfRange(usize),
}

/// A fresh-per-slab symmetric key sufficient to derive one keystream per shard index.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SlabKey(pub [u8; 32]);

impl SlabKey {
    /// Generates a new key from a cryptographically strong random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn derive_shard_key(&self, shard_index: usize) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"slab-engine/shard-key");
        hasher.update(self.0);
        hasher.update((shard_index as u64).to_le_bytes());
        hasher.finalize().into()
    }

    fn cipher_for_shard(&self, shard_index: usize) -> Result<ChaCha20, CryptoError> {
        if shard_index > u8::MAX as usize {
            return Err(CryptoError::ShardIndexOutOfRange(shard_index));
        }
        let key = self.derive_shard_key(shard_index);
        Ok(ChaCha20::new(&key.into(), &STREAM_NONCE.into()))
    }
}

impl std::fmt::Debug for SlabKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SlabKey({}...)", hex::encode(&self.0[..4]))
    }
}

/// XORs each populated shard in place with its `(key, index)` keystream.
///
/// Absent shards (`None`, only valid mid-migration or mid-reconstruction) are skipped.
pub fn encrypt_shards(key: &SlabKey, shards: &mut [Option<Vec<u8>>]) -> Result<(), CryptoError> {
    apply_keystream(key, shards)
}

/// Inverse of [`encrypt_shards`]; XOR with ChaCha20 is involutive so this calls the
/// same keystream application.
pub fn decrypt_shards(key: &SlabKey, shards: &mut [Option<Vec<u8>>]) -> Result<(), CryptoError> {
    apply_keystream(key, shards)
}

fn apply_keystream(key: &SlabKey, shards: &mut [Option<Vec<u8>>]) -> Result<(), CryptoError> {
    for (index, shard) in shards.iter_mut().enumerate() {
        if let Some(bytes) = shard {
            let mut cipher = key.cipher_for_shard(index)?;
            cipher.apply_keystream(bytes);
        }
    }
    Ok(())
}

/// XORs `bytes` with the keystream for `shard_index` starting at byte `offset` within
/// that shard, rather than from the start. Used when only a sub-window of a shard was
/// fetched (`DownloadRange`'s `SectorRegion`-trimmed host reads), where seeking to the
/// window's start avoids having to re-derive bytes the caller never requested.
pub fn apply_keystream_at(
    key: &SlabKey,
    shard_index: usize,
    offset: u64,
    bytes: &mut [u8],
) -> Result<(), CryptoError> {
    let mut cipher = key.cipher_for_shard(shard_index)?;
    cipher.seek(offset);
    cipher.apply_keystream(bytes);
    Ok(())
}
