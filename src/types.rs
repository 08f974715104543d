//! Shared wire-level primitives: host identities, content hashes and currency amounts.
//!
//! These are kept as thin newtypes over fixed-size byte arrays rather than re-exporting
//! a particular signature crate's types directly, so that the rest of the engine does not
//! leak a dependency on `ed25519-dalek`'s type layout into every module that merely needs
//! to compare or hash a host identity.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};

/// A host's Ed25519 public key, used both as the host's stable identity and to verify
/// that a `Sector` really is stored where the engine thinks it is.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<ed25519_dalek::VerifyingKey> for PublicKey {
    fn from(vk: ed25519_dalek::VerifyingKey) -> Self {
        Self(vk.to_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

/// A 256-bit content hash: a sector's Merkle root, or a data-integrity hash elsewhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, BorshSerialize, BorshDeserialize)]
pub struct Hash256(pub [u8; 32]);

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex::encode(self.0))
    }
}

/// A 64-byte Ed25519 signature, kept as a plain array so wire structs can derive
/// `BorshSerialize`/`BorshDeserialize` without pulling the signature crate's own
/// (de)serialization machinery into the wire format.
#[derive(Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Signature(pub [u8; 64]);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.0[..8]))
    }
}

impl From<ed25519_dalek::Signature> for Signature {
    fn from(sig: ed25519_dalek::Signature) -> Self {
        Self(sig.to_bytes())
    }
}

/// A renter-network currency amount. The protocol this engine targets uses 128-bit
/// fixed-point amounts (the teacher's Solana lamports are a 64-bit analogue); 128 bits
/// avoids overflow when a contract's lifetime payout is expressed in the smallest unit.
pub type Currency = u128;
