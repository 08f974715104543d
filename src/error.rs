//! Error taxonomy for the slab engine.
//!
//! Mirrors the teacher's `ApiError` (`error.rs` in `cenwadike-solad/node`): a single
//! `thiserror`-derived enum with `#[from]` conversions from the narrower component
//! errors, so callers match on one type regardless of which module a failure
//! originated in.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::erasure::CodingError;
use crate::types::PublicKey;

/// One host's failure on one task (an upload, a download, or a delete).
///
/// `cause` is intentionally opaque (`anyhow::Error`): the engine does not care *why*
/// a `HostSession` call failed, only that it did, and the host session implementation
/// is itself an external collaborator (see spec §4.6).
#[derive(Debug)]
pub struct HostError {
    pub host: PublicKey,
    pub cause: anyhow::Error,
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host {}: {}", self.host, self.cause)
    }
}

impl HostError {
    pub fn new(host: PublicKey, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            host,
            cause: cause.into(),
        }
    }
}

/// Aggregate of one or more per-host failures, raised when a dispatcher run could not
/// find enough healthy hosts to retire every task.
#[derive(Debug, Default)]
pub struct HostErrorSet {
    pub errors: Vec<HostError>,
}

impl HostErrorSet {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, err: HostError) {
        self.errors.push(err);
    }

    pub fn extend(&mut self, other: HostErrorSet) {
        self.errors.extend(other.errors);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

impl std::fmt::Display for HostErrorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} host(s) failed:", self.errors.len())?;
        for e in &self.errors {
            write!(f, "\n  - {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for HostErrorSet {}

/// Top-level error type for every fallible operation the engine exposes.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fewer candidate hosts than required shards; preflight failure, nothing attempted.
    #[error("insufficient hosts: need {needed}, have {have}")]
    InsufficientHosts { needed: usize, have: usize },

    /// Decode/recover called with fewer than `m` populated shards.
    #[error("insufficient shards: need {needed}, have {have}")]
    InsufficientShards { needed: usize, have: usize },

    /// A requested byte range falls outside the slice list's covered length.
    #[error("range out of bounds: offset {offset} + length {length} > total {total}")]
    RangeOutOfBounds {
        offset: u64,
        length: u64,
        total: u64,
    },

    /// A host failed one or more operations; see the attached set for detail.
    #[error(transparent)]
    Hosts(#[from] HostErrorSet),

    /// A reader/writer I/O failure. Aborts the current slab; never retried.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Erasure coding failure (insufficient shards, malformed shard lengths, ...).
    #[error("coding error: {0}")]
    Coding(#[from] CodingError),

    /// Slab crypto failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// A slab or payment invariant was violated by caller input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
