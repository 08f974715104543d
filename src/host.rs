//! The `HostSession` capability the engine consumes.
//!
//! Abstracts away the renter-host RPC protocol (framing, handshakes, payment
//! attachment) entirely; the engine only ever calls these four methods. A concrete
//! implementation lives outside this crate's scope (spec §1), same division of labor
//! as the teacher's `StorageService`-shaped collaborators.

use async_trait::async_trait;

use crate::types::{Hash256, PublicKey};

/// An authenticated session against a single host, exposing its sector-level RPCs.
#[async_trait]
pub trait HostSession: Send + Sync {
    /// Stable for the lifetime of the session; identifies which `Sector`s this host owns.
    fn public_key(&self) -> PublicKey;

    /// Uploads one full `SectorSize`-byte sector and returns its Merkle root.
    async fn upload_sector(&self, sector_bytes: &[u8]) -> anyhow::Result<Hash256>;

    /// Writes exactly `length` bytes into `buf`, read starting at `offset` within the
    /// sector identified by `root`. The implementation is expected to verify the
    /// returned bytes against `root`.
    async fn download_sector(
        &self,
        buf: &mut Vec<u8>,
        root: Hash256,
        offset: u64,
        length: u64,
    ) -> anyhow::Result<()>;

    /// Removes the listed roots from this host. An empty list is a no-op. Atomicity
    /// across the list is not required.
    async fn delete_sectors(&self, roots: &[Hash256]) -> anyhow::Result<()>;
}
