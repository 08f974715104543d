//! Minimal end-to-end wiring of the slab engine against in-memory hosts.
//!
//! Not a shipped CLI surface (the real one is a collaborator's job, per spec §1) — this
//! is illustrative wiring only, run with `cargo run --example mock_node`, in the same
//! spirit as the teacher's `main.rs` logging setup but without the JSON-rotation,
//! Actix, and libp2p machinery a real node would add around it.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::info;

use slab_engine::config::EngineConfig;
use slab_engine::engine::{delete, download_range, migrate, upload_from_reader};
use slab_engine::host::HostSession;
use slab_engine::sector::merkle_root;
use slab_engine::slab::Slice;
use slab_engine::types::{Hash256, PublicKey};

struct InMemoryHost {
    key: PublicKey,
    sectors: Mutex<HashMap<Hash256, Vec<u8>>>,
}

impl InMemoryHost {
    fn new(id: u8) -> Arc<Self> {
        Arc::new(Self {
            key: PublicKey::from_bytes([id; 32]),
            sectors: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl HostSession for InMemoryHost {
    fn public_key(&self) -> PublicKey {
        self.key
    }

    async fn upload_sector(&self, sector_bytes: &[u8]) -> anyhow::Result<Hash256> {
        let root = merkle_root(sector_bytes);
        self.sectors.lock().unwrap().insert(root, sector_bytes.to_vec());
        Ok(root)
    }

    async fn download_sector(
        &self,
        buf: &mut Vec<u8>,
        root: Hash256,
        offset: u64,
        length: u64,
    ) -> anyhow::Result<()> {
        let sectors = self.sectors.lock().unwrap();
        let bytes = sectors
            .get(&root)
            .ok_or_else(|| anyhow::anyhow!("host {} has no sector {root}", self.key))?;
        let start = offset as usize;
        buf.clear();
        buf.extend_from_slice(&bytes[start..start + length as usize]);
        Ok(())
    }

    async fn delete_sectors(&self, roots: &[Hash256]) -> anyhow::Result<()> {
        let mut sectors = self.sectors.lock().unwrap();
        for root in roots {
            sectors.remove(root);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let (m, n) = (2usize, 4usize);
    let hosts: Vec<Arc<dyn HostSession>> =
        (1..=n as u8).map(|b| InMemoryHost::new(b) as Arc<dyn HostSession>).collect();
    let config = EngineConfig::default();

    let payload = b"the quick brown fox jumps over the lazy dog".repeat(1024);
    info!("uploading {} bytes across {n} hosts ((m, n) = ({m}, {n}))", payload.len());

    let slabs = upload_from_reader(&mut Cursor::new(payload.clone()), m, n, &hosts, &config).await?;
    info!("placed {} slab(s)", slabs.len());

    let mut slab = slabs.into_iter().next().unwrap();
    let slice = Slice::new(Arc::new(slab.clone()), 0, payload.len() as u64);

    let mut out = Vec::new();
    download_range(&mut out, &[slice], 0, payload.len() as u64, &hosts, &config).await?;
    assert_eq!(out, payload, "round trip must reproduce the original bytes");
    info!("round trip verified ({} bytes)", out.len());

    // Migrate off the first host onto a fresh one.
    let fresh_host = InMemoryHost::new(9) as Arc<dyn HostSession>;
    let mut destination = hosts[1..].to_vec();
    destination.push(fresh_host);
    migrate(&mut slab, &hosts, &destination, &config).await?;
    info!("migrated away from host 1");

    delete(&[slab], &destination).await?;
    info!("deleted all sectors from the destination host set");

    Ok(())
}
