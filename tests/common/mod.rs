//! Shared fixture scaffolding for the integration suite: an in-memory [`HostSession`]
//! that actually stores sector bytes (so round-trip tests are real round trips) and can
//! be told to fail uploads or downloads deterministically, the way a departing or
//! overloaded host would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use slab_engine::host::HostSession;
use slab_engine::sector::merkle_root;
use slab_engine::types::{Hash256, PublicKey};

pub fn host_key(b: u8) -> PublicKey {
    PublicKey::from_bytes([b; 32])
}

/// An in-memory stand-in for a single host's RPC endpoint.
pub struct MockHostSession {
    key: PublicKey,
    sectors: Mutex<HashMap<Hash256, Vec<u8>>>,
    fail_uploads: bool,
    fail_downloads: bool,
    delete_calls: AtomicUsize,
    deleted_roots: Mutex<Vec<Hash256>>,
}

impl MockHostSession {
    pub fn new(b: u8) -> Arc<Self> {
        Arc::new(Self {
            key: host_key(b),
            sectors: Mutex::new(HashMap::new()),
            fail_uploads: false,
            fail_downloads: false,
            delete_calls: AtomicUsize::new(0),
            deleted_roots: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_uploads(b: u8) -> Arc<Self> {
        Arc::new(Self {
            fail_uploads: true,
            ..Self::plain(b)
        })
    }

    pub fn failing_downloads(b: u8) -> Arc<Self> {
        Arc::new(Self {
            fail_downloads: true,
            ..Self::plain(b)
        })
    }

    fn plain(b: u8) -> Self {
        Self {
            key: host_key(b),
            sectors: Mutex::new(HashMap::new()),
            fail_uploads: false,
            fail_downloads: false,
            delete_calls: AtomicUsize::new(0),
            deleted_roots: Mutex::new(Vec::new()),
        }
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn deleted_roots(&self) -> Vec<Hash256> {
        self.deleted_roots.lock().unwrap().clone()
    }

    pub fn stored_sector_count(&self) -> usize {
        self.sectors.lock().unwrap().len()
    }
}

#[async_trait]
impl HostSession for MockHostSession {
    fn public_key(&self) -> PublicKey {
        self.key
    }

    async fn upload_sector(&self, sector_bytes: &[u8]) -> anyhow::Result<Hash256> {
        if self.fail_uploads {
            anyhow::bail!("mock host {} refuses uploads", self.key);
        }
        let root = merkle_root(sector_bytes);
        self.sectors
            .lock()
            .unwrap()
            .insert(root, sector_bytes.to_vec());
        Ok(root)
    }

    async fn download_sector(
        &self,
        buf: &mut Vec<u8>,
        root: Hash256,
        offset: u64,
        length: u64,
    ) -> anyhow::Result<()> {
        if self.fail_downloads {
            anyhow::bail!("mock host {} refuses downloads", self.key);
        }
        let sectors = self.sectors.lock().unwrap();
        let bytes = sectors
            .get(&root)
            .ok_or_else(|| anyhow::anyhow!("mock host {} has no sector with root {root}", self.key))?;
        let start = offset as usize;
        let end = start + length as usize;
        buf.clear();
        buf.extend_from_slice(&bytes[start..end]);
        Ok(())
    }

    async fn delete_sectors(&self, roots: &[Hash256]) -> anyhow::Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut sectors = self.sectors.lock().unwrap();
        let mut deleted = self.deleted_roots.lock().unwrap();
        for root in roots {
            sectors.remove(root);
            deleted.push(*root);
        }
        Ok(())
    }
}

pub fn as_sessions(hosts: &[Arc<MockHostSession>]) -> Vec<Arc<dyn HostSession>> {
    hosts.iter().map(|h| h.clone() as Arc<dyn HostSession>).collect()
}
