//! The slab engine API: `upload_from_reader`, `download_range`, `migrate`, `delete`
//! (spec §4.4), orchestrating the sector, erasure, crypto, slab, dispatcher and host
//! modules into the four operations the rest of a renter node calls.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::EngineConfig;
use crate::crypto::{self, SlabKey};
use crate::dispatcher::dispatch;
use crate::erasure::ErasureCoder;
use crate::error::EngineError;
use crate::host::HostSession;
use crate::sector::{Sector, SECTOR_SIZE};
use crate::slab::{Slab, Slice};

/// Reads from `reader` until `buf` is full or the stream ends, returning the number of
/// bytes actually filled. A short fill is only ever the result of end-of-stream; any
/// I/O error propagates immediately.
async fn fill_or_eof<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Splits a plaintext buffer into `n` erasure-coded, encrypted shards ready for upload.
fn encode_and_encrypt(buf: &[u8], m: usize, n: usize) -> Result<(SlabKey, Vec<Vec<u8>>), EngineError> {
    let coder = ErasureCoder::new(m, n)?;
    let key = SlabKey::generate();
    let mut shards: Vec<Option<Vec<u8>>> = coder.encode(buf)?.into_iter().map(Some).collect();
    crypto::encrypt_shards(&key, &mut shards)?;
    Ok((key, shards.into_iter().map(|s| s.expect("just encrypted")).collect()))
}

/// Reads `reader` to completion, producing one `Slab` per `m * SectorSize`-byte chunk
/// (the final chunk may be shorter, zero-padded up to full sector size).
///
/// Precondition: `hosts.len() >= n`, checked before any work begins, and `n` must not
/// exceed `config.max_shards_hint` (`EngineError::InvalidArgument`). Upload is
/// all-or-nothing per call: if any slab's dispersal fails, the slabs placed by earlier
/// iterations are discarded and the aggregate error is returned (spec §7).
pub async fn upload_from_reader<R: AsyncRead + Unpin>(
    reader: &mut R,
    m: usize,
    n: usize,
    hosts: &[Arc<dyn HostSession>],
    config: &EngineConfig,
) -> Result<Vec<Slab>, EngineError> {
    if hosts.len() < n {
        return Err(EngineError::InsufficientHosts {
            needed: n,
            have: hosts.len(),
        });
    }
    if n > config.max_shards_hint {
        return Err(EngineError::InvalidArgument(format!(
            "n = {n} exceeds configured max_shards_hint = {}",
            config.max_shards_hint
        )));
    }

    let mut slabs = Vec::new();
    loop {
        let mut buf = vec![0u8; m * SECTOR_SIZE];
        let filled = fill_or_eof(reader, &mut buf).await?;
        if filled == 0 {
            break;
        }

        let (key, shards) = encode_and_encrypt(&buf, m, n)?;
        debug!("engine: upload slab {} of size {filled} bytes ({m}, {n})", slabs.len());

        let mut tasks = Vec::with_capacity(config.max_shards_hint.max(n));
        tasks.extend(0..n);
        let shards = Arc::new(shards);
        let candidate_hosts = hosts.to_vec();

        let outcome = dispatch(tasks, candidate_hosts, config.max_inflight_hint, move |host, shard_index| {
            let shards = shards.clone();
            async move {
                let root = host.upload_sector(&shards[shard_index]).await?;
                Ok(Sector::new(host.public_key(), root))
            }
        })
        .await;

        if !outcome.is_complete(n) {
            warn!(
                "engine: upload aborted, slab {} failed to place ({} host errors)",
                slabs.len(),
                outcome.errors.len()
            );
            return Err(EngineError::Hosts(outcome.errors));
        }

        let placed = outcome.into_ordered(n);
        slabs.push(Slab::new(key, m, placed.into_iter().map(Some).collect()));

        if filled < buf.len() {
            break;
        }
    }

    info!("engine: upload produced {} slab(s)", slabs.len());
    Ok(slabs)
}

/// Fetches the same `[offset, offset + length)` byte window from `task_count` distinct,
/// eligible hosts, mapping each responding host to the shard index it actually stores.
/// Returned shard bytes are already decrypted (keystream applied at `offset`) — callers
/// hand reconstruction plaintext, never ciphertext.
/// Shared by `download_range` (a windowed, `SectorRegion`-trimmed fetch) and `migrate`
/// (a whole-sector fetch, `offset = 0`, `length = SECTOR_SIZE`).
async fn fetch_shards(
    slab: &Arc<Slab>,
    hosts: &[Arc<dyn HostSession>],
    task_count: usize,
    offset: u64,
    length: u64,
    config: &EngineConfig,
) -> Result<Vec<Option<Vec<u8>>>, EngineError> {
    let tasks: Vec<usize> = (0..task_count).collect();
    let candidate_hosts = hosts.to_vec();
    let slab_for_run = slab.clone();

    let outcome = dispatch(tasks, candidate_hosts, config.max_inflight_hint, move |host, _task| {
        let slab = slab_for_run.clone();
        async move {
            let host_key = host.public_key();
            let (shard_index, sector) = slab
                .shards
                .iter()
                .enumerate()
                .find_map(|(i, s)| s.filter(|s| s.host == host_key).map(|s| (i, s)))
                .ok_or_else(|| anyhow::anyhow!("host {host_key} not stored in this slab (NotStored)"))?;
            let mut buf = Vec::new();
            host.download_sector(&mut buf, sector.root, offset, length).await?;
            crypto::apply_keystream_at(&slab.key, shard_index, offset, &mut buf)
                .map_err(anyhow::Error::from)?;
            Ok((shard_index, buf))
        }
    })
    .await;

    if !outcome.is_complete(task_count) {
        return Err(EngineError::Hosts(outcome.errors));
    }

    let mut shards: Vec<Option<Vec<u8>>> = vec![None; slab.shard_count()];
    for (shard_index, bytes) in outcome.into_ordered(task_count) {
        shards[shard_index] = Some(bytes);
    }
    Ok(shards)
}

/// Writes `[offset, offset + length)` of the plaintext spanned by `slices` to `writer`.
///
/// `offset + length` must not exceed the total length of `slices`; an empty `length` is
/// a no-op. The slice list is trimmed to the covering range first, then each trimmed
/// slice is resolved independently: `m` download tasks fetch a `SectorRegion()` from
/// eligible hosts (substituting on failure or on `NotStored`), the fetched shards are
/// decrypted and reconstructed, and the relevant bytes are recovered and written out.
///
/// A slice is split into one per-shard piece first (almost always exactly one — the
/// common case for a ranged read, since a shard holds a full `SectorSize` worth of
/// plaintext); only a slice spanning a shard boundary needs more than one dispatch
/// round. `Migrate` does not go through this path; it fetches whole sectors directly
/// since it always needs the full slab.
pub async fn download_range<W: AsyncWrite + Unpin>(
    writer: &mut W,
    slices: &[Slice],
    offset: u64,
    length: u64,
    hosts: &[Arc<dyn HostSession>],
    config: &EngineConfig,
) -> Result<(), EngineError> {
    let total: u64 = slices.iter().map(|s| s.length).sum();
    if offset + length > total {
        return Err(EngineError::RangeOutOfBounds { offset, length, total });
    }
    if length == 0 {
        return Ok(());
    }

    for slice in trim_slices(slices, offset, length) {
        download_slice(writer, &slice, hosts, config).await?;
    }
    Ok(())
}

fn trim_slices(slices: &[Slice], offset: u64, length: u64) -> Vec<Slice> {
    let end = offset + length;
    let mut out = Vec::new();
    let mut pos = 0u64;
    for slice in slices {
        let slice_start = pos;
        let slice_end = pos + slice.length;
        pos = slice_end;

        let lo = offset.max(slice_start);
        let hi = end.min(slice_end);
        if lo < hi {
            out.push(slice.trimmed(lo - slice_start, hi - lo));
        }
    }
    out
}

async fn download_slice<W: AsyncWrite + Unpin>(
    writer: &mut W,
    slice: &Slice,
    hosts: &[Arc<dyn HostSession>],
    config: &EngineConfig,
) -> Result<(), EngineError> {
    let slab = slice.slab.clone();
    let m = slab.min_shards;
    let n = slab.shard_count();
    let coder = ErasureCoder::new(m, n)?;

    let ranges = slice.shard_ranges();
    if let [range] = ranges.as_slice() {
        // Common case: the slice lives entirely within one shard, so only that
        // shard's minimal leaf-aligned region (and its reconstruction peers') need
        // to be fetched.
        let (region_start, region_end) = range.sector_region();
        let region_len = region_end - region_start;
        let mut shards = fetch_shards(&slab, hosts, m, region_start, region_len, config).await?;
        coder.reconstruct(&mut shards)?;

        let rel_offset = range.local_offset - region_start;
        let bytes = shards[range.shard_index].as_ref().expect("reconstructed above");
        let start = rel_offset as usize;
        writer
            .write_all(&bytes[start..start + range.local_length as usize])
            .await?;
    } else {
        // The slice spans a shard boundary: fetch every data shard in full and
        // recover the requested window from the reconstructed whole-slab plaintext.
        let mut shards = fetch_shards(&slab, hosts, m, 0, SECTOR_SIZE as u64, config).await?;
        coder.reconstruct(&mut shards)?;

        let mut out = Vec::with_capacity(slice.length as usize);
        coder.recover(&mut out, &shards, slice.offset, slice.length)?;
        writer.write_all(&out).await?;
    }
    Ok(())
}

/// Moves shards whose current host is not present in `to` onto a host from `to`,
/// leaving every other shard untouched.
///
/// A no-op if every shard is already on a host in `to`. Fails with `InsufficientHosts`
/// up front if more shards need to move than `to` has capacity for — nothing is
/// attempted in that case. Otherwise: downloads the whole slab from `from`
/// (reconstructing via any `m` of its `n` shards), re-encrypts with the slab's existing
/// key (deterministic, so recovered ciphertext matches the original byte-for-byte —
/// spec §8 property 7), then re-disperses only the moving shard indices onto `to`.
/// Uploads that ultimately fail leave the corresponding `slab.shards[i]` untouched;
/// whatever did succeed is committed to `slab` before the aggregate error is returned.
pub async fn migrate(
    slab: &mut Slab,
    from: &[Arc<dyn HostSession>],
    to: &[Arc<dyn HostSession>],
    config: &EngineConfig,
) -> Result<(), EngineError> {
    let moving: Vec<usize> = slab
        .shards
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let host = s.as_ref()?.host;
            let stays = to.iter().any(|h| h.public_key() == host);
            (!stays).then_some(i)
        })
        .collect();

    if moving.is_empty() {
        debug!("engine: migrate is a no-op, every shard already in the destination set");
        return Ok(());
    }
    if moving.len() > to.len() {
        return Err(EngineError::InsufficientHosts {
            needed: moving.len(),
            have: to.len(),
        });
    }

    let m = slab.min_shards;
    let n = slab.shard_count();
    let slab_arc = Arc::new(slab.clone());
    let mut shards = fetch_shards(&slab_arc, from, m, 0, SECTOR_SIZE as u64, config).await?;

    let coder = ErasureCoder::new(m, n)?;
    coder.reconstruct(&mut shards)?;
    crypto::encrypt_shards(&slab.key, &mut shards)?;

    let shards = Arc::new(shards);
    let moving_hosts = to.to_vec();
    let shards_for_run = shards.clone();

    let outcome = dispatch(moving.clone(), moving_hosts, config.max_inflight_hint, move |host, shard_index| {
        let shards = shards_for_run.clone();
        async move {
            let bytes = shards[shard_index].as_ref().expect("reconstructed above");
            let root = host.upload_sector(bytes).await?;
            Ok(Sector::new(host.public_key(), root))
        }
    })
    .await;

    for (shard_index, sector) in outcome.succeeded {
        slab.shards[shard_index] = Some(sector);
    }

    if !outcome.errors.is_empty() {
        warn!(
            "engine: migrate left {} shard(s) unmoved after host failures",
            outcome.errors.len()
        );
        return Err(EngineError::Hosts(outcome.errors));
    }

    info!("engine: migrate moved {} shard(s)", moving.len());
    Ok(())
}

/// Deletes every sector the given slabs reference, grouped by host: one bulk
/// `delete_sectors` call per distinct host, run concurrently. Unlike upload/download/
/// migrate there is no substitution — a shard's sectors live on exactly one host, and
/// that host either honors the delete or it doesn't. Always attempts every host;
/// returns the aggregate of whatever failed (empty on full success).
pub async fn delete(slabs: &[Slab], hosts: &[Arc<dyn HostSession>]) -> Result<(), EngineError> {
    use crate::error::{HostError, HostErrorSet};
    use crate::types::{Hash256, PublicKey};

    let mut by_host: HashMap<PublicKey, Vec<Hash256>> = HashMap::new();
    for slab in slabs {
        for sector in slab.shards.iter().flatten() {
            by_host.entry(sector.host).or_default().push(sector.root);
        }
    }

    let host_lookup: HashMap<PublicKey, Arc<dyn HostSession>> =
        hosts.iter().map(|h| (h.public_key(), h.clone())).collect();

    let jobs = by_host.into_iter().map(|(host_key, roots)| {
        let host_lookup = &host_lookup;
        async move {
            match host_lookup.get(&host_key) {
                Some(host) => host
                    .delete_sectors(&roots)
                    .await
                    .map_err(|cause| HostError::new(host_key, cause)),
                None => Err(HostError::new(
                    host_key,
                    anyhow::anyhow!("no session available for host {host_key}"),
                )),
            }
        }
    });

    let results = futures::future::join_all(jobs).await;

    let mut errors = HostErrorSet::default();
    for result in results {
        if let Err(e) = result {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        info!("engine: delete succeeded across {} host(s)", host_lookup.len());
        Ok(())
    } else {
        warn!("engine: delete failed on {} host(s)", errors.len());
        Err(EngineError::Hosts(errors))
    }
}
