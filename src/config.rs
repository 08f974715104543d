//! Deployment-overridable knobs, kept separate from the protocol constants that are
//! part of the wire format (`sector::SECTOR_SIZE`, `sector::LEAF_SIZE`) and therefore
//! cannot vary per deployment. Mirrors the shape of small config structs elsewhere in
//! the retrieval pack (e.g. `icn-dag`'s storage config): a plain struct with a
//! `Default` impl, passed in explicitly rather than read from a global.

/// Tunable limits for one [`crate::engine`] instance.
///
/// Neither knob affects wire compatibility; both only bound local resource use. A
/// production embedder typically builds this from its own config file or environment
/// loader — that loader is itself out of scope here (spec §1).
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Upper bound on concurrent in-flight host RPCs per [`crate::dispatcher::dispatch`]
    /// run. Every task is still spawned as its own worker up front per spec §4.3's "at
    /// most `len(tasks)` concurrent workers", but each worker blocks on a semaphore
    /// permit before actually calling into the host, so the host-facing concurrency
    /// this instance generates stays capped regardless of how wide a single upload or
    /// download fans out. `0` means unbounded.
    pub max_inflight_hint: usize,

    /// Maximum number of shards (`n`) this instance will erasure-code a single slab
    /// into. `upload_from_reader` rejects a larger `n` up front with
    /// `EngineError::InvalidArgument` and uses this value to pre-size its per-slab task
    /// vector.
    pub max_shards_hint: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_inflight_hint: 64,
            max_shards_hint: 30,
        }
    }
}
