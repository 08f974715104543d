//! Property tests for the quantified invariants of spec §8: round-trip and
//! partial-read round-trip over random plaintexts and random `(m, n)` pairs.
//!
//! Plaintexts are kept well under one sector so cases stay cheap; the engine zero-pads
//! up to `m * SECTOR_SIZE` regardless, so small inputs still exercise the full
//! encode/encrypt/disperse/reconstruct/decrypt/decode path.

mod common;

use std::io::Cursor;
use std::sync::Arc;

use proptest::prelude::*;

use slab_engine::config::EngineConfig;
use slab_engine::engine::{download_range, upload_from_reader};
use slab_engine::slab::Slice;

use common::{as_sessions, MockHostSession};

fn round_trip(data: Vec<u8>, m: usize, n: usize, off: u64, len: u64) -> bool {
    if data.is_empty() {
        return off == 0 && len == 0;
    }
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let hosts: Vec<_> = (1..=n as u8).map(MockHostSession::new).collect();
        let sessions = as_sessions(&hosts);
        let config = EngineConfig::default();

        let slabs = match upload_from_reader(&mut Cursor::new(data.clone()), m, n, &sessions, &config).await {
            Ok(s) => s,
            Err(_) => return false,
        };

        let slab = Arc::new(slabs.into_iter().next().unwrap());
        let slice = Slice::new(slab, 0, data.len() as u64);

        let mut out = Vec::new();
        if download_range(&mut out, &[slice], off, len, &sessions, &config).await.is_err() {
            return false;
        }
        out == data[off as usize..(off + len) as usize]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn full_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096), n in 1usize..6) {
        let m = (n + 1) / 2;
        let len = data.len() as u64;
        prop_assert!(round_trip(data, m, n, 0, len));
    }

    #[test]
    fn partial_read_round_trip(
        data in prop::collection::vec(any::<u8>(), 1..4096),
        n in 1usize..6,
        off_frac in 0.0f64..1.0,
        len_frac in 0.0f64..1.0,
    ) {
        let m = (n + 1) / 2;
        let total = data.len() as u64;
        let off = (off_frac * total as f64) as u64;
        let remaining = total - off;
        let len = (len_frac * remaining as f64) as u64;
        prop_assert!(round_trip(data, m, n, off, len));
    }
}
