//! Renter-side slab engine: erasure-code, encrypt and disperse byte streams across a
//! pool of paid RPC hosts, then reconstruct, migrate or delete what was placed.
//!
//! The four operations a caller drives are [`engine::upload_from_reader`],
//! [`engine::download_range`], [`engine::migrate`] and [`engine::delete`]; everything
//! else in this crate exists to support them. See `DESIGN.md` for how each module maps
//! onto its source of grounding in the retrieval pack.

pub mod config;
pub mod crypto;
pub mod dispatcher;
pub mod engine;
pub mod erasure;
pub mod error;
pub mod host;
pub mod payment;
pub mod sector;
pub mod slab;
pub mod types;

pub use config::EngineConfig;
pub use error::EngineError;
pub use host::HostSession;
pub use slab::{Slab, Slice};
