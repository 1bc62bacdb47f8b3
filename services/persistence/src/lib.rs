//! Durable and shared state for the paper-trading risk core
//!
//! Three concerns live here:
//! - `journal`: append-only tick journal with checksummed, batch-atomic
//!   writes for historical reconstruction
//! - `store`: the shared account/position store every actor mutates through
//! - `locks`: the per-position TTL mutual-exclusion table backing the
//!   lock-then-verify closure protocol

pub mod journal;
pub mod locks;
pub mod store;

pub const SERVICE_VERSION: &str = "0.1.0";
