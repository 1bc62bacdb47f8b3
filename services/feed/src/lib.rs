//! Feed service
//!
//! Turns the upstream trade stream into the venue's three tick products:
//! a durable journal record (batched), a price-cache write, and a
//! best-effort broadcast event. The cache write always lands before the
//! broadcast publish, so a consumer reacting to an event observes a cache
//! at least as fresh as that event.
//!
//! ```text
//! Upstream WS ──▶ normalize ──▶ MarkCache.record
//!                        │            │
//!                        │            ▼
//!                        ├──▶ TickBatcher ──▶ TickJournal (batched, retried)
//!                        │
//!                        └──▶ broadcast VenueEvent::Tick (best-effort)
//! ```

pub mod adapter;
pub mod batch;
pub mod cache;
pub mod normalize;
pub mod ws;

pub const SERVICE_VERSION: &str = "0.1.0";
