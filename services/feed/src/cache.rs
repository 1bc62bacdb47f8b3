//! Process-wide price cache
//!
//! Single source of truth for "current mark". Latest-write-wins per symbol;
//! the ingest task is the only writer, which serializes writes per symbol
//! and keeps intermittent regressions out of the cache. Consumers enforce
//! staleness themselves via [`PricePoint::is_stale`].

use dashmap::DashMap;

use types::ids::Symbol;
use types::marks::{MarkSource, PricePoint};
use types::numeric::Price;

/// Concurrent symbol → latest-mark map.
#[derive(Debug, Default)]
pub struct MarkCache {
    entries: DashMap<Symbol, PricePoint>,
}

impl MarkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest observation for a symbol. Latest write wins.
    pub fn record(&self, symbol: Symbol, price: Price, observed_at_ms: i64) {
        self.entries
            .insert(symbol, PricePoint::new(price, observed_at_ms));
    }

    /// Symbols with at least one observation, for scan-style consumers.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut out: Vec<Symbol> = self.entries.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MarkSource for MarkCache {
    fn mark(&self, symbol: &Symbol) -> Option<PricePoint> {
        self.entries.get(symbol).map(|e| *e.value())
    }
}
