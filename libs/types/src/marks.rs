//! Price cache interface
//!
//! The cache itself lives in the feed service; consumers depend only on the
//! [`MarkSource`] trait so tests can substitute a deterministic price map.

use serde::{Deserialize, Serialize};

use crate::ids::Symbol;
use crate::numeric::Price;

/// Latest observed mark for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Price,
    /// When the trade carrying this price was observed, Unix milliseconds
    pub observed_at_ms: i64,
}

impl PricePoint {
    pub fn new(price: Price, observed_at_ms: i64) -> Self {
        Self {
            price,
            observed_at_ms,
        }
    }

    /// Age of this observation relative to `now_ms`.
    ///
    /// Clock skew can make the observation appear to be from the future;
    /// that reads as age zero, not a negative age.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.observed_at_ms).max(0)
    }

    /// Whether this observation is older than `max_age_ms`.
    pub fn is_stale(&self, now_ms: i64, max_age_ms: i64) -> bool {
        self.age_ms(now_ms) > max_age_ms
    }
}

/// Read side of the venue's price cache.
///
/// Latest-write-wins per symbol; staleness is the consumer's decision.
pub trait MarkSource: Send + Sync {
    /// Latest mark for a symbol, if one has ever been observed.
    fn mark(&self, symbol: &Symbol) -> Option<PricePoint>;
}

/// Fixed price map for tests and offline evaluation.
#[derive(Debug, Default, Clone)]
pub struct StaticMarks {
    entries: std::collections::BTreeMap<Symbol, PricePoint>,
}

impl StaticMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, symbol: Symbol, price: Price, observed_at_ms: i64) {
        self.entries
            .insert(symbol, PricePoint::new(price, observed_at_ms));
    }
}

impl MarkSource for StaticMarks {
    fn mark(&self, symbol: &Symbol) -> Option<PricePoint> {
        self.entries.get(symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_and_staleness() {
        let point = PricePoint::new(Price::from_u64(30_000), 1_000);
        assert_eq!(point.age_ms(4_000), 3_000);
        assert!(!point.is_stale(4_000, 5_000));
        assert!(point.is_stale(7_001, 5_000));
    }

    #[test]
    fn test_future_observation_age_clamped() {
        let point = PricePoint::new(Price::from_u64(30_000), 10_000);
        assert_eq!(point.age_ms(9_000), 0);
        assert!(!point.is_stale(9_000, 5_000));
    }

    #[test]
    fn test_static_marks() {
        let mut marks = StaticMarks::new();
        let sym = Symbol::canonical("BTCUSDT");
        assert!(marks.mark(&sym).is_none());

        marks.set(sym.clone(), Price::from_u64(30_000), 1_000);
        let point = marks.mark(&sym).unwrap();
        assert_eq!(point.price, Price::from_u64(30_000));
    }
}
