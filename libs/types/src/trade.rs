//! Normalized trade tick records
//!
//! A [`TradeTick`] is the validated record of one upstream trade: canonical
//! symbol, finite positive price and quantity. It is the unit of the durable
//! tick journal and of broadcast tick events.

use serde::{Deserialize, Serialize};

use crate::ids::Symbol;
use crate::numeric::{Price, Quantity};

/// One normalized upstream trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTick {
    pub symbol: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    /// Exchange timestamp, Unix milliseconds
    pub timestamp_ms: i64,
}

impl TradeTick {
    pub fn new(symbol: Symbol, price: Price, quantity: Quantity, timestamp_ms: i64) -> Self {
        Self {
            symbol,
            price,
            quantity,
            timestamp_ms,
        }
    }
}
