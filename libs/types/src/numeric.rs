//! Fixed-point numeric types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Trigger comparisons additionally go through [`PriceScale`], which maps a
//! price to an integer mantissa at the symbol's declared precision so two
//! prices are compared as integers, never as floats.

use std::collections::BTreeMap;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::Symbol;

/// A strictly positive, finite price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Try to create a price; rejects zero and negative values.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from an integer number of quote units.
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Parse from a decimal string.
    pub fn from_str(s: &str) -> Option<Self> {
        Decimal::from_str_exact(s).ok().and_then(Self::try_new)
    }

    /// Get inner decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive base-asset quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Try to create a quantity; rejects zero and negative values.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Parse from a decimal string.
    pub fn from_str(s: &str) -> Option<Self> {
        Decimal::from_str_exact(s).ok().and_then(Self::try_new)
    }

    /// Get inner decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-symbol decimal precision registry.
///
/// Maps each symbol to its declared number of price decimals and converts
/// prices to scaled integer mantissas at that precision. SL/TP trigger
/// evaluation compares these mantissas, so a price exactly equal to a
/// target triggers and a price one scaled unit short does not.
#[derive(Debug, Clone)]
pub struct PriceScale {
    decimals: BTreeMap<Symbol, u32>,
    default_decimals: u32,
}

impl PriceScale {
    /// Registry with the venue's default instruments at 3 decimals.
    pub fn with_defaults() -> Self {
        let mut decimals = BTreeMap::new();
        for sym in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
            decimals.insert(Symbol::canonical(sym), 3);
        }
        Self {
            decimals,
            default_decimals: 3,
        }
    }

    /// Override or add the precision for a symbol.
    pub fn set(&mut self, symbol: Symbol, decimals: u32) {
        self.decimals.insert(symbol, decimals);
    }

    /// Declared decimals for a symbol (falls back to the default).
    pub fn decimals(&self, symbol: &Symbol) -> u32 {
        self.decimals
            .get(symbol)
            .copied()
            .unwrap_or(self.default_decimals)
    }

    /// Scaled integer mantissa of a price at the symbol's precision.
    ///
    /// Half-up rounding at the last declared decimal; the result of a
    /// scale-0 decimal always fits an i128.
    pub fn scaled(&self, symbol: &Symbol, price: Price) -> i128 {
        let decimals = self.decimals(symbol);
        let factor = Decimal::from(10u64.pow(decimals));
        (price.as_decimal() * factor)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i128()
            .unwrap_or(i128::MAX)
    }
}

impl Default for PriceScale {
    fn default() -> Self {
        Self::with_defaults()
    }
}
