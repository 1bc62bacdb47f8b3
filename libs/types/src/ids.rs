//! Unique identifier types for venue entities
//!
//! Position and account IDs use UUID v7 for time-sortable ordering, enabling
//! efficient chronological queries over the position ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a position
///
/// Uses UUID v7 for time-based sorting. Positions can be efficiently
/// queried in open-order using the embedded timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(Uuid);

impl PositionId {
    /// Create a new PositionId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PositionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical instrument key.
///
/// Always uppercase, always quoted in USDT (e.g. "BTCUSDT"). External
/// surfaces spell symbols many ways ("btc", "BTCUSD", "BTCT"); everything
/// is normalized through [`Symbol::canonical`] at the boundary so only one
/// spelling ever reaches the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize a raw symbol spelling into its canonical form.
    ///
    /// Known aliases map to their canonical pair; anything already ending
    /// in "USDT" passes through; "…USD" is upgraded to "…USDT"; a bare
    /// base asset gets "USDT" appended.
    pub fn canonical(raw: impl AsRef<str>) -> Self {
        let s = raw.as_ref().trim().to_uppercase();
        let canon = match s.as_str() {
            "" => "BTCUSDT".to_string(),
            "BTC" | "BTCT" | "BTCUSD" => "BTCUSDT".to_string(),
            "ETH" | "ETHUSD" => "ETHUSDT".to_string(),
            "SOL" | "SOLUSD" => "SOLUSDT".to_string(),
            _ if s.ends_with("USDT") => s,
            _ if s.ends_with("USD") => format!("{}T", s),
            _ => format!("{}USDT", s),
        };
        Self(canon)
    }

    /// Get the canonical symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::canonical(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_id_creation() {
        let id1 = PositionId::new();
        let id2 = PositionId::new();
        assert_ne!(id1, id2, "PositionIds should be unique");
    }

    #[test]
    fn test_position_id_serialization() {
        let id = PositionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: PositionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_account_id_creation() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_symbol_canonical_passthrough() {
        assert_eq!(Symbol::canonical("BTCUSDT").as_str(), "BTCUSDT");
        assert_eq!(Symbol::canonical("ethusdt").as_str(), "ETHUSDT");
    }

    #[test]
    fn test_symbol_aliases() {
        assert_eq!(Symbol::canonical("BTC").as_str(), "BTCUSDT");
        assert_eq!(Symbol::canonical("BTCT").as_str(), "BTCUSDT");
        assert_eq!(Symbol::canonical("btcusd").as_str(), "BTCUSDT");
        assert_eq!(Symbol::canonical("SOL").as_str(), "SOLUSDT");
    }

    #[test]
    fn test_symbol_usd_upgrade() {
        assert_eq!(Symbol::canonical("BNBUSD").as_str(), "BNBUSDT");
    }

    #[test]
    fn test_symbol_bare_base() {
        assert_eq!(Symbol::canonical("BNB").as_str(), "BNBUSDT");
    }

    #[test]
    fn test_symbol_serialization() {
        let sym = Symbol::canonical("BTCUSDT");
        let json = serde_json::to_string(&sym).unwrap();
        assert_eq!(json, "\"BTCUSDT\"");

        let deserialized: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(sym, deserialized);
    }
}
