//! Account ledger types
//!
//! One account holds realized collateral. The balance moves only when a
//! position goes terminal, and it is floored at zero at every realization:
//! the venue absorbs any theoretical excess loss rather than driving a
//! demo account negative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

/// Single ledger per trading identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    /// Realized collateral; never below zero
    pub balance: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

impl Account {
    /// Create a new account with a starting balance.
    ///
    /// A negative starting balance is clamped to zero.
    pub fn new(starting_balance: Decimal, timestamp: i64) -> Self {
        Self {
            account_id: AccountId::new(),
            balance: starting_balance.max(Decimal::ZERO),
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
        }
    }

    /// Apply a realized PnL to the balance, flooring the result at zero.
    ///
    /// Returns the new balance.
    pub fn apply_realized(&mut self, realized_pnl: Decimal, timestamp: i64) -> Decimal {
        self.balance = (self.balance + realized_pnl).max(Decimal::ZERO);
        self.updated_at = timestamp;
        self.version += 1;
        self.balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation() {
        let account = Account::new(Decimal::from(5_000), 1708123456789);
        assert_eq!(account.balance, Decimal::from(5_000));
        assert_eq!(account.version, 0);
    }

    #[test]
    fn test_negative_start_clamped() {
        let account = Account::new(Decimal::from(-100), 1708123456789);
        assert_eq!(account.balance, Decimal::ZERO);
    }

    #[test]
    fn test_apply_realized_profit() {
        let mut account = Account::new(Decimal::from(5_000), 1);
        let balance = account.apply_realized(Decimal::from(100), 2);
        assert_eq!(balance, Decimal::from(5_100));
        assert_eq!(account.version, 1);
    }

    #[test]
    fn test_apply_realized_loss() {
        let mut account = Account::new(Decimal::from(5_000), 1);
        let balance = account.apply_realized(Decimal::from(-300), 2);
        assert_eq!(balance, Decimal::from(4_700));
    }

    #[test]
    fn test_balance_floored_at_zero() {
        let mut account = Account::new(Decimal::from(100), 1);
        let balance = account.apply_realized(Decimal::from(-250), 2);
        assert_eq!(balance, Decimal::ZERO);

        // Subsequent profit applies from zero, not from the theoretical deficit
        let balance = account.apply_realized(Decimal::from(50), 3);
        assert_eq!(balance, Decimal::from(50));
    }
}
