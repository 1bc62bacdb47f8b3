//! Shared account and position store
//!
//! The mutable state every actor converges on. Positions are updated in
//! place through closure-based read-modify-write: the closure observes the
//! LIVE row under the map's shard lock, which is the "re-read after
//! acquiring the lock" step of the closure protocol. Cross-position
//! consistency is eventual within one enforcement pass; there is no global
//! transaction.

use dashmap::DashMap;
use rust_decimal::Decimal;

use types::account::Account;
use types::errors::StoreError;
use types::ids::{AccountId, PositionId, Symbol};
use types::position::{Position, PositionStatus};

/// In-process account ledger store.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: DashMap<AccountId, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account; returns its id.
    pub fn insert(&self, account: Account) -> AccountId {
        let id = account.account_id;
        self.accounts.insert(id, account);
        id
    }

    pub fn get(&self, account_id: &AccountId) -> Option<Account> {
        self.accounts.get(account_id).map(|a| a.clone())
    }

    /// Current realized balance.
    pub fn balance(&self, account_id: &AccountId) -> Result<Decimal, StoreError> {
        self.accounts
            .get(account_id)
            .map(|a| a.balance)
            .ok_or(StoreError::AccountNotFound)
    }

    /// Apply a realized PnL under the shard lock; the balance floor lives
    /// in [`Account::apply_realized`]. Returns the new balance.
    pub fn apply_realized(
        &self,
        account_id: &AccountId,
        realized_pnl: Decimal,
        timestamp_ms: i64,
    ) -> Result<Decimal, StoreError> {
        let mut account = self
            .accounts
            .get_mut(account_id)
            .ok_or(StoreError::AccountNotFound)?;
        Ok(account.apply_realized(realized_pnl, timestamp_ms))
    }
}

/// In-process position store, one mutable record per position id.
#[derive(Debug, Default)]
pub struct PositionStore {
    positions: DashMap<PositionId, Position>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a freshly admitted position. Single write; no partial state
    /// is observable.
    pub fn insert(&self, position: Position) -> PositionId {
        let id = position.id;
        self.positions.insert(id, position);
        id
    }

    pub fn get(&self, position_id: &PositionId) -> Option<Position> {
        self.positions.get(position_id).map(|p| p.clone())
    }

    /// All positions for an account, optionally filtered by status,
    /// oldest first.
    pub fn list(&self, account_id: &AccountId, status: Option<PositionStatus>) -> Vec<Position> {
        let mut out: Vec<Position> = self
            .positions
            .iter()
            .filter(|entry| {
                entry.account_id == *account_id
                    && status.map_or(true, |s| entry.status == s)
            })
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    /// Open positions for an account.
    pub fn open_positions(&self, account_id: &AccountId) -> Vec<Position> {
        self.list(account_id, Some(PositionStatus::Open))
    }

    /// Every open position across accounts, oldest first. The enforcer's
    /// working set for one scan.
    pub fn all_open(&self) -> Vec<Position> {
        let mut out: Vec<Position> = self
            .positions
            .iter()
            .filter(|entry| entry.is_open())
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    /// Open positions on a symbol, across accounts. The watcher's working
    /// set for one tick.
    pub fn open_for_symbol(&self, symbol: &Symbol) -> Vec<Position> {
        let mut out: Vec<Position> = self
            .positions
            .iter()
            .filter(|entry| entry.is_open() && entry.symbol == *symbol)
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    /// Read-modify-write on the live row under the shard lock.
    ///
    /// The closure sees current state, not the snapshot the caller may have
    /// iterated from.
    pub fn update<R>(
        &self,
        position_id: &PositionId,
        f: impl FnOnce(&mut Position) -> R,
    ) -> Result<R, StoreError> {
        let mut position = self
            .positions
            .get_mut(position_id)
            .ok_or(StoreError::PositionNotFound {
                position_id: *position_id,
            })?;
        Ok(f(&mut position))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
