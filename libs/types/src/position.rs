//! Leveraged position lifecycle types
//!
//! A position transitions exactly once from OPEN to a terminal state
//! (CLOSED or LIQUIDATED); [`Position::close`] is the only path there and
//! refuses to run twice.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::CloseError;
use crate::ids::{AccountId, PositionId, Symbol};
use crate::numeric::{Price, Quantity};

/// Position side enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Long position - profit when price increases
    Long,
    /// Short position - profit when price decreases
    Short,
}

/// Lifecycle status of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    /// Live exposure, mark-to-market applies
    Open,
    /// Closed by SL/TP trigger or manual request
    Closed,
    /// Force-closed by the liquidation enforcer
    Liquidated,
}

/// Why a position left the OPEN state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    Liquidation,
    Manual,
}

/// One leveraged exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub units: Quantity,
    pub entry_price: Price,
    /// 1..=100, validated at admission
    pub leverage: u8,
    /// Collateral locked at open: notional(entry) / leverage
    pub posted_margin: Decimal,
    pub take_profit: Option<Price>,
    pub stop_loss: Option<Price>,
    pub status: PositionStatus,
    pub close_price: Option<Price>,
    pub closed_at: Option<i64>,
    pub realized_pnl: Option<Decimal>,
    pub close_reason: Option<CloseReason>,
    pub opened_at: i64,
    pub version: u64,
}

impl Position {
    /// Open a new position at the given entry price.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        account_id: AccountId,
        symbol: Symbol,
        side: Side,
        units: Quantity,
        entry_price: Price,
        leverage: u8,
        take_profit: Option<Price>,
        stop_loss: Option<Price>,
        opened_at: i64,
    ) -> Self {
        let notional = units.as_decimal() * entry_price.as_decimal();
        let posted_margin = notional / Decimal::from(leverage);

        Self {
            id: PositionId::new(),
            account_id,
            symbol,
            side,
            units,
            entry_price,
            leverage,
            posted_margin,
            take_profit,
            stop_loss,
            status: PositionStatus::Open,
            close_price: None,
            closed_at: None,
            realized_pnl: None,
            close_reason: None,
            opened_at,
            version: 0,
        }
    }

    /// Whether the position is still live.
    pub fn is_open(&self) -> bool {
        matches!(self.status, PositionStatus::Open)
    }

    /// Unrealized PnL at the given mark.
    ///
    /// Long: (mark − entry) × units; short: (entry − mark) × units.
    pub fn unrealized_pnl(&self, mark: Price) -> Decimal {
        let units = self.units.as_decimal();
        match self.side {
            Side::Long => (mark.as_decimal() - self.entry_price.as_decimal()) * units,
            Side::Short => (self.entry_price.as_decimal() - mark.as_decimal()) * units,
        }
    }

    /// Full economic exposure at the given mark: units × mark.
    pub fn notional(&self, mark: Price) -> Decimal {
        self.units.as_decimal() * mark.as_decimal()
    }

    /// Posted margin re-derived at the current mark: notional(mark) / leverage.
    ///
    /// The liquidation rule evaluates collateral against this value, not the
    /// margin frozen at entry.
    pub fn posted_margin_at(&self, mark: Price) -> Decimal {
        self.notional(mark) / Decimal::from(self.leverage)
    }

    /// Transition out of OPEN. The only path to a terminal state.
    ///
    /// Returns `CloseError::AlreadyClosed` if the position is already
    /// terminal; terminal positions are never resurrected.
    pub fn close(
        &mut self,
        close_price: Price,
        realized_pnl: Decimal,
        reason: CloseReason,
        at_ms: i64,
    ) -> Result<(), CloseError> {
        if !self.is_open() {
            return Err(CloseError::AlreadyClosed {
                position_id: self.id,
            });
        }

        self.status = match reason {
            CloseReason::Liquidation => PositionStatus::Liquidated,
            _ => PositionStatus::Closed,
        };
        self.close_price = Some(close_price);
        self.closed_at = Some(at_ms);
        self.realized_pnl = Some(realized_pnl);
        self.close_reason = Some(reason);
        self.version += 1;
        Ok(())
    }
}
