//! Account snapshot computation
//!
//! Pure function over (balance, open positions, price map); no I/O, no
//! hidden state, so identical inputs always yield identical output.
//! Positions whose symbol has no cache entry are excluded from every
//! aggregate — they are "unpriced", not zero. Callers relying on the
//! snapshot must account for that policy.

use rust_decimal::Decimal;
use serde::Serialize;

use types::marks::MarkSource;
use types::position::Position;

use crate::margin;

/// Derived account state at current marks. Never stored; recomputed on
/// demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSnapshot {
    /// Realized collateral
    pub balance: Decimal,
    /// Σ unrealized PnL over priced open positions
    pub unrealized_pnl: Decimal,
    /// balance + unrealized_pnl
    pub equity: Decimal,
    /// Σ notional(mark) / leverage — evaluated at current mark, so it
    /// fluctuates with price rather than staying frozen at entry
    pub used_margin: Decimal,
    /// equity − used_margin
    pub free_margin: Decimal,
    /// Σ notional(mark) × maintenance_rate(leverage)
    pub maintenance: Decimal,
    /// equity / used_margin; `None` means no margin in use (∞)
    pub margin_level: Option<Decimal>,
}

/// Compute the snapshot for one account.
///
/// Non-open positions contribute nothing; unpriced open positions are
/// skipped entirely.
pub fn compute(
    balance: Decimal,
    positions: &[Position],
    marks: &dyn MarkSource,
) -> AccountSnapshot {
    let mut unrealized_pnl = Decimal::ZERO;
    let mut used_margin = Decimal::ZERO;
    let mut maintenance = Decimal::ZERO;

    for position in positions.iter().filter(|p| p.is_open()) {
        let Some(point) = marks.mark(&position.symbol) else {
            continue;
        };
        let mark = point.price;

        unrealized_pnl += position.unrealized_pnl(mark);
        let notional = position.notional(mark);
        used_margin += margin::round_up(notional / Decimal::from(position.leverage));
        maintenance += margin::maintenance_margin(notional, position.leverage);
    }

    let equity = balance + unrealized_pnl;
    let free_margin = margin::round_down(equity - used_margin);
    let margin_level = margin::margin_level(equity, used_margin);

    AccountSnapshot {
        balance,
        unrealized_pnl,
        equity,
        used_margin,
        free_margin,
        maintenance,
        margin_level,
    }
}
