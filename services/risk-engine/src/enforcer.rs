//! Liquidation enforcer
//!
//! Scans all OPEN positions on a fixed cadence (default once per second —
//! a deliberate responsiveness/load trade-off, not a sub-second SLA) and
//! force-closes breaches through the shared closeout protocol. Two rules
//! run per pass:
//!
//! 1. Per-position margin breach: liquidate when unrealized PnL at the
//!    current mark has consumed the margin the position would post at that
//!    mark — a hard stop at 100% of locked collateral.
//! 2. Account-level sweep: while equity ≤ maintenance, close by descending
//!    notional (largest exposure first), re-evaluating after each closure
//!    and stopping once equity clears maintenance.
//!
//! Unpriced positions are skipped; the watcher and the enforcer reconcile
//! through the per-position lock, so a contended position is simply left
//! for whoever holds it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, info};

use persistence::store::{AccountStore, PositionStore};
use types::ids::{AccountId, PositionId};
use types::marks::MarkSource;
use types::position::{CloseReason, Position};

use crate::closeout::{CloseOutcome, Closeout};
use crate::snapshot;

/// Enforcer tuning.
#[derive(Debug, Clone)]
pub struct EnforcerConfig {
    /// Scan cadence
    pub scan_interval: Duration,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(1),
        }
    }
}

/// What one scan did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanReport {
    /// Positions liquidated by the per-position margin-breach rule
    pub margin_breaches: Vec<PositionId>,
    /// Positions liquidated by the account-level sweep
    pub account_sweeps: Vec<PositionId>,
}

impl ScanReport {
    pub fn total(&self) -> usize {
        self.margin_breaches.len() + self.account_sweeps.len()
    }
}

/// Fixed-cadence liquidation actor.
pub struct LiquidationEnforcer {
    positions: Arc<PositionStore>,
    accounts: Arc<AccountStore>,
    marks: Arc<dyn MarkSource>,
    closeout: Closeout,
    config: EnforcerConfig,
}

impl LiquidationEnforcer {
    pub fn new(
        positions: Arc<PositionStore>,
        accounts: Arc<AccountStore>,
        marks: Arc<dyn MarkSource>,
        closeout: Closeout,
        config: EnforcerConfig,
    ) -> Self {
        Self {
            positions,
            accounts,
            marks,
            closeout,
            config,
        }
    }

    /// One full enforcement pass against the current price cache.
    pub fn scan_once(&self, now_ms: i64) -> ScanReport {
        let mut report = ScanReport::default();

        // Pass 1: per-position margin breach
        let open = self.positions.all_open();
        let mut touched_accounts: BTreeSet<AccountId> = BTreeSet::new();

        for position in &open {
            touched_accounts.insert(position.account_id);

            let Some(point) = self.marks.mark(&position.symbol) else {
                continue;
            };
            let mark = point.price;

            let upnl = position.unrealized_pnl(mark);
            let breach_line = -position.posted_margin_at(mark);
            if upnl <= breach_line {
                debug!(
                    position_id = %position.id,
                    %upnl,
                    %breach_line,
                    "margin breach at current mark"
                );
                if let CloseOutcome::Closed { .. } =
                    self.closeout
                        .close_position(position.id, mark, CloseReason::Liquidation, now_ms)
                {
                    report.margin_breaches.push(position.id);
                }
            }
        }

        // Pass 2: account-level equity vs maintenance
        for account_id in touched_accounts {
            report
                .account_sweeps
                .extend(self.sweep_account(&account_id, now_ms));
        }

        if report.total() > 0 {
            info!(
                margin_breaches = report.margin_breaches.len(),
                account_sweeps = report.account_sweeps.len(),
                "liquidation scan closed positions"
            );
        }
        report
    }

    /// Close largest exposures until equity clears maintenance.
    fn sweep_account(&self, account_id: &AccountId, now_ms: i64) -> Vec<PositionId> {
        let mut closed = Vec::new();

        loop {
            let open = self.positions.open_positions(account_id);
            if open.is_empty() {
                break;
            }

            let Ok(balance) = self.accounts.balance(account_id) else {
                break;
            };
            let snap = snapshot::compute(balance, &open, self.marks.as_ref());
            if snap.maintenance <= Decimal::ZERO || snap.equity > snap.maintenance {
                break;
            }

            // Largest priced exposure first
            let Some((position, mark)) = self.largest_priced(&open) else {
                break;
            };

            match self
                .closeout
                .close_position(position.id, mark, CloseReason::Liquidation, now_ms)
            {
                CloseOutcome::Closed { .. } => closed.push(position.id),
                // Contended or already terminal: someone else is moving
                // this account; re-evaluate on the next loop with whatever
                // state they leave behind
                _ => break,
            }
        }

        closed
    }

    fn largest_priced(&self, open: &[Position]) -> Option<(Position, types::numeric::Price)> {
        open.iter()
            .filter_map(|p| {
                self.marks
                    .mark(&p.symbol)
                    .map(|point| (p.clone(), point.price, p.notional(point.price)))
            })
            .max_by(|a, b| a.2.cmp(&b.2))
            .map(|(p, mark, _)| (p, mark))
    }

    /// Run the scan loop until shutdown. Each pass runs to completion;
    /// shutdown is only observed between passes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.scan_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    self.scan_once(now_ms);
                }
            }
        }
    }
}
