//! Conditional order watcher (take-profit / stop-loss)
//!
//! Event-driven: fires on every accepted tick, for the affected symbol
//! only. Trigger evaluation compares scaled integer mantissas at the
//! symbol's declared precision — never raw floats — with inclusive
//! comparisons, and take-profit wins when both targets cross on one tick.
//! Closures go through the shared lock-then-verify protocol, so rapid
//! tick bursts and the liquidation enforcer cannot double-process a
//! position.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use persistence::store::PositionStore;
use types::events::{VenueEvent, VenueEventPayload};
use types::ids::{PositionId, Symbol};
use types::numeric::{Price, PriceScale};
use types::position::{CloseReason, Position, Side};

use crate::closeout::{CloseOutcome, Closeout};

/// Per-tick SL/TP evaluation actor.
pub struct ConditionalOrderWatcher {
    positions: Arc<PositionStore>,
    closeout: Closeout,
    scale: PriceScale,
}

impl ConditionalOrderWatcher {
    pub fn new(positions: Arc<PositionStore>, closeout: Closeout, scale: PriceScale) -> Self {
        Self {
            positions,
            closeout,
            scale,
        }
    }

    /// Evaluate every open position on the tick's symbol.
    ///
    /// Returns the closures this call performed.
    pub fn on_tick(
        &self,
        symbol: &Symbol,
        mark: Price,
        now_ms: i64,
    ) -> Vec<(PositionId, CloseReason)> {
        let mark_scaled = self.scale.scaled(symbol, mark);
        let mut closed = Vec::new();

        for position in self.positions.open_for_symbol(symbol) {
            if position.take_profit.is_none() && position.stop_loss.is_none() {
                continue;
            }

            let Some(reason) = self.trigger_for(&position, symbol, mark_scaled) else {
                continue;
            };

            debug!(
                position_id = %position.id,
                reason = ?reason,
                mark_scaled,
                "conditional trigger crossed"
            );

            // Contended or already terminal: another evaluator owns this
            // closure; skipping is the correct outcome
            if let CloseOutcome::Closed { .. } =
                self.closeout
                    .close_position(position.id, mark, reason, now_ms)
            {
                closed.push((position.id, reason));
            }
        }

        closed
    }

    /// Side-aware trigger check on scaled integers. Take-profit wins when
    /// both conditions are met on the same tick.
    fn trigger_for(
        &self,
        position: &Position,
        symbol: &Symbol,
        mark_scaled: i128,
    ) -> Option<CloseReason> {
        let tp_scaled = position.take_profit.map(|t| self.scale.scaled(symbol, t));
        let sl_scaled = position.stop_loss.map(|t| self.scale.scaled(symbol, t));

        let tp_hit = tp_scaled.is_some_and(|target| match position.side {
            Side::Long => mark_scaled >= target,
            Side::Short => mark_scaled <= target,
        });
        if tp_hit {
            return Some(CloseReason::TakeProfit);
        }

        let sl_hit = sl_scaled.is_some_and(|target| match position.side {
            Side::Long => mark_scaled <= target,
            Side::Short => mark_scaled >= target,
        });
        if sl_hit {
            return Some(CloseReason::StopLoss);
        }

        None
    }

    /// Consume the broadcast stream until shutdown.
    ///
    /// A lagged receiver skips to the live edge: ticks are refreshable
    /// state, not a ledger, and the enforcer backstops anything missed.
    pub async fn run(
        self,
        mut events: broadcast::Receiver<VenueEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = events.recv() => match received {
                    Ok(event) => {
                        if let VenueEventPayload::Tick { symbol, price, .. } = event.payload {
                            let now_ms = chrono::Utc::now().timestamp_millis();
                            self.on_tick(&symbol, price, now_ms);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "watcher lagged behind tick stream; resuming at live edge");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
