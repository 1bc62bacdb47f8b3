//! Lock-then-verify closure protocol
//!
//! Both the enforcer and the watcher may want to close the same position;
//! manual close requests race them too. Every path out of OPEN goes
//! through [`Closeout::close_position`]: acquire the position's TTL lock,
//! re-read live status under the store's shard lock, abort if terminal,
//! then transition, realize PnL into the balance, and emit the lifecycle
//! event. Contention and already-terminal are outcomes, not errors — the
//! intended effect (position closed) is achieved either way.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use persistence::locks::PositionLockTable;
use persistence::store::{AccountStore, PositionStore};
use types::errors::CloseError;
use types::events::{VenueEvent, VenueEventPayload};
use types::ids::PositionId;
use types::marks::MarkSource;
use types::numeric::Price;
use types::position::{CloseReason, Position};

/// Result of one closure attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// This caller performed the transition.
    Closed {
        position: Position,
        realized: Decimal,
    },
    /// Another evaluator holds the lock; skip.
    Contended,
    /// The position was already terminal when re-read.
    AlreadyTerminal,
    /// No such position.
    NotFound,
}

/// Shared closure executor.
#[derive(Clone)]
pub struct Closeout {
    positions: Arc<PositionStore>,
    accounts: Arc<AccountStore>,
    locks: Arc<PositionLockTable>,
    events: broadcast::Sender<VenueEvent>,
}

impl Closeout {
    pub fn new(
        positions: Arc<PositionStore>,
        accounts: Arc<AccountStore>,
        locks: Arc<PositionLockTable>,
        events: broadcast::Sender<VenueEvent>,
    ) -> Self {
        Self {
            positions,
            accounts,
            locks,
            events,
        }
    }

    /// Close one position at the given mark.
    ///
    /// Liquidations cap the realized loss at the collateral posted when
    /// the position opened — a trader never loses more than what was
    /// posted; every other reason realizes the full unrealized PnL. The
    /// balance is floored at zero on realization.
    pub fn close_position(
        &self,
        position_id: PositionId,
        mark: Price,
        reason: CloseReason,
        now_ms: i64,
    ) -> CloseOutcome {
        let Some(_guard) = self.locks.try_acquire(position_id) else {
            trace!(position_id = %position_id, "closure lock contended; skipping");
            return CloseOutcome::Contended;
        };

        // Re-read live status under the shard lock: a tick burst or the
        // other evaluator may have closed it between our snapshot and now.
        let updated = self.positions.update(&position_id, |position| {
            if !position.is_open() {
                return None;
            }

            let upnl = position.unrealized_pnl(mark);
            let realized = match reason {
                // Loss capped at 100% of the collateral posted at open
                CloseReason::Liquidation => upnl.max(-position.posted_margin),
                // SL/TP and manual closes are ordinary exits
                _ => upnl,
            };

            // Cannot fail: open checked above under the same lock
            let _ = position.close(mark, realized, reason, now_ms);
            Some((position.clone(), realized))
        });

        let (position, realized) = match updated {
            Err(_) => return CloseOutcome::NotFound,
            Ok(None) => {
                debug!(position_id = %position_id, "position already terminal; closure is a no-op");
                return CloseOutcome::AlreadyTerminal;
            }
            Ok(Some(pair)) => pair,
        };

        match self
            .accounts
            .apply_realized(&position.account_id, realized, now_ms)
        {
            Ok(balance) => {
                info!(
                    position_id = %position_id,
                    reason = ?reason,
                    %realized,
                    %balance,
                    "position closed"
                );
            }
            Err(err) => {
                // The position is terminal either way; a missing account is
                // an integrity fault worth shouting about
                warn!(
                    position_id = %position_id,
                    error = %err,
                    "realized PnL could not be applied"
                );
            }
        }

        let payload = match reason {
            CloseReason::Liquidation => VenueEventPayload::PositionLiquidated {
                position: position.clone(),
            },
            _ => VenueEventPayload::OrderClosed {
                position: position.clone(),
            },
        };
        if self.events.send(VenueEvent::new(now_ms, payload)).is_err() {
            trace!("closure broadcast dropped (no subscribers)");
        }

        CloseOutcome::Closed { position, realized }
    }

    /// Manual close requested through the API surface.
    ///
    /// Uses the latest mark when one exists and falls back to the entry
    /// price for an unpriced symbol (realizing zero PnL). A concurrent
    /// evaluator holding the lock means the closure is already in flight,
    /// which the caller sees as already-closed.
    pub fn manual_close(
        &self,
        position_id: PositionId,
        marks: &dyn MarkSource,
        now_ms: i64,
    ) -> Result<Decimal, CloseError> {
        let position = self
            .positions
            .get(&position_id)
            .ok_or(CloseError::NotFound { position_id })?;
        if !position.is_open() {
            return Err(CloseError::AlreadyClosed { position_id });
        }

        let mark = marks
            .mark(&position.symbol)
            .map(|point| point.price)
            .unwrap_or(position.entry_price);

        match self.close_position(position_id, mark, CloseReason::Manual, now_ms) {
            CloseOutcome::Closed { realized, .. } => Ok(realized),
            CloseOutcome::NotFound => Err(CloseError::NotFound { position_id }),
            CloseOutcome::AlreadyTerminal | CloseOutcome::Contended => {
                Err(CloseError::AlreadyClosed { position_id })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::account::Account;
    use types::ids::{AccountId, Symbol};
    use types::marks::StaticMarks;
    use types::numeric::Quantity;
    use types::position::{PositionStatus, Side};

    struct Fixture {
        closeout: Closeout,
        positions: Arc<PositionStore>,
        accounts: Arc<AccountStore>,
        locks: Arc<PositionLockTable>,
        rx: broadcast::Receiver<VenueEvent>,
        account_id: AccountId,
    }

    fn make_fixture(balance: u64) -> Fixture {
        let positions = Arc::new(PositionStore::new());
        let accounts = Arc::new(AccountStore::new());
        let locks = Arc::new(PositionLockTable::with_default_ttl());
        let (tx, rx) = broadcast::channel(64);
        let account_id = accounts.insert(Account::new(Decimal::from(balance), 1));

        Fixture {
            closeout: Closeout::new(
                Arc::clone(&positions),
                Arc::clone(&accounts),
                Arc::clone(&locks),
                tx,
            ),
            positions,
            accounts,
            locks,
            rx,
            account_id,
        }
    }

    fn open_position(fx: &Fixture, entry: u64, leverage: u8) -> PositionId {
        let position = Position::open(
            fx.account_id,
            Symbol::canonical("BTCUSDT"),
            Side::Long,
            Quantity::from_str("0.1").unwrap(),
            Price::from_u64(entry),
            leverage,
            None,
            None,
            1,
        );
        fx.positions.insert(position)
    }

    #[test]
    fn test_ordinary_close_realizes_full_pnl() {
        let fx = make_fixture(5_000);
        let id = open_position(&fx, 30_000, 10);

        let outcome = fx.closeout.close_position(
            id,
            Price::from_u64(31_000),
            CloseReason::TakeProfit,
            2,
        );

        match outcome {
            CloseOutcome::Closed { realized, position } => {
                assert_eq!(realized, Decimal::from(100));
                assert_eq!(position.status, PositionStatus::Closed);
            }
            other => panic!("expected Closed, got {:?}", other),
        }
        assert_eq!(
            fx.accounts.balance(&fx.account_id).unwrap(),
            Decimal::from(5_100)
        );
    }

    #[test]
    fn test_liquidation_caps_loss_at_posted_margin() {
        let fx = make_fixture(5_000);
        let id = open_position(&fx, 30_000, 10);

        // Mark 26700: upnl = -330, posted margin at open = 300; the loss
        // is capped at what was posted
        let outcome = fx.closeout.close_position(
            id,
            Price::from_u64(26_700),
            CloseReason::Liquidation,
            2,
        );

        match outcome {
            CloseOutcome::Closed { realized, position } => {
                assert_eq!(realized, Decimal::from(-300));
                assert_eq!(position.status, PositionStatus::Liquidated);
            }
            other => panic!("expected Closed, got {:?}", other),
        }
        assert_eq!(
            fx.accounts.balance(&fx.account_id).unwrap(),
            Decimal::from(4_700)
        );
    }

    #[test]
    fn test_second_close_is_noop() {
        let fx = make_fixture(5_000);
        let id = open_position(&fx, 30_000, 10);

        let first =
            fx.closeout
                .close_position(id, Price::from_u64(31_000), CloseReason::TakeProfit, 2);
        assert!(matches!(first, CloseOutcome::Closed { .. }));

        let second =
            fx.closeout
                .close_position(id, Price::from_u64(31_000), CloseReason::StopLoss, 3);
        assert_eq!(second, CloseOutcome::AlreadyTerminal);

        // Balance applied exactly once
        assert_eq!(
            fx.accounts.balance(&fx.account_id).unwrap(),
            Decimal::from(5_100)
        );
    }

    #[test]
    fn test_contended_lock_skips() {
        let fx = make_fixture(5_000);
        let id = open_position(&fx, 30_000, 10);

        let _held = fx.locks.try_acquire(id).unwrap();
        let outcome =
            fx.closeout
                .close_position(id, Price::from_u64(31_000), CloseReason::TakeProfit, 2);
        assert_eq!(outcome, CloseOutcome::Contended);

        // Still open; nothing realized
        assert!(fx.positions.get(&id).unwrap().is_open());
        assert_eq!(
            fx.accounts.balance(&fx.account_id).unwrap(),
            Decimal::from(5_000)
        );
    }

    #[test]
    fn test_unknown_position() {
        let fx = make_fixture(5_000);
        let outcome = fx.closeout.close_position(
            PositionId::new(),
            Price::from_u64(31_000),
            CloseReason::Manual,
            2,
        );
        assert_eq!(outcome, CloseOutcome::NotFound);
    }

    #[test]
    fn test_close_emits_lifecycle_event() {
        let mut fx = make_fixture(5_000);
        let id = open_position(&fx, 30_000, 10);

        fx.closeout
            .close_position(id, Price::from_u64(31_000), CloseReason::TakeProfit, 2);
        let event = fx.rx.try_recv().unwrap();
        assert_eq!(event.event_type_label(), "order_closed");

        let id2 = open_position(&fx, 30_000, 10);
        fx.closeout
            .close_position(id2, Price::from_u64(20_000), CloseReason::Liquidation, 3);
        let event = fx.rx.try_recv().unwrap();
        assert_eq!(event.event_type_label(), "position_liquidated");
    }

    #[test]
    fn test_manual_close_uses_cached_mark() {
        let fx = make_fixture(5_000);
        let id = open_position(&fx, 30_000, 10);

        let mut marks = StaticMarks::new();
        marks.set(Symbol::canonical("BTCUSDT"), Price::from_u64(30_500), 1);

        let realized = fx.closeout.manual_close(id, &marks, 2).unwrap();
        assert_eq!(realized, Decimal::from(50));
    }

    #[test]
    fn test_manual_close_unpriced_falls_back_to_entry() {
        let fx = make_fixture(5_000);
        let id = open_position(&fx, 30_000, 10);

        let marks = StaticMarks::new();
        let realized = fx.closeout.manual_close(id, &marks, 2).unwrap();
        assert_eq!(realized, Decimal::ZERO);
    }

    #[test]
    fn test_manual_close_errors() {
        let fx = make_fixture(5_000);
        let marks = StaticMarks::new();

        let missing = PositionId::new();
        assert!(matches!(
            fx.closeout.manual_close(missing, &marks, 2),
            Err(CloseError::NotFound { .. })
        ));

        let id = open_position(&fx, 30_000, 10);
        fx.closeout.manual_close(id, &marks, 2).unwrap();
        assert!(matches!(
            fx.closeout.manual_close(id, &marks, 3),
            Err(CloseError::AlreadyClosed { .. })
        ));
    }

    #[test]
    fn test_balance_floored_on_deep_loss() {
        let fx = make_fixture(100);
        let id = open_position(&fx, 30_000, 10);

        // Liquidation at mark 20000: upnl = -1000, capped at posted -300;
        // balance 100 floors at 0 instead of going negative
        let outcome = fx.closeout.close_position(
            id,
            Price::from_u64(20_000),
            CloseReason::Liquidation,
            2,
        );
        assert!(matches!(outcome, CloseOutcome::Closed { .. }));
        assert_eq!(fx.accounts.balance(&fx.account_id).unwrap(), Decimal::ZERO);
    }
}
