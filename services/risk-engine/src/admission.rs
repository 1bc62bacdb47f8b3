//! Pre-trade admission control
//!
//! Validates a proposed order before any Position exists. Checks run in a
//! fixed order and fail fast, each with its own stable error: shape,
//! leverage bounds, price freshness, slippage against the authoritative
//! mark, then free-margin sufficiency via the snapshot engine. On success
//! the position is constructed and persisted in a single store write — no
//! partial state is ever observable.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, trace};

use persistence::store::{AccountStore, PositionStore};
use types::errors::AdmissionError;
use types::events::{VenueEvent, VenueEventPayload};
use types::ids::{AccountId, Symbol};
use types::marks::MarkSource;
use types::numeric::{Price, Quantity};
use types::position::{Position, Side};

use crate::margin;
use crate::snapshot;

/// Admission thresholds.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Reject when the cached mark is older than this
    pub max_price_age_ms: i64,
    /// Allowed deviation between a client-observed price and the mark
    pub slippage_tolerance_bps: u32,
    /// Gross sanity band for client prices; anything outside is malformed
    /// input rather than slippage
    pub sanity_band_bps: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_price_age_ms: 5_000,
            slippage_tolerance_bps: 50,
            sanity_band_bps: 2_000,
        }
    }
}

/// A proposed order, already normalized out of the loose external payload.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    /// Base-asset quantity; must be positive
    pub units: Decimal,
    /// Requested leverage; validated against venue bounds
    pub leverage: u32,
    /// Price the caller observed, if it supplied one
    pub client_price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

/// Order admission service.
pub struct AdmissionControl {
    positions: Arc<PositionStore>,
    accounts: Arc<AccountStore>,
    marks: Arc<dyn MarkSource>,
    events: broadcast::Sender<VenueEvent>,
    config: AdmissionConfig,
}

impl AdmissionControl {
    pub fn new(
        positions: Arc<PositionStore>,
        accounts: Arc<AccountStore>,
        marks: Arc<dyn MarkSource>,
        events: broadcast::Sender<VenueEvent>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            positions,
            accounts,
            marks,
            events,
            config,
        }
    }

    /// Validate and admit one order; the returned position is already
    /// persisted.
    pub fn place_order(
        &self,
        request: OrderRequest,
        now_ms: i64,
    ) -> Result<Position, AdmissionError> {
        // 1. Shape: quantity and optional trigger prices must be positive
        let units = Quantity::try_new(request.units).ok_or_else(|| {
            AdmissionError::InvalidOrder {
                reason: format!("units must be positive, got {}", request.units),
            }
        })?;
        let take_profit = parse_trigger(request.take_profit, "take_profit")?;
        let stop_loss = parse_trigger(request.stop_loss, "stop_loss")?;

        // 2. Leverage bounds: rejected, not clamped
        let leverage = margin::leverage_in_bounds(request.leverage).ok_or(
            AdmissionError::LeverageOutOfRange {
                requested: request.leverage,
                min: margin::LEVERAGE_MIN,
                max: margin::LEVERAGE_MAX,
            },
        )?;

        // 3. Authoritative mark must exist and be fresh
        let point = self.marks.mark(&request.symbol).ok_or_else(|| {
            AdmissionError::PriceUnavailable {
                symbol: request.symbol.to_string(),
            }
        })?;
        if point.is_stale(now_ms, self.config.max_price_age_ms) {
            return Err(AdmissionError::PriceStale {
                symbol: request.symbol.to_string(),
                age_ms: point.age_ms(now_ms),
            });
        }
        let mark = point.price;

        // 4. Client-observed price: sanity band, then slippage tolerance.
        // Within tolerance the client's price is the entry — it is the
        // fresher observation; outside, reject.
        let entry_price = match request.client_price {
            None => mark,
            Some(client) => {
                let client_price =
                    Price::try_new(client).ok_or_else(|| AdmissionError::InvalidOrder {
                        reason: format!("client price must be positive, got {}", client),
                    })?;
                let deviation = deviation_bps(client, mark.as_decimal());
                if deviation > Decimal::from(self.config.sanity_band_bps) {
                    return Err(AdmissionError::InvalidOrder {
                        reason: format!(
                            "client price {} outside sanity band of mark {}",
                            client, mark
                        ),
                    });
                }
                if deviation > Decimal::from(self.config.slippage_tolerance_bps) {
                    return Err(AdmissionError::SlippageExceeded {
                        client,
                        mark: mark.as_decimal(),
                        tolerance_bps: self.config.slippage_tolerance_bps,
                    });
                }
                client_price
            }
        };

        // 5. Margin sufficiency from the live snapshot; exact equality is
        // accepted
        let required_margin =
            margin::order_margin(units.as_decimal(), entry_price.as_decimal(), leverage);
        let balance = self
            .accounts
            .balance(&request.account_id)
            .map_err(|_| AdmissionError::InvalidOrder {
                reason: "unknown account".to_string(),
            })?;
        let open = self.positions.open_positions(&request.account_id);
        let snap = snapshot::compute(balance, &open, self.marks.as_ref());
        if required_margin > snap.free_margin {
            return Err(AdmissionError::InsufficientMargin {
                required: required_margin,
                free: snap.free_margin,
            });
        }

        // Construct and persist atomically: one insert, no partial state
        let position = Position::open(
            request.account_id,
            request.symbol,
            request.side,
            units,
            entry_price,
            leverage,
            take_profit,
            stop_loss,
            now_ms,
        );
        self.positions.insert(position.clone());

        info!(
            position_id = %position.id,
            symbol = %position.symbol,
            side = ?position.side,
            leverage,
            %required_margin,
            "order admitted"
        );

        let event = VenueEvent::new(
            now_ms,
            VenueEventPayload::OrderPlaced {
                position: position.clone(),
            },
        );
        if self.events.send(event).is_err() {
            trace!("order_placed broadcast dropped (no subscribers)");
        }

        Ok(position)
    }
}

fn parse_trigger(
    value: Option<Decimal>,
    field: &str,
) -> Result<Option<Price>, AdmissionError> {
    match value {
        None => Ok(None),
        Some(v) => Price::try_new(v)
            .map(Some)
            .ok_or_else(|| AdmissionError::InvalidOrder {
                reason: format!("{} must be positive, got {}", field, v),
            }),
    }
}

/// Absolute deviation between two prices in basis points of the mark.
fn deviation_bps(client: Decimal, mark: Decimal) -> Decimal {
    ((client - mark).abs() * Decimal::from(10_000)) / mark
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::account::Account;
    use types::marks::StaticMarks;

    struct Fixture {
        admission: AdmissionControl,
        positions: Arc<PositionStore>,
        account_id: AccountId,
        rx: broadcast::Receiver<VenueEvent>,
    }

    const NOW_MS: i64 = 10_000;

    fn make_fixture(balance: u64, marks: StaticMarks) -> Fixture {
        let positions = Arc::new(PositionStore::new());
        let accounts = Arc::new(AccountStore::new());
        let (tx, rx) = broadcast::channel(64);
        let account_id = accounts.insert(Account::new(Decimal::from(balance), 1));
        let marks: Arc<dyn MarkSource> = Arc::new(marks);

        Fixture {
            admission: AdmissionControl::new(
                Arc::clone(&positions),
                accounts,
                marks,
                tx,
                AdmissionConfig::default(),
            ),
            positions,
            account_id,
            rx,
        }
    }

    fn fresh_marks(price: u64) -> StaticMarks {
        let mut marks = StaticMarks::new();
        marks.set(
            Symbol::canonical("BTCUSDT"),
            Price::from_u64(price),
            NOW_MS - 100,
        );
        marks
    }

    fn base_request(fx: &Fixture) -> OrderRequest {
        OrderRequest {
            account_id: fx.account_id,
            symbol: Symbol::canonical("BTCUSDT"),
            side: Side::Long,
            units: Decimal::from_str_exact("0.1").unwrap(),
            leverage: 10,
            client_price: None,
            take_profit: None,
            stop_loss: None,
        }
    }

    #[test]
    fn test_admit_and_persist() {
        let mut fx = make_fixture(5_000, fresh_marks(30_000));
        let position = fx.admission.place_order(base_request(&fx), NOW_MS).unwrap();

        assert_eq!(position.entry_price, Price::from_u64(30_000));
        assert_eq!(position.posted_margin, Decimal::from(300));
        assert_eq!(fx.positions.get(&position.id), Some(position));

        let event = fx.rx.try_recv().unwrap();
        assert_eq!(event.event_type_label(), "order_placed");
    }

    #[test]
    fn test_reject_non_positive_units() {
        let fx = make_fixture(5_000, fresh_marks(30_000));
        let mut request = base_request(&fx);
        request.units = Decimal::ZERO;

        let err = fx.admission.place_order(request, NOW_MS).unwrap_err();
        assert_eq!(err.code(), "INVALID_ORDER");
        assert!(fx.positions.is_empty());
    }

    #[test]
    fn test_reject_leverage_out_of_range() {
        let fx = make_fixture(5_000, fresh_marks(30_000));

        let mut request = base_request(&fx);
        request.leverage = 0;
        let err = fx.admission.place_order(request, NOW_MS).unwrap_err();
        assert_eq!(err.code(), "LEVERAGE_OUT_OF_RANGE");

        let mut request = base_request(&fx);
        request.leverage = 101;
        let err = fx.admission.place_order(request, NOW_MS).unwrap_err();
        assert_eq!(err.code(), "LEVERAGE_OUT_OF_RANGE");
    }

    #[test]
    fn test_reject_price_unavailable() {
        let fx = make_fixture(5_000, StaticMarks::new());
        let err = fx
            .admission
            .place_order(base_request(&fx), NOW_MS)
            .unwrap_err();
        assert_eq!(err.code(), "PRICE_UNAVAILABLE");
    }

    #[test]
    fn test_reject_stale_price() {
        let mut marks = StaticMarks::new();
        marks.set(Symbol::canonical("BTCUSDT"), Price::from_u64(30_000), 100);
        let fx = make_fixture(5_000, marks);

        // Default staleness threshold is 5s; this mark is ~10s old
        let err = fx
            .admission
            .place_order(base_request(&fx), NOW_MS)
            .unwrap_err();
        assert_eq!(err.code(), "PRICE_STALE");
    }

    #[test]
    fn test_client_price_within_tolerance_becomes_entry() {
        let fx = make_fixture(5_000, fresh_marks(30_000));
        let mut request = base_request(&fx);
        // 30010 is ~3.3bps from the mark, inside the 50bps tolerance
        request.client_price = Some(Decimal::from(30_010));

        let position = fx.admission.place_order(request, NOW_MS).unwrap();
        assert_eq!(position.entry_price, Price::from_u64(30_010));
    }

    #[test]
    fn test_reject_slippage_exceeded() {
        let fx = make_fixture(5_000, fresh_marks(30_000));
        let mut request = base_request(&fx);
        // 30200 is ~66bps away: beyond tolerance, inside the sanity band
        request.client_price = Some(Decimal::from(30_200));

        let err = fx.admission.place_order(request, NOW_MS).unwrap_err();
        assert_eq!(err.code(), "SLIPPAGE_EXCEEDED");
    }

    #[test]
    fn test_reject_client_price_outside_sanity_band() {
        let fx = make_fixture(5_000, fresh_marks(30_000));
        let mut request = base_request(&fx);
        // 45000 is 50% away from the mark: malformed input, not slippage
        request.client_price = Some(Decimal::from(45_000));

        let err = fx.admission.place_order(request, NOW_MS).unwrap_err();
        assert_eq!(err.code(), "INVALID_ORDER");
    }

    #[test]
    fn test_margin_boundary_exact_equality_accepted() {
        // balance 300, flat account: free margin = 300;
        // required = 0.1 × 30000 / 10 = 300 exactly
        let fx = make_fixture(300, fresh_marks(30_000));
        let position = fx.admission.place_order(base_request(&fx), NOW_MS).unwrap();
        assert_eq!(position.posted_margin, Decimal::from(300));
    }

    #[test]
    fn test_margin_boundary_one_unit_over_rejected() {
        // free margin 299.99 < required 300
        let mut marks = StaticMarks::new();
        marks.set(
            Symbol::canonical("BTCUSDT"),
            Price::from_u64(30_000),
            NOW_MS - 100,
        );
        let positions = Arc::new(PositionStore::new());
        let accounts = Arc::new(AccountStore::new());
        let (tx, _rx) = broadcast::channel(64);
        let account_id = accounts.insert(Account::new(
            Decimal::from_str_exact("299.99").unwrap(),
            1,
        ));
        let marks: Arc<dyn MarkSource> = Arc::new(marks);
        let admission = AdmissionControl::new(
            Arc::clone(&positions),
            accounts,
            marks,
            tx,
            AdmissionConfig::default(),
        );

        let request = OrderRequest {
            account_id,
            symbol: Symbol::canonical("BTCUSDT"),
            side: Side::Long,
            units: Decimal::from_str_exact("0.1").unwrap(),
            leverage: 10,
            client_price: None,
            take_profit: None,
            stop_loss: None,
        };
        let err = admission.place_order(request, NOW_MS).unwrap_err();
        match err {
            AdmissionError::InsufficientMargin { required, free } => {
                assert_eq!(required, Decimal::from(300));
                assert_eq!(free, Decimal::from_str_exact("299.99").unwrap());
            }
            other => panic!("expected InsufficientMargin, got {:?}", other),
        }
        assert!(positions.is_empty());
    }

    #[test]
    fn test_existing_positions_consume_free_margin() {
        let mut fx = make_fixture(650, fresh_marks(30_000));

        // First order posts 300 of margin
        fx.admission.place_order(base_request(&fx), NOW_MS).unwrap();
        let _ = fx.rx.try_recv();

        // Free margin is now 650 - 300 = 350; a second identical order
        // (required 300) still fits
        fx.admission.place_order(base_request(&fx), NOW_MS).unwrap();

        // But a third does not
        let err = fx
            .admission
            .place_order(base_request(&fx), NOW_MS)
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_MARGIN");
    }

    #[test]
    fn test_reject_negative_trigger_prices() {
        let fx = make_fixture(5_000, fresh_marks(30_000));
        let mut request = base_request(&fx);
        request.take_profit = Some(Decimal::from(-1));

        let err = fx.admission.place_order(request, NOW_MS).unwrap_err();
        assert_eq!(err.code(), "INVALID_ORDER");
    }

    #[test]
    fn test_unknown_account_rejected() {
        let fx = make_fixture(5_000, fresh_marks(30_000));
        let mut request = base_request(&fx);
        request.account_id = AccountId::new();

        let err = fx.admission.place_order(request, NOW_MS).unwrap_err();
        assert_eq!(err.code(), "INVALID_ORDER");
    }
}
