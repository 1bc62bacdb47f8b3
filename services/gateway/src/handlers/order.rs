//! Order placement and manual close
//!
//! The external payload is loosely typed: multiple spellings per field,
//! numbers that arrive as strings, sides in any case. Everything is
//! normalized here into a strict [`OrderRequest`] before it touches the
//! risk core; nothing loose crosses that boundary.

use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use risk_engine::admission::OrderRequest;
use types::ids::{AccountId, PositionId, Symbol};
use types::position::{Position, Side};

use crate::error::AppError;
use crate::state::AppState;

const SYMBOL_KEYS: [&str; 2] = ["symbol", "asset"];
const UNITS_KEYS: [&str; 4] = ["units", "size", "qty", "volume"];
const CLIENT_PRICE_KEYS: [&str; 2] = ["price", "clientPrice"];
const TP_KEYS: [&str; 2] = ["tp", "takeProfit"];
const SL_KEYS: [&str; 2] = ["sl", "stopLoss"];

/// `POST /api/orders`
pub async fn place_order(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Position>, AppError> {
    let request = normalize_order(state.account_id, &body)?;
    let position = state.admission.place_order(request, state.now_ms())?;
    Ok(Json(position))
}

/// `POST /api/orders/:id/close`
pub async fn close_position(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let position_id = PositionId::from_uuid(id);
    let realized = state
        .closeout
        .manual_close(position_id, state.marks.as_ref(), state.now_ms())?;
    Ok(Json(json!({
        "position_id": position_id,
        "realized_pnl": realized
    })))
}

/// Collapse the loose external payload into a strict request.
pub fn normalize_order(account_id: AccountId, body: &Value) -> Result<OrderRequest, AppError> {
    let symbol = first_of(body, &SYMBOL_KEYS)
        .and_then(Value::as_str)
        .map(Symbol::canonical)
        .ok_or_else(|| AppError::BadRequest("missing symbol".to_string()))?;

    let side = body
        .get("side")
        .and_then(Value::as_str)
        .and_then(parse_side)
        .ok_or_else(|| AppError::BadRequest("side must be buy or sell".to_string()))?;

    let units = first_of(body, &UNITS_KEYS)
        .and_then(coerce_decimal)
        .ok_or_else(|| AppError::BadRequest("missing or unparseable size".to_string()))?;

    let leverage = body
        .get("leverage")
        .filter(|v| !v.is_null())
        .map(|v| {
            coerce_u32(v)
                .ok_or_else(|| AppError::BadRequest("unparseable leverage".to_string()))
        })
        .transpose()?
        .unwrap_or(1);

    let client_price = optional_decimal(body, &CLIENT_PRICE_KEYS)?;
    let take_profit = optional_decimal(body, &TP_KEYS)?;
    let stop_loss = optional_decimal(body, &SL_KEYS)?;

    Ok(OrderRequest {
        account_id,
        symbol,
        side,
        units,
        leverage,
        client_price,
        take_profit,
        stop_loss,
    })
}

fn parse_side(raw: &str) -> Option<Side> {
    match raw.to_uppercase().as_str() {
        "BUY" | "LONG" => Some(Side::Long),
        "SELL" | "SHORT" => Some(Side::Short),
        _ => None,
    }
}

fn first_of<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| body.get(*k)).filter(|v| !v.is_null())
}

fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str_exact(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str_exact(&n.to_string()).ok(),
        _ => None,
    }
}

fn coerce_u32(value: &Value) -> Option<u32> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        _ => None,
    }
}

/// A present-but-unparseable optional field is a client error, not a
/// silently dropped value.
fn optional_decimal(body: &Value, keys: &[&str]) -> Result<Option<Decimal>, AppError> {
    match first_of(body, keys) {
        None => Ok(None),
        Some(value) => coerce_decimal(value).map(Some).ok_or_else(|| {
            AppError::BadRequest(format!("unparseable value for {}", keys[0]))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountId {
        AccountId::new()
    }

    #[test]
    fn test_normalize_canonical_payload() {
        let body = json!({
            "symbol": "BTCUSDT",
            "side": "buy",
            "units": "0.1",
            "leverage": 10,
            "tp": 31000,
            "sl": "29000"
        });
        let request = normalize_order(account(), &body).unwrap();
        assert_eq!(request.symbol, Symbol::canonical("BTCUSDT"));
        assert_eq!(request.side, Side::Long);
        assert_eq!(request.units, Decimal::from_str_exact("0.1").unwrap());
        assert_eq!(request.leverage, 10);
        assert_eq!(request.take_profit, Some(Decimal::from(31_000)));
        assert_eq!(request.stop_loss, Some(Decimal::from(29_000)));
    }

    #[test]
    fn test_normalize_alias_spellings() {
        // The wild west: asset + volume + SELL + string leverage
        let body = json!({
            "asset": "btc",
            "side": "SELL",
            "volume": 0.5,
            "leverage": "20",
            "takeProfit": "28000"
        });
        let request = normalize_order(account(), &body).unwrap();
        assert_eq!(request.symbol, Symbol::canonical("BTCUSDT"));
        assert_eq!(request.side, Side::Short);
        assert_eq!(request.units, Decimal::from_str_exact("0.5").unwrap());
        assert_eq!(request.leverage, 20);
        assert_eq!(request.take_profit, Some(Decimal::from(28_000)));
    }

    #[test]
    fn test_missing_leverage_defaults_to_one() {
        let body = json!({"symbol": "BTCUSDT", "side": "buy", "size": 1});
        let request = normalize_order(account(), &body).unwrap();
        assert_eq!(request.leverage, 1);
    }

    #[test]
    fn test_missing_symbol_rejected() {
        let body = json!({"side": "buy", "units": 1});
        assert!(normalize_order(account(), &body).is_err());
    }

    #[test]
    fn test_bad_side_rejected() {
        let body = json!({"symbol": "BTCUSDT", "side": "hold", "units": 1});
        assert!(normalize_order(account(), &body).is_err());
    }

    #[test]
    fn test_unparseable_size_rejected() {
        let body = json!({"symbol": "BTCUSDT", "side": "buy", "units": "lots"});
        assert!(normalize_order(account(), &body).is_err());
    }

    #[test]
    fn test_present_but_garbage_tp_rejected() {
        let body = json!({"symbol": "BTCUSDT", "side": "buy", "units": 1, "tp": "soon"});
        assert!(normalize_order(account(), &body).is_err());
    }

    #[test]
    fn test_null_optionals_ignored() {
        let body = json!({"symbol": "BTCUSDT", "side": "buy", "units": 1, "tp": null});
        let request = normalize_order(account(), &body).unwrap();
        assert_eq!(request.take_profit, None);
    }
}
