//! Upstream message normalization
//!
//! The core is agnostic to the exact wire format: the upstream sends
//! combined-stream envelopes with aggTrade payloads, and field names vary
//! across feeds (`symbol`/`asset`/`s`, `price`/`p`/`last`,
//! `quantity`/`q`/`qty`, string or number values). Everything is coerced
//! here into a strict [`TradeTick`]; anything malformed is dropped and
//! logged, never propagated.

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use types::ids::Symbol;
use types::numeric::{Price, Quantity};
use types::trade::TradeTick;

const SYMBOL_KEYS: [&str; 3] = ["symbol", "asset", "s"];
const PRICE_KEYS: [&str; 3] = ["price", "p", "last"];
const QUANTITY_KEYS: [&str; 3] = ["quantity", "q", "qty"];
const TIMESTAMP_KEYS: [&str; 3] = ["timestamp", "T", "time"];

/// Parse one raw text frame into a normalized tick.
///
/// Returns `None` (after a debug log) for anything that is not a
/// well-formed trade with a finite positive price and quantity.
pub fn parse_frame(text: &str) -> Option<TradeTick> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(err) => {
            debug!(error = %err, "dropping unparseable feed frame");
            return None;
        }
    };

    // Combined-stream envelopes nest the trade under "data"
    let record = value.get("data").unwrap_or(&value);

    let Some(raw_symbol) = first_str(record, &SYMBOL_KEYS) else {
        debug!("dropping feed frame without symbol");
        return None;
    };
    let symbol = Symbol::canonical(raw_symbol);

    let price = first_decimal(record, &PRICE_KEYS).and_then(Price::try_new);
    let quantity = first_decimal(record, &QUANTITY_KEYS).and_then(Quantity::try_new);
    let timestamp_ms = first_i64(record, &TIMESTAMP_KEYS).filter(|ts| *ts > 0);

    match (price, quantity, timestamp_ms) {
        (Some(price), Some(quantity), Some(timestamp_ms)) => {
            Some(TradeTick::new(symbol, price, quantity, timestamp_ms))
        }
        _ => {
            debug!(symbol = %symbol, "dropping malformed trade frame");
            None
        }
    }
}

fn first_str<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| record.get(k).and_then(Value::as_str))
}

fn first_decimal(record: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter()
        .find_map(|k| record.get(k))
        .and_then(coerce_decimal)
}

fn first_i64(record: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| record.get(k)).and_then(coerce_i64)
}

/// Accept both JSON strings and numbers for numeric fields.
fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str_exact(s.trim()).ok(),
        // Route through the display form so binary-float noise does not
        // leak into the decimal representation
        Value::Number(n) => Decimal::from_str_exact(&n.to_string()).ok(),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}
