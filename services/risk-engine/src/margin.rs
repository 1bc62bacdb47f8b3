//! Margin calculation functions
//!
//! Deterministic margin computations on fixed-point decimals. Margin
//! requirements round UP and free margin rounds DOWN so rounding always
//! favors the venue's safety.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Leverage bounds enforced at admission.
pub const LEVERAGE_MIN: u8 = 1;
pub const LEVERAGE_MAX: u8 = 100;

/// Validate requested leverage against the venue bounds.
///
/// Out-of-range requests are rejected, not clamped.
pub fn leverage_in_bounds(requested: u32) -> Option<u8> {
    if (LEVERAGE_MIN as u32..=LEVERAGE_MAX as u32).contains(&requested) {
        Some(requested as u8)
    } else {
        None
    }
}

/// Margin required to open an order: `(units × price) / leverage`.
///
/// Rounds UP to favor safety.
pub fn order_margin(units: Decimal, price: Decimal, leverage: u8) -> Decimal {
    assert!(leverage >= 1, "Leverage must be >= 1");
    let notional = units * price;
    round_up(notional / Decimal::from(leverage))
}

/// Maintenance margin rate, tiered by leverage.
///
/// | Leverage | MM rate |
/// |----------|---------|
/// | >= 100   | 1.00%   |
/// | >= 20    | 0.90%   |
/// | >= 10    | 0.70%   |
/// | < 10     | 0.50%   |
///
/// Higher leverage carries a higher maintenance rate; applied to notional
/// at the current mark.
pub fn maintenance_rate(leverage: u8) -> Decimal {
    if leverage >= 100 {
        Decimal::from_str_exact("0.01").unwrap()
    } else if leverage >= 20 {
        Decimal::from_str_exact("0.009").unwrap()
    } else if leverage >= 10 {
        Decimal::from_str_exact("0.007").unwrap()
    } else {
        Decimal::from_str_exact("0.005").unwrap()
    }
}

/// Maintenance requirement contribution for one position:
/// `notional(mark) × maintenance_rate(leverage)`. Rounds UP.
pub fn maintenance_margin(notional: Decimal, leverage: u8) -> Decimal {
    round_up(notional * maintenance_rate(leverage))
}

/// Margin level: `equity / used_margin`, or `None` when nothing is used
/// (the "infinite" health of a flat account — never a divide-by-zero).
pub fn margin_level(equity: Decimal, used_margin: Decimal) -> Option<Decimal> {
    if used_margin > Decimal::ZERO {
        Some(equity / used_margin)
    } else {
        None
    }
}

// ── Rounding helpers (deterministic) ─────────────────────────────────────

/// Round UP to 18 decimal places (favor safety for margins).
pub(crate) fn round_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(18, RoundingStrategy::MidpointAwayFromZero)
}

/// Round DOWN to 18 decimal places (conservative for free margin).
pub(crate) fn round_down(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(18, RoundingStrategy::ToZero)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leverage_bounds() {
        assert_eq!(leverage_in_bounds(1), Some(1));
        assert_eq!(leverage_in_bounds(100), Some(100));
        assert_eq!(leverage_in_bounds(0), None);
        assert_eq!(leverage_in_bounds(101), None);
        assert_eq!(leverage_in_bounds(1_000_000), None);
    }

    #[test]
    fn test_order_margin_10x() {
        // 0.1 BTC @ $30,000, 10x leverage → $300
        let om = order_margin(
            Decimal::from_str_exact("0.1").unwrap(),
            Decimal::from(30_000),
            10,
        );
        assert_eq!(om, Decimal::from(300));
    }

    #[test]
    fn test_order_margin_1x() {
        let om = order_margin(Decimal::from(1), Decimal::from(30_000), 1);
        assert_eq!(om, Decimal::from(30_000));
    }

    #[test]
    fn test_maintenance_rate_tiers() {
        assert_eq!(maintenance_rate(100), Decimal::from_str_exact("0.01").unwrap());
        assert_eq!(maintenance_rate(20), Decimal::from_str_exact("0.009").unwrap());
        assert_eq!(maintenance_rate(10), Decimal::from_str_exact("0.007").unwrap());
        assert_eq!(maintenance_rate(5), Decimal::from_str_exact("0.005").unwrap());
        assert_eq!(maintenance_rate(1), Decimal::from_str_exact("0.005").unwrap());
    }

    #[test]
    fn test_higher_leverage_higher_rate() {
        let levels = [1u8, 5, 10, 20, 50, 100];
        for pair in levels.windows(2) {
            assert!(
                maintenance_rate(pair[0]) <= maintenance_rate(pair[1]),
                "rate must not decrease with leverage: {} vs {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_maintenance_margin() {
        // $3,000 notional at 10x → 0.7% → $21
        let mm = maintenance_margin(Decimal::from(3_000), 10);
        assert_eq!(mm, Decimal::from(21));
    }

    #[test]
    fn test_maintenance_below_posted() {
        // Posted margin at 10x is 10%; maintenance at 0.7% is well below
        let notional = Decimal::from(3_000);
        let posted = notional / Decimal::from(10);
        let mm = maintenance_margin(notional, 10);
        assert!(mm < posted);
    }

    #[test]
    fn test_margin_level() {
        let level = margin_level(Decimal::from(6_000), Decimal::from(3_000));
        assert_eq!(level, Some(Decimal::from(2)));
    }

    #[test]
    fn test_margin_level_no_usage() {
        assert_eq!(margin_level(Decimal::from(5_000), Decimal::ZERO), None);
    }

    #[test]
    fn test_deterministic_order_margin() {
        let units = Decimal::from_str_exact("1.23456789").unwrap();
        let price = Decimal::from_str_exact("30123.456").unwrap();
        assert_eq!(order_margin(units, price, 7), order_margin(units, price, 7));
    }
}
