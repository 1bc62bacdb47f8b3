//! Error taxonomy for the risk core
//!
//! Admission rejections are deterministic and carry a stable string code
//! for the API surface; concurrency races (lock contention, already
//! terminal) are modeled as outcomes, not errors, by their call sites.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ids::PositionId;

/// Pre-trade admission rejection.
///
/// Returned synchronously to the caller, never retried automatically.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdmissionError {
    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error("leverage {requested} outside allowed range {min}..={max}")]
    LeverageOutOfRange { requested: u32, min: u8, max: u8 },

    #[error("no price available for {symbol}")]
    PriceUnavailable { symbol: String },

    #[error("price for {symbol} is stale ({age_ms}ms old)")]
    PriceStale { symbol: String, age_ms: i64 },

    #[error("client price {client} deviates from mark {mark} beyond {tolerance_bps}bps")]
    SlippageExceeded {
        client: Decimal,
        mark: Decimal,
        tolerance_bps: u32,
    },

    #[error("insufficient margin: required {required}, free {free}")]
    InsufficientMargin { required: Decimal, free: Decimal },
}

impl AdmissionError {
    /// Stable error code for the API surface.
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::InvalidOrder { .. } => "INVALID_ORDER",
            AdmissionError::LeverageOutOfRange { .. } => "LEVERAGE_OUT_OF_RANGE",
            AdmissionError::PriceUnavailable { .. } => "PRICE_UNAVAILABLE",
            AdmissionError::PriceStale { .. } => "PRICE_STALE",
            AdmissionError::SlippageExceeded { .. } => "SLIPPAGE_EXCEEDED",
            AdmissionError::InsufficientMargin { .. } => "INSUFFICIENT_MARGIN",
        }
    }
}

/// Failure to close a position on request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CloseError {
    #[error("position not found: {position_id}")]
    NotFound { position_id: PositionId },

    #[error("position already in terminal state: {position_id}")]
    AlreadyClosed { position_id: PositionId },
}

impl CloseError {
    /// Stable error code for the API surface.
    pub fn code(&self) -> &'static str {
        match self {
            CloseError::NotFound { .. } => "NOT_FOUND",
            CloseError::AlreadyClosed { .. } => "ALREADY_CLOSED",
        }
    }
}

/// Shared store lookup failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("account not found")]
    AccountNotFound,

    #[error("position not found: {position_id}")]
    PositionNotFound { position_id: PositionId },
}
