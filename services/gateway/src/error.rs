use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use types::errors::{AdmissionError, CloseError};

/// Central error type for the gateway surface.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Admission(#[from] AdmissionError),

    #[error("{0}")]
    Close(#[from] CloseError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Admission(err) => {
                let status = match err {
                    AdmissionError::InvalidOrder { .. }
                    | AdmissionError::LeverageOutOfRange { .. } => StatusCode::BAD_REQUEST,
                    AdmissionError::PriceUnavailable { .. }
                    | AdmissionError::PriceStale { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    AdmissionError::SlippageExceeded { .. }
                    | AdmissionError::InsufficientMargin { .. } => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                };
                (status, err.code(), err.to_string())
            }
            AppError::Close(err) => {
                let status = match err {
                    CloseError::NotFound { .. } => StatusCode::NOT_FOUND,
                    CloseError::AlreadyClosed { .. } => StatusCode::CONFLICT,
                };
                (status, err.code(), err.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_admission_rejections_map_to_4xx() {
        let err = AppError::Admission(AdmissionError::InsufficientMargin {
            required: Decimal::from(300),
            free: Decimal::from(100),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::Admission(AdmissionError::PriceUnavailable {
            symbol: "BTCUSDT".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_close_errors_map_to_404_and_409() {
        let id = types::ids::PositionId::new();
        let response = AppError::Close(CloseError::NotFound { position_id: id }).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            AppError::Close(CloseError::AlreadyClosed { position_id: id }).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
