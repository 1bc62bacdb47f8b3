//! Account query surface

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use risk_engine::snapshot::{self, AccountSnapshot};
use types::position::{Position, PositionStatus};

use crate::error::AppError;
use crate::state::AppState;

/// `GET /api/snapshot`
///
/// Derived state, recomputed from the live store and price cache on every
/// call; nothing here is persisted.
pub async fn get_snapshot(State(state): State<AppState>) -> Result<Json<AccountSnapshot>, AppError> {
    let balance = state
        .accounts
        .balance(&state.account_id)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let open = state.positions.open_positions(&state.account_id);
    let snap = snapshot::compute(balance, &open, state.marks.as_ref());
    Ok(Json(snap))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// open | closed | liquidated; omit for all
    pub status: Option<String>,
}

/// `GET /api/positions?status=`
pub async fn list_positions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Position>>, AppError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(parse_status(raw).ok_or_else(|| {
            AppError::BadRequest(format!("unknown status filter: {}", raw))
        })?),
    };
    Ok(Json(state.positions.list(&state.account_id, status)))
}

fn parse_status(raw: &str) -> Option<PositionStatus> {
    match raw.to_uppercase().as_str() {
        "OPEN" => Some(PositionStatus::Open),
        "CLOSED" => Some(PositionStatus::Closed),
        "LIQUIDATED" => Some(PositionStatus::Liquidated),
        _ => None,
    }
}
