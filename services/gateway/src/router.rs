use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{account, order, ws};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/orders", post(order::place_order))
        .route("/api/orders/:id/close", post(order::close_position))
        .route("/api/snapshot", get(account::get_snapshot))
        .route("/api/positions", get(account::list_positions))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
