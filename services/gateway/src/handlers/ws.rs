//! Broadcast gateway
//!
//! Relays every venue event to each connected WebSocket client as JSON.
//! Delivery is fire-and-forget, at-most-once per connection: a slow client
//! that lags the broadcast channel skips ahead and is expected to re-fetch
//! the snapshot; a failed send drops the connection.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::state::AppState;

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| relay(socket, state))
}

async fn relay(mut socket: WebSocket, state: AppState) {
    let mut events = state.events.subscribe();
    debug!("broadcast subscriber connected");

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Gaps are the contract; the client refetches state
                    warn!(skipped, "ws subscriber lagged; continuing at live edge");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                // Pings are answered by axum; client text is ignored
                Some(Ok(_)) => {}
            }
        }
    }

    debug!("broadcast subscriber disconnected");
}
