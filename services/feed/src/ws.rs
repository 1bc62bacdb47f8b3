//! Upstream WebSocket transport
//!
//! [`TradeSource`] abstracts "something that can open a stream of raw text
//! frames" so the adapter's reconnect loop and the tests never care whether
//! frames come from a live exchange socket or a script.

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// One live connection's stream of raw text frames.
#[async_trait]
pub trait TradeStream: Send {
    /// Next text frame; `None` means the stream ended (disconnect).
    async fn next_frame(&mut self) -> Option<Result<String, FeedError>>;
}

/// Factory for trade streams; called again on every reconnect.
#[async_trait]
pub trait TradeSource: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn TradeStream>, FeedError>;
}

/// Live upstream source over tokio-tungstenite.
pub struct WsTradeSource {
    url: String,
}

impl WsTradeSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TradeSource for WsTradeSource {
    async fn connect(&self) -> Result<Box<dyn TradeStream>, FeedError> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        Ok(Box::new(WsTradeStream { socket }))
    }
}

struct WsTradeStream {
    socket: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl TradeStream for WsTradeStream {
    async fn next_frame(&mut self) -> Option<Result<String, FeedError>> {
        loop {
            match self.socket.next().await {
                None => return None,
                Some(Err(e)) => return Some(Err(FeedError::Transport(e.to_string()))),
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Close(_))) => return None,
                // Control and binary frames carry no trades
                Some(Ok(_)) => continue,
            }
        }
    }
}
