//! Venue event taxonomy for broadcast fan-out
//!
//! Every tick and order-lifecycle transition is published as a
//! [`VenueEvent`]. Delivery is fire-and-forget, at-most-once per
//! subscriber; subscribers must tolerate gaps and re-fetch snapshots on
//! reconnect.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::Symbol;
use crate::numeric::{Price, Quantity};
use crate::position::Position;

/// One broadcast event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueEvent {
    /// Unique event identifier (UUID v7)
    pub event_id: Uuid,
    /// Unix milliseconds
    pub timestamp_ms: i64,
    /// Event-specific payload
    pub payload: VenueEventPayload,
}

/// Event-specific payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum VenueEventPayload {
    /// A normalized trade tick was accepted from the upstream feed
    Tick {
        symbol: Symbol,
        price: Price,
        quantity: Quantity,
    },

    /// Admission control created a new position
    OrderPlaced { position: Position },

    /// A position left OPEN via SL/TP trigger or manual close
    ///
    /// `position.close_reason` carries the trigger that fired.
    OrderClosed { position: Position },

    /// The enforcer force-closed a position
    PositionLiquidated { position: Position },
}

impl VenueEvent {
    pub fn new(timestamp_ms: i64, payload: VenueEventPayload) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            timestamp_ms,
            payload,
        }
    }

    /// Get the event type as a string label for logging.
    pub fn event_type_label(&self) -> &'static str {
        match &self.payload {
            VenueEventPayload::Tick { .. } => "tick",
            VenueEventPayload::OrderPlaced { .. } => "order_placed",
            VenueEventPayload::OrderClosed { .. } => "order_closed",
            VenueEventPayload::PositionLiquidated { .. } => "position_liquidated",
        }
    }
}
