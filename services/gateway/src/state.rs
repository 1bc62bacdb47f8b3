use std::sync::Arc;

use tokio::sync::broadcast;

use feed::cache::MarkCache;
use persistence::store::{AccountStore, PositionStore};
use risk_engine::admission::AdmissionControl;
use risk_engine::closeout::Closeout;
use types::events::VenueEvent;
use types::ids::AccountId;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionControl>,
    pub closeout: Closeout,
    pub positions: Arc<PositionStore>,
    pub accounts: Arc<AccountStore>,
    pub marks: Arc<MarkCache>,
    pub events: broadcast::Sender<VenueEvent>,
    /// The demo account served by the API surface
    pub account_id: AccountId,
}

impl AppState {
    /// Current wall-clock in Unix milliseconds.
    pub fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
