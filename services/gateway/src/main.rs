mod config;
mod error;
mod handlers;
mod router;
mod state;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};

use feed::adapter::{self, TickPipeline};
use feed::cache::MarkCache;
use feed::ws::WsTradeSource;
use persistence::journal::TickJournal;
use persistence::locks::PositionLockTable;
use persistence::store::{AccountStore, PositionStore};
use risk_engine::admission::AdmissionControl;
use risk_engine::closeout::Closeout;
use risk_engine::enforcer::LiquidationEnforcer;
use risk_engine::watcher::ConditionalOrderWatcher;
use types::account::Account;
use types::marks::MarkSource;
use types::numeric::PriceScale;

use config::GatewayConfig;
use router::create_router;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env();
    tracing::info!(?config.bind_addr, feed_url = %config.feed.url, "starting venue");

    // Shared state
    let marks = Arc::new(MarkCache::new());
    let positions = Arc::new(PositionStore::new());
    let accounts = Arc::new(AccountStore::new());
    let locks = Arc::new(PositionLockTable::with_default_ttl());
    let (events_tx, _) = broadcast::channel(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let now_ms = chrono::Utc::now().timestamp_millis();
    let account_id = accounts.insert(Account::new(config.starting_balance, now_ms));
    tracing::info!(%account_id, balance = %config.starting_balance, "demo account ready");

    // Durable tick journal
    if let Some(parent) = config.journal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let journal = TickJournal::open(&config.journal_path)?;

    // Feed: ingest pipeline + connection loop + flusher
    let pipeline = Arc::new(TickPipeline::new(
        Arc::clone(&marks),
        journal,
        events_tx.clone(),
        config.feed.batch_size,
    ));
    let source = Arc::new(WsTradeSource::new(config.feed.url.clone()));
    tokio::spawn(adapter::run_adapter(
        source,
        Arc::clone(&pipeline),
        config.feed.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(adapter::run_flusher(
        Arc::clone(&pipeline),
        config.feed.clone(),
        shutdown_rx.clone(),
    ));

    // Risk actors share one closeout protocol
    let mark_source: Arc<dyn MarkSource> = Arc::clone(&marks) as Arc<dyn MarkSource>;
    let closeout = Closeout::new(
        Arc::clone(&positions),
        Arc::clone(&accounts),
        Arc::clone(&locks),
        events_tx.clone(),
    );

    let enforcer = LiquidationEnforcer::new(
        Arc::clone(&positions),
        Arc::clone(&accounts),
        Arc::clone(&mark_source),
        closeout.clone(),
        config.enforcer.clone(),
    );
    tokio::spawn(enforcer.run(shutdown_rx.clone()));

    let watcher = ConditionalOrderWatcher::new(
        Arc::clone(&positions),
        closeout.clone(),
        PriceScale::with_defaults(),
    );
    tokio::spawn(watcher.run(events_tx.subscribe(), shutdown_rx.clone()));

    let admission = Arc::new(AdmissionControl::new(
        Arc::clone(&positions),
        Arc::clone(&accounts),
        mark_source,
        events_tx.clone(),
        config.admission.clone(),
    ));

    // HTTP/WS surface
    let app_state = AppState {
        admission,
        closeout,
        positions,
        accounts,
        marks,
        events: events_tx,
        account_id,
    };
    let app = create_router(app_state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Stop actors; the flusher drains the pending batch on its way out
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    Ok(())
}
