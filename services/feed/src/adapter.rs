//! Feed adapter actor
//!
//! Owns the per-tick pipeline (normalize → cache → batch → broadcast) and
//! the two long-running loops around it: the connection loop with capped
//! exponential backoff, and the interval flusher that retries failed
//! journal batches indefinitely. Reconnects resume without gap-filling;
//! this is a paper-trading feed, not a regulated tape.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};

use persistence::journal::{JournalError, TickJournal};
use types::events::{VenueEvent, VenueEventPayload};
use types::trade::TradeTick;

use crate::batch::{TickBatcher, DEFAULT_BATCH_SIZE};
use crate::cache::MarkCache;
use crate::normalize::parse_frame;
use crate::ws::TradeSource;

/// Feed adapter tuning.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Upstream combined-stream URL
    pub url: String,
    /// Journal batch size threshold
    pub batch_size: usize,
    /// Wall-clock flush interval for partial batches
    pub flush_interval: Duration,
    /// First reconnect delay; doubles per attempt
    pub reconnect_base: Duration,
    /// Reconnect delay cap
    pub reconnect_cap: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://fstream.binance.com/stream?streams=btcusdt@aggTrade/ethusdt@aggTrade/solusdt@aggTrade".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_secs(1),
            reconnect_base: Duration::from_secs(1),
            reconnect_cap: Duration::from_secs(10),
        }
    }
}

/// Delay before reconnect attempt `attempt` (1-based): base × 2^min(attempt, 5),
/// capped.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exp = attempt.min(5);
    base.saturating_mul(2u32.saturating_pow(exp)).min(cap)
}

/// The per-tick pipeline shared by the pump and the flusher.
pub struct TickPipeline {
    cache: std::sync::Arc<MarkCache>,
    batcher: Mutex<TickBatcher>,
    journal: Mutex<TickJournal>,
    events: broadcast::Sender<VenueEvent>,
}

impl TickPipeline {
    pub fn new(
        cache: std::sync::Arc<MarkCache>,
        journal: TickJournal,
        events: broadcast::Sender<VenueEvent>,
        batch_size: usize,
    ) -> Self {
        Self {
            cache,
            batcher: Mutex::new(TickBatcher::new(batch_size)),
            journal: Mutex::new(journal),
            events,
        }
    }

    /// Ingest one raw frame. Returns true if it produced a tick.
    ///
    /// Side effects are ordered: the cache write happens before the
    /// broadcast publish, so an event consumer always observes a cache at
    /// least as fresh as the event it is reacting to.
    pub fn ingest_frame(&self, text: &str) -> bool {
        let Some(tick) = parse_frame(text) else {
            return false;
        };
        self.ingest_tick(tick);
        true
    }

    /// Ingest an already-normalized tick.
    pub fn ingest_tick(&self, tick: TradeTick) {
        self.cache
            .record(tick.symbol.clone(), tick.price, tick.timestamp_ms);

        let full_batch = {
            let mut batcher = self.batcher.lock().unwrap();
            batcher.push(tick.clone())
        };
        if let Some(batch) = full_batch {
            if let Err(err) = self.write_batch(batch) {
                warn!(error = %err, "tick batch write failed; requeued for retry");
            }
        }

        let event = VenueEvent::new(
            tick.timestamp_ms,
            VenueEventPayload::Tick {
                symbol: tick.symbol,
                price: tick.price,
                quantity: tick.quantity,
            },
        );
        // Best-effort: no subscribers is fine, the cache and journal are
        // the authoritative products
        if self.events.send(event).is_err() {
            trace!("tick broadcast dropped (no subscribers)");
        }
    }

    /// Flush whatever is pending. On failure the batch is requeued and the
    /// error returned so the flusher can back off.
    pub fn flush(&self) -> Result<usize, JournalError> {
        let batch = {
            let mut batcher = self.batcher.lock().unwrap();
            batcher.drain()
        };
        if batch.is_empty() {
            return Ok(0);
        }
        let count = batch.len();
        self.write_batch(batch)?;
        Ok(count)
    }

    /// Ticks buffered and awaiting a durable write.
    pub fn pending(&self) -> usize {
        self.batcher.lock().unwrap().len()
    }

    fn write_batch(&self, batch: Vec<TradeTick>) -> Result<(), JournalError> {
        let result = {
            let mut journal = self.journal.lock().unwrap();
            journal.append_batch(&batch)
        };
        if let Err(err) = result {
            let mut batcher = self.batcher.lock().unwrap();
            batcher.requeue(batch);
            return Err(err);
        }
        Ok(())
    }
}

/// Connection loop: connect, pump frames, reconnect with capped backoff.
pub async fn run_adapter(
    source: std::sync::Arc<dyn TradeSource>,
    pipeline: std::sync::Arc<TickPipeline>,
    config: FeedConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        match source.connect().await {
            Ok(mut stream) => {
                attempt = 0;
                info!(url = %config.url, "feed connected");

                loop {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        frame = stream.next_frame() => match frame {
                            Some(Ok(text)) => {
                                pipeline.ingest_frame(&text);
                            }
                            Some(Err(err)) => {
                                warn!(error = %err, "feed transport error");
                                break;
                            }
                            None => {
                                warn!("feed stream closed by upstream");
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, attempt, "feed connect failed");
            }
        }

        attempt += 1;
        let delay = backoff_delay(attempt, config.reconnect_base, config.reconnect_cap);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "feed reconnect backoff");
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Interval flusher: bounds durable staleness under light flow and retries
/// failed batches with backoff, indefinitely.
pub async fn run_flusher(
    pipeline: std::sync::Arc<TickPipeline>,
    config: FeedConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                match pipeline.flush() {
                    Ok(_) => failures = 0,
                    Err(err) => {
                        failures += 1;
                        let delay = backoff_delay(
                            failures,
                            config.reconnect_base,
                            config.reconnect_cap,
                        );
                        warn!(
                            error = %err,
                            failures,
                            delay_ms = delay.as_millis() as u64,
                            "journal flush failed; backing off"
                        );
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    // Final flush on shutdown; the batch survives in memory if it fails
    if let Err(err) = pipeline.flush() {
        warn!(error = %err, pending = pipeline.pending(), "shutdown flush failed");
    }
}
