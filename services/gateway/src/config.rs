//! Environment-driven configuration
//!
//! Parsed once at startup; services receive typed config structs and never
//! read the environment themselves. Every knob has a default suitable for
//! the demo deployment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::warn;

use feed::adapter::FeedConfig;
use risk_engine::admission::AdmissionConfig;
use risk_engine::enforcer::EnforcerConfig;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP/WS bind address
    pub bind_addr: SocketAddr,
    /// Tick journal location
    pub journal_path: PathBuf,
    /// Demo account starting balance
    pub starting_balance: Decimal,
    pub feed: FeedConfig,
    pub admission: AdmissionConfig,
    pub enforcer: EnforcerConfig,
}

impl GatewayConfig {
    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let bind_addr = env_parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8081)));
        let journal_path = env_parsed("JOURNAL_PATH", PathBuf::from("data/ticks.journal"));
        let starting_balance = env_parsed("STARTING_BALANCE", Decimal::from(5_000));

        let mut feed = FeedConfig::default();
        if let Ok(url) = std::env::var("FEED_URL") {
            feed.url = url;
        }
        feed.batch_size = env_parsed("FEED_BATCH_SIZE", feed.batch_size);
        feed.flush_interval =
            Duration::from_millis(env_parsed("FEED_FLUSH_INTERVAL_MS", 1_000u64));

        let admission = AdmissionConfig {
            max_price_age_ms: env_parsed("PRICE_STALENESS_MS", 5_000i64),
            slippage_tolerance_bps: env_parsed("SLIPPAGE_TOLERANCE_BPS", 50u32),
            sanity_band_bps: env_parsed("PRICE_SANITY_BAND_BPS", 2_000u32),
        };

        let enforcer = EnforcerConfig {
            scan_interval: Duration::from_millis(env_parsed("SCAN_INTERVAL_MS", 1_000u64)),
        };

        Self {
            bind_addr,
            journal_path,
            starting_balance,
            feed,
            admission,
            enforcer,
        }
    }
}

/// Parse an env var, warning (and defaulting) on malformed values.
fn env_parsed<T: std::str::FromStr + Clone>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Err(_) => default,
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, raw = %raw, "unparseable env var; using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = GatewayConfig::from_env();
        assert_eq!(config.starting_balance, Decimal::from(5_000));
        assert_eq!(config.admission.max_price_age_ms, 5_000);
        assert_eq!(config.enforcer.scan_interval, Duration::from_secs(1));
    }
}
