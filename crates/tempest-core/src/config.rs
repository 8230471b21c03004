// ── Runtime station configuration ──
//
// These types describe *which* station to ingest and how to tune the
// reconnect and fallback behaviour. They carry the access token but never
// touch disk: the CLI constructs a `StationConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use tempest_api::rest::DEFAULT_REST_URL;
use tempest_api::websocket::DEFAULT_PUSH_URL;

use crate::error::CoreError;
use crate::model::StationId;

/// Reconnect backoff tuning for the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first reconnection attempt. Default: 5s.
    pub initial_delay: Duration,
    /// Multiplier applied per consecutive failure. Must be > 1. Default: 2.0.
    pub growth: f64,
    /// Upper bound on the computed delay. Default: 300s.
    pub max_delay: Duration,
    /// Minimum delay after a rate-limited failure. Default: 60s.
    pub rate_limit_floor: Duration,
    /// Jitter is drawn uniformly from `[0, jitter_ratio × delay]`. Default: 0.3.
    pub jitter_ratio: f64,
    /// Consecutive failures after which automatic reconnection stops. Default: 10.
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            growth: 2.0,
            max_delay: Duration::from_secs(300),
            rate_limit_floor: Duration::from_secs(60),
            jitter_ratio: 0.3,
            max_retries: 10,
        }
    }
}

/// Fallback cadence of the freshness arbiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessConfig {
    /// Delay before the first check after startup. Default: 15s.
    pub initial_check: Duration,
    /// Period between checks. Default: 10 min.
    pub check_interval: Duration,
    /// Maximum age of the last push observation. Default: 5 min.
    pub staleness_window: Duration,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            initial_check: Duration::from_secs(15),
            check_interval: Duration::from_secs(10 * 60),
            staleness_window: Duration::from_secs(5 * 60),
        }
    }
}

/// Configuration for ingesting a single station.
///
/// Built by the CLI (or any embedding application) -- core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct StationConfig {
    pub station: StationId,
    /// Personal access token presented to both APIs.
    pub token: SecretString,
    /// REST base URL.
    pub rest_url: Url,
    /// WebSocket push endpoint (without the token).
    pub push_url: Url,
    /// HTTP request and WebSocket handshake timeout.
    pub timeout: Duration,
    pub backoff: BackoffConfig,
    pub freshness: FreshnessConfig,
}

impl StationConfig {
    /// Config for `station` against the public Tempest endpoints.
    pub fn new(station: impl Into<StationId>, token: SecretString) -> Result<Self, CoreError> {
        Ok(Self {
            station: station.into(),
            token,
            rest_url: parse_url("rest_url", DEFAULT_REST_URL)?,
            push_url: parse_url("push_url", DEFAULT_PUSH_URL)?,
            timeout: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
            freshness: FreshnessConfig::default(),
        })
    }

    /// Reject tuning values the state machine cannot honour.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.station.as_str().trim().is_empty() {
            return Err(CoreError::Config {
                message: "station id must not be empty".into(),
            });
        }
        if self.backoff.growth.is_nan() || self.backoff.growth <= 1.0 {
            return Err(CoreError::Config {
                message: format!("backoff growth must be > 1, got {}", self.backoff.growth),
            });
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter_ratio) {
            return Err(CoreError::Config {
                message: format!(
                    "jitter ratio must be within 0..=1, got {}",
                    self.backoff.jitter_ratio
                ),
            });
        }
        if self.backoff.max_retries == 0 {
            return Err(CoreError::Config {
                message: "max_retries must be at least 1".into(),
            });
        }
        if self.freshness.check_interval.is_zero() {
            return Err(CoreError::Config {
                message: "freshness check interval must be non-zero".into(),
            });
        }
        Ok(())
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, CoreError> {
    Url::parse(value).map_err(|e| CoreError::Config {
        message: format!("invalid {field} '{value}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn config() -> StationConfig {
        StationConfig::new("1234", SecretString::from("t".to_string())).unwrap()
    }

    #[test]
    fn defaults_point_at_public_endpoints() {
        let cfg = config();
        assert_eq!(cfg.rest_url.as_str(), "https://swd.weatherflow.com/swd/rest");
        assert_eq!(cfg.push_url.as_str(), "wss://ws.weatherflow.com/swd/data");
        assert_eq!(cfg.backoff.max_retries, 10);
        assert_eq!(cfg.freshness.staleness_window, Duration::from_secs(300));
        assert_eq!(cfg.freshness.check_interval, Duration::from_secs(600));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_growing_backoff() {
        let mut cfg = config();
        cfg.backoff.growth = 1.0;
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn rejects_empty_station() {
        let cfg = StationConfig::new("  ", SecretString::from("t".to_string())).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_jitter() {
        let mut cfg = config();
        cfg.backoff.jitter_ratio = 1.5;
        assert!(cfg.validate().is_err());
    }
}
