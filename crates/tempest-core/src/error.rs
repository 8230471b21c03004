// ── Core error types ──
//
// Ingestion-level errors. Consumers never see raw HTTP statuses or JSON
// failures: the `From<tempest_api::Error>` impl translates transport-layer
// errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach weather service: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Rate limited by weather service (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("Weather service request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("No primary sensor device found for station {station}: {reason}")]
    DeviceNotFound { station: String, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Streaming client has shut down")]
    ClientStopped,
}

impl CoreError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tempest_api::Error> for CoreError {
    fn from(err: tempest_api::Error) -> Self {
        match err {
            tempest_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.status().map(|s| s.as_u16()) == Some(429) {
                    CoreError::RateLimited {
                        retry_after_secs: 0,
                    }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            tempest_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            tempest_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            tempest_api::Error::RateLimited { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            tempest_api::Error::Api { status: 429, .. } => CoreError::RateLimited {
                retry_after_secs: 0,
            },
            tempest_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            tempest_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            tempest_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            tempest_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
        }
    }
}
