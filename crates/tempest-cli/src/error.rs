//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tempest_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const RATE_LIMITED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the weather service")]
    #[diagnostic(
        code(tempest::connection_failed),
        help("Check your network connection and the configured URLs.\n{reason}")
    )]
    ConnectionFailed { reason: String },

    #[error("Rate limited by the weather service")]
    #[diagnostic(
        code(tempest::rate_limited),
        help("Wait at least {retry_after_secs}s before trying again.")
    )]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(tempest::timeout),
        help("Increase the timeout with --timeout or check service availability.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("The access token was rejected")]
    #[diagnostic(
        code(tempest::auth_failed),
        help(
            "Create a personal access token at tempestwx.com under Settings > Data Authorizations,\n\
             then pass it with --token or set TEMPEST_TOKEN."
        )
    )]
    AuthFailed,

    #[error("No access token configured")]
    #[diagnostic(
        code(tempest::no_token),
        help("Pass --token, set TEMPEST_TOKEN, or add `token` to {path}")
    )]
    NoToken { path: String },

    // ── Station ──────────────────────────────────────────────────────
    #[error("No station configured")]
    #[diagnostic(
        code(tempest::no_station),
        help("Pass --station, set TEMPEST_STATION, or add `station` to {path}")
    )]
    NoStation { path: String },

    #[error("No sensor found for station '{station}'")]
    #[diagnostic(
        code(tempest::device_not_found),
        help("Check the station id and that a Tempest sensor is paired with it.\n{reason}")
    )]
    DeviceNotFound { station: String, reason: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(tempest::api_error))]
    ApiError { status: Option<u16>, message: String },

    #[error("Stream stopped unexpectedly")]
    #[diagnostic(code(tempest::stopped))]
    Stopped,

    // ── Validation / configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tempest::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(tempest::config))]
    Config(Box<figment::Error>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    #[diagnostic(code(tempest::json))]
    Json(#[from] serde_json::Error),

    #[error("TOML encoding failed: {0}")]
    #[diagnostic(code(tempest::toml))]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Stopped => exit_code::CONNECTION,
            Self::RateLimited { .. } => exit_code::RATE_LIMITED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed | Self::NoToken { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::NoStation { .. } | Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::RateLimited { retry_after_secs } => CliError::RateLimited { retry_after_secs },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceNotFound { station, reason } => {
                if reason.contains("HTTP 401") || reason.contains("HTTP 403") {
                    CliError::AuthFailed
                } else {
                    CliError::DeviceNotFound { station, reason }
                }
            }
            CoreError::Api {
                status: Some(401 | 403),
                ..
            } => CliError::AuthFailed,
            CoreError::Api { message, status } => CliError::ApiError { status, message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::ClientStopped => CliError::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::ConnectionFailed {
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::RateLimited {
                    retry_after_secs: 60,
                },
                exit_code::RATE_LIMITED,
            ),
            (
                CoreError::Api {
                    message: "nope".into(),
                    status: Some(401),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::DeviceNotFound {
                    station: "1".into(),
                    reason: "no device of type ST".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::Config {
                    message: "bad".into(),
                },
                exit_code::USAGE,
            ),
        ];
        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn resolver_auth_failure_is_auth() {
        let err = CliError::from(CoreError::DeviceNotFound {
            station: "1".into(),
            reason: "API error (HTTP 401): invalid token".into(),
        });
        assert!(matches!(err, CliError::AuthFailed));
    }
}
