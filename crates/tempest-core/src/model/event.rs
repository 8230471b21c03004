use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use super::observation::DerivedMetrics;

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObservationSource {
    /// Delivered over the WebSocket push channel.
    Push,
    /// Fetched from the REST snapshot endpoint as a fallback.
    Poll,
}

/// Error taxonomy surfaced on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, reset, timed out, or closed unexpectedly.
    Transport,
    /// The service answered with an over-quota response.
    RateLimited,
    /// Device lookup failed before subscribing.
    Resolution,
    /// A fallback snapshot fetch failed.
    Poll,
    /// Automatic reconnection gave up. Terminal until `connect()` is called.
    RetryExhausted,
}

/// Everything the ingestion core tells its consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WeatherEvent {
    Connected,
    Disconnected,
    Observation {
        metrics: Arc<DerivedMetrics>,
        source: ObservationSource,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl WeatherEvent {
    pub fn observation(metrics: DerivedMetrics, source: ObservationSource) -> Self {
        Self::Observation {
            metrics: Arc::new(metrics),
            source,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// `true` for observations delivered over the push channel.
    pub fn is_push_observation(&self) -> bool {
        matches!(
            self,
            Self::Observation {
                source: ObservationSource::Push,
                ..
            }
        )
    }
}

impl fmt::Display for WeatherEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Observation { metrics, source } => write!(
                f,
                "observation ({source}): {:.2}°C {:.0}% {:.1} hPa wind {:.1} m/s",
                metrics.temperature, metrics.humidity, metrics.pressure, metrics.wind_speed
            ),
            Self::Error { kind, message } => write!(f, "error ({kind}): {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::observation::{RawObservation, normalize};

    #[test]
    fn source_and_kind_render_lowercase() {
        assert_eq!(ObservationSource::Push.to_string(), "push");
        assert_eq!(ObservationSource::Poll.to_string(), "poll");
        assert_eq!(ErrorKind::RetryExhausted.to_string(), "retry_exhausted");
    }

    #[test]
    fn push_observation_is_detected() {
        let metrics = normalize(&RawObservation::from_json(&serde_json::json!([])));
        let push = WeatherEvent::observation(metrics.clone(), ObservationSource::Push);
        let poll = WeatherEvent::observation(metrics, ObservationSource::Poll);
        assert!(push.is_push_observation());
        assert!(!poll.is_push_observation());
        assert!(!WeatherEvent::Connected.is_push_observation());
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(WeatherEvent::error(ErrorKind::Poll, "boom")).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["kind"], "poll");
        assert_eq!(json["message"], "boom");
    }
}
