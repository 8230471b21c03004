//! Reactive ingestion core for WeatherFlow Tempest stations.
//!
//! Sits between `tempest-api` and consumers (the `tempest` CLI or any
//! embedding application):
//!
//! - **[`WeatherStation`]**: facade wiring every component for one station
//!   onto a shared `tokio::sync::broadcast` bus of [`WeatherEvent`]s.
//!
//! - **[`StreamingClient`]**: handle to the push-channel session task.
//!   Resolves the station's device, subscribes, normalizes frames and
//!   reconnects with exponential backoff and jitter.
//!
//! - **[`FreshnessArbiter`]**: periodic check that falls back to a REST
//!   snapshot when push data goes stale or the channel is down.
//!
//! - **[`DeviceResolver`] / [`SnapshotClient`]**: REST lookups behind the
//!   [`StationApi`] seam.
//!
//! - **Domain model** ([`model`]): [`DerivedMetrics`] and the
//!   [`normalize`] function that folds both observation shapes into it.

pub mod config;
pub mod error;
pub mod freshness;
pub mod model;
pub mod resolver;
pub mod snapshot;
pub mod source;
pub mod station;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BackoffConfig, FreshnessConfig, StationConfig};
pub use error::CoreError;
pub use freshness::{FallbackAction, FreshnessArbiter, FreshnessRecord};
pub use model::{
    DerivedMetrics, DeviceBinding, ErrorKind, ObservationSource, RawObservation, SnapshotRecord,
    StationId, StreamRecord, WeatherEvent, normalize,
};
pub use resolver::DeviceResolver;
pub use snapshot::SnapshotClient;
pub use source::StationApi;
pub use station::WeatherStation;
pub use stream::{ConnectionState, ReconnectOutcome, StreamingClient};
