// ── WeatherStation facade ──
//
// Wires the ingestion components for one station onto a shared event bus:
// resolver and snapshot client over REST, the streaming session over the
// push channel, and the freshness arbiter watching both.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::info;

use tempest_api::{PushConnector, RestClient, TransportConfig, WsConnector};

use crate::config::StationConfig;
use crate::error::CoreError;
use crate::freshness::{FallbackAction, FreshnessArbiter};
use crate::model::{DerivedMetrics, DeviceBinding, StationId, WeatherEvent};
use crate::resolver::DeviceResolver;
use crate::snapshot::SnapshotClient;
use crate::source::StationApi;
use crate::stream::{ConnectionState, EVENT_CHANNEL_SIZE, StreamingClient};

/// Live ingestion for a single station.
pub struct WeatherStation {
    station: StationId,
    events: broadcast::Sender<WeatherEvent>,
    resolver: DeviceResolver,
    snapshot: SnapshotClient,
    streaming: StreamingClient,
    arbiter: FreshnessArbiter,
}

impl WeatherStation {
    /// Connect to the public Tempest services described by `config`.
    ///
    /// Returns once the background tasks are running; the first connection
    /// attempt proceeds asynchronously. Subscribe right away to see it.
    pub async fn start(config: StationConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::default().with_timeout(config.timeout);
        let rest = RestClient::new(config.rest_url.clone(), config.token.clone(), &transport)?;
        let connector = WsConnector::new(&config.push_url, &config.token, &transport);

        Self::start_with(config, Arc::new(rest), Arc::new(connector)).await
    }

    /// Like [`start`](Self::start), with caller-supplied transports.
    pub async fn start_with(
        config: StationConfig,
        api: Arc<dyn StationApi>,
        connector: Arc<dyn PushConnector>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let resolver = DeviceResolver::new(Arc::clone(&api));
        let snapshot = SnapshotClient::new(api);

        let streaming = StreamingClient::spawn(
            config.station.clone(),
            resolver.clone(),
            connector,
            config.backoff.clone(),
            events.clone(),
        );
        let arbiter = FreshnessArbiter::spawn(
            config.station.clone(),
            streaming.clone(),
            snapshot.clone(),
            config.freshness.clone(),
            events.clone(),
        );

        streaming.connect().await?;
        info!(station = %config.station, "weather station started");

        Ok(Self {
            station: config.station,
            events,
            resolver,
            snapshot,
            streaming,
            arbiter,
        })
    }

    pub fn station(&self) -> &StationId {
        &self.station
    }

    /// Subscribe to observations, connection changes and errors.
    pub fn subscribe(&self) -> broadcast::Receiver<WeatherEvent> {
        self.events.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.streaming.watch_state()
    }

    /// Latest freshness check result.
    pub fn fallback_verdicts(&self) -> watch::Receiver<Option<FallbackAction>> {
        self.arbiter.verdicts()
    }

    pub fn streaming(&self) -> &StreamingClient {
        &self.streaming
    }

    /// One-off REST snapshot, outside the fallback cadence.
    pub async fn fetch_snapshot(&self) -> Result<DerivedMetrics, CoreError> {
        self.snapshot.fetch_latest(&self.station).await
    }

    pub async fn resolve_device(&self) -> Result<DeviceBinding, CoreError> {
        self.resolver.resolve(&self.station).await
    }

    /// Stop the arbiter, disconnect the push channel and end both tasks.
    pub async fn shutdown(&self) {
        self.arbiter.stop().await;
        // The session may already be gone; shutdown below covers it.
        let _ = self.streaming.disconnect().await;
        self.streaming.shutdown().await;
        info!(station = %self.station, "weather station stopped");
    }
}
