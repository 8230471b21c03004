// ── Freshness arbiter ──
//
// Periodic safety net behind the push channel. It watches the event bus for
// push observations and, on each check, decides whether the stream is
// healthy, stale, or down. Stale or down triggers a REST snapshot published
// as a `Poll` observation; down additionally asks the streaming client to
// reconnect.

use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FreshnessConfig;
use crate::model::{ErrorKind, ObservationSource, StationId, WeatherEvent};
use crate::snapshot::SnapshotClient;
use crate::stream::StreamingClient;

/// What a freshness check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FallbackAction {
    /// Connected and the last push observation is recent.
    None,
    /// Connected but silent for longer than the staleness window.
    Poll,
    /// Not connected.
    ReconnectAndPoll,
}

/// Pure decision for one freshness check.
///
/// A push observation exactly `window` old still counts as fresh.
pub fn decide(
    connected: bool,
    last_push: Option<Instant>,
    now: Instant,
    window: Duration,
) -> FallbackAction {
    if !connected {
        return FallbackAction::ReconnectAndPoll;
    }
    let fresh = last_push.is_some_and(|t| now.saturating_duration_since(t) <= window);
    if fresh {
        FallbackAction::None
    } else {
        FallbackAction::Poll
    }
}

/// Arrival time of the most recent push observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshnessRecord {
    last_push: Option<Instant>,
}

impl FreshnessRecord {
    pub fn stamp(&mut self, at: Instant) {
        self.last_push = Some(at);
    }

    pub fn last_push(&self) -> Option<Instant> {
        self.last_push
    }

    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_push.map(|t| now.saturating_duration_since(t))
    }
}

/// Handle to the background arbiter task.
pub struct FreshnessArbiter {
    cancel: CancellationToken,
    verdicts: watch::Receiver<Option<FallbackAction>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FreshnessArbiter {
    /// Subscribe to `events` and start the check loop.
    ///
    /// The first check fires after `config.initial_check`, then every
    /// `config.check_interval`.
    pub fn spawn(
        station: StationId,
        streaming: StreamingClient,
        snapshot: SnapshotClient,
        config: FreshnessConfig,
        events: broadcast::Sender<WeatherEvent>,
    ) -> Self {
        let (verdict_tx, verdicts) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = ArbiterTask {
            station,
            streaming,
            snapshot,
            window: config.staleness_window,
            record: FreshnessRecord::default(),
            bus: events.subscribe(),
            events,
            verdicts: verdict_tx,
        };
        let handle = tokio::spawn(task.run(config, cancel.clone()));

        Self {
            cancel,
            verdicts,
            task: Mutex::new(Some(handle)),
        }
    }

    /// Latest check result; `None` until the first check ran.
    pub fn verdicts(&self) -> watch::Receiver<Option<FallbackAction>> {
        self.verdicts.clone()
    }

    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "freshness arbiter task failed");
            }
        }
    }
}

struct ArbiterTask {
    station: StationId,
    streaming: StreamingClient,
    snapshot: SnapshotClient,
    window: Duration,
    record: FreshnessRecord,
    bus: broadcast::Receiver<WeatherEvent>,
    events: broadcast::Sender<WeatherEvent>,
    verdicts: watch::Sender<Option<FallbackAction>>,
}

impl ArbiterTask {
    async fn run(mut self, config: FreshnessConfig, cancel: CancellationToken) {
        let start = Instant::now() + config.initial_check;
        let mut ticker = tokio::time::interval_at(start, config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                received = self.bus.recv() => match received {
                    Ok(event) if event.is_push_observation() => self.record.stamp(Instant::now()),
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "freshness arbiter lagged behind event bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = ticker.tick() => self.check().await,
            }
        }
        debug!(station = %self.station, "freshness arbiter stopped");
    }

    async fn check(&mut self) {
        let now = Instant::now();
        let connected = self.streaming.is_connected();
        let action = decide(connected, self.record.last_push(), now, self.window);
        debug!(
            station = %self.station,
            connected,
            age = ?self.record.age(now),
            %action,
            "freshness check"
        );

        match action {
            FallbackAction::None => {}
            FallbackAction::Poll => {
                info!(station = %self.station, "push data stale, polling snapshot");
                self.poll().await;
            }
            FallbackAction::ReconnectAndPoll => {
                match self.streaming.reconnect_if_needed().await {
                    Ok(outcome) => info!(station = %self.station, %outcome, "push channel down"),
                    Err(e) => warn!(error = %e, "reconnect request failed"),
                }
                self.poll().await;
            }
        }

        self.verdicts.send_replace(Some(action));
    }

    async fn poll(&self) {
        match self.snapshot.fetch_latest(&self.station).await {
            Ok(metrics) => {
                let _ = self
                    .events
                    .send(WeatherEvent::observation(metrics, ObservationSource::Poll));
            }
            Err(e) => {
                warn!(station = %self.station, error = %e, "fallback snapshot failed");
                let _ = self
                    .events
                    .send(WeatherEvent::error(ErrorKind::Poll, e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WINDOW: Duration = Duration::from_secs(300);

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[test]
    fn fresh_push_needs_nothing() {
        let now = later();
        let last = Some(now - Duration::from_secs(120));
        assert_eq!(decide(true, last, now, WINDOW), FallbackAction::None);
    }

    #[test]
    fn boundary_counts_as_fresh() {
        let now = later();
        let last = Some(now - WINDOW);
        assert_eq!(decide(true, last, now, WINDOW), FallbackAction::None);
    }

    #[test]
    fn stale_push_polls() {
        let now = later();
        let last = Some(now - Duration::from_secs(301));
        assert_eq!(decide(true, last, now, WINDOW), FallbackAction::Poll);
    }

    #[test]
    fn never_received_polls() {
        assert_eq!(
            decide(true, None, Instant::now(), WINDOW),
            FallbackAction::Poll
        );
    }

    #[test]
    fn disconnected_reconnects_regardless_of_age() {
        let now = Instant::now();
        assert_eq!(
            decide(false, Some(now), now, WINDOW),
            FallbackAction::ReconnectAndPoll
        );
        assert_eq!(
            decide(false, None, now, WINDOW),
            FallbackAction::ReconnectAndPoll
        );
    }

    #[test]
    fn record_tracks_age() {
        let mut record = FreshnessRecord::default();
        let now = Instant::now();
        assert!(record.age(now).is_none());
        record.stamp(now);
        assert_eq!(record.age(now), Some(Duration::ZERO));
    }
}
