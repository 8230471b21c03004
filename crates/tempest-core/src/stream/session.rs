// ── Streaming session task ──
//
// Single owner of the push connection lifecycle. Everything that mutates
// connection state (commands, attempt completions, inbound frames, the
// backoff timer) arrives through one `select!` loop, so transitions are
// serialized without locks.
//
// Each connection attempt is tagged with a generation number; an outcome
// whose generation no longer matches the current one is discarded.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use tempest_api::{ListenRequest, PushChannel, PushConnector};

use super::frame::{FrameOutcome, classify};
use super::retry::{RetryDecision, RetryPolicy};
use super::{ConnectionState, ReconnectOutcome};
use crate::config::BackoffConfig;
use crate::error::CoreError;
use crate::model::{DeviceBinding, ErrorKind, ObservationSource, StationId, WeatherEvent, normalize};
use crate::resolver::DeviceResolver;

pub(super) enum Command {
    Connect,
    Disconnect {
        done: oneshot::Sender<()>,
    },
    ReconnectIfNeeded {
        reply: oneshot::Sender<ReconnectOutcome>,
    },
}

enum AttemptOutcome {
    Resolved {
        generation: u64,
        result: Result<DeviceBinding, CoreError>,
    },
    Opened {
        generation: u64,
        result: Result<Box<dyn PushChannel>, tempest_api::Error>,
    },
}

impl AttemptOutcome {
    fn generation(&self) -> u64 {
        match self {
            Self::Resolved { generation, .. } | Self::Opened { generation, .. } => *generation,
        }
    }
}

pub(super) struct Session {
    station: StationId,
    resolver: DeviceResolver,
    connector: Arc<dyn PushConnector>,
    events: broadcast::Sender<WeatherEvent>,
    state: watch::Sender<ConnectionState>,
    retry: RetryPolicy,
    binding: Option<DeviceBinding>,
    channel: Option<Box<dyn PushChannel>>,
    attempt: Option<BoxFuture<'static, AttemptOutcome>>,
    generation: u64,
    reconnect_at: Option<Instant>,
    /// Set by an explicit disconnect; cleared by the next `connect()`.
    halted: bool,
}

impl Session {
    pub(super) fn new(
        station: StationId,
        resolver: DeviceResolver,
        connector: Arc<dyn PushConnector>,
        backoff: BackoffConfig,
        events: broadcast::Sender<WeatherEvent>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            station,
            resolver,
            connector,
            events,
            state,
            retry: RetryPolicy::new(backoff),
            binding: None,
            channel: None,
            attempt: None,
            generation: 0,
            reconnect_at: None,
            halted: false,
        }
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) {
        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                outcome = poll_attempt(&mut self.attempt) => {
                    self.attempt = None;
                    self.handle_attempt(outcome).await;
                }
                frame = next_frame(&mut self.channel) => self.handle_frame(frame).await,
                () = sleep_until_deadline(reconnect_at) => {
                    debug!(station = %self.station, "backoff elapsed");
                    self.start_attempt();
                }
            }
        }

        self.halt().await;
        debug!(station = %self.station, "streaming session stopped");
    }

    // ── Commands ─────────────────────────────────────────────────────

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect { done } => {
                self.halt().await;
                let _ = done.send(());
            }
            Command::ReconnectIfNeeded { reply } => {
                let outcome = self.reconnect_if_needed();
                let _ = reply.send(outcome);
            }
        }
    }

    fn connect(&mut self) {
        let state = self.current_state();
        if state.is_active() {
            debug!(%state, "connect ignored, connection already active");
            return;
        }
        self.halted = false;
        if self.retry.is_exhausted() {
            info!(station = %self.station, "retry budget restored by explicit connect");
            self.retry.reset();
        }
        self.start_attempt();
    }

    fn reconnect_if_needed(&mut self) -> ReconnectOutcome {
        match self.current_state() {
            ConnectionState::Listening => ReconnectOutcome::AlreadyConnected,
            ConnectionState::Resolving | ConnectionState::Connecting | ConnectionState::Closing => {
                ReconnectOutcome::InProgress
            }
            ConnectionState::Disconnected if self.halted => ReconnectOutcome::Halted,
            ConnectionState::Disconnected if self.reconnect_at.is_some() => {
                ReconnectOutcome::InProgress
            }
            // Only an explicit connect() restores a spent budget.
            ConnectionState::Disconnected if self.retry.is_exhausted() => {
                ReconnectOutcome::Exhausted
            }
            ConnectionState::Disconnected => {
                self.start_attempt();
                ReconnectOutcome::Started
            }
        }
    }

    /// Explicit teardown: cancel any attempt or timer, close the channel,
    /// forget the binding and stop reconnecting.
    async fn halt(&mut self) {
        self.halted = true;
        self.reconnect_at = None;
        self.attempt = None;
        self.generation = self.generation.wrapping_add(1);

        let was_listening = self.current_state() == ConnectionState::Listening;
        self.close_channel().await;
        self.binding = None;
        self.set_state(ConnectionState::Disconnected);
        if was_listening {
            self.emit(WeatherEvent::Disconnected);
            info!(station = %self.station, "push channel disconnected");
        }
    }

    // ── Connection attempts ──────────────────────────────────────────

    fn start_attempt(&mut self) {
        self.reconnect_at = None;
        self.generation = self.generation.wrapping_add(1);

        if self.binding.is_some() {
            self.open_channel();
            return;
        }

        self.set_state(ConnectionState::Resolving);
        let generation = self.generation;
        let resolver = self.resolver.clone();
        let station = self.station.clone();
        self.attempt = Some(Box::pin(async move {
            AttemptOutcome::Resolved {
                generation,
                result: resolver.resolve(&station).await,
            }
        }));
    }

    fn open_channel(&mut self) {
        self.set_state(ConnectionState::Connecting);
        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        self.attempt = Some(Box::pin(async move {
            AttemptOutcome::Opened {
                generation,
                result: connector.open().await,
            }
        }));
    }

    async fn handle_attempt(&mut self, outcome: AttemptOutcome) {
        let generation = outcome.generation();
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "discarding superseded connection attempt"
            );
            return;
        }

        match outcome {
            AttemptOutcome::Resolved {
                result: Ok(binding),
                ..
            } => {
                self.binding = Some(binding);
                self.open_channel();
            }
            AttemptOutcome::Resolved { result: Err(e), .. } => {
                warn!(station = %self.station, error = %e, "device resolution failed");
                let rate_limited = e.is_rate_limited();
                let kind = if rate_limited {
                    ErrorKind::RateLimited
                } else {
                    ErrorKind::Resolution
                };
                self.emit(WeatherEvent::error(kind, e.to_string()));
                self.schedule_retry(rate_limited);
            }
            AttemptOutcome::Opened {
                result: Ok(channel),
                ..
            } => self.on_open(channel).await,
            AttemptOutcome::Opened { result: Err(e), .. } => {
                warn!(station = %self.station, error = %e, "push channel connect failed");
                let rate_limited = e.is_rate_limited();
                let kind = if rate_limited {
                    ErrorKind::RateLimited
                } else {
                    ErrorKind::Transport
                };
                self.emit(WeatherEvent::error(kind, CoreError::from(e).to_string()));
                self.schedule_retry(rate_limited);
            }
        }
    }

    async fn on_open(&mut self, mut channel: Box<dyn PushChannel>) {
        let Some(device_id) = self.binding.as_ref().map(|b| b.device_id) else {
            warn!("push channel opened without a device binding");
            channel.close().await;
            self.schedule_retry(false);
            return;
        };

        if let Err(e) = channel
            .send_text(ListenRequest::start(device_id).to_text())
            .await
        {
            warn!(device_id, error = %e, "listen_start failed");
            channel.close().await;
            self.emit(WeatherEvent::error(ErrorKind::Transport, e.to_string()));
            self.schedule_retry(false);
            return;
        }

        self.retry.reset();
        self.channel = Some(channel);
        self.set_state(ConnectionState::Listening);
        info!(station = %self.station, device_id, "listening for push observations");
        self.emit(WeatherEvent::Connected);
    }

    // ── Inbound traffic ──────────────────────────────────────────────

    async fn handle_frame(&mut self, frame: Result<Option<String>, tempest_api::Error>) {
        match frame {
            Ok(Some(text)) => self.on_text(&text),
            Ok(None) => {
                info!(station = %self.station, "push channel closed by remote");
                self.on_connection_lost(None).await;
            }
            Err(e) => {
                warn!(station = %self.station, error = %e, "push channel error");
                self.on_connection_lost(Some(e.to_string())).await;
            }
        }
    }

    fn on_text(&self, text: &str) {
        match classify(text, self.binding.as_ref()) {
            FrameOutcome::Observation(raw) => {
                let metrics = normalize(&raw);
                trace!(temperature = metrics.temperature, "push observation");
                self.emit(WeatherEvent::observation(metrics, ObservationSource::Push));
            }
            FrameOutcome::Ack(id) => debug!(?id, "listen acknowledged"),
            FrameOutcome::ForeignDevice(device_id) => {
                debug!(?device_id, "dropping observation for another device");
            }
            FrameOutcome::MissingObs => debug!("dropping observation frame without obs array"),
            FrameOutcome::Ignored(kind) => trace!(%kind, "ignoring push frame"),
            FrameOutcome::Malformed(e) => warn!(error = %e, "unparseable push frame"),
        }
    }

    async fn on_connection_lost(&mut self, error: Option<String>) {
        self.close_channel().await;
        self.set_state(ConnectionState::Disconnected);
        self.emit(WeatherEvent::Disconnected);
        if let Some(message) = error {
            self.emit(WeatherEvent::error(ErrorKind::Transport, message));
        }
        self.schedule_retry(false);
    }

    /// Unsubscribe (if the socket still takes writes) and close.
    async fn close_channel(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        self.set_state(ConnectionState::Closing);

        if channel.is_writable() {
            if let Some(device_id) = self.binding.as_ref().map(|b| b.device_id) {
                if let Err(e) = channel
                    .send_text(ListenRequest::stop(device_id).to_text())
                    .await
                {
                    debug!(error = %e, "listen_stop failed");
                }
            }
        }
        channel.close().await;
    }

    // ── Backoff ──────────────────────────────────────────────────────

    fn schedule_retry(&mut self, rate_limited: bool) {
        self.set_state(ConnectionState::Disconnected);

        match self.retry.record_failure(rate_limited) {
            RetryDecision::Retry {
                attempt,
                base,
                delay,
            } => {
                info!(
                    station = %self.station,
                    attempt,
                    rate_limited,
                    base = ?base,
                    delay = ?delay,
                    "reconnect scheduled"
                );
                self.reconnect_at = Some(Instant::now() + delay);
            }
            RetryDecision::GiveUp { failures } => {
                error!(station = %self.station, failures, "giving up on push channel");
                self.reconnect_at = None;
                self.emit(WeatherEvent::error(
                    ErrorKind::RetryExhausted,
                    format!("push channel gave up after {failures} consecutive failures"),
                ));
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "connection state changed");
        }
    }

    fn emit(&self, event: WeatherEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn poll_attempt(attempt: &mut Option<BoxFuture<'static, AttemptOutcome>>) -> AttemptOutcome {
    match attempt {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(
    channel: &mut Option<Box<dyn PushChannel>>,
) -> Result<Option<String>, tempest_api::Error> {
    match channel {
        Some(channel) => channel.next_text().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
