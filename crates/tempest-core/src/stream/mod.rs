//! Push-channel streaming client.
//!
//! [`StreamingClient`] is a cheap, cloneable handle to a background session
//! task that owns the WebSocket connection. It resolves the station's
//! primary device, subscribes with `listen_start`, turns inbound frames into
//! [`WeatherEvent::Observation`]s and reconnects with exponential backoff
//! when the connection drops.
//!
//! ```text
//! Disconnected ──connect()──▶ Resolving ──▶ Connecting ──open──▶ Listening
//!      ▲                          │              │                   │
//!      │                          └── failure ───┴──── Closing ◀─────┘
//!      └──────────── backoff timer / give up ◀──────────┘
//! ```

mod frame;
pub mod retry;
mod session;

use std::sync::Arc;

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use tempest_api::PushConnector;

use self::session::{Command, Session};
use crate::config::BackoffConfig;
use crate::error::CoreError;
use crate::model::{StationId, WeatherEvent};
use crate::resolver::DeviceResolver;

pub use retry::{RetryDecision, RetryPolicy};

const COMMAND_CHANNEL_SIZE: usize = 16;

/// Capacity of the shared event bus.
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    /// Looking up the device to subscribe to.
    Resolving,
    /// WebSocket handshake in flight.
    Connecting,
    /// Subscribed and receiving frames.
    Listening,
    /// Unsubscribing and closing the socket.
    Closing,
}

impl ConnectionState {
    /// Anything other than `Disconnected`.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// Result of [`StreamingClient::reconnect_if_needed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReconnectOutcome {
    /// Already listening; nothing done.
    AlreadyConnected,
    /// An attempt is running or a backoff timer is pending.
    InProgress,
    /// Disconnected on request; only `connect()` resumes.
    Halted,
    /// Automatic reconnection gave up; only `connect()` resumes.
    Exhausted,
    /// A new connection attempt was started.
    Started,
}

/// Handle to the streaming session task.
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct StreamingClient {
    inner: Arc<StreamingInner>,
}

struct StreamingInner {
    station: StationId,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<WeatherEvent>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingClient {
    /// Spawn the session task. Does NOT connect; call [`connect`](Self::connect).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        station: StationId,
        resolver: DeviceResolver,
        connector: Arc<dyn PushConnector>,
        backoff: BackoffConfig,
        events: broadcast::Sender<WeatherEvent>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();

        let session = Session::new(
            station.clone(),
            resolver,
            connector,
            backoff,
            events.clone(),
            state_tx,
        );
        let task = tokio::spawn(session.run(command_rx, cancel.clone()));

        Self {
            inner: Arc::new(StreamingInner {
                station,
                commands: command_tx,
                state: state_rx,
                events,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    pub fn station(&self) -> &StationId {
        &self.inner.station
    }

    /// Start connecting. No-op while an attempt is running or the channel
    /// is listening. After the retry budget ran out, this starts a fresh one.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.send(Command::Connect).await
    }

    /// Unsubscribe, close the socket and stop reconnecting.
    ///
    /// Returns once the session is `Disconnected`.
    pub async fn disconnect(&self) -> Result<(), CoreError> {
        let (done, rx) = oneshot::channel();
        self.send(Command::Disconnect { done }).await?;
        rx.await.map_err(|_| CoreError::ClientStopped)
    }

    /// Connect unless already listening, already trying, halted by
    /// [`disconnect`](Self::disconnect), or out of retries.
    pub async fn reconnect_if_needed(&self) -> Result<ReconnectOutcome, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReconnectIfNeeded { reply }).await?;
        rx.await.map_err(|_| CoreError::ClientStopped)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Listening
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    /// Subscribe to the event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<WeatherEvent> {
        self.inner.events.subscribe()
    }

    /// Stop the session task and wait for it to finish tearing down.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "streaming session task failed");
            }
        }
    }

    async fn send(&self, command: Command) -> Result<(), CoreError> {
        self.inner
            .commands
            .send(command)
            .await
            .map_err(|_| CoreError::ClientStopped)
    }
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("station", &self.inner.station)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_disconnected_is_idle() {
        assert!(!ConnectionState::Disconnected.is_active());
        assert!(ConnectionState::Resolving.is_active());
        assert!(ConnectionState::Listening.is_active());
        assert!(ConnectionState::Closing.is_active());
    }

    #[test]
    fn states_render_snake_case() {
        assert_eq!(ConnectionState::Listening.to_string(), "listening");
        assert_eq!(ReconnectOutcome::AlreadyConnected.to_string(), "already_connected");
        assert_eq!(ReconnectOutcome::Exhausted.to_string(), "exhausted");
    }
}
