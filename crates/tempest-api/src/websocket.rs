//! WebSocket push channel.
//!
//! Opens the Tempest push socket and exposes it through the
//! [`PushConnector`] / [`PushChannel`] pair. The connection carries text
//! frames in both directions; ping/pong and binary frames are handled here
//! and never reach the caller.
//!
//! This module does no reconnecting of its own: each [`PushConnector::open`]
//! call is one handshake, and the lifecycle (subscribe, backoff, teardown)
//! is driven by the owner of the channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use tempest_api::websocket::{PushConnector, WsConnector};
//!
//! let connector = WsConnector::new(&push_url, &token, &TransportConfig::default());
//! let mut channel = connector.open().await?;
//! channel.send_text(ListenRequest::start(device_id).to_text()).await?;
//! while let Some(text) = channel.next_text().await? {
//!     println!("{text}");
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Default push endpoint of the Tempest cloud.
pub const DEFAULT_PUSH_URL: &str = "wss://ws.weatherflow.com/swd/data";

/// Close code reported when the socket dies without a close handshake.
const ABNORMAL_CLOSURE: u16 = 1006;

// ── Seams ────────────────────────────────────────────────────────────

/// One open push connection.
#[async_trait]
pub trait PushChannel: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), Error>;

    /// Wait for the next text frame.
    ///
    /// `Ok(None)` means the remote end closed the connection.
    async fn next_text(&mut self) -> Result<Option<String>, Error>;

    /// Whether a frame can still be written (no close seen or sent yet).
    fn is_writable(&self) -> bool;

    /// Close the connection. Errors are swallowed: the socket is gone either way.
    async fn close(&mut self);
}

/// Factory for push connections: one call, one handshake.
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PushChannel>, Error>;
}

// ── WsConnector ──────────────────────────────────────────────────────

/// [`PushConnector`] backed by `tokio-tungstenite`.
pub struct WsConnector {
    /// Full URL including the `token` query parameter.
    url: Url,
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(push_url: &Url, token: &SecretString, transport: &TransportConfig) -> Self {
        let mut url = push_url.clone();
        url.query_pairs_mut()
            .append_pair("token", token.expose_secret());
        Self {
            url,
            handshake_timeout: transport.timeout,
        }
    }

    /// Host of the push endpoint, safe to log.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("<unknown>")
    }
}

impl std::fmt::Debug for WsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnector")
            .field("host", &self.host())
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    async fn open(&self) -> Result<Box<dyn PushChannel>, Error> {
        tracing::info!(host = self.host(), "Connecting to push channel");

        let handshake = tokio_tungstenite::connect_async(self.url.as_str());
        let (stream, _response) = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: self.handshake_timeout.as_secs(),
            })?
            .map_err(map_handshake_error)?;

        tracing::info!("Push channel connected");
        Ok(Box::new(WsChannel {
            stream,
            closed: false,
        }))
    }
}

/// Translate a failed upgrade into an [`Error`], singling out HTTP 429.
fn map_handshake_error(err: tungstenite::Error) -> Error {
    if let tungstenite::Error::Http(ref response) = err {
        if response.status() == tungstenite::http::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            return Error::RateLimited { retry_after_secs };
        }
    }
    Error::WebSocketConnect(err.to_string())
}

// ── WsChannel ────────────────────────────────────────────────────────

struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl PushChannel for WsChannel {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        if self.closed {
            return Err(Error::WebSocketClosed {
                code: ABNORMAL_CLOSURE,
                reason: "send on closed channel".into(),
            });
        }
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                self.closed = true;
                Error::WebSocketClosed {
                    code: ABNORMAL_CLOSURE,
                    reason: e.to_string(),
                }
            })
    }

    async fn next_text(&mut self) -> Result<Option<String>, Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong reply itself
                    tracing::trace!("push channel ping");
                }
                Some(Ok(Message::Close(frame))) => {
                    self.closed = true;
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "Push channel close frame received");
                    } else {
                        tracing::info!("Push channel close frame received (no payload)");
                    }
                    return Ok(None);
                }
                Some(Ok(_)) => {
                    // Binary, Pong, Frame -- ignore
                }
                Some(Err(e)) => {
                    self.closed = true;
                    return Err(Error::WebSocketClosed {
                        code: ABNORMAL_CLOSURE,
                        reason: e.to_string(),
                    });
                }
                None => {
                    self.closed = true;
                    tracing::info!("Push channel stream ended");
                    return Ok(None);
                }
            }
        }
    }

    fn is_writable(&self) -> bool {
        !self.closed
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "push channel close failed");
        }
    }
}
