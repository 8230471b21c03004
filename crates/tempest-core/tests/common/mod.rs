// In-memory stand-ins for the REST and push transports.

#![allow(clippy::unwrap_used, dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::time::Instant;

use tempest_api::{
    Error, PushChannel, PushConnector, StationObservationResponse, StationsResponse,
};
use tempest_core::{StationId, WeatherEvent};

pub const DEVICE_ID: u64 = 42;

pub fn station() -> StationId {
    StationId::from("1234")
}

/// Push frame for the given device carrying one obs_st-shaped row.
pub fn obs_frame(kind: &str, device_id: u64, temperature: f64) -> String {
    json!({
        "type": kind,
        "device_id": device_id,
        "obs": [[1_700_000_000, 0.5, 5, 6, 180, 3, 1012, temperature, 55, 9000, 3, 120, 0, 0, 0, 0, 3.3, 1]]
    })
    .to_string()
}

pub fn drain(rx: &mut broadcast::Receiver<WeatherEvent>) -> Vec<WeatherEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait for the next observation event, skipping everything else.
pub async fn next_observation(rx: &mut broadcast::Receiver<WeatherEvent>) -> WeatherEvent {
    loop {
        let event = rx.recv().await.unwrap();
        if matches!(event, WeatherEvent::Observation { .. }) {
            return event;
        }
    }
}

// ── REST ────────────────────────────────────────────────────────────

pub struct FakeApi {
    stations: Value,
    snapshot: Value,
    snapshot_fails: AtomicBool,
    /// When set, each station lookup waits for one permit.
    station_gate: Option<Arc<Semaphore>>,
    station_calls: AtomicUsize,
    snapshot_calls: AtomicUsize,
}

impl FakeApi {
    /// A station with a hub and one `ST` sensor.
    pub fn new() -> Arc<Self> {
        Self::with_devices(json!([
            { "device_id": 7, "device_type": "HB" },
            { "device_id": DEVICE_ID, "device_type": "ST", "serial_number": "ST-00042" }
        ]))
    }

    pub fn with_devices(devices: Value) -> Arc<Self> {
        Arc::new(Self::build(devices, None))
    }

    /// Station lookups block until the returned semaphore hands out a permit.
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let devices = json!([
            { "device_id": DEVICE_ID, "device_type": "ST", "serial_number": "ST-00042" }
        ]);
        (Arc::new(Self::build(devices, Some(Arc::clone(&gate)))), gate)
    }

    fn build(devices: Value, station_gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            stations: json!({ "stations": [{ "station_id": 1234, "devices": devices }] }),
            snapshot: json!({
                "station_id": 1234,
                "obs": [{
                    "timestamp": 1_700_000_000,
                    "air_temperature": 22.34567,
                    "brightness": 0,
                    "relative_humidity": 48
                }]
            }),
            snapshot_fails: AtomicBool::new(false),
            station_gate,
            station_calls: AtomicUsize::new(0),
            snapshot_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_snapshots(&self) {
        self.snapshot_fails.store(true, Ordering::SeqCst);
    }

    pub fn station_calls(&self) -> usize {
        self.station_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl tempest_core::StationApi for FakeApi {
    async fn station(&self, _: &StationId) -> Result<StationsResponse, Error> {
        self.station_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.station_gate {
            gate.acquire().await.unwrap().forget();
        }
        Ok(serde_json::from_value(self.stations.clone()).unwrap())
    }

    async fn latest_observation(&self, _: &StationId) -> Result<StationObservationResponse, Error> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.snapshot_fails.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        Ok(serde_json::from_value(self.snapshot.clone()).unwrap())
    }
}

// ── Push channel ────────────────────────────────────────────────────

pub enum Inbound {
    Text(String),
    /// Remote close frame.
    Close,
    /// Socket error.
    Fail,
}

/// Test-side end of one fake push connection.
pub struct FakeLink {
    pub inbound: mpsc::UnboundedSender<Inbound>,
    pub sent: Arc<Mutex<Vec<String>>>,
}

impl FakeLink {
    pub fn push(&self, text: String) {
        self.inbound.send(Inbound::Text(text)).unwrap();
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

pub struct FakeConnector {
    /// Opens left to fail before the first success.
    failures_left: AtomicUsize,
    rate_limited: bool,
    /// When set, each open waits for one permit before completing.
    gate: Option<Arc<Semaphore>>,
    open_times: Mutex<Vec<Instant>>,
    links: mpsc::UnboundedSender<FakeLink>,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeLink>) {
        Self::failing(0)
    }

    /// Fail the first `n` opens. `usize::MAX` never succeeds.
    pub fn failing(n: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeLink>) {
        Self::build(n, false)
    }

    pub fn rate_limited(n: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeLink>) {
        Self::build(n, true)
    }

    /// Opens succeed, but only once the returned semaphore hands out a permit.
    pub fn gated() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<FakeLink>,
        Arc<Semaphore>,
    ) {
        let gate = Arc::new(Semaphore::new(0));
        let (connector, links) = Self::build_with(0, false, Some(Arc::clone(&gate)));
        (connector, links, gate)
    }

    fn build(n: usize, rate_limited: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeLink>) {
        Self::build_with(n, rate_limited, None)
    }

    fn build_with(
        n: usize,
        rate_limited: bool,
        gate: Option<Arc<Semaphore>>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeLink>) {
        let (links, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            failures_left: AtomicUsize::new(n),
            rate_limited,
            gate,
            open_times: Mutex::new(Vec::new()),
            links,
        });
        (connector, rx)
    }

    pub fn opens(&self) -> usize {
        self.open_times.lock().unwrap().len()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.open_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushConnector for FakeConnector {
    async fn open(&self) -> Result<Box<dyn PushChannel>, Error> {
        self.open_times.lock().unwrap().push(Instant::now());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(if self.rate_limited {
                Error::RateLimited {
                    retry_after_secs: 0,
                }
            } else {
                Error::WebSocketConnect("connection refused".into())
            });
        }

        let (inbound, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let _ = self.links.send(FakeLink {
            inbound,
            sent: Arc::clone(&sent),
        });
        Ok(Box::new(FakeChannel {
            rx,
            sent,
            writable: true,
        }))
    }
}

struct FakeChannel {
    rx: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    writable: bool,
}

#[async_trait]
impl PushChannel for FakeChannel {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_text(&mut self) -> Result<Option<String>, Error> {
        match self.rx.recv().await {
            Some(Inbound::Text(text)) => Ok(Some(text)),
            Some(Inbound::Close) | None => {
                self.writable = false;
                Ok(None)
            }
            Some(Inbound::Fail) => {
                self.writable = false;
                Err(Error::WebSocketClosed {
                    code: 1006,
                    reason: "connection reset".into(),
                })
            }
        }
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    async fn close(&mut self) {
        self.writable = false;
    }
}
