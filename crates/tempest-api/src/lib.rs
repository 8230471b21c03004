// tempest-api: Async Rust client for the WeatherFlow Tempest REST and push APIs

pub mod error;
pub mod models;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use models::{
    DeviceMeta, InboundFrame, ListenKind, ListenRequest, StationMeta, StationObservationResponse,
    StationsResponse,
};
pub use rest::RestClient;
pub use transport::TransportConfig;
pub use websocket::{PushChannel, PushConnector, WsConnector};
