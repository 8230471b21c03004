// ── Station data source seam ──
//
// The resolver and snapshot client talk to the REST API through this
// trait so they can be driven by in-memory fakes in tests.

use async_trait::async_trait;

use tempest_api::{RestClient, StationObservationResponse, StationsResponse};

use crate::model::StationId;

/// Read-only view of the station REST endpoints.
#[async_trait]
pub trait StationApi: Send + Sync {
    /// Station metadata, including its devices.
    async fn station(&self, station: &StationId) -> Result<StationsResponse, tempest_api::Error>;

    /// Most recent observation snapshot.
    async fn latest_observation(
        &self,
        station: &StationId,
    ) -> Result<StationObservationResponse, tempest_api::Error>;
}

#[async_trait]
impl StationApi for RestClient {
    async fn station(&self, station: &StationId) -> Result<StationsResponse, tempest_api::Error> {
        RestClient::station(self, station.as_str()).await
    }

    async fn latest_observation(
        &self,
        station: &StationId,
    ) -> Result<StationObservationResponse, tempest_api::Error> {
        RestClient::latest_observation(self, station.as_str()).await
    }
}
