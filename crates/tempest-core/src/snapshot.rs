// ── REST snapshot fetch ──

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DerivedMetrics, RawObservation, StationId, StreamRecord, normalize};
use crate::source::StationApi;

/// One-shot fetch of the latest station observation, normalized.
#[derive(Clone)]
pub struct SnapshotClient {
    api: Arc<dyn StationApi>,
}

impl SnapshotClient {
    pub fn new(api: Arc<dyn StationApi>) -> Self {
        Self { api }
    }

    /// Fetch and normalize the newest observation.
    ///
    /// Transport failures are errors. A successful response without any
    /// observation normalizes to default metrics.
    pub async fn fetch_latest(&self, station: &StationId) -> Result<DerivedMetrics, CoreError> {
        let response = self.api.latest_observation(station).await?;

        let raw = if let Some(latest) = response.latest() {
            RawObservation::from_json(latest)
        } else {
            warn!(%station, "snapshot response carried no observations");
            RawObservation::StreamRecord(StreamRecord::default())
        };

        let metrics = normalize(&raw);
        debug!(%station, temperature = metrics.temperature, "snapshot fetched");
        Ok(metrics)
    }
}

impl std::fmt::Debug for SnapshotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotClient").finish_non_exhaustive()
    }
}
