// ── Device resolution ──
//
// Maps a station id to the primary sensor device whose push stream we
// subscribe to. Lookup failures are reported as `DeviceNotFound`, except
// rate limiting which keeps its own variant so backoff can honour it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{DeviceBinding, StationId};
use crate::source::StationApi;

#[derive(Clone)]
pub struct DeviceResolver {
    api: Arc<dyn StationApi>,
}

impl DeviceResolver {
    pub fn new(api: Arc<dyn StationApi>) -> Self {
        Self { api }
    }

    /// Look up the station's primary sensor.
    ///
    /// The first device of type `ST` wins. No request is made to the push
    /// service when this fails.
    pub async fn resolve(&self, station: &StationId) -> Result<DeviceBinding, CoreError> {
        debug!(%station, "resolving primary sensor device");

        let response = self.api.station(station).await.map_err(|e| {
            if e.is_rate_limited() {
                CoreError::from(e)
            } else {
                CoreError::DeviceNotFound {
                    station: station.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let device = response
            .devices()
            .find(|d| d.is_primary_sensor())
            .ok_or_else(|| CoreError::DeviceNotFound {
                station: station.to_string(),
                reason: format!(
                    "no device of type {} among {} device(s)",
                    tempest_api::models::PRIMARY_DEVICE_TYPE,
                    response.devices().count()
                ),
            })?;

        info!(%station, device_id = device.device_id, "resolved primary sensor");
        Ok(DeviceBinding {
            station: station.clone(),
            device_id: device.device_id,
            serial_number: device.serial_number.clone(),
        })
    }
}

impl std::fmt::Debug for DeviceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempest_api::{StationObservationResponse, StationsResponse};

    use super::*;

    struct Canned(Result<serde_json::Value, fn() -> tempest_api::Error>);

    #[async_trait]
    impl StationApi for Canned {
        async fn station(&self, _: &StationId) -> Result<StationsResponse, tempest_api::Error> {
            match &self.0 {
                Ok(body) => Ok(serde_json::from_value(body.clone()).unwrap()),
                Err(make) => Err(make()),
            }
        }

        async fn latest_observation(
            &self,
            _: &StationId,
        ) -> Result<StationObservationResponse, tempest_api::Error> {
            unreachable!("resolver never fetches observations")
        }
    }

    fn resolver(api: Canned) -> DeviceResolver {
        DeviceResolver::new(Arc::new(api))
    }

    #[tokio::test]
    async fn picks_first_st_device() {
        let api = Canned(Ok(json!({
            "stations": [{
                "station_id": 1,
                "devices": [
                    { "device_id": 10, "device_type": "HB" },
                    { "device_id": 20, "device_type": "ST", "serial_number": "ST-20" },
                    { "device_id": 30, "device_type": "ST" }
                ]
            }]
        })));

        let binding = resolver(api).resolve(&StationId::from("1")).await.unwrap();
        assert_eq!(binding.device_id, 20);
        assert_eq!(binding.serial_number.as_deref(), Some("ST-20"));
        assert_eq!(binding.station, StationId::from("1"));
    }

    #[tokio::test]
    async fn hub_only_station_is_not_found() {
        let api = Canned(Ok(json!({
            "stations": [{ "station_id": 1, "devices": [{ "device_id": 10, "device_type": "HB" }] }]
        })));

        let err = resolver(api).resolve(&StationId::from("1")).await.unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_station_list_is_not_found() {
        let api = Canned(Ok(json!({ "stations": [] })));
        let err = resolver(api).resolve(&StationId::from("1")).await.unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }));
    }

    #[tokio::test]
    async fn http_failure_is_not_found() {
        let api = Canned(Err(|| tempest_api::Error::Api {
            status: 500,
            message: "boom".into(),
        }));
        let err = resolver(api).resolve(&StationId::from("1")).await.unwrap_err();
        match err {
            CoreError::DeviceNotFound { station, reason } => {
                assert_eq!(station, "1");
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_is_preserved() {
        let api = Canned(Err(|| tempest_api::Error::RateLimited {
            retry_after_secs: 60,
        }));
        let err = resolver(api).resolve(&StationId::from("1")).await.unwrap_err();
        assert!(err.is_rate_limited());
    }
}
