// REST API HTTP client
//
// Wraps `reqwest::Client` with Tempest URL construction, token injection
// and status-code mapping. Every method is a single request/response call;
// retry policy belongs to the caller.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{StationObservationResponse, StationsResponse};
use crate::transport::TransportConfig;

/// Default REST base URL of the Tempest cloud.
pub const DEFAULT_REST_URL: &str = "https://swd.weatherflow.com/swd/rest";

/// Raw HTTP client for the Tempest REST API.
///
/// The access token is appended as the `token` query parameter on every
/// request and never logged.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl RestClient {
    /// Create a new REST client from a `TransportConfig`.
    pub fn new(base_url: Url, token: SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, token))
    }

    /// Create a REST client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, token: SecretString) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// The REST base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /observations/station/{station_id}` -- latest named-field observation.
    pub async fn latest_observation(
        &self,
        station_id: &str,
    ) -> Result<StationObservationResponse, Error> {
        let url = self.endpoint_url(&["observations", "station", station_id])?;
        self.get(url).await
    }

    /// `GET /stations/{station_id}` -- station metadata with its device list.
    pub async fn station(&self, station_id: &str) -> Result<StationsResponse, Error> {
        let url = self.endpoint_url(&["stations", station_id])?;
        self.get(url).await
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{segments...}?token={token}`.
    ///
    /// Segments are percent-encoded individually, so a station identifier
    /// can never escape its path position.
    pub(crate) fn endpoint_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("token", self.token.expose_secret());
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!(path = url.path(), "GET");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        parse_response(resp).await
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Map HTTP status codes onto [`Error`] variants and decode the JSON body.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        return Err(Error::RateLimited { retry_after_secs });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: preview(&body).to_owned(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

/// First 200 bytes of a body, cut on a char boundary.
fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn client(base: &str) -> RestClient {
        RestClient::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            SecretString::from("s3cret".to_string()),
        )
    }

    #[test]
    fn endpoint_url_appends_segments_and_token() {
        let c = client("https://swd.weatherflow.com/swd/rest");
        let url = c.endpoint_url(&["observations", "station", "1234"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://swd.weatherflow.com/swd/rest/observations/station/1234?token=s3cret"
        );
    }

    #[test]
    fn endpoint_url_handles_trailing_slash() {
        let c = client("http://localhost:8080/");
        let url = c.endpoint_url(&["stations", "9"]).unwrap();
        assert_eq!(url.path(), "/stations/9");
    }

    #[test]
    fn endpoint_url_encodes_station_segment() {
        let c = client("http://localhost:8080");
        let url = c.endpoint_url(&["stations", "a/b"]).unwrap();
        assert_eq!(url.path(), "/stations/a%2Fb");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        let p = preview(&body);
        assert!(p.len() <= 200);
        assert!(body.starts_with(p));
    }

    #[test]
    fn debug_does_not_leak_token() {
        let c = client("http://localhost");
        assert!(!format!("{c:?}").contains("s3cret"));
    }
}
