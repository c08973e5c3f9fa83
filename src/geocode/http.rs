//! HTTP reverse geocoding against the Google Geocoding JSON API.
//!
//! One request per call; pacing and retries are the resolver's business, so
//! this client never retries on its own. Any response that parses is
//! returned as a [`GeocodeResponse`] even when the status is not `OK`.

use super::{GeocodeError, GeocodeResponse, GeocodeStatus, ReverseGeocoder};
use crate::Coordinate;
use futures::future::BoxFuture;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// API response for the reverse geocode endpoint
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    results: Vec<ApiResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    formatted_address: Option<String>,
}

/// Reverse geocoder backed by the Google Geocoding API.
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GoogleGeocoder {
    /// Create a geocoder using the given API key
    pub fn new(api_key: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeocodeError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Point at a different endpoint (proxy, test server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, coordinate: Coordinate) -> Result<GeocodeResponse, GeocodeError> {
        let req_start = Instant::now();
        let latlng = format!("{},{}", coordinate.lat, coordinate.lng);

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("latlng", latlng.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!("[GoogleGeocoder] HTTP {} for {}", status, latlng);
            return Err(GeocodeError::Http(status.as_u16()));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GeocodeError::Transport(format!("body download error: {}", e)))?;

        let parsed = parse_response(&bytes)?;
        debug!(
            "[GoogleGeocoder] {} -> {:?} ({:.1}KB in {:?})",
            latlng,
            parsed.status,
            bytes.len() as f64 / 1024.0,
            req_start.elapsed()
        );
        Ok(parsed)
    }
}

impl ReverseGeocoder for GoogleGeocoder {
    fn reverse_geocode(&self, coordinate: Coordinate) -> BoxFuture<'_, Result<GeocodeResponse, GeocodeError>> {
        Box::pin(self.fetch(coordinate))
    }
}

/// Decode a reverse geocode body into the provider-neutral response.
pub(crate) fn parse_response(body: &[u8]) -> Result<GeocodeResponse, GeocodeError> {
    let data: ApiResponse = serde_json::from_slice(body)?;

    if let Some(message) = &data.error_message {
        debug!("[GoogleGeocoder] provider message: {}", message);
    }

    Ok(GeocodeResponse {
        status: GeocodeStatus::from(data.status.as_str()),
        formatted_address: data.results.into_iter().find_map(|r| r.formatted_address),
    })
}
