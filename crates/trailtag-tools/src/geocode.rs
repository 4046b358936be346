//! Geocoding client with a token bucket.
//!
//! Denied requests return `Ok(None)` and are not retried by the bucket;
//! transient HTTP failures also degrade to `None` so the workflow can
//! continue with partial data.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};

/// Token bucket parameters protecting the upstream geocoding API.
const GEOCODE_RATE_PER_SEC: u32 = 5;
const GEOCODE_BURST: u32 = 10;

/// Request timeout mandated for geocoding calls.
const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the geocoding client.
#[derive(Debug, Clone)]
pub struct GeocodeConfig {
    /// Geocoding API endpoint
    pub base_url: String,
    /// API key forwarded as the `key` query parameter
    pub api_key: Option<String>,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            api_key: None,
        }
    }
}

impl GeocodeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("GEOCODE_BASE_URL").unwrap_or_else(|_| {
                "https://maps.googleapis.com/maps/api/geocode/json".to_string()
            }),
            api_key: std::env::var("GOOGLE_API_KEY").ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Rate-limited geocoding client. Resolves place names to `[lon, lat]`.
pub struct GeocodeClient {
    http: reqwest::Client,
    config: GeocodeConfig,
    bucket: DefaultDirectRateLimiter,
}

impl GeocodeClient {
    pub fn new(config: GeocodeConfig) -> ToolResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(GEOCODE_TIMEOUT)
            .build()
            .map_err(ToolError::Network)?;

        let quota = Quota::per_second(NonZeroU32::new(GEOCODE_RATE_PER_SEC).unwrap())
            .allow_burst(NonZeroU32::new(GEOCODE_BURST).unwrap());

        Ok(Self {
            http,
            config,
            bucket: RateLimiter::direct(quota),
        })
    }

    pub fn from_env() -> ToolResult<Self> {
        Self::new(GeocodeConfig::from_env())
    }

    /// Resolve a place name to WGS84 `[lon, lat]`.
    ///
    /// Returns `None` when the bucket denies the call, the upstream has no
    /// match, or the request fails; all three are logged and non-fatal.
    pub async fn geocode(&self, place: &str) -> Option<[f64; 2]> {
        if self.bucket.check().is_err() {
            warn!(place, "Geocode request denied by rate limiter");
            return None;
        }

        let mut request = self
            .http
            .get(&self.config.base_url)
            .query(&[("address", place)]);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(place, "Geocode request failed: {}", e);
                return None;
            }
        };

        let body: GeocodeResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(place, "Geocode response parse failed: {}", e);
                return None;
            }
        };

        if body.status != "OK" {
            debug!(place, status = %body.status, "Geocode lookup returned no result");
            return None;
        }

        body.results.first().map(|result| {
            let location = &result.geometry.location;
            [location.lng, location.lat]
        })
    }
}
