//! Nominatim HTTP client: free-form address → coordinates, and the reverse,
//! used both by the Geocoder adapter and the Rest-stop Locator.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::hos::types::Coordinate;

#[derive(Debug, Deserialize)]
struct NominatimSearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimReverseResult {
    display_name: String,
}

pub struct GeocodeResult {
    pub coordinate: Coordinate,
    pub display_name: String,
}

/// Raised on a non-retryable upstream response (HTTP 4xx). Transient
/// failures (network errors, 5xx) are surfaced as a plain `anyhow::Error`
/// so the caller's retry loop treats them as retryable.
#[derive(Debug, thiserror::Error)]
#[error("nominatim rejected the request: {0}")]
pub struct NominatimClientError(pub String);

pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("dutycycle-worker/1.0")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Forward-geocode a free-form US address. `Ok(None)` means no match; an `Err`
    /// distinguishes non-retryable 4xx from everything else via
    /// `NominatimClientError`.
    pub async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
        let url = format!(
            "{}/search?q={}&format=json&countrycodes=us&limit=1",
            self.base_url,
            urlencoding::encode(address)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to send geocoding request")?;

        if response.status().is_client_error() {
            return Err(NominatimClientError(format!("HTTP {}", response.status())).into());
        }
        if !response.status().is_success() {
            anyhow::bail!("nominatim returned {}", response.status());
        }

        let results: Vec<NominatimSearchResult> = response
            .json()
            .await
            .context("failed to parse geocoding response")?;

        let Some(result) = results.into_iter().next() else {
            return Ok(None);
        };

        let lat: f64 = result.lat.parse().context("invalid latitude in geocoding response")?;
        let lng: f64 = result.lon.parse().context("invalid longitude in geocoding response")?;

        Ok(Some(GeocodeResult {
            coordinate: Coordinate { lat, lng }.rounded(),
            display_name: result.display_name,
        }))
    }

    /// Reverse-geocode coordinates to a display name, for snapping rest
    /// stops to a plausible place. Never treated as fatal by
    /// callers — a miss just falls back to a synthetic placeholder.
    pub async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Option<String>> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json",
            self.base_url, coordinate.lat, coordinate.lng
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to send reverse-geocoding request")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let result: NominatimReverseResult = response
            .json()
            .await
            .context("failed to parse reverse-geocoding response")?;

        Ok(Some(result.display_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These hit the public Nominatim API; kept but ignored by default since
    // network-dependent tests shouldn't run on every `cargo test`.

    #[tokio::test]
    #[ignore]
    async fn geocode_chicago() {
        let client = NominatimClient::new("https://nominatim.openstreetmap.org");
        let result = client
            .geocode("233 S Wacker Dr, Chicago, IL")
            .await
            .unwrap()
            .unwrap();
        assert!((result.coordinate.lat - 41.8781).abs() < 0.5);
    }
}
