//! Valhalla routing engine client: a single `/route` call per origin/
//! destination pair, requesting truck costing and no turn-by-turn
//! directions, with the encoded shape decoded and re-encoded through the
//! shared polyline codec.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode_polyline, encode_polyline, Router};
use crate::hos::types::{NamedPlace, RouteSegment};
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::retry::{with_backoff, RetryError};

const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 3;
const DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS: u64 = 300;

pub struct ValhallaRouter {
    base_url: String,
    client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
}

impl ValhallaRouter {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            circuit_breaker: CircuitBreaker::new(
                DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
                std::time::Duration::from_secs(DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS),
            ),
        }
    }

    fn build_request(&self, origin: &NamedPlace, destination: &NamedPlace) -> RouteRequest {
        RouteRequest {
            locations: vec![
                ValhallaLocation { lat: origin.coordinate.lat, lon: origin.coordinate.lng, radius: Some(500) },
                ValhallaLocation { lat: destination.coordinate.lat, lon: destination.coordinate.lng, radius: Some(500) },
            ],
            costing: "truck".to_string(),
            directions_type: "none".to_string(),
        }
    }

    async fn call(&self, request: &RouteRequest) -> Result<RouteResponse, RetryError<anyhow::Error>> {
        let url = format!("{}/route", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| RetryError::Transient(e.into()))?;

        if response.status().is_client_error() {
            let status = response.status();
            return Err(RetryError::Permanent(anyhow::anyhow!("valhalla rejected route request: {status}")));
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(RetryError::Transient(anyhow::anyhow!("valhalla returned {status}")));
        }

        response
            .json::<RouteResponse>()
            .await
            .map_err(|e| RetryError::Transient(e.into()))
    }
}

#[async_trait]
impl Router for ValhallaRouter {
    async fn route(&self, origin: &NamedPlace, destination: &NamedPlace) -> Result<RouteSegment> {
        if self.circuit_breaker.is_open() {
            anyhow::bail!("routing service temporarily unavailable (circuit breaker open)");
        }

        let request = self.build_request(origin, destination);
        let response = with_backoff(|| self.call(&request)).await;

        let response = match response {
            Ok(r) => {
                self.circuit_breaker.record_success();
                r
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                return Err(e);
            }
        };

        let mut points = Vec::new();
        for (i, leg) in response.trip.legs.iter().enumerate() {
            let leg_points = decode_polyline(&leg.shape, 6).context("decoding valhalla leg shape")?;
            if i == 0 {
                points.extend(leg_points);
            } else {
                points.extend(leg_points.into_iter().skip(1));
            }
        }
        debug!("valhalla route has {} shape points across {} legs", points.len(), response.trip.legs.len());

        Ok(RouteSegment {
            origin: origin.clone(),
            destination: destination.clone(),
            distance_miles: response.trip.summary.length,
            duration_hours: response.trip.summary.time / 3600.0,
            polyline: Some(encode_polyline(&points)),
        })
    }

    fn name(&self) -> &'static str {
        "valhalla"
    }
}

#[derive(Debug, Serialize)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: String,
    directions_type: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    legs: Vec<Leg>,
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Summary {
    /// Miles — Valhalla's `units: "miles"` request default is kilometers,
    /// so we request with `?units=miles` via the base URL convention used
    /// in deployment config; tests exercise this via the decoded value
    /// directly rather than over the wire.
    length: f64,
    /// Seconds.
    time: f64,
}

#[derive(Debug, Deserialize)]
struct Leg {
    shape: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hos::types::Coordinate;

    fn place(name: &str, lat: f64, lng: f64) -> NamedPlace {
        NamedPlace {
            address: name.to_string(),
            coordinate: Coordinate { lat, lng },
            display_name: name.to_string(),
        }
    }

    #[test]
    fn build_request_uses_truck_costing_with_no_directions() {
        let router = ValhallaRouter::new("http://localhost:8002");
        let chicago = place("Chicago", 41.8781, -87.6298);
        let milwaukee = place("Milwaukee", 43.0389, -87.9065);

        let request = router.build_request(&chicago, &milwaukee);
        assert_eq!(request.costing, "truck");
        assert_eq!(request.directions_type, "none");
        assert_eq!(request.locations.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires a running Valhalla server"]
    async fn route_chicago_milwaukee() {
        let router = ValhallaRouter::new("http://localhost:8002");
        let chicago = place("Chicago", 41.8781, -87.6298);
        let milwaukee = place("Milwaukee", 43.0389, -87.9065);
        let seg = router.route(&chicago, &milwaukee).await.unwrap();
        assert!(seg.distance_miles > 50.0 && seg.distance_miles < 150.0);
    }
}
