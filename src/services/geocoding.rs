//! Geocoder adapter: address string → `NamedPlace`. Pure from
//! the caller's point of view — the only hidden state is the LRU cache and
//! the circuit breaker guarding the live backend.

use std::num::NonZeroUsize;

use anyhow::Result;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use crate::hos::types::{Coordinate, NamedPlace};
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::nominatim::{NominatimClient, NominatimClientError};
use crate::services::retry::{with_backoff, RetryError};

const CACHE_CAPACITY: usize = 512;
const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 3;
const DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS: u64 = 300;

/// A geocoding miss (as opposed to a transient failure) — surfaced to the
/// HTTP layer as `UPSTREAM_INVALID`.
#[derive(Debug, thiserror::Error)]
#[error("no geocoding result for address: {0}")]
pub struct NoGeocodeMatch(pub String);

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<NamedPlace>;
    fn name(&self) -> &'static str;
}

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

// ---------------------------------------------------------------------
// MockGeocoder — deterministic, no network. Used in tests and whenever
// GEOCODER_BACKEND=mock.
// ---------------------------------------------------------------------

pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    /// Hash the address into a coordinate inside the contiguous US bounding
    /// box (lat 25–49, lng -125..-67), so tests get varied but deterministic
    /// and always-valid geocoding results.
    fn hash_to_coordinate(address: &str) -> Coordinate {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        normalize(address).hash(&mut hasher);
        let hash = hasher.finish();

        const LAT_MIN: f64 = 25.0;
        const LAT_MAX: f64 = 49.0;
        const LNG_MIN: f64 = -125.0;
        const LNG_MAX: f64 = -67.0;

        let lat_frac = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_frac = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinate {
            lat: LAT_MIN + lat_frac * (LAT_MAX - LAT_MIN),
            lng: LNG_MIN + lng_frac * (LNG_MAX - LNG_MIN),
        }
        .rounded()
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<NamedPlace> {
        if address.trim().is_empty() {
            return Err(NoGeocodeMatch(address.to_string()).into());
        }
        Ok(NamedPlace {
            address: address.to_string(),
            coordinate: Self::hash_to_coordinate(address),
            display_name: address.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------
// NominatimGeocoder — live backend, circuit-breaker-wrapped, LRU-cached.
// ---------------------------------------------------------------------

pub struct NominatimGeocoder {
    client: NominatimClient,
    circuit_breaker: CircuitBreaker,
    cache: Mutex<LruCache<String, NamedPlace>>,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(
            base_url,
            DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            std::time::Duration::from_secs(DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS),
        )
    }

    pub fn with_config(
        base_url: &str,
        circuit_breaker_threshold: u32,
        circuit_breaker_recovery: std::time::Duration,
    ) -> Self {
        Self {
            client: NominatimClient::new(base_url),
            circuit_breaker: CircuitBreaker::new(circuit_breaker_threshold, circuit_breaker_recovery),
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<NamedPlace> {
        let key = normalize(address);
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(cached.clone());
        }

        if self.circuit_breaker.is_open() {
            anyhow::bail!("geocoding service temporarily unavailable (circuit breaker open)");
        }

        let address_owned = address.to_string();
        let result = with_backoff(|| {
            let address = address_owned.clone();
            async move {
                match self.client.geocode(&address).await {
                    Ok(Some(r)) => Ok(Some(r)),
                    Ok(None) => Ok(None),
                    Err(e) if e.downcast_ref::<NominatimClientError>().is_some() => {
                        Err(RetryError::Permanent(e))
                    }
                    Err(e) => Err(RetryError::Transient(e)),
                }
            }
        })
        .await;

        let result = match result {
            Ok(r) => {
                self.circuit_breaker.record_success();
                r
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                return Err(e);
            }
        };

        let Some(geocoded) = result else {
            return Err(NoGeocodeMatch(address.to_string()).into());
        };

        let place = NamedPlace {
            address: address.to_string(),
            coordinate: geocoded.coordinate,
            display_name: geocoded.display_name,
        };
        self.cache.lock().put(key, place.clone());
        Ok(place)
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

/// Build a geocoder from `GEOCODER_BACKEND` (`mock` default, `nominatim` for
/// a live backend at `NOMINATIM_URL`).
pub fn create_geocoder(nominatim_url: &str) -> Box<dyn Geocoder> {
    match std::env::var("GEOCODER_BACKEND").as_deref() {
        Ok("nominatim") => {
            tracing::info!("using NominatimGeocoder at {}", nominatim_url);
            Box::new(NominatimGeocoder::new(nominatim_url))
        }
        _ => {
            tracing::info!("using MockGeocoder");
            Box::new(MockGeocoder::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_geocoder_is_deterministic() {
        let g = MockGeocoder::new();
        let a = g.geocode("233 S Wacker Dr, Chicago, IL").await.unwrap();
        let b = g.geocode("233 S Wacker Dr, Chicago, IL").await.unwrap();
        assert_eq!(a.coordinate, b.coordinate);
    }

    #[tokio::test]
    async fn mock_geocoder_differs_by_address() {
        let g = MockGeocoder::new();
        let a = g.geocode("Chicago, IL").await.unwrap();
        let b = g.geocode("Madison, WI").await.unwrap();
        assert_ne!(a.coordinate, b.coordinate);
    }

    #[tokio::test]
    async fn mock_geocoder_stays_within_contiguous_us() {
        let g = MockGeocoder::new();
        for address in ["1 Main St", "PO Box 2", "Somewhere, TX"] {
            let place = g.geocode(address).await.unwrap();
            assert!(place.coordinate.lat >= 25.0 && place.coordinate.lat <= 49.0);
            assert!(place.coordinate.lng >= -125.0 && place.coordinate.lng <= -67.0);
        }
    }

    #[tokio::test]
    async fn mock_geocoder_rejects_empty_address() {
        let g = MockGeocoder::new();
        assert!(g.geocode("").await.is_err());
    }

    #[tokio::test]
    async fn nominatim_geocoder_fails_fast_when_circuit_open() {
        let g = NominatimGeocoder::with_config(
            "https://nominatim.openstreetmap.org",
            1,
            std::time::Duration::from_secs(300),
        );
        g.circuit_breaker.record_failure();
        assert!(g.circuit_breaker.is_open());
        let err = g.geocode("anything").await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker"));
    }
}
