//! Rest-stop locator: names a point along a route for the
//! driver-facing schedule. Advisory only — never consulted by HOS
//! accounting, so a miss here never blocks a trip calculation.

use async_trait::async_trait;

use crate::hos::scheduler::RestStopLocator;
use crate::hos::types::{Coordinate, NamedPlace, StopKind};
use crate::services::nominatim::NominatimClient;

/// Reverse-geocodes through Nominatim, falling back to a synthetic
/// "<kind> near lat,lng" label when the lookup misses or errors — a rest
/// stop name is cosmetic, so we never propagate a network error here.
pub struct NominatimRestStopLocator {
    client: NominatimClient,
}

impl NominatimRestStopLocator {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: NominatimClient::new(base_url),
        }
    }
}

fn stop_kind_label(kind: StopKind) -> &'static str {
    match kind {
        StopKind::Start => "Start",
        StopKind::Pickup => "Pickup",
        StopKind::Dropoff => "Dropoff",
        StopKind::Fuel => "Fuel stop",
        StopKind::Break30Min => "Rest break",
        StopKind::Rest10Hr => "Rest stop",
        StopKind::Restart34Hr => "Restart stop",
        StopKind::EndPostTrip => "End of trip",
    }
}

fn fallback_name(near: Coordinate, kind: StopKind) -> String {
    format!("{} near {:.4}, {:.4}", stop_kind_label(kind), near.lat, near.lng)
}

#[async_trait]
impl RestStopLocator for NominatimRestStopLocator {
    async fn locate(&self, near: Coordinate, kind: StopKind) -> Option<NamedPlace> {
        let display_name = match self.client.reverse_geocode(near).await {
            Ok(Some(name)) => name,
            Ok(None) => fallback_name(near, kind),
            Err(e) => {
                tracing::debug!("reverse geocode failed, using fallback name: {e}");
                fallback_name(near, kind)
            }
        };

        Some(NamedPlace {
            address: display_name.clone(),
            coordinate: near,
            display_name,
        })
    }
}

/// Build a rest-stop locator from `GEOCODER_BACKEND` — sharing the
/// Geocoder's backend selection, since both consult the same Nominatim
/// instance when configured for live use.
pub fn create_rest_stop_locator(nominatim_url: &str) -> Box<dyn RestStopLocator> {
    match std::env::var("GEOCODER_BACKEND").as_deref() {
        Ok("nominatim") => Box::new(NominatimRestStopLocator::new(nominatim_url)),
        _ => Box::new(crate::hos::scheduler::NullRestStopLocator),
    }
}
