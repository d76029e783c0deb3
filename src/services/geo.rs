//! Geographic calculations shared by the routing and rest-stop adapters.

use chrono_tz::Tz;

use crate::hos::types::Coordinate;

/// Earth radius in miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance between two points, in miles.
pub fn haversine_distance_miles(from: Coordinate, to: Coordinate) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_MILES * c
}

/// Linear interpolation between two coordinates at `fraction` ∈ [0, 1].
/// Good enough for snapping a position to a point along a route leg — the
/// scheduler only uses this to label a rest stop, not for HOS accounting.
pub fn lerp(from: Coordinate, to: Coordinate, fraction: f64) -> Coordinate {
    let fraction = fraction.clamp(0.0, 1.0);
    Coordinate {
        lat: from.lat + (to.lat - from.lat) * fraction,
        lng: from.lng + (to.lng - from.lng) * fraction,
    }
}

/// Approximate the contiguous-US time zone for a coordinate by longitude
/// band. A real implementation would
/// consult a zone-polygon dataset; none of the retrieved corpus carries
/// one, so this picks the dominant zone for each longitude band and falls
/// back to UTC outside the contiguous US.
pub fn timezone_for_coordinate(coordinate: Coordinate) -> Tz {
    let lat = coordinate.lat;
    let lng = coordinate.lng;

    if !(24.0..=50.0).contains(&lat) || !(-125.0..=-66.0).contains(&lng) {
        return Tz::UTC;
    }

    if lng > -82.0 {
        Tz::America__New_York
    } else if lng > -100.0 {
        Tz::America__Chicago
    } else if lng > -114.0 {
        Tz::America__Denver
    } else {
        Tz::America__Los_Angeles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timezone_for_coordinate_picks_eastern_for_chicago_lng_band() {
        // Chicago itself sits just west of the -82 cutoff, in Central.
        let chicago = Coordinate { lat: 41.8781, lng: -87.6298 };
        assert_eq!(timezone_for_coordinate(chicago), Tz::America__Chicago);
    }

    #[test]
    fn timezone_for_coordinate_picks_pacific_for_los_angeles() {
        let la = Coordinate { lat: 34.0522, lng: -118.2437 };
        assert_eq!(timezone_for_coordinate(la), Tz::America__Los_Angeles);
    }

    #[test]
    fn timezone_for_coordinate_falls_back_to_utc_outside_contiguous_us() {
        let reykjavik = Coordinate { lat: 64.1466, lng: -21.9426 };
        assert_eq!(timezone_for_coordinate(reykjavik), Tz::UTC);
    }

    #[test]
    fn haversine_chicago_milwaukee() {
        let chicago = Coordinate { lat: 41.8781, lng: -87.6298 };
        let milwaukee = Coordinate { lat: 43.0389, lng: -87.9065 };
        let miles = haversine_distance_miles(chicago, milwaukee);
        assert!((miles - 81.0).abs() < 5.0, "expected ~81mi, got {miles}");
    }

    #[test]
    fn haversine_same_point_is_zero() {
        let p = Coordinate { lat: 40.0, lng: -90.0 };
        assert!(haversine_distance_miles(p, p) < 1e-9);
    }

    #[test]
    fn lerp_midpoint() {
        let a = Coordinate { lat: 40.0, lng: -90.0 };
        let b = Coordinate { lat: 42.0, lng: -92.0 };
        let mid = lerp(a, b, 0.5);
        assert!((mid.lat - 41.0).abs() < 1e-9);
        assert!((mid.lng - (-91.0)).abs() < 1e-9);
    }

    #[test]
    fn lerp_clamps_fraction() {
        let a = Coordinate { lat: 40.0, lng: -90.0 };
        let b = Coordinate { lat: 42.0, lng: -92.0 };
        assert_eq!(lerp(a, b, -1.0), a);
        assert_eq!(lerp(a, b, 2.0), b);
    }
}
