//! Router adapter: an origin/destination pair → total distance,
//! total driving duration, and an encoded polyline. Distinct from the
//! teacher's N×N VRP matrix service — this is the pairwise contract
//! `hos::scheduler` actually needs.

pub mod valhalla;

use anyhow::Result;
use async_trait::async_trait;

use crate::hos::types::{Coordinate, NamedPlace, RouteSegment};
use crate::services::geo::{haversine_distance_miles, lerp};

pub use valhalla::ValhallaRouter;

#[async_trait]
pub trait Router: Send + Sync {
    async fn route(&self, origin: &NamedPlace, destination: &NamedPlace) -> Result<RouteSegment>;
    fn name(&self) -> &'static str;
}

/// Straight-line-based router for tests and deployments without a routing
/// engine configured. Distance is Haversine × a fixed road-winding
/// coefficient; duration derives from a fixed average highway speed.
pub struct MockRouter {
    road_coefficient: f64,
    average_speed_mph: f64,
}

impl MockRouter {
    pub fn new() -> Self {
        Self {
            road_coefficient: 1.2,
            average_speed_mph: 55.0,
        }
    }

    pub fn with_params(road_coefficient: f64, average_speed_mph: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_mph,
        }
    }
}

impl Default for MockRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Router for MockRouter {
    async fn route(&self, origin: &NamedPlace, destination: &NamedPlace) -> Result<RouteSegment> {
        let straight = haversine_distance_miles(origin.coordinate, destination.coordinate);
        let distance_miles = straight * self.road_coefficient;
        let duration_hours = distance_miles / self.average_speed_mph;

        let polyline = encode_polyline(&[origin.coordinate, destination.coordinate]);

        Ok(RouteSegment {
            origin: origin.clone(),
            destination: destination.clone(),
            distance_miles,
            duration_hours,
            polyline: Some(polyline),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Build a router from `ROUTER_BACKEND` (`mock` default, `valhalla` for a
/// live engine at `VALHALLA_URL`).
pub fn create_router(valhalla_url: Option<&str>) -> Box<dyn Router> {
    match (std::env::var("ROUTER_BACKEND").as_deref(), valhalla_url) {
        (Ok("valhalla"), Some(url)) => {
            tracing::info!("using ValhallaRouter at {}", url);
            Box::new(ValhallaRouter::new(url))
        }
        _ => {
            tracing::info!("using MockRouter");
            Box::new(MockRouter::new())
        }
    }
}

/// Decode a Google/Valhalla/OSRM-style encoded polyline into `[lat, lng]`
/// points, at the given decimal precision (Valhalla uses 6, Google uses 5).
pub fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<Coordinate>> {
    let factor = 10_f64.powi(precision as i32);
    let mut coordinates = Vec::new();
    let mut lat = 0i64;
    let mut lng = 0i64;

    let bytes = encoded.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        lat += decode_varint(bytes, &mut i)?;
        lng += decode_varint(bytes, &mut i)?;
        coordinates.push(Coordinate {
            lat: lat as f64 / factor,
            lng: lng as f64 / factor,
        });
    }

    Ok(coordinates)
}

fn decode_varint(bytes: &[u8], i: &mut usize) -> Result<i64> {
    let mut shift = 0;
    let mut result = 0i64;
    loop {
        if *i >= bytes.len() {
            anyhow::bail!("truncated polyline encoding");
        }
        let byte = bytes[*i] as i64 - 63;
        *i += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

/// Encode points at precision 6, matching `decode_polyline`'s default.
pub fn encode_polyline(points: &[Coordinate]) -> String {
    let factor = 10_f64.powi(6);
    let mut out = String::new();
    let mut prev_lat = 0i64;
    let mut prev_lng = 0i64;

    for point in points {
        let lat = (point.lat * factor).round() as i64;
        let lng = (point.lng * factor).round() as i64;
        encode_varint(lat - prev_lat, &mut out);
        encode_varint(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn encode_varint(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    loop {
        let mut chunk = (v & 0x1f) as u8;
        v >>= 5;
        if v != 0 {
            chunk |= 0x20;
        }
        out.push((chunk + 63) as char);
        if v == 0 {
            break;
        }
    }
}

/// Snap a fractional position (0.0 = origin, 1.0 = destination) along a
/// segment's decoded polyline to a coordinate — used only to label rest
/// stops; never affects HOS accounting. Falls back to a linear
/// interpolation between the segment's endpoints when there's no polyline
/// or it fails to decode.
pub fn interpolate_along_segment(segment: &RouteSegment, fraction: f64) -> Coordinate {
    let fraction = fraction.clamp(0.0, 1.0);

    let points = segment
        .polyline
        .as_deref()
        .and_then(|p| decode_polyline(p, 6).ok())
        .filter(|pts| pts.len() >= 2);

    let Some(points) = points else {
        return lerp(segment.origin.coordinate, segment.destination.coordinate, fraction);
    };

    let segment_lengths: Vec<f64> = points
        .windows(2)
        .map(|w| haversine_distance_miles(w[0], w[1]))
        .collect();
    let total: f64 = segment_lengths.iter().sum();
    if total <= f64::EPSILON {
        return points[0];
    }

    let target = total * fraction;
    let mut covered = 0.0;
    for (i, len) in segment_lengths.iter().enumerate() {
        if covered + len >= target || i == segment_lengths.len() - 1 {
            let local_fraction = if *len > f64::EPSILON { (target - covered) / len } else { 0.0 };
            return lerp(points[i], points[i + 1], local_fraction);
        }
        covered += len;
    }

    *points.last().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(name: &str, lat: f64, lng: f64) -> NamedPlace {
        NamedPlace {
            address: name.to_string(),
            coordinate: Coordinate { lat, lng },
            display_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn mock_router_produces_positive_distance_and_duration() {
        let router = MockRouter::new();
        let chicago = place("Chicago", 41.8781, -87.6298);
        let milwaukee = place("Milwaukee", 43.0389, -87.9065);

        let seg = router.route(&chicago, &milwaukee).await.unwrap();
        assert!(seg.distance_miles > 0.0);
        assert!(seg.duration_hours > 0.0);
        assert!(seg.polyline.is_some());
    }

    #[test]
    fn polyline_round_trips() {
        let points = vec![
            Coordinate { lat: 41.8781, lng: -87.6298 },
            Coordinate { lat: 43.0389, lng: -87.9065 },
            Coordinate { lat: 43.0731, lng: -89.4012 },
        ];
        let encoded = encode_polyline(&points);
        let decoded = decode_polyline(&encoded, 6).unwrap();

        assert_eq!(decoded.len(), points.len());
        for (a, b) in points.iter().zip(decoded.iter()) {
            assert!((a.lat - b.lat).abs() < 1e-5);
            assert!((a.lng - b.lng).abs() < 1e-5);
        }
    }

    #[test]
    fn interpolate_at_zero_and_one_hits_endpoints() {
        let origin = place("A", 40.0, -90.0);
        let destination = place("B", 42.0, -92.0);
        let segment = RouteSegment {
            origin: origin.clone(),
            destination: destination.clone(),
            distance_miles: 100.0,
            duration_hours: 2.0,
            polyline: Some(encode_polyline(&[origin.coordinate, destination.coordinate])),
        };

        let start = interpolate_along_segment(&segment, 0.0);
        let end = interpolate_along_segment(&segment, 1.0);
        assert!((start.lat - origin.coordinate.lat).abs() < 1e-4);
        assert!((end.lat - destination.coordinate.lat).abs() < 1e-4);
    }

    #[test]
    fn interpolate_without_polyline_falls_back_to_lerp() {
        let origin = place("A", 40.0, -90.0);
        let destination = place("B", 42.0, -92.0);
        let segment = RouteSegment {
            origin: origin.clone(),
            destination: destination.clone(),
            distance_miles: 100.0,
            duration_hours: 2.0,
            polyline: None,
        };

        let mid = interpolate_along_segment(&segment, 0.5);
        assert!((mid.lat - 41.0).abs() < 1e-9);
    }
}
