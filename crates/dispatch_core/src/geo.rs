//! Geographic primitives: Haversine distances, road-distance/ETA estimation,
//! and polyline position sampling.
//!
//! This module provides:
//!
//! - **Haversine distance** between two lat/lng points
//! - **Road-distance estimation** via a fixed tortuosity multiplier
//! - **ETA estimation** from distance at an assumed average speed
//! - **Polyline interpolation**: position at a progress fraction along a path
//!
//! Everything here is pure; no providers, no I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Multiplier converting straight-line distance to an approximate road distance.
pub const ROAD_TORTUOSITY: f64 = 1.35;

/// Assumed average urban response speed.
pub const AVG_SPEED_KMH: f64 = 45.0;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Coordinates quantized to ~0.1m precision, usable as a hash key.
    pub(crate) fn quantized(self) -> (i64, i64) {
        ((self.lat * 1e6).round() as i64, (self.lng * 1e6).round() as i64)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeoError {
    #[error("path must contain at least one point")]
    EmptyPath,
}

/// Great-circle distance in metres between two points.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Approximate road distance from a straight-line distance.
pub fn road_distance_m(straight_m: f64) -> f64 {
    straight_m * ROAD_TORTUOSITY
}

/// Estimated travel time in whole seconds at the default average speed.
pub fn eta_secs(distance_m: f64) -> u64 {
    eta_secs_at(distance_m, AVG_SPEED_KMH)
}

/// Estimated travel time in whole seconds at the given speed.
pub fn eta_secs_at(distance_m: f64, speed_kmh: f64) -> u64 {
    if distance_m <= 0.0 {
        return 0;
    }
    let speed_ms = speed_kmh.max(1.0) / 3.6;
    (distance_m / speed_ms).round() as u64
}

/// Total polyline length: sum of consecutive Haversine segment distances.
pub fn path_length_m(path: &[GeoPoint]) -> f64 {
    path.windows(2).map(|pair| haversine_m(pair[0], pair[1])).sum()
}

/// Position at `progress` (0..=1) along a polyline.
///
/// Walks cumulative segment lengths and linearly interpolates within the
/// segment containing `progress * total_length`. Boundary values are exact:
/// `progress <= 0` yields the first point and `progress >= 1` the last point
/// with no floating drift.
pub fn position_at_progress(path: &[GeoPoint], progress: f64) -> Result<GeoPoint, GeoError> {
    let first = *path.first().ok_or(GeoError::EmptyPath)?;
    let last = *path.last().ok_or(GeoError::EmptyPath)?;
    if path.len() == 1 || progress <= 0.0 {
        return Ok(first);
    }
    if progress >= 1.0 {
        return Ok(last);
    }

    let total = path_length_m(path);
    if total <= 0.0 {
        return Ok(first);
    }
    let target = progress * total;

    let mut walked = 0.0;
    for pair in path.windows(2) {
        let seg = haversine_m(pair[0], pair[1]);
        if walked + seg >= target && seg > 0.0 {
            let t = (target - walked) / seg;
            return Ok(GeoPoint::new(
                pair[0].lat + (pair[1].lat - pair[0].lat) * t,
                pair[0].lng + (pair[1].lng - pair[0].lng) * t,
            ));
        }
        walked += seg;
    }

    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kl_origin() -> GeoPoint {
        GeoPoint::new(3.07, 101.60)
    }

    fn kl_incident() -> GeoPoint {
        GeoPoint::new(3.06, 101.58)
    }

    #[test]
    fn haversine_known_distance() {
        // ~0.01 deg lat + 0.02 deg lng near the equator is roughly 2.5km.
        let d = haversine_m(kl_origin(), kl_incident());
        assert!(d > 2_000.0 && d < 3_000.0, "unexpected distance {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_m(kl_origin(), kl_origin()), 0.0);
    }

    #[test]
    fn road_distance_applies_tortuosity() {
        assert_eq!(road_distance_m(1000.0), 1350.0);
    }

    #[test]
    fn eta_scales_with_distance() {
        // 12.5 m/s at 45 km/h.
        assert_eq!(eta_secs(0.0), 0);
        assert_eq!(eta_secs(12_500.0), 1000);
        assert_eq!(eta_secs_at(10_000.0, 36.0), 1000);
    }

    #[test]
    fn empty_path_is_an_error() {
        assert_eq!(position_at_progress(&[], 0.5), Err(GeoError::EmptyPath));
        assert_eq!(path_length_m(&[]), 0.0);
    }

    #[test]
    fn single_point_path_returns_that_point() {
        let p = kl_origin();
        for progress in [-1.0, 0.0, 0.5, 1.0, 2.0] {
            assert_eq!(position_at_progress(&[p], progress).expect("point"), p);
        }
    }

    #[test]
    fn progress_boundaries_are_exact() {
        let path = vec![kl_origin(), GeoPoint::new(3.065, 101.59), kl_incident()];
        assert_eq!(position_at_progress(&path, 0.0).expect("start"), path[0]);
        assert_eq!(position_at_progress(&path, -0.5).expect("start"), path[0]);
        assert_eq!(position_at_progress(&path, 1.0).expect("end"), path[2]);
        assert_eq!(position_at_progress(&path, 1.5).expect("end"), path[2]);
    }

    #[test]
    fn midpoint_of_straight_segment_interpolates_linearly() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 1.0);
        let mid = position_at_progress(&[a, b], 0.5).expect("midpoint");
        assert!((mid.lng - 0.5).abs() < 1e-9);
        assert!(mid.lat.abs() < 1e-9);
    }

    #[test]
    fn interpolation_walks_across_segments() {
        // Two equal-length segments; progress 0.75 lands halfway into the second.
        let path = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(0.0, 2.0),
        ];
        let p = position_at_progress(&path, 0.75).expect("point");
        assert!((p.lng - 1.5).abs() < 1e-6);
    }

    #[test]
    fn path_length_sums_segments() {
        let path = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(0.0, 2.0),
        ];
        let total = path_length_m(&path);
        let direct = haversine_m(path[0], path[2]);
        assert!((total - direct).abs() < 1.0);
    }
}
