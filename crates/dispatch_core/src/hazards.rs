//! Hazard model: geographic zones that delay routes crossing them.
//!
//! Hazards modify effective travel time via a fixed per-hazard penalty. The
//! model is independent of the route provider -- it operates on ETA, not on
//! route geometry -- so it works with straight-line and OSRM routes alike.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::geo::GeoPoint;
use crate::routing::RouteResult;

/// Default added delay per active hazard crossed, in seconds.
pub const DEFAULT_HAZARD_PENALTY_SECS: u64 = 600;

/// Axis-aligned geographic rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub id: String,
    /// Free-form hazard kind, e.g. "flood" or "road_closure".
    pub kind: String,
    pub bounds: BoundingBox,
    pub active: bool,
}

/// Read-only source of the current hazard set.
pub trait HazardSource: Send + Sync {
    /// All currently active hazards.
    fn active_hazards(&self) -> Vec<Hazard>;
}

/// In-memory hazard set; inactive entries are filtered out on read.
#[derive(Default)]
pub struct StaticHazardSource {
    hazards: Vec<Hazard>,
}

impl StaticHazardSource {
    pub fn new(hazards: Vec<Hazard>) -> Self {
        Self { hazards }
    }
}

impl HazardSource for StaticHazardSource {
    fn active_hazards(&self) -> Vec<Hazard> {
        self.hazards.iter().filter(|h| h.active).cloned().collect()
    }
}

/// Flags routes that cross active hazard zones and converts the crossing
/// count into a time penalty.
#[derive(Clone)]
pub struct HazardAdvisor {
    source: Arc<dyn HazardSource>,
    penalty_per_hazard_secs: u64,
}

impl HazardAdvisor {
    pub fn new(source: Arc<dyn HazardSource>, penalty_per_hazard_secs: u64) -> Self {
        Self {
            source,
            penalty_per_hazard_secs,
        }
    }

    /// Advisor whose per-hazard penalty comes from the shared parameter set.
    pub fn from_config(source: Arc<dyn HazardSource>, config: &DispatchConfig) -> Self {
        Self::new(source, config.hazard_penalty_secs)
    }

    /// Active hazards whose rectangle contains at least one path coordinate.
    pub fn affecting_hazards(&self, path: &[GeoPoint]) -> Vec<Hazard> {
        self.source
            .active_hazards()
            .into_iter()
            .filter(|hazard| path.iter().any(|point| hazard.bounds.contains(*point)))
            .collect()
    }

    /// Total penalty for the path: per-hazard penalty times crossing count.
    pub fn penalty_secs(&self, path: &[GeoPoint]) -> u64 {
        self.affecting_hazards(path).len() as u64 * self.penalty_per_hazard_secs
    }

    /// Copy of `route` with the ETA increased by the path penalty. The
    /// geometry is unchanged -- the penalty models delay, not rerouting.
    pub fn apply_penalty(&self, route: &RouteResult) -> RouteResult {
        let penalty = self.penalty_secs(&route.geometry);
        RouteResult {
            geometry: route.geometry.clone(),
            distance_m: route.distance_m,
            eta_secs: route.eta_secs + penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flood_zone(active: bool) -> Hazard {
        Hazard {
            id: "hz-1".into(),
            kind: "flood".into(),
            bounds: BoundingBox {
                min_lat: 3.0,
                max_lat: 3.1,
                min_lng: 101.5,
                max_lng: 101.7,
            },
            active,
        }
    }

    fn advisor(hazards: Vec<Hazard>) -> HazardAdvisor {
        HazardAdvisor::new(
            Arc::new(StaticHazardSource::new(hazards)),
            DEFAULT_HAZARD_PENALTY_SECS,
        )
    }

    #[test]
    fn bounding_box_containment() {
        let bounds = flood_zone(true).bounds;
        assert!(bounds.contains(GeoPoint::new(3.05, 101.6)));
        assert!(!bounds.contains(GeoPoint::new(3.2, 101.6)));
        assert!(!bounds.contains(GeoPoint::new(3.05, 101.8)));
    }

    #[test]
    fn inactive_hazards_are_ignored() {
        let advisor = advisor(vec![flood_zone(false)]);
        let path = vec![GeoPoint::new(3.05, 101.6)];
        assert!(advisor.affecting_hazards(&path).is_empty());
        assert_eq!(advisor.penalty_secs(&path), 0);
    }

    #[test]
    fn penalty_counts_each_affecting_hazard() {
        let mut second = flood_zone(true);
        second.id = "hz-2".into();
        let advisor = advisor(vec![flood_zone(true), second]);
        let path = vec![GeoPoint::new(3.05, 101.6)];
        assert_eq!(advisor.penalty_secs(&path), 1_200);
    }

    #[test]
    fn path_outside_all_zones_has_zero_penalty() {
        let advisor = advisor(vec![flood_zone(true)]);
        let path = vec![GeoPoint::new(4.0, 100.0), GeoPoint::new(4.1, 100.1)];
        assert_eq!(advisor.penalty_secs(&path), 0);
    }

    #[test]
    fn apply_penalty_adjusts_eta_only() {
        // Baseline 500s route crossing one active hazard => 1100s.
        let advisor = advisor(vec![flood_zone(true)]);
        let route = RouteResult {
            geometry: vec![GeoPoint::new(3.05, 101.6), GeoPoint::new(3.06, 101.65)],
            distance_m: 6_250.0,
            eta_secs: 500,
        };
        let adjusted = advisor.apply_penalty(&route);
        assert_eq!(adjusted.eta_secs, 1_100);
        assert_eq!(adjusted.geometry, route.geometry);
        assert_eq!(adjusted.distance_m, route.distance_m);
    }
}
