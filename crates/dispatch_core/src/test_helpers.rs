//! Shared fixtures for tests: well-known coordinates, record constructors,
//! an event-collecting bus, and seeded random fleets.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geo::GeoPoint;
use crate::hazards::{HazardAdvisor, StaticHazardSource};
use crate::lifecycle::events::{DispatchEvent, EventBus};
use crate::model::{
    Ambulance, AmbulanceStatus, AmbulanceTier, Hospital, Incident, IncidentStatus, Severity,
};

/// Standard fleet position used across tests (Klang Valley area).
pub const AMBULANCE_POS: GeoPoint = GeoPoint {
    lat: 3.07,
    lng: 101.60,
};

/// Standard incident position, ~2.5km south-west of [`AMBULANCE_POS`].
pub const INCIDENT_POS: GeoPoint = GeoPoint {
    lat: 3.06,
    lng: 101.58,
};

pub fn ambulance_at(id: &str, tier: AmbulanceTier, position: GeoPoint) -> Ambulance {
    Ambulance {
        id: id.to_string(),
        callsign: id.to_uppercase(),
        tier,
        position,
        home_hospital: None,
        status: AmbulanceStatus::Idle,
    }
}

pub fn hospital_at(
    id: &str,
    position: GeoPoint,
    capabilities: &[&str],
    load: Option<u8>,
) -> Hospital {
    Hospital {
        id: id.to_string(),
        name: id.to_string(),
        position,
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        load,
    }
}

pub fn incident_at(id: &str, position: GeoPoint, severity: Severity) -> Incident {
    Incident {
        id: id.to_string(),
        position,
        severity,
        triage: None,
        status: IncidentStatus::Pending,
        assigned_ambulance: None,
        destination_hospital: None,
        eta_secs: None,
        route: None,
    }
}

/// A hazard advisor with an empty hazard set.
pub fn no_hazards() -> HazardAdvisor {
    HazardAdvisor::new(
        Arc::new(StaticHazardSource::default()),
        crate::hazards::DEFAULT_HAZARD_PENALTY_SECS,
    )
}

/// Event bus that records everything published, for ordering assertions.
#[derive(Default)]
pub struct CollectingBus {
    events: Mutex<Vec<DispatchEvent>>,
}

impl CollectingBus {
    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().clone()
    }
}

impl EventBus for CollectingBus {
    fn publish(&self, event: DispatchEvent) {
        self.events.lock().push(event);
    }
}

pub fn collecting_bus() -> Arc<CollectingBus> {
    Arc::new(CollectingBus::default())
}

/// Deterministic random fleet around [`INCIDENT_POS`]: ~75% idle, mixed tiers.
pub fn random_fleet(seed: u64, count: usize) -> Vec<Ambulance> {
    let mut rng = StdRng::seed_from_u64(seed);
    let tiers = [
        AmbulanceTier::Rrv,
        AmbulanceTier::Bls,
        AmbulanceTier::Als,
        AmbulanceTier::Cct,
    ];
    (0..count)
        .map(|i| {
            let position = GeoPoint::new(
                INCIDENT_POS.lat + rng.gen_range(-0.05..0.05),
                INCIDENT_POS.lng + rng.gen_range(-0.05..0.05),
            );
            let mut ambulance =
                ambulance_at(&format!("unit-{i:03}"), tiers[rng.gen_range(0..4)], position);
            if rng.gen_bool(0.25) {
                ambulance.status = AmbulanceStatus::EnRoute;
            }
            ambulance
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_fleet_is_deterministic_per_seed() {
        assert_eq!(random_fleet(42, 10), random_fleet(42, 10));
        assert_ne!(random_fleet(42, 10), random_fleet(43, 10));
    }

    #[test]
    fn fixture_positions_are_distinct() {
        assert_ne!(AMBULANCE_POS, INCIDENT_POS);
    }
}
