//! Candidate selection: rank the idle fleet by ETA to an incident.
//!
//! Pure selection -- the caller owns the ambulance status mutation that
//! actually claims the chosen unit.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::geo::GeoPoint;
use crate::model::{Ambulance, AmbulanceTier};
use crate::routing::{RouteProvider, RouteResult};
use crate::store::{Storage, StoreError};

/// An eligible ambulance with its computed route to the incident.
#[derive(Clone, Debug)]
pub struct RankedCandidate {
    pub ambulance: Ambulance,
    pub route: RouteResult,
}

pub struct CandidateSelector {
    store: Arc<dyn Storage>,
    router: Arc<dyn RouteProvider>,
}

impl CandidateSelector {
    pub fn new(store: Arc<dyn Storage>, router: Arc<dyn RouteProvider>) -> Self {
        Self { store, router }
    }

    /// Rank eligible units for an incident.
    ///
    /// Only IDLE ambulances are considered. When `required_tier` is given,
    /// units below that tier are filtered out. Survivors are routed to the
    /// incident and sorted ascending by ETA, ties broken by distance, then by
    /// ambulance id for determinism. An empty result is a normal "no eligible
    /// unit" outcome, not an error.
    ///
    /// Hazard penalties are intentionally not applied here; they are a
    /// destination-selection and lifecycle concern.
    pub async fn select_candidates(
        &self,
        incident_pos: GeoPoint,
        required_tier: Option<AmbulanceTier>,
    ) -> Result<Vec<RankedCandidate>, StoreError> {
        let fleet = self.store.idle_ambulances().await?;

        let mut ranked = Vec::with_capacity(fleet.len());
        for ambulance in fleet {
            if let Some(min_tier) = required_tier {
                if ambulance.tier < min_tier {
                    continue;
                }
            }
            match self.router.route(ambulance.position, incident_pos).await {
                Ok(route) => ranked.push(RankedCandidate { ambulance, route }),
                Err(err) => {
                    // A fallback-wrapped provider never gets here; a bare one
                    // just loses this unit from the ranking.
                    tracing::warn!(
                        ambulance = %ambulance.id,
                        error = %err,
                        "route computation failed, skipping candidate"
                    );
                }
            }
        }

        ranked.sort_by(|a, b| {
            a.route
                .eta_secs
                .cmp(&b.route.eta_secs)
                .then_with(|| {
                    a.route
                        .distance_m
                        .partial_cmp(&b.route.distance_m)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.ambulance.id.cmp(&b.ambulance.id))
        });
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AmbulanceStatus;
    use crate::routing::StraightLineProvider;
    use crate::store::MemoryStore;
    use crate::test_helpers::{ambulance_at, INCIDENT_POS};

    fn selector(store: Arc<MemoryStore>) -> CandidateSelector {
        CandidateSelector::new(store, Arc::new(StraightLineProvider::default()))
    }

    #[tokio::test]
    async fn tier_filter_is_monotonic() {
        let store = Arc::new(MemoryStore::new());
        for (id, tier) in [
            ("rrv", AmbulanceTier::Rrv),
            ("bls", AmbulanceTier::Bls),
            ("als", AmbulanceTier::Als),
            ("cct", AmbulanceTier::Cct),
        ] {
            store.insert_ambulance(ambulance_at(id, tier, GeoPoint::new(3.07, 101.60)));
        }

        let ranked = selector(store)
            .select_candidates(INCIDENT_POS, Some(AmbulanceTier::Als))
            .await
            .expect("candidates");

        let ids: Vec<&str> = ranked.iter().map(|c| c.ambulance.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"als"));
        assert!(ids.contains(&"cct"));
    }

    #[tokio::test]
    async fn ranking_is_by_eta_then_distance_then_id() {
        let store = Arc::new(MemoryStore::new());
        // "far" is ~3x the distance of the two near units; the near units are
        // equidistant and tie-break on id.
        store.insert_ambulance(ambulance_at(
            "far",
            AmbulanceTier::Bls,
            GeoPoint::new(3.12, 101.60),
        ));
        store.insert_ambulance(ambulance_at(
            "b-near",
            AmbulanceTier::Bls,
            GeoPoint::new(3.08, 101.58),
        ));
        store.insert_ambulance(ambulance_at(
            "a-near",
            AmbulanceTier::Bls,
            GeoPoint::new(3.04, 101.58),
        ));

        let ranked = selector(store)
            .select_candidates(INCIDENT_POS, None)
            .await
            .expect("candidates");

        let ids: Vec<&str> = ranked.iter().map(|c| c.ambulance.id.as_str()).collect();
        assert_eq!(ids, vec!["a-near", "b-near", "far"]);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].route.eta_secs <= pair[1].route.eta_secs));
    }

    #[tokio::test]
    async fn busy_units_never_appear() {
        let store = Arc::new(MemoryStore::new());
        let mut busy = ambulance_at("busy", AmbulanceTier::Cct, INCIDENT_POS);
        busy.status = AmbulanceStatus::Transporting;
        store.insert_ambulance(busy);
        store.insert_ambulance(ambulance_at(
            "idle",
            AmbulanceTier::Bls,
            GeoPoint::new(3.10, 101.65),
        ));

        let ranked = selector(store)
            .select_candidates(INCIDENT_POS, None)
            .await
            .expect("candidates");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].ambulance.id, "idle");
    }

    #[tokio::test]
    async fn empty_fleet_is_a_normal_result() {
        let store = Arc::new(MemoryStore::new());
        let ranked = selector(store)
            .select_candidates(INCIDENT_POS, None)
            .await
            .expect("candidates");
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn seeded_random_fleet_respects_ordering_properties() {
        let store = Arc::new(MemoryStore::new());
        for ambulance in crate::test_helpers::random_fleet(7, 25) {
            store.insert_ambulance(ambulance);
        }

        let ranked = selector(store)
            .select_candidates(INCIDENT_POS, Some(AmbulanceTier::Bls))
            .await
            .expect("candidates");

        for candidate in &ranked {
            assert!(candidate.ambulance.tier >= AmbulanceTier::Bls);
            assert_eq!(candidate.ambulance.status, AmbulanceStatus::Idle);
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].route.eta_secs <= pair[1].route.eta_secs);
            if pair[0].route.eta_secs == pair[1].route.eta_secs {
                assert!(pair[0].route.distance_m <= pair[1].route.distance_m);
            }
        }
    }
}
