//! Destination selection: pick the receiving hospital for an incident.
//!
//! Required capabilities are derived from the triage classification (HIGH
//! severity only) and the transporting ambulance tier. Hospitals matching
//! any required tag survive filtering; when nothing matches, the full set is
//! used instead -- availability beats specialization. Survivors are routed,
//! hazard-penalized, and ranked by the configured [`RankingPolicy`].

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::geo::GeoPoint;
use crate::hazards::{HazardAdvisor, HazardSource};
use crate::model::{AmbulanceTier, Hospital, Severity, TriageCategory};
use crate::routing::{RouteProvider, RouteResult};
use crate::store::{Storage, StoreError};

/// Load value assumed for hospitals that do not report one.
const NEUTRAL_LOAD: f64 = 50.0;

/// ETA ceiling used to normalize the blended score.
const ETA_CEILING_SECS: f64 = 3_600.0;

/// How surviving hospitals are ranked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingPolicy {
    /// Ascending hazard-penalized distance; ETA breaks ties.
    #[default]
    NearestFirst,
    /// 40% normalized reported load + 60% ETA capped at one hour. Hospitals
    /// without load data score a neutral mid-value, so ranking degrades to
    /// ETA ordering when no one reports load.
    LoadBlended,
}

/// The chosen hospital with its penalized route from the incident.
#[derive(Clone, Debug)]
pub struct DestinationChoice {
    pub hospital: Hospital,
    pub route: RouteResult,
}

pub struct DestinationSelector {
    store: Arc<dyn Storage>,
    router: Arc<dyn RouteProvider>,
    hazards: HazardAdvisor,
    policy: RankingPolicy,
}

impl DestinationSelector {
    pub fn new(
        store: Arc<dyn Storage>,
        router: Arc<dyn RouteProvider>,
        hazards: HazardAdvisor,
        policy: RankingPolicy,
    ) -> Self {
        Self {
            store,
            router,
            hazards,
            policy,
        }
    }

    /// Selector whose hazard penalty and ranking policy come from the shared
    /// parameter set.
    pub fn from_config(
        store: Arc<dyn Storage>,
        router: Arc<dyn RouteProvider>,
        hazards: Arc<dyn HazardSource>,
        config: &DispatchConfig,
    ) -> Self {
        Self::new(
            store,
            router,
            HazardAdvisor::from_config(hazards, config),
            config.ranking_policy,
        )
    }

    /// Union of capability tags required by triage and ambulance tier.
    /// Triage requirements apply only to HIGH-severity incidents.
    pub fn required_capabilities(
        severity: Severity,
        tier: Option<AmbulanceTier>,
        triage: Option<TriageCategory>,
    ) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        if severity == Severity::High {
            if let Some(triage) = triage {
                tags.extend(triage.required_capabilities().iter().map(|t| t.to_string()));
            }
        }
        if let Some(tier) = tier {
            for tag in tier.required_capabilities() {
                if !tags.iter().any(|have| have.eq_ignore_ascii_case(tag)) {
                    tags.push(tag.to_string());
                }
            }
        }
        tags
    }

    /// Pick the best hospital for an incident, or `None` when no hospitals
    /// are configured at all.
    pub async fn select_destination(
        &self,
        incident_pos: GeoPoint,
        severity: Severity,
        tier: Option<AmbulanceTier>,
        triage: Option<TriageCategory>,
    ) -> Result<Option<DestinationChoice>, StoreError> {
        let all = self.store.hospitals().await?;
        if all.is_empty() {
            return Ok(None);
        }

        let required = Self::required_capabilities(severity, tier, triage);
        let filtered: Vec<Hospital> = if required.is_empty() {
            all.clone()
        } else {
            all.iter()
                .filter(|h| h.has_any_capability(&required))
                .cloned()
                .collect()
        };
        // Fall back to the full set rather than returning nothing.
        let candidates = if filtered.is_empty() { all } else { filtered };

        let mut scored = Vec::with_capacity(candidates.len());
        for hospital in candidates {
            match self.router.route(incident_pos, hospital.position).await {
                Ok(route) => {
                    let route = self.hazards.apply_penalty(&route);
                    scored.push(DestinationChoice { hospital, route });
                }
                Err(err) => {
                    tracing::warn!(
                        hospital = %hospital.id,
                        error = %err,
                        "route computation failed, skipping hospital"
                    );
                }
            }
        }

        scored.sort_by(|a, b| self.compare(a, b));
        Ok(scored.into_iter().next())
    }

    fn compare(&self, a: &DestinationChoice, b: &DestinationChoice) -> Ordering {
        match self.policy {
            RankingPolicy::NearestFirst => a
                .route
                .distance_m
                .partial_cmp(&b.route.distance_m)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.route.eta_secs.cmp(&b.route.eta_secs))
                .then_with(|| a.hospital.id.cmp(&b.hospital.id)),
            RankingPolicy::LoadBlended => blended_score(a)
                .partial_cmp(&blended_score(b))
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.route
                        .distance_m
                        .partial_cmp(&b.route.distance_m)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.hospital.id.cmp(&b.hospital.id)),
        }
    }
}

fn blended_score(choice: &DestinationChoice) -> f64 {
    let load = choice.hospital.load.map(f64::from).unwrap_or(NEUTRAL_LOAD) / 100.0;
    let eta = (choice.route.eta_secs as f64).min(ETA_CEILING_SECS) / ETA_CEILING_SECS;
    0.4 * load + 0.6 * eta
}
