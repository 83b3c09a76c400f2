//! Lifecycle coordination: one actor task per active incident.
//!
//! A dispatch accepted by [`LifecycleCoordinator::start`] claims the
//! ambulance, registers a [`LifecycleState`] in the shared registry, and
//! spawns a task that drives the phase machine:
//!
//! ```text
//! OUTBOUND -> ON_SCENE -> DECISION -> INBOUND -> COMPLETE
//! ```
//!
//! Travel phases advance a progress fraction on a fixed tick, interpolating
//! the ambulance position along the phase route and writing it back to
//! storage; the on-scene dwell is a one-shot sleep. Cancellation removes the
//! registry entry and aborts the task before returning, and every tick write
//! is guarded by a registry liveness check, so a timer fire already in flight
//! at cancellation time becomes a no-op.

pub mod events;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::DispatchConfig;
use crate::geo::{self, GeoPoint};
use crate::model::{AmbulanceStatus, AmbulanceTier, IncidentStatus, Severity, TriageCategory};
use crate::routing::{RouteProvider, RouteResult, StraightLineProvider};
use crate::selection::DestinationSelector;
use crate::store::{AmbulanceUpdate, IncidentUpdate, Storage, StoreError};

use events::{DispatchEvent, EventBus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecyclePhase {
    Outbound,
    OnScene,
    Decision,
    Inbound,
    Complete,
}

/// Transient per-incident state; exists only while the lifecycle runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifecycleState {
    pub incident_id: String,
    pub phase: LifecyclePhase,
    /// Progress fraction within the current phase, 0..=1.
    pub progress: f64,
    /// Route geometry for the current travel phase; empty during dwell.
    pub route: Vec<GeoPoint>,
    /// Duration of the current phase in seconds.
    pub phase_secs: u64,
    /// Destination hospital, once the DECISION phase has chosen one.
    pub hospital_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything needed to begin a lifecycle for one incident.
#[derive(Clone, Debug)]
pub struct StartRequest {
    pub incident_id: String,
    pub ambulance_id: String,
    pub ambulance_position: GeoPoint,
    pub incident_position: GeoPoint,
    pub severity: Severity,
    pub tier: AmbulanceTier,
    pub triage: Option<TriageCategory>,
    /// Route already computed by the caller (e.g. during candidate
    /// selection); when absent the coordinator queries the route provider.
    pub precomputed_route: Option<RouteResult>,
}

struct ActiveLifecycle {
    ambulance_id: String,
    state: LifecycleState,
    task: Option<JoinHandle<()>>,
}

struct CoordinatorInner {
    store: Arc<dyn Storage>,
    router: Arc<dyn RouteProvider>,
    destinations: DestinationSelector,
    bus: Arc<dyn EventBus>,
    config: DispatchConfig,
    fallback: StraightLineProvider,
    active: Mutex<HashMap<String, ActiveLifecycle>>,
}

#[derive(Clone)]
pub struct LifecycleCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl LifecycleCoordinator {
    pub fn new(
        store: Arc<dyn Storage>,
        router: Arc<dyn RouteProvider>,
        destinations: DestinationSelector,
        bus: Arc<dyn EventBus>,
        config: DispatchConfig,
    ) -> Self {
        let fallback = StraightLineProvider::new(
            config.fallback_geometry_points,
            config.avg_speed_kmh,
            config.tortuosity,
        );
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                router,
                destinations,
                bus,
                config,
                fallback,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Begin a lifecycle. Idempotent: a second start for an incident id that
    /// is already tracked returns success without side effects, so duplicate
    /// dispatch requests never create duplicate timers.
    pub async fn start(&self, request: StartRequest) -> Result<(), DispatchError> {
        // Reserve the registry slot under the lock, before any await, so two
        // concurrent starts for the same incident cannot both pass the check.
        {
            let mut active = self.inner.active.lock();
            if active.contains_key(&request.incident_id) {
                tracing::debug!(incident = %request.incident_id, "lifecycle already active, ignoring start");
                return Ok(());
            }
            active.insert(
                request.incident_id.clone(),
                ActiveLifecycle {
                    ambulance_id: request.ambulance_id.clone(),
                    state: LifecycleState {
                        incident_id: request.incident_id.clone(),
                        phase: LifecyclePhase::Outbound,
                        progress: 0.0,
                        route: Vec::new(),
                        phase_secs: 0,
                        hospital_id: None,
                    },
                    task: None,
                },
            );
        }

        let route = match request.precomputed_route.clone() {
            Some(route) => route,
            None => match self
                .inner
                .router
                .route(request.ambulance_position, request.incident_position)
                .await
            {
                Ok(route) => route,
                Err(err) => {
                    tracing::warn!(error = %err, "outbound route failed, using straight-line fallback");
                    self.inner
                        .fallback
                        .estimate(request.ambulance_position, request.incident_position)
                }
            },
        };

        // A cancel may have landed while the route lookup was in flight; it
        // already removed the registry entry and reset the unit, so the claim
        // below must not happen.
        if !self.inner.is_active(&request.incident_id) {
            tracing::debug!(incident = %request.incident_id, "cancelled during route lookup, abandoning start");
            return Ok(());
        }

        // Claim the unit before the phase task exists: once this write lands,
        // no concurrent dispatch can observe the ambulance as IDLE.
        if let Err(err) = self
            .inner
            .store
            .update_ambulance(
                &request.ambulance_id,
                AmbulanceUpdate {
                    status: Some(AmbulanceStatus::EnRoute),
                    ..Default::default()
                },
            )
            .await
        {
            self.inner.active.lock().remove(&request.incident_id);
            return Err(err.into());
        }

        if let Err(err) = self
            .inner
            .store
            .update_incident(
                &request.incident_id,
                IncidentUpdate {
                    status: Some(IncidentStatus::Dispatched),
                    assigned_ambulance: Some(request.ambulance_id.clone()),
                    eta_secs: Some(route.eta_secs),
                    route: Some(route.geometry.clone()),
                    ..Default::default()
                },
            )
            .await
        {
            // The incident record belongs to the storage collaborator; a
            // missing record does not stop the simulation itself.
            tracing::warn!(incident = %request.incident_id, error = %err, "incident update failed");
        }

        tracing::info!(
            incident = %request.incident_id,
            ambulance = %request.ambulance_id,
            eta_secs = route.eta_secs,
            "lifecycle started"
        );

        let inner = Arc::clone(&self.inner);
        let ambulance_id = request.ambulance_id.clone();
        let spawned = {
            let mut active = self.inner.active.lock();
            match active.get_mut(&request.incident_id) {
                Some(entry) => {
                    entry.task = Some(tokio::spawn(run_lifecycle(inner, request, route)));
                    true
                }
                None => false,
            }
        };
        if !spawned {
            // Cancelled after the claim write; cancel's own reset may have
            // lost the race with that write, so undo the claim here.
            self.inner
                .write_ambulance(
                    &ambulance_id,
                    AmbulanceUpdate {
                        status: Some(AmbulanceStatus::Idle),
                        ..Default::default()
                    },
                )
                .await;
        }
        Ok(())
    }

    /// Cancel an active lifecycle. The registry entry is removed and the
    /// phase task aborted before anything else happens, so no position or
    /// status write for the bound ambulance can land after this returns.
    /// Returns `false` for unknown incident ids.
    pub async fn cancel(&self, incident_id: &str) -> bool {
        let entry = self.inner.active.lock().remove(incident_id);
        let Some(entry) = entry else {
            tracing::debug!(incident = %incident_id, "cancel requested for unknown incident");
            return false;
        };
        if let Some(task) = entry.task {
            task.abort();
        }

        if let Err(err) = self
            .inner
            .store
            .update_ambulance(
                &entry.ambulance_id,
                AmbulanceUpdate {
                    status: Some(AmbulanceStatus::Idle),
                    ..Default::default()
                },
            )
            .await
        {
            tracing::warn!(ambulance = %entry.ambulance_id, error = %err, "reset after cancel failed");
        }
        if let Err(err) = self
            .inner
            .store
            .update_incident(
                incident_id,
                IncidentUpdate {
                    status: Some(IncidentStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
        {
            tracing::warn!(incident = %incident_id, error = %err, "incident update failed");
        }

        self.inner.bus.publish(DispatchEvent::LifecycleCancelled {
            incident_id: incident_id.to_string(),
            ambulance_id: entry.ambulance_id,
        });
        tracing::info!(incident = %incident_id, "lifecycle cancelled");
        true
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    /// Snapshot of an active lifecycle, or `None` once it has completed or
    /// been cancelled.
    pub fn status(&self, incident_id: &str) -> Option<LifecycleState> {
        self.inner
            .active
            .lock()
            .get(incident_id)
            .map(|entry| entry.state.clone())
    }
}

impl CoordinatorInner {
    fn is_active(&self, incident_id: &str) -> bool {
        self.active.lock().contains_key(incident_id)
    }

    /// Enter a phase in the registry snapshot. Returns `false` when the
    /// lifecycle is no longer tracked (cancelled).
    fn enter_phase(
        &self,
        incident_id: &str,
        phase: LifecyclePhase,
        route: Vec<GeoPoint>,
        phase_secs: u64,
    ) -> bool {
        let mut active = self.active.lock();
        match active.get_mut(incident_id) {
            Some(entry) => {
                entry.state.phase = phase;
                entry.state.progress = 0.0;
                entry.state.route = route;
                entry.state.phase_secs = phase_secs;
                true
            }
            None => false,
        }
    }

    /// Record tick progress. Returns `false` when the lifecycle is gone,
    /// which callers must treat as "stop, write nothing".
    fn record_progress(&self, incident_id: &str, progress: f64) -> bool {
        let mut active = self.active.lock();
        match active.get_mut(incident_id) {
            Some(entry) => {
                entry.state.progress = progress;
                true
            }
            None => false,
        }
    }

    fn record_hospital(&self, incident_id: &str, hospital_id: &str) -> bool {
        let mut active = self.active.lock();
        match active.get_mut(incident_id) {
            Some(entry) => {
                entry.state.hospital_id = Some(hospital_id.to_string());
                true
            }
            None => false,
        }
    }

    fn remove(&self, incident_id: &str) {
        self.active.lock().remove(incident_id);
    }

    async fn write_ambulance(&self, ambulance_id: &str, update: AmbulanceUpdate) {
        if let Err(err) = self.store.update_ambulance(ambulance_id, update).await {
            tracing::warn!(ambulance = %ambulance_id, error = %err, "ambulance update failed");
        }
    }

    async fn write_incident(&self, incident_id: &str, update: IncidentUpdate) {
        if let Err(err) = self.store.update_incident(incident_id, update).await {
            tracing::warn!(incident = %incident_id, error = %err, "incident update failed");
        }
    }
}

async fn run_lifecycle(inner: Arc<CoordinatorInner>, request: StartRequest, outbound: RouteResult) {
    // OUTBOUND: ambulance -> incident.
    if !travel_phase(
        &inner,
        &request,
        LifecyclePhase::Outbound,
        &outbound,
        AmbulanceStatus::EnRoute,
        IncidentStatus::EnRoute,
    )
    .await
    {
        return;
    }

    // ON_SCENE: fixed dwell, no position change.
    let dwell_secs = inner.config.on_scene_dwell_ms.div_ceil(1_000);
    if !inner.enter_phase(
        &request.incident_id,
        LifecyclePhase::OnScene,
        Vec::new(),
        dwell_secs,
    ) {
        return;
    }
    inner
        .write_ambulance(
            &request.ambulance_id,
            AmbulanceUpdate {
                status: Some(AmbulanceStatus::OnScene),
                position: Some(request.incident_position),
                ..Default::default()
            },
        )
        .await;
    inner
        .write_incident(
            &request.incident_id,
            IncidentUpdate {
                status: Some(IncidentStatus::OnScene),
                ..Default::default()
            },
        )
        .await;
    inner.bus.publish(DispatchEvent::AmbulanceUpdate {
        ambulance_id: request.ambulance_id.clone(),
        position: request.incident_position,
        status: AmbulanceStatus::OnScene,
        phase: LifecyclePhase::OnScene,
        route: None,
        eta_secs: None,
    });
    tracing::debug!(incident = %request.incident_id, "on scene");
    tokio::time::sleep(inner.config.on_scene_dwell()).await;

    // DECISION: pick the receiving hospital.
    if !inner.enter_phase(&request.incident_id, LifecyclePhase::Decision, Vec::new(), 0) {
        return;
    }
    let choice = match inner
        .destinations
        .select_destination(
            request.incident_position,
            request.severity,
            Some(request.tier),
            request.triage,
        )
        .await
    {
        Ok(choice) => choice,
        Err(err) => {
            tracing::warn!(incident = %request.incident_id, error = %err, "hospital lookup failed");
            None
        }
    };
    let Some(choice) = choice else {
        // Recoverable outcome: release the unit and end the incident rather
        // than leaving the lifecycle stuck.
        tracing::warn!(incident = %request.incident_id, "no hospital available, terminating early");
        inner
            .write_ambulance(
                &request.ambulance_id,
                AmbulanceUpdate {
                    status: Some(AmbulanceStatus::Idle),
                    ..Default::default()
                },
            )
            .await;
        inner
            .write_incident(
                &request.incident_id,
                IncidentUpdate {
                    status: Some(IncidentStatus::Completed),
                    ..Default::default()
                },
            )
            .await;
        inner.bus.publish(DispatchEvent::LifecycleComplete {
            incident_id: request.incident_id.clone(),
            ambulance_id: request.ambulance_id.clone(),
            hospital_id: None,
        });
        inner.remove(&request.incident_id);
        return;
    };

    if !inner.record_hospital(&request.incident_id, &choice.hospital.id) {
        return;
    }
    inner
        .write_incident(
            &request.incident_id,
            IncidentUpdate {
                destination_hospital: Some(choice.hospital.id.clone()),
                eta_secs: Some(choice.route.eta_secs),
                ..Default::default()
            },
        )
        .await;
    inner.bus.publish(DispatchEvent::HospitalSelected {
        incident_id: request.incident_id.clone(),
        ambulance_id: request.ambulance_id.clone(),
        hospital_id: choice.hospital.id.clone(),
        hospital_position: choice.hospital.position,
        eta_secs: choice.route.eta_secs,
    });
    tracing::debug!(
        incident = %request.incident_id,
        hospital = %choice.hospital.id,
        "hospital selected"
    );

    // INBOUND: incident -> hospital, mirroring OUTBOUND.
    if !travel_phase(
        &inner,
        &request,
        LifecyclePhase::Inbound,
        &choice.route,
        AmbulanceStatus::Transporting,
        IncidentStatus::Transporting,
    )
    .await
    {
        return;
    }

    // COMPLETE: the unit redeploys to the destination hospital.
    if !inner.is_active(&request.incident_id) {
        return;
    }
    inner
        .write_ambulance(
            &request.ambulance_id,
            AmbulanceUpdate {
                status: Some(AmbulanceStatus::Idle),
                position: Some(choice.hospital.position),
                home_hospital: Some(choice.hospital.id.clone()),
            },
        )
        .await;
    inner
        .write_incident(
            &request.incident_id,
            IncidentUpdate {
                status: Some(IncidentStatus::Completed),
                ..Default::default()
            },
        )
        .await;
    inner.bus.publish(DispatchEvent::LifecycleComplete {
        incident_id: request.incident_id.clone(),
        ambulance_id: request.ambulance_id.clone(),
        hospital_id: Some(choice.hospital.id.clone()),
    });
    inner.remove(&request.incident_id);
    tracing::info!(
        incident = %request.incident_id,
        ambulance = %request.ambulance_id,
        hospital = %choice.hospital.id,
        "lifecycle complete"
    );
}

/// Drive one travel phase tick-by-tick. Returns `false` if the lifecycle was
/// cancelled mid-phase; the caller must stop immediately.
async fn travel_phase(
    inner: &Arc<CoordinatorInner>,
    request: &StartRequest,
    phase: LifecyclePhase,
    route: &RouteResult,
    ambulance_status: AmbulanceStatus,
    incident_status: IncidentStatus,
) -> bool {
    // Duration floor guarantees visible progress even for a zero-distance leg.
    let phase_secs = route.eta_secs.max(inner.config.min_phase_secs);
    let tick_ms = inner.config.tick_ms.max(1);
    let total_ticks = ((phase_secs * 1_000).div_ceil(tick_ms)).max(1);

    if !inner.enter_phase(
        &request.incident_id,
        phase,
        route.geometry.clone(),
        phase_secs,
    ) {
        return false;
    }

    let start_pos = route
        .geometry
        .first()
        .copied()
        .unwrap_or(request.ambulance_position);
    inner
        .write_ambulance(
            &request.ambulance_id,
            AmbulanceUpdate {
                status: Some(ambulance_status),
                position: Some(start_pos),
                ..Default::default()
            },
        )
        .await;
    inner
        .write_incident(
            &request.incident_id,
            IncidentUpdate {
                status: Some(incident_status),
                eta_secs: Some(phase_secs),
                route: Some(route.geometry.clone()),
                ..Default::default()
            },
        )
        .await;
    // Phase-entry event carries the full geometry; tick events do not.
    inner.bus.publish(DispatchEvent::AmbulanceUpdate {
        ambulance_id: request.ambulance_id.clone(),
        position: start_pos,
        status: ambulance_status,
        phase,
        route: Some(route.geometry.clone()),
        eta_secs: Some(phase_secs),
    });
    tracing::debug!(incident = %request.incident_id, ?phase, phase_secs, "travel phase started");

    let mut interval = tokio::time::interval(inner.config.tick());
    interval.tick().await; // first tick completes immediately

    let mut position = start_pos;
    for tick in 1..=total_ticks {
        interval.tick().await;

        let progress = tick as f64 / total_ticks as f64;
        // Liveness check before any write: a cancel between timer fire and
        // here must turn this tick into a no-op.
        if !inner.record_progress(&request.incident_id, progress) {
            return false;
        }

        position = geo::position_at_progress(&route.geometry, progress).unwrap_or(position);
        inner
            .write_ambulance(
                &request.ambulance_id,
                AmbulanceUpdate {
                    position: Some(position),
                    ..Default::default()
                },
            )
            .await;

        let remaining = (phase_secs as f64 * (1.0 - progress)).round() as u64;
        inner.bus.publish(DispatchEvent::AmbulanceUpdate {
            ambulance_id: request.ambulance_id.clone(),
            position,
            status: ambulance_status,
            phase,
            route: None,
            eta_secs: Some(remaining),
        });
    }
    true
}
