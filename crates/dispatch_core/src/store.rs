//! Storage collaborator boundary.
//!
//! The core never owns persistence; it works against the [`Storage`] trait
//! and writes partial updates back on every tick. [`MemoryStore`] is the
//! in-process implementation used by tests and single-node wiring. Each call
//! is individually atomic and read-after-write consistent; no multi-record
//! transactions are assumed.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::geo::GeoPoint;
use crate::model::{
    Ambulance, AmbulanceStatus, Hospital, Incident, IncidentStatus,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("ambulance {0} not found")]
    AmbulanceNotFound(String),
    #[error("hospital {0} not found")]
    HospitalNotFound(String),
    #[error("incident {0} not found")]
    IncidentNotFound(String),
}

/// Partial ambulance update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AmbulanceUpdate {
    pub status: Option<AmbulanceStatus>,
    pub position: Option<GeoPoint>,
    pub home_hospital: Option<String>,
}

/// Partial incident update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct IncidentUpdate {
    pub status: Option<IncidentStatus>,
    pub assigned_ambulance: Option<String>,
    pub destination_hospital: Option<String>,
    pub eta_secs: Option<u64>,
    pub route: Option<Vec<GeoPoint>>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn ambulance(&self, id: &str) -> Result<Ambulance, StoreError>;
    async fn update_ambulance(&self, id: &str, update: AmbulanceUpdate) -> Result<(), StoreError>;
    /// Fleet snapshot restricted to units currently IDLE.
    async fn idle_ambulances(&self) -> Result<Vec<Ambulance>, StoreError>;
    async fn hospital(&self, id: &str) -> Result<Hospital, StoreError>;
    async fn hospitals(&self) -> Result<Vec<Hospital>, StoreError>;
    async fn incident(&self, id: &str) -> Result<Incident, StoreError>;
    async fn update_incident(&self, id: &str, update: IncidentUpdate) -> Result<(), StoreError>;
}

#[derive(Default)]
struct MemoryStoreInner {
    ambulances: HashMap<String, Ambulance>,
    hospitals: HashMap<String, Hospital>,
    incidents: HashMap<String, Incident>,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_ambulance(&self, ambulance: Ambulance) {
        self.inner
            .lock()
            .ambulances
            .insert(ambulance.id.clone(), ambulance);
    }

    pub fn insert_hospital(&self, hospital: Hospital) {
        self.inner
            .lock()
            .hospitals
            .insert(hospital.id.clone(), hospital);
    }

    pub fn insert_incident(&self, incident: Incident) {
        self.inner
            .lock()
            .incidents
            .insert(incident.id.clone(), incident);
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn ambulance(&self, id: &str) -> Result<Ambulance, StoreError> {
        self.inner
            .lock()
            .ambulances
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::AmbulanceNotFound(id.to_string()))
    }

    async fn update_ambulance(&self, id: &str, update: AmbulanceUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let ambulance = inner
            .ambulances
            .get_mut(id)
            .ok_or_else(|| StoreError::AmbulanceNotFound(id.to_string()))?;
        if let Some(status) = update.status {
            ambulance.status = status;
        }
        if let Some(position) = update.position {
            ambulance.position = position;
        }
        if let Some(home) = update.home_hospital {
            ambulance.home_hospital = Some(home);
        }
        Ok(())
    }

    async fn idle_ambulances(&self) -> Result<Vec<Ambulance>, StoreError> {
        Ok(self
            .inner
            .lock()
            .ambulances
            .values()
            .filter(|a| a.status == AmbulanceStatus::Idle)
            .cloned()
            .collect())
    }

    async fn hospital(&self, id: &str) -> Result<Hospital, StoreError> {
        self.inner
            .lock()
            .hospitals
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::HospitalNotFound(id.to_string()))
    }

    async fn hospitals(&self) -> Result<Vec<Hospital>, StoreError> {
        Ok(self.inner.lock().hospitals.values().cloned().collect())
    }

    async fn incident(&self, id: &str) -> Result<Incident, StoreError> {
        self.inner
            .lock()
            .incidents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::IncidentNotFound(id.to_string()))
    }

    async fn update_incident(&self, id: &str, update: IncidentUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let incident = inner
            .incidents
            .get_mut(id)
            .ok_or_else(|| StoreError::IncidentNotFound(id.to_string()))?;
        if let Some(status) = update.status {
            incident.status = status;
        }
        if let Some(ambulance) = update.assigned_ambulance {
            incident.assigned_ambulance = Some(ambulance);
        }
        if let Some(hospital) = update.destination_hospital {
            incident.destination_hospital = Some(hospital);
        }
        if let Some(eta) = update.eta_secs {
            incident.eta_secs = Some(eta);
        }
        if let Some(route) = update.route {
            incident.route = Some(route);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AmbulanceTier;

    fn unit(id: &str, status: AmbulanceStatus) -> Ambulance {
        Ambulance {
            id: id.to_string(),
            callsign: format!("UNIT-{id}"),
            tier: AmbulanceTier::Bls,
            position: GeoPoint::new(3.07, 101.60),
            home_hospital: None,
            status,
        }
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields_untouched() {
        let store = MemoryStore::new();
        store.insert_ambulance(unit("a1", AmbulanceStatus::Idle));

        store
            .update_ambulance(
                "a1",
                AmbulanceUpdate {
                    status: Some(AmbulanceStatus::EnRoute),
                    ..Default::default()
                },
            )
            .await
            .expect("update");

        let ambulance = store.ambulance("a1").await.expect("ambulance");
        assert_eq!(ambulance.status, AmbulanceStatus::EnRoute);
        assert_eq!(ambulance.position, GeoPoint::new(3.07, 101.60));
        assert_eq!(ambulance.callsign, "UNIT-a1");
    }

    #[tokio::test]
    async fn idle_filter_excludes_busy_units() {
        let store = MemoryStore::new();
        store.insert_ambulance(unit("a1", AmbulanceStatus::Idle));
        store.insert_ambulance(unit("a2", AmbulanceStatus::EnRoute));
        store.insert_ambulance(unit("a3", AmbulanceStatus::Transporting));

        let idle = store.idle_ambulances().await.expect("idle");
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].id, "a1");
    }

    #[tokio::test]
    async fn missing_records_are_reported() {
        let store = MemoryStore::new();
        assert_eq!(
            store.ambulance("nope").await,
            Err(StoreError::AmbulanceNotFound("nope".to_string()))
        );
        assert_eq!(
            store
                .update_incident("nope", IncidentUpdate::default())
                .await,
            Err(StoreError::IncidentNotFound("nope".to_string()))
        );
    }
}
