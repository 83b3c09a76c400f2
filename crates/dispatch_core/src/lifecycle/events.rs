//! Dispatch event fan-out.
//!
//! Events are a tagged union published fire-and-forget; the bus offers no
//! acknowledgment and no delivery guarantee. [`BroadcastBus`] fans out over
//! `tokio::sync::broadcast`, so slow or disconnected subscribers simply miss
//! events instead of building a backlog.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::geo::GeoPoint;
use crate::model::AmbulanceStatus;

use super::LifecyclePhase;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// Live position/status of an ambulance mid-lifecycle. Route geometry is
    /// attached only on phase entry, not on every tick.
    AmbulanceUpdate {
        ambulance_id: String,
        position: GeoPoint,
        status: AmbulanceStatus,
        phase: LifecyclePhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        route: Option<Vec<GeoPoint>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        eta_secs: Option<u64>,
    },
    HospitalSelected {
        incident_id: String,
        ambulance_id: String,
        hospital_id: String,
        hospital_position: GeoPoint,
        eta_secs: u64,
    },
    /// Lifecycle reached COMPLETE, or terminated early from DECISION when no
    /// hospital was available (`hospital_id` is `None` in that case).
    LifecycleComplete {
        incident_id: String,
        ambulance_id: String,
        hospital_id: Option<String>,
    },
    LifecycleCancelled {
        incident_id: String,
        ambulance_id: String,
    },
}

/// Fire-and-forget event sink.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: DispatchEvent);
}

/// Broadcast-channel bus for connected dispatcher sessions.
pub struct BroadcastBus {
    tx: broadcast::Sender<DispatchEvent>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.tx.subscribe()
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, event: DispatchEvent) {
        // Err means no subscribers are connected right now; events are not queued.
        let _ = self.tx.send(event);
    }
}

/// Discards everything; used when no dispatcher UI is attached.
pub struct NullBus;

impl EventBus for NullBus {
    fn publish(&self, _event: DispatchEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_as_tagged_union() {
        let event = DispatchEvent::HospitalSelected {
            incident_id: "inc-1".into(),
            ambulance_id: "amb-1".into(),
            hospital_id: "hosp-1".into(),
            hospital_position: GeoPoint::new(3.1, 101.6),
            eta_secs: 420,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "hospital_selected");
        assert_eq!(json["eta_secs"], 420);

        let back: DispatchEvent = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn tick_updates_omit_empty_route() {
        let event = DispatchEvent::AmbulanceUpdate {
            ambulance_id: "amb-1".into(),
            position: GeoPoint::new(3.1, 101.6),
            status: AmbulanceStatus::EnRoute,
            phase: LifecyclePhase::Outbound,
            route: None,
            eta_secs: None,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert!(json.get("route").is_none());
        assert!(json.get("eta_secs").is_none());
    }

    #[tokio::test]
    async fn broadcast_bus_fans_out_to_subscribers() {
        let bus = BroadcastBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(DispatchEvent::LifecycleCancelled {
            incident_id: "inc-1".into(),
            ambulance_id: "amb-1".into(),
        });
        let event = rx.recv().await.expect("event");
        assert!(matches!(event, DispatchEvent::LifecycleCancelled { .. }));
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = BroadcastBus::new(16);
        bus.publish(DispatchEvent::LifecycleCancelled {
            incident_id: "inc-1".into(),
            ambulance_id: "amb-1".into(),
        });
    }
}
