//! Domain records shared across the dispatch core: ambulances, incidents,
//! hospitals, and the capability tables that tie them together.

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Ambulance equipment level, ordered from lightest to heaviest.
///
/// The derived ordering is load-bearing: candidate filtering keeps units
/// whose tier is `>=` the required tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmbulanceTier {
    /// Rapid response vehicle.
    Rrv,
    /// Basic life support.
    Bls,
    /// Advanced life support.
    Als,
    /// Critical care transport.
    Cct,
}

impl AmbulanceTier {
    /// Hospital capability tags implied by transporting with this tier.
    /// Lighter tiers impose no destination constraint.
    pub fn required_capabilities(self) -> &'static [&'static str] {
        match self {
            AmbulanceTier::Rrv | AmbulanceTier::Bls => &[],
            AmbulanceTier::Als => &["ICU", "TRAUMA"],
            AmbulanceTier::Cct => &["ICU", "TRAUMA", "CT"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmbulanceStatus {
    Idle,
    EnRoute,
    OnScene,
    Transporting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambulance {
    pub id: String,
    /// Display label shown to dispatchers, e.g. "ALPHA-2".
    pub callsign: String,
    pub tier: AmbulanceTier,
    pub position: GeoPoint,
    /// Hospital the unit is based at; updated on drop-off.
    pub home_hospital: Option<String>,
    pub status: AmbulanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Low,
}

/// Medical nature of an incident; drives required hospital capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriageCategory {
    Stemi,
    Stroke,
    Trauma,
    Burns,
    Pediatric,
    General,
}

impl TriageCategory {
    /// Hospital capability tags this classification requires.
    pub fn required_capabilities(self) -> &'static [&'static str] {
        match self {
            TriageCategory::Stemi => &["PCI"],
            TriageCategory::Stroke => &["STROKE", "NEURO", "CT"],
            TriageCategory::Trauma => &["TRAUMA"],
            TriageCategory::Burns => &["BURNS"],
            TriageCategory::Pediatric => &["PEDIATRIC"],
            TriageCategory::General => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Pending,
    Dispatched,
    EnRoute,
    OnScene,
    Transporting,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub position: GeoPoint,
    pub severity: Severity,
    pub triage: Option<TriageCategory>,
    pub status: IncidentStatus,
    pub assigned_ambulance: Option<String>,
    pub destination_hospital: Option<String>,
    pub eta_secs: Option<u64>,
    pub route: Option<Vec<GeoPoint>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: String,
    pub name: String,
    pub position: GeoPoint,
    /// Capability tags (PCI, TRAUMA, STROKE, ...), compared case-insensitively.
    pub capabilities: Vec<String>,
    /// Reported occupancy 0-100, when the hospital publishes it.
    pub load: Option<u8>,
}

impl Hospital {
    /// Case-insensitive check whether this hospital carries any of `tags`.
    pub fn has_any_capability(&self, tags: &[String]) -> bool {
        self.capabilities
            .iter()
            .any(|have| tags.iter().any(|want| have.eq_ignore_ascii_case(want)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_is_strict() {
        assert!(AmbulanceTier::Rrv < AmbulanceTier::Bls);
        assert!(AmbulanceTier::Bls < AmbulanceTier::Als);
        assert!(AmbulanceTier::Als < AmbulanceTier::Cct);
    }

    #[test]
    fn triage_capability_tables() {
        assert_eq!(TriageCategory::Stemi.required_capabilities(), &["PCI"]);
        assert_eq!(
            TriageCategory::Stroke.required_capabilities(),
            &["STROKE", "NEURO", "CT"]
        );
        assert!(TriageCategory::General.required_capabilities().is_empty());
    }

    #[test]
    fn heavy_tiers_constrain_destination() {
        assert!(AmbulanceTier::Bls.required_capabilities().is_empty());
        assert!(AmbulanceTier::Cct
            .required_capabilities()
            .contains(&"CT"));
    }

    #[test]
    fn capability_match_is_case_insensitive() {
        let hospital = Hospital {
            id: "h1".into(),
            name: "General".into(),
            position: GeoPoint::new(3.0, 101.0),
            capabilities: vec!["pci".into(), "Trauma".into()],
            load: None,
        };
        assert!(hospital.has_any_capability(&["PCI".to_string()]));
        assert!(!hospital.has_any_capability(&["BURNS".to_string()]));
    }
}
