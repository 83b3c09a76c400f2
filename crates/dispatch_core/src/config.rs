//! Tunable parameters for the dispatch core, bundled into a serializable
//! parameter set so harnesses can persist and replay configurations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geo::{AVG_SPEED_KMH, ROAD_TORTUOSITY};
use crate::selection::RankingPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Lifecycle tick interval in milliseconds.
    pub tick_ms: u64,
    /// On-scene dwell between arrival and the hospital decision.
    pub on_scene_dwell_ms: u64,
    /// Minimum travel-phase duration in seconds, so near-zero-distance
    /// incidents still show visible progress.
    pub min_phase_secs: u64,
    /// Fixed delay added per active hazard crossed by a route.
    pub hazard_penalty_secs: u64,
    /// Average speed assumed by the straight-line route fallback.
    pub avg_speed_kmh: f64,
    /// Straight-line to road-distance multiplier for the fallback.
    pub tortuosity: f64,
    /// Number of points in the densified fallback geometry.
    pub fallback_geometry_points: usize,
    pub ranking_policy: RankingPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            on_scene_dwell_ms: 3_000,
            min_phase_secs: 5,
            hazard_penalty_secs: 600,
            avg_speed_kmh: AVG_SPEED_KMH,
            tortuosity: ROAD_TORTUOSITY,
            fallback_geometry_points: 20,
            ranking_policy: RankingPolicy::default(),
        }
    }
}

impl DispatchConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn on_scene_dwell(&self) -> Duration {
        Duration::from_millis(self.on_scene_dwell_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let config = DispatchConfig::default();
        assert_eq!(config.tick(), Duration::from_secs(1));
        assert_eq!(config.on_scene_dwell(), Duration::from_secs(3));
        assert_eq!(config.min_phase_secs, 5);
        assert_eq!(config.hazard_penalty_secs, 600);
    }

    #[test]
    fn round_trips_through_serde() {
        let config = DispatchConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: DispatchConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
