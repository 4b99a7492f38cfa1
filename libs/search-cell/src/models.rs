use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{GeoPoint, ServiceCode, TimeWindow, UrgencyTier};

/// A citizen's search: where they are, what they need, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub location: GeoPoint,
    pub service: ServiceCode,
    /// Without a window every upcoming slot is a candidate.
    #[serde(default)]
    pub window: Option<TimeWindow>,
    #[serde(default)]
    pub urgency: UrgencyTier,
    /// Defaults to the configured radius ceiling.
    pub radius_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSlot {
    pub slot_id: Uuid,
    pub facility_id: u32,
    pub facility_name: String,
    pub address: String,
    pub service: ServiceCode,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub remaining: u32,
    pub distance_km: f64,
    pub wait_hours: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub distance_weight: f64,
    pub wait_weight: f64,
    pub routine_multiplier: f64,
    pub priority_multiplier: f64,
    pub urgent_multiplier: f64,
}

impl RankingWeights {
    pub fn urgency_multiplier(&self, tier: UrgencyTier) -> f64 {
        match tier {
            UrgencyTier::Routine => self.routine_multiplier,
            UrgencyTier::Priority => self.priority_multiplier,
            UrgencyTier::Urgent => self.urgent_multiplier,
        }
    }

    /// Lower is better.
    pub fn score(&self, distance_km: f64, wait_hours: f64, tier: UrgencyTier) -> f64 {
        self.distance_weight * distance_km
            + self.wait_weight * self.urgency_multiplier(tier) * wait_hours
    }
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            distance_weight: 1.0,
            wait_weight: 0.5,
            routine_multiplier: 1.0,
            priority_multiplier: 2.0,
            urgent_multiplier: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    pub radius_ceiling_km: f64,
    pub max_candidate_facilities: usize,
    pub max_results: usize,
    pub weights: RankingWeights,
}

impl PlannerConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            radius_ceiling_km: config.radius_ceiling_km,
            max_candidate_facilities: config.max_candidate_facilities,
            max_results: config.max_results,
            weights: RankingWeights {
                distance_weight: config.distance_weight,
                wait_weight: config.wait_weight,
                routine_multiplier: config.routine_multiplier,
                priority_multiplier: config.priority_multiplier,
                urgent_multiplier: config.urgent_multiplier,
            },
        }
    }
}
