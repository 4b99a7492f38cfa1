use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub radius_ceiling_km: f64,
    pub max_candidate_facilities: usize,
    pub max_results: usize,
    pub default_hold_ttl_seconds: u64,
    pub max_hold_ttl_seconds: u64,
    pub hold_sweep_interval_seconds: u64,
    pub grid_cell_degrees: f64,
    pub event_channel_capacity: usize,
    pub ingest_workers: usize,
    pub snapshot_path: Option<String>,
    pub snapshot_interval_seconds: u64,
    pub distance_weight: f64,
    pub wait_weight: f64,
    pub routine_multiplier: f64,
    pub priority_multiplier: f64,
    pub urgent_multiplier: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            radius_ceiling_km: 50.0,
            max_candidate_facilities: 20,
            max_results: 20,
            default_hold_ttl_seconds: 300,
            max_hold_ttl_seconds: 900,
            hold_sweep_interval_seconds: 5,
            grid_cell_degrees: 0.1,
            event_channel_capacity: 1024,
            ingest_workers: 4,
            snapshot_path: None,
            snapshot_interval_seconds: 30,
            distance_weight: 1.0,
            wait_weight: 0.5,
            routine_multiplier: 1.0,
            priority_multiplier: 2.0,
            urgent_multiplier: 4.0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            bind_addr: env::var("SUS_BIND_ADDR").unwrap_or_else(|_| {
                warn!("SUS_BIND_ADDR not set, using default");
                defaults.bind_addr.clone()
            }),
            radius_ceiling_km: parse_or("SUS_RADIUS_CEILING_KM", defaults.radius_ceiling_km),
            max_candidate_facilities: parse_or(
                "SUS_MAX_CANDIDATE_FACILITIES",
                defaults.max_candidate_facilities,
            ),
            max_results: parse_or("SUS_MAX_RESULTS", defaults.max_results),
            default_hold_ttl_seconds: parse_or(
                "SUS_DEFAULT_HOLD_TTL_SECONDS",
                defaults.default_hold_ttl_seconds,
            ),
            max_hold_ttl_seconds: parse_or(
                "SUS_MAX_HOLD_TTL_SECONDS",
                defaults.max_hold_ttl_seconds,
            ),
            hold_sweep_interval_seconds: parse_or(
                "SUS_HOLD_SWEEP_INTERVAL_SECONDS",
                defaults.hold_sweep_interval_seconds,
            ),
            grid_cell_degrees: parse_or("SUS_GRID_CELL_DEGREES", defaults.grid_cell_degrees),
            event_channel_capacity: parse_or(
                "SUS_EVENT_CHANNEL_CAPACITY",
                defaults.event_channel_capacity,
            ),
            ingest_workers: parse_or("SUS_INGEST_WORKERS", defaults.ingest_workers),
            snapshot_path: env::var("SUS_SNAPSHOT_PATH").ok().filter(|p| !p.is_empty()),
            snapshot_interval_seconds: parse_or(
                "SUS_SNAPSHOT_INTERVAL_SECONDS",
                defaults.snapshot_interval_seconds,
            ),
            distance_weight: parse_or("SUS_DISTANCE_WEIGHT", defaults.distance_weight),
            wait_weight: parse_or("SUS_WAIT_WEIGHT", defaults.wait_weight),
            routine_multiplier: parse_or("SUS_ROUTINE_MULTIPLIER", defaults.routine_multiplier),
            priority_multiplier: parse_or("SUS_PRIORITY_MULTIPLIER", defaults.priority_multiplier),
            urgent_multiplier: parse_or("SUS_URGENT_MULTIPLIER", defaults.urgent_multiplier),
        };

        if !config.is_valid() {
            warn!("Configuration has out-of-range values, using defaults for limits and weights");
            return Self {
                radius_ceiling_km: defaults.radius_ceiling_km,
                max_candidate_facilities: defaults.max_candidate_facilities,
                max_results: defaults.max_results,
                grid_cell_degrees: defaults.grid_cell_degrees,
                distance_weight: defaults.distance_weight,
                wait_weight: defaults.wait_weight,
                routine_multiplier: defaults.routine_multiplier,
                priority_multiplier: defaults.priority_multiplier,
                urgent_multiplier: defaults.urgent_multiplier,
                default_hold_ttl_seconds: defaults.default_hold_ttl_seconds,
                max_hold_ttl_seconds: defaults.max_hold_ttl_seconds,
                ..config
            };
        }

        if config.snapshot_path.is_none() {
            warn!("SUS_SNAPSHOT_PATH not set, slot state will not survive restarts");
        }

        config
    }

    pub fn is_valid(&self) -> bool {
        self.radius_ceiling_km > 0.0
            && self.max_candidate_facilities > 0
            && self.max_results > 0
            && self.grid_cell_degrees > 0.0
            && self.grid_cell_degrees <= 10.0
            && self.distance_weight >= 0.0
            && self.wait_weight >= 0.0
            && self.routine_multiplier >= 0.0
            && self.priority_multiplier >= 0.0
            && self.urgent_multiplier >= 0.0
            && self.default_hold_ttl_seconds > 0
            && self.default_hold_ttl_seconds <= self.max_hold_ttl_seconds
    }

    pub fn is_persistence_configured(&self) -> bool {
        self.snapshot_path.is_some()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an unparsable value {:?}, using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
