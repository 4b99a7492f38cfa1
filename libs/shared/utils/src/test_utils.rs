use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{GeoPoint, ServiceCode};

use crate::clock::ManualClock;

pub struct TestConfig {
    pub radius_ceiling_km: f64,
    pub max_candidate_facilities: usize,
    pub max_results: usize,
    pub max_hold_ttl_seconds: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            radius_ceiling_km: 25.0,
            max_candidate_facilities: 10,
            max_results: 10,
            max_hold_ttl_seconds: 600,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            radius_ceiling_km: self.radius_ceiling_km,
            max_candidate_facilities: self.max_candidate_facilities,
            max_results: self.max_results,
            default_hold_ttl_seconds: 60,
            max_hold_ttl_seconds: self.max_hold_ttl_seconds,
            hold_sweep_interval_seconds: 1,
            grid_cell_degrees: 0.05,
            event_channel_capacity: 64,
            ingest_workers: 2,
            snapshot_path: None,
            snapshot_interval_seconds: 30,
            distance_weight: 1.0,
            wait_weight: 0.5,
            routine_multiplier: 1.0,
            priority_multiplier: 2.0,
            urgent_multiplier: 4.0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Fixed instant all tests start from: Monday 2025-03-10 08:00 UTC.
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

pub fn test_clock() -> ManualClock {
    ManualClock::new(test_epoch())
}

pub fn hours_after_epoch(hours: i64) -> DateTime<Utc> {
    test_epoch() + Duration::hours(hours)
}

pub struct TestLocations;

impl TestLocations {
    pub fn praca_da_se() -> GeoPoint {
        GeoPoint::new(-23.5505, -46.6333)
    }

    pub fn avenida_paulista() -> GeoPoint {
        GeoPoint::new(-23.5614, -46.6559)
    }

    pub fn santo_amaro() -> GeoPoint {
        GeoPoint::new(-23.6536, -46.7075)
    }

    pub fn campinas() -> GeoPoint {
        GeoPoint::new(-22.9099, -47.0626)
    }
}

pub struct TestServices;

impl TestServices {
    /// Cardiology consultation.
    pub fn cardiology() -> ServiceCode {
        ServiceCode::new(125, 1)
    }

    /// Routine vaccination.
    pub fn vaccination() -> ServiceCode {
        ServiceCode::new(143, 2)
    }

    /// Catalogued but offered by no test facility.
    pub fn dermatology() -> ServiceCode {
        ServiceCode::new(131, 1)
    }
}

pub struct SamplePayloads;

impl SamplePayloads {
    pub fn slot_created(
        slot_id: Uuid,
        sequence: u64,
        facility_id: u32,
        service: ServiceCode,
        start_time: DateTime<Utc>,
        capacity: u32,
    ) -> serde_json::Value {
        json!({
            "type": "slot_created",
            "slot_id": slot_id,
            "sequence": sequence,
            "facility_id": facility_id,
            "service": service,
            "start_time": start_time.to_rfc3339(),
            "duration_minutes": 30,
            "capacity": capacity
        })
    }

    pub fn slot_cancelled(slot_id: Uuid, sequence: u64) -> serde_json::Value {
        json!({
            "type": "slot_cancelled",
            "slot_id": slot_id,
            "sequence": sequence
        })
    }

    pub fn capacity_changed(slot_id: Uuid, sequence: u64, capacity: u32) -> serde_json::Value {
        json!({
            "type": "capacity_changed",
            "slot_id": slot_id,
            "sequence": sequence,
            "capacity": capacity
        })
    }

    pub fn slot_rescheduled(
        slot_id: Uuid,
        sequence: u64,
        start_time: DateTime<Utc>,
    ) -> serde_json::Value {
        json!({
            "type": "slot_rescheduled",
            "slot_id": slot_id,
            "sequence": sequence,
            "start_time": start_time.to_rfc3339(),
            "duration_minutes": 30
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default().to_app_config();

        assert_eq!(config.radius_ceiling_km, 25.0);
        assert!(config.is_valid());
        assert!(!config.is_persistence_configured());
    }

    #[test]
    fn test_clock_starts_at_epoch_and_advances() {
        let clock = test_clock();
        assert_eq!(clock.now(), test_epoch());

        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), test_epoch() + Duration::minutes(90));
    }

    #[test]
    fn test_sample_payload_shape() {
        let payload = SamplePayloads::slot_cancelled(Uuid::new_v4(), 3);
        assert_eq!(payload["type"], "slot_cancelled");
        assert_eq!(payload["sequence"], 3);
    }
}
