use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_models::{GeoPoint, ServiceCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    /// CNES registry code.
    pub cnes: u32,
    pub name: String,
    pub kind: Option<String>,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub cep: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub shift: Option<String>,
    pub services: BTreeSet<ServiceCode>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Facility {
    pub fn offers(&self, service: &ServiceCode) -> bool {
        self.services.contains(service)
    }

    /// "street, number, district" with missing parts left out.
    pub fn full_address(&self) -> String {
        [&self.address, &self.number, &self.district]
            .iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalService {
    pub code: ServiceCode,
    pub service_name: String,
    pub classification_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertFacilityRequest {
    pub name: String,
    pub kind: Option<String>,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub cep: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub shift: Option<String>,
    pub services: Vec<ServiceCode>,
}

impl UpsertFacilityRequest {
    pub fn new(name: &str, location: GeoPoint, services: Vec<ServiceCode>) -> Self {
        Self {
            name: name.to_string(),
            kind: None,
            location,
            address: None,
            number: None,
            district: None,
            city: None,
            state: None,
            cep: None,
            telephone: None,
            email: None,
            shift: None,
            services,
        }
    }
}

/// A facility returned by a proximity query.
#[derive(Debug, Clone)]
pub struct FacilityMatch {
    pub facility: Arc<Facility>,
    pub distance_km: f64,
}

/// Public listing entry for nearby facilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyFacility {
    pub cnes: u32,
    pub name: String,
    pub address: String,
    pub kind: Option<String>,
    pub distance_km: f64,
}

impl From<&FacilityMatch> for NearbyFacility {
    fn from(m: &FacilityMatch) -> Self {
        Self {
            cnes: m.facility.cnes,
            name: m.facility.name.clone(),
            address: m.facility.full_address(),
            kind: m.facility.kind.clone(),
            distance_km: m.distance_km,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FacilityIndexStats {
    pub total_facilities: usize,
    pub active_facilities: usize,
    pub catalogued_services: usize,
}
