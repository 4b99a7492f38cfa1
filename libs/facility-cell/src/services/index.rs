use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use shared_models::{GeoPoint, ServiceCode};

use crate::error::FacilityError;
use crate::models::{
    Facility, FacilityIndexStats, FacilityMatch, MedicalService, UpsertFacilityRequest,
};
use crate::services::grid::{Grid, GridCell};

/// Immutable view of the registry. Readers load it without locking; writers
/// copy, modify and swap it in.
#[derive(Debug, Clone, Default)]
struct IndexSnapshot {
    facilities: HashMap<u32, Arc<Facility>>,
    cells: HashMap<GridCell, Vec<u32>>,
    catalog: BTreeMap<ServiceCode, MedicalService>,
}

impl IndexSnapshot {
    fn unlink(&mut self, cell: GridCell, cnes: u32) {
        if let Some(members) = self.cells.get_mut(&cell) {
            members.retain(|id| *id != cnes);
            if members.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    fn link(&mut self, cell: GridCell, cnes: u32) {
        let members = self.cells.entry(cell).or_default();
        if let Err(pos) = members.binary_search(&cnes) {
            members.insert(pos, cnes);
        }
    }
}

pub struct FacilityIndex {
    grid: Grid,
    snapshot: ArcSwap<IndexSnapshot>,
    write_lock: Mutex<()>,
}

impl FacilityIndex {
    pub fn new(cell_degrees: f64) -> Self {
        let grid = Grid::new(cell_degrees);
        debug!("Facility index using {:.3} degree grid cells", grid.cell_degrees());

        Self {
            grid,
            snapshot: ArcSwap::from_pointee(IndexSnapshot::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Add or replace a catalog entry.
    pub fn register_service(&self, service: MedicalService) {
        let _guard = self.write_lock.lock();
        let mut next = IndexSnapshot::clone(&self.snapshot.load());
        debug!("Registering service {} ({})", service.code, service.classification_name);
        next.catalog.insert(service.code, service);
        self.snapshot.store(Arc::new(next));
    }

    pub fn services(&self) -> Vec<MedicalService> {
        self.snapshot.load().catalog.values().cloned().collect()
    }

    pub fn is_known_service(&self, code: &ServiceCode) -> bool {
        self.snapshot.load().catalog.contains_key(code)
    }

    /// Register a facility or update its profile. An existing facility keeps
    /// its activation status; see `activate`.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub fn upsert(
        &self,
        cnes: u32,
        request: UpsertFacilityRequest,
    ) -> Result<Arc<Facility>, FacilityError> {
        if request.name.trim().is_empty() {
            return Err(FacilityError::ValidationError(
                "Facility name must not be empty".to_string(),
            ));
        }
        if !request.location.is_valid() {
            return Err(FacilityError::InvalidLocation {
                lat: request.location.lat,
                lng: request.location.lng,
            });
        }

        let _guard = self.write_lock.lock();
        let current = self.snapshot.load_full();

        let unknown = request.services.iter().find(|code| !current.catalog.contains_key(*code));
        if let Some(unknown) = unknown {
            return Err(FacilityError::UnknownService(*unknown));
        }

        let now = Utc::now();
        let previous = current.facilities.get(&cnes).cloned();
        let facility = Arc::new(Facility {
            cnes,
            name: request.name.trim().to_string(),
            kind: request.kind,
            location: request.location,
            address: request.address,
            number: request.number,
            district: request.district,
            city: request.city,
            state: request.state,
            cep: request.cep,
            telephone: request.telephone,
            email: request.email,
            shift: request.shift,
            services: request.services.into_iter().collect(),
            is_active: previous.as_ref().map(|f| f.is_active).unwrap_or(true),
            created_at: previous.as_ref().map(|f| f.created_at).unwrap_or(now),
            updated_at: now,
        });

        let mut next = IndexSnapshot::clone(&current);
        if let Some(old) = &previous {
            next.unlink(self.grid.cell_of(&old.location), cnes);
        }
        if facility.is_active {
            next.link(self.grid.cell_of(&facility.location), cnes);
        }
        next.facilities.insert(cnes, Arc::clone(&facility));
        self.snapshot.store(Arc::new(next));

        if previous.is_some() {
            info!("Facility {} updated", cnes);
        } else {
            info!("Facility {} registered", cnes);
        }

        Ok(facility)
    }

    /// Soft-deactivate: the record stays readable but leaves proximity results.
    pub fn deactivate(&self, cnes: u32) -> Result<Arc<Facility>, FacilityError> {
        self.set_active(cnes, false)
    }

    /// Put a deactivated facility back into proximity results.
    pub fn activate(&self, cnes: u32) -> Result<Arc<Facility>, FacilityError> {
        self.set_active(cnes, true)
    }

    fn set_active(&self, cnes: u32, active: bool) -> Result<Arc<Facility>, FacilityError> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load_full();

        let existing = current
            .facilities
            .get(&cnes)
            .ok_or(FacilityError::NotFound(cnes))?;

        if existing.is_active == active {
            debug!("Facility {} already {}", cnes, if active { "active" } else { "inactive" });
            return Ok(Arc::clone(existing));
        }

        let mut updated = Facility::clone(existing);
        updated.is_active = active;
        updated.updated_at = Utc::now();
        let updated = Arc::new(updated);

        let mut next = IndexSnapshot::clone(&current);
        let cell = self.grid.cell_of(&updated.location);
        if active {
            next.link(cell, cnes);
        } else {
            next.unlink(cell, cnes);
        }
        next.facilities.insert(cnes, Arc::clone(&updated));
        self.snapshot.store(Arc::new(next));

        if active {
            info!("Facility {} reactivated", cnes);
        } else {
            warn!("Facility {} deactivated", cnes);
        }
        Ok(updated)
    }

    pub fn get(&self, cnes: u32) -> Result<Arc<Facility>, FacilityError> {
        self.snapshot
            .load()
            .facilities
            .get(&cnes)
            .cloned()
            .ok_or(FacilityError::NotFound(cnes))
    }

    /// Services of one facility grouped as service name -> classification names.
    pub fn services_by_name(
        &self,
        cnes: u32,
    ) -> Result<BTreeMap<String, Vec<String>>, FacilityError> {
        let snapshot = self.snapshot.load();
        let facility = snapshot
            .facilities
            .get(&cnes)
            .ok_or(FacilityError::NotFound(cnes))?;

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for code in &facility.services {
            if let Some(entry) = snapshot.catalog.get(code) {
                grouped
                    .entry(entry.service_name.clone())
                    .or_default()
                    .push(entry.classification_name.clone());
            }
        }

        Ok(grouped)
    }

    /// Active facilities offering `service` within `radius_km`, nearest first,
    /// ties broken by CNES code.
    pub fn nearest(
        &self,
        location: &GeoPoint,
        service: &ServiceCode,
        radius_km: f64,
    ) -> Vec<FacilityMatch> {
        if !location.is_valid() || !radius_km.is_finite() || radius_km <= 0.0 {
            debug!("Ignoring proximity query with invalid location or radius");
            return Vec::new();
        }

        let snapshot = self.snapshot.load();
        let mut matches = Vec::new();

        for cell in self.grid.cells_within(location, radius_km) {
            let Some(members) = snapshot.cells.get(&cell) else {
                continue;
            };

            for cnes in members {
                let Some(facility) = snapshot.facilities.get(cnes) else {
                    continue;
                };
                if !facility.is_active || !facility.offers(service) {
                    continue;
                }

                let distance_km = location.distance_km(&facility.location);
                if distance_km <= radius_km {
                    matches.push(FacilityMatch {
                        facility: Arc::clone(facility),
                        distance_km,
                    });
                }
            }
        }

        matches.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.facility.cnes.cmp(&b.facility.cnes))
        });

        debug!(
            "Found {} facilities offering {} within {:.1} km",
            matches.len(),
            service,
            radius_km
        );

        matches
    }

    pub fn stats(&self) -> FacilityIndexStats {
        let snapshot = self.snapshot.load();
        FacilityIndexStats {
            total_facilities: snapshot.facilities.len(),
            active_facilities: snapshot.facilities.values().filter(|f| f.is_active).count(),
            catalogued_services: snapshot.catalog.len(),
        }
    }
}
