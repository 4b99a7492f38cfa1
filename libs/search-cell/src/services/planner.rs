use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info};

use facility_cell::FacilityIndex;
use slot_cell::SlotStore;

use crate::error::SearchError;
use crate::models::{PlannerConfig, RankedSlot, SearchRequest};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Answers citizen searches by joining the facility index with live slot
/// availability. Read-only: planning never touches slot state.
pub struct QueryPlanner {
    facilities: Arc<FacilityIndex>,
    slots: Arc<SlotStore>,
    config: PlannerConfig,
}

impl QueryPlanner {
    pub fn new(
        facilities: Arc<FacilityIndex>,
        slots: Arc<SlotStore>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            facilities,
            slots,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn search(&self, request: &SearchRequest) -> Result<Vec<RankedSlot>, SearchError> {
        let radius_km = self.validate(request)?;
        let now = self.slots.now();
        let weights = self.config.weights;
        let per_facility = self.config.max_results;

        let candidates = self.facilities.nearest(&request.location, &request.service, radius_km);
        let mut ranked = Vec::new();

        for candidate in candidates.iter().take(self.config.max_candidate_facilities) {
            let facility = &candidate.facility;
            // Within one facility the score only grows with start time, so the
            // earliest `max_results` slots are all that can make the cut.
            let open = self
                .slots
                .query_open_at(facility.cnes, request.service, request.window)
                .take(per_facility);

            for slot in open {
                let wait_hours =
                    (slot.start_time - now).num_seconds() as f64 / SECONDS_PER_HOUR;
                ranked.push(RankedSlot {
                    slot_id: slot.slot_id,
                    facility_id: facility.cnes,
                    facility_name: facility.name.clone(),
                    address: facility.full_address(),
                    service: slot.service,
                    start_time: slot.start_time,
                    duration_minutes: slot.duration_minutes,
                    remaining: slot.remaining,
                    distance_km: candidate.distance_km,
                    wait_hours,
                    score: weights.score(candidate.distance_km, wait_hours, request.urgency),
                });
            }
        }

        debug!(
            "Search for {} considered {} facilities and {} slots",
            request.service,
            candidates.len().min(self.config.max_candidate_facilities),
            ranked.len()
        );

        ranked.sort_by(compare_ranked);
        ranked.truncate(self.config.max_results);

        info!(
            "Search for {} ({}) within {:.1} km returned {} slots",
            request.service,
            request.urgency,
            radius_km,
            ranked.len()
        );
        Ok(ranked)
    }

    /// Returns the effective radius.
    fn validate(&self, request: &SearchRequest) -> Result<f64, SearchError> {
        if !request.location.is_valid() {
            return Err(SearchError::InvalidRequest("coordinates out of range".to_string()));
        }
        if !self.facilities.is_known_service(&request.service) {
            return Err(SearchError::InvalidRequest(format!(
                "unknown service {}",
                request.service
            )));
        }
        if request.window.is_some_and(|window| !window.is_valid()) {
            return Err(SearchError::InvalidRequest("window ends before it starts".to_string()));
        }

        let radius_km = request.radius_km.unwrap_or(self.config.radius_ceiling_km);
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(SearchError::InvalidRequest("radius_km must be positive".to_string()));
        }

        Ok(radius_km.min(self.config.radius_ceiling_km))
    }
}

fn compare_ranked(a: &RankedSlot, b: &RankedSlot) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then_with(|| a.start_time.cmp(&b.start_time))
        .then_with(|| a.facility_id.cmp(&b.facility_id))
        .then_with(|| a.slot_id.cmp(&b.slot_id))
}
