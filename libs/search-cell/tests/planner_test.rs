// libs/search-cell/tests/planner_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use facility_cell::{FacilityIndex, MedicalService, UpsertFacilityRequest};
use search_cell::*;
use shared_models::{GeoPoint, ServiceCode, TimeWindow, UrgencyTier};
use shared_utils::test_utils::{
    hours_after_epoch, test_clock, TestConfig, TestLocations, TestServices,
};
use slot_cell::{SlotChange, SlotDraft, SlotEventPublisher, SlotStatus, SlotStore};

const PAULISTA: u32 = 2077485;
const SANTO_AMARO: u32 = 2078015;
const CAMPINAS: u32 = 2022648;

struct TestSetup {
    planner: QueryPlanner,
    slots: Arc<SlotStore>,
}

impl TestSetup {
    fn new() -> Self {
        Self::with_config(PlannerConfig::from_config(&TestConfig::default().to_app_config()))
    }

    fn with_config(config: PlannerConfig) -> Self {
        let facilities = Arc::new(FacilityIndex::new(0.05));
        let catalog = [
            (TestServices::cardiology(), "Cardiologia"),
            (TestServices::dermatology(), "Dermatologia"),
        ];
        for (code, name) in catalog {
            facilities.register_service(MedicalService {
                code,
                service_name: name.to_string(),
                classification_name: "Consulta".to_string(),
            });
        }
        for (cnes, location) in [
            (PAULISTA, TestLocations::avenida_paulista()),
            (SANTO_AMARO, TestLocations::santo_amaro()),
            (CAMPINAS, TestLocations::campinas()),
        ] {
            let request = UpsertFacilityRequest::new(
                &format!("UBS {}", cnes),
                location,
                vec![TestServices::cardiology()],
            );
            facilities.upsert(cnes, request).expect("facility should register");
        }

        let slots = Arc::new(SlotStore::new(Arc::new(test_clock()), SlotEventPublisher::new(16)));
        let planner = QueryPlanner::new(facilities, slots.clone(), config);
        Self { planner, slots }
    }

    fn slot(&self, facility_id: u32, start_hours: i64) -> Uuid {
        let slot_id = Uuid::new_v4();
        self.slots
            .apply_update(
                slot_id,
                1,
                SlotChange::Create(SlotDraft {
                    facility_id,
                    service: TestServices::cardiology(),
                    start_time: hours_after_epoch(start_hours),
                    duration_minutes: 20,
                    capacity: 1,
                }),
            )
            .expect("slot should be created");
        slot_id
    }
}

fn request(urgency: UrgencyTier) -> SearchRequest {
    SearchRequest {
        location: TestLocations::praca_da_se(),
        service: TestServices::cardiology(),
        window: Some(TimeWindow::new(hours_after_epoch(0), hours_after_epoch(72))),
        urgency,
        radius_km: Some(20.0),
    }
}

fn ids(results: &[RankedSlot]) -> Vec<Uuid> {
    results.iter().map(|r| r.slot_id).collect()
}

#[test]
fn test_routine_search_prefers_nearby_facility() {
    let setup = TestSetup::new();
    let near_later = setup.slot(PAULISTA, 10);
    let far_sooner = setup.slot(SANTO_AMARO, 2);

    let results = setup.planner.search(&request(UrgencyTier::Routine)).unwrap();

    // 2.6 km + 0.5 * 10 h = 7.6 against 13.7 km + 0.5 * 2 h = 14.7
    assert_eq!(ids(&results), vec![near_later, far_sooner]);
    assert!((results[0].score - 7.6).abs() < 0.1);
    assert!((results[0].distance_km - 2.6).abs() < 0.1);
    assert!((results[0].wait_hours - 10.0).abs() < 1e-9);
    assert_eq!(results[0].facility_id, PAULISTA);
}

#[test]
fn test_urgent_search_weighs_waiting_time_more() {
    let setup = TestSetup::new();
    let near_later = setup.slot(PAULISTA, 10);
    let far_sooner = setup.slot(SANTO_AMARO, 2);

    let results = setup.planner.search(&request(UrgencyTier::Urgent)).unwrap();

    // 2.6 + 0.5 * 4 * 10 = 22.6 against 13.7 + 0.5 * 4 * 2 = 17.7
    assert_eq!(ids(&results), vec![far_sooner, near_later]);
}

#[test]
fn test_nothing_within_radius_is_empty_result() {
    let setup = TestSetup::new();
    setup.slot(SANTO_AMARO, 4);
    setup.slot(CAMPINAS, 4);

    let mut narrow = request(UrgencyTier::Routine);
    narrow.radius_km = Some(1.0);

    let results = setup.planner.search(&narrow).expect("no matches is not an error");
    assert!(results.is_empty());
}

#[test]
fn test_radius_is_capped_by_ceiling() {
    let setup = TestSetup::new();
    setup.slot(CAMPINAS, 4);
    let paulista = setup.slot(PAULISTA, 4);

    let mut wide = request(UrgencyTier::Routine);
    wide.radius_km = Some(500.0);

    let results = setup.planner.search(&wide).unwrap();
    assert_eq!(ids(&results), vec![paulista], "Campinas lies beyond the 25 km ceiling");

    wide.radius_km = None;
    assert_eq!(setup.planner.search(&wide).unwrap().len(), 1);
}

#[test]
fn test_window_and_status_filters() {
    let setup = TestSetup::new();
    let inside = setup.slot(PAULISTA, 5);
    setup.slot(PAULISTA, 80);
    let cancelled = setup.slot(PAULISTA, 6);
    setup
        .slots
        .apply_update(cancelled, 2, SlotChange::SetStatus(SlotStatus::Cancelled))
        .unwrap();

    let results = setup.planner.search(&request(UrgencyTier::Routine)).unwrap();
    assert_eq!(ids(&results), vec![inside]);
}

#[test]
fn test_search_without_window_covers_all_upcoming_slots() {
    let setup = TestSetup::new();
    let soon = setup.slot(PAULISTA, 5);
    let later = setup.slot(PAULISTA, 80);

    let mut open_ended = request(UrgencyTier::Routine);
    open_ended.window = None;

    let results = setup.planner.search(&open_ended).unwrap();
    assert_eq!(ids(&results), vec![soon, later]);
}

#[test]
fn test_equal_scores_break_on_start_then_facility_then_slot() {
    let setup = TestSetup::new();
    let mut slots = vec![setup.slot(PAULISTA, 8), setup.slot(PAULISTA, 8)];
    slots.sort();

    let results = setup.planner.search(&request(UrgencyTier::Routine)).unwrap();
    assert_eq!(ids(&results), slots);
}

#[test]
fn test_results_are_capped() {
    let config = PlannerConfig {
        max_results: 3,
        ..PlannerConfig::from_config(&TestConfig::default().to_app_config())
    };
    let setup = TestSetup::with_config(config);
    let expected: Vec<Uuid> = (1..=5).map(|h| setup.slot(PAULISTA, h)).collect();
    for h in 1..=5 {
        setup.slot(SANTO_AMARO, h);
    }

    let results = setup.planner.search(&request(UrgencyTier::Routine)).unwrap();
    assert_eq!(ids(&results), expected[..3].to_vec());
}

#[test]
fn test_candidate_facilities_are_bounded() {
    let config = PlannerConfig {
        max_candidate_facilities: 1,
        ..PlannerConfig::from_config(&TestConfig::default().to_app_config())
    };
    let setup = TestSetup::with_config(config);
    setup.slot(SANTO_AMARO, 1);
    let nearest = setup.slot(PAULISTA, 30);

    let results = setup.planner.search(&request(UrgencyTier::Urgent)).unwrap();
    assert_eq!(ids(&results), vec![nearest], "only the nearest facility is consulted");
}

#[test]
fn test_invalid_requests() {
    let setup = TestSetup::new();

    let mut bad = request(UrgencyTier::Routine);
    bad.service = ServiceCode::new(999, 1);
    assert_matches!(setup.planner.search(&bad), Err(SearchError::InvalidRequest(_)));

    let mut bad = request(UrgencyTier::Routine);
    bad.window = Some(TimeWindow::new(hours_after_epoch(10), hours_after_epoch(2)));
    assert_matches!(setup.planner.search(&bad), Err(SearchError::InvalidRequest(_)));

    let mut bad = request(UrgencyTier::Routine);
    bad.radius_km = Some(0.0);
    assert_matches!(setup.planner.search(&bad), Err(SearchError::InvalidRequest(_)));

    let mut bad = request(UrgencyTier::Routine);
    bad.location = GeoPoint::new(-95.0, 0.0);
    assert_matches!(setup.planner.search(&bad), Err(SearchError::InvalidRequest(_)));
}

#[test]
fn test_known_service_without_providers_is_empty() {
    let setup = TestSetup::new();
    let mut search = request(UrgencyTier::Routine);
    search.service = TestServices::dermatology();

    assert!(setup.planner.search(&search).unwrap().is_empty());
}

#[test]
fn test_ranking_weights() {
    let weights = RankingWeights::default();
    assert_eq!(weights.urgency_multiplier(UrgencyTier::Priority), 2.0);
    assert_eq!(weights.score(10.0, 4.0, UrgencyTier::Routine), 12.0);
    assert_eq!(weights.score(10.0, 4.0, UrgencyTier::Urgent), 18.0);
}
