use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use facility_cell::{facility_routes, FacilityCellState};
use reservation_cell::{reservation_routes, ReservationCellState};
use search_cell::{search_routes, SearchCellState};
use shared_models::error::AppError;
use slot_cell::{slot_routes, SlotCellState};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let facilities = facility_routes(FacilityCellState {
        index: state.facilities.clone(),
        config: state.config.clone(),
    });
    let slots = slot_routes(SlotCellState {
        store: state.slots.clone(),
        ingest: state.ingest.clone(),
        pipeline: state.pipeline.clone(),
        config: state.config.clone(),
    });
    let holds = reservation_routes(ReservationCellState {
        coordinator: state.coordinator.clone(),
    });
    let search = search_routes(SearchCellState {
        planner: state.planner.clone(),
    });

    Router::new()
        .route("/", get(|| async { "SUS availability API is running!" }))
        .route("/health", get(health).with_state(state))
        .nest("/facilities", facilities)
        .nest("/slots", slots)
        .nest("/holds", holds)
        .nest("/search", search)
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "status": "ok",
        "facilities": state.facilities.stats(),
        "slots": state.slots.stats(),
        "holds": state.coordinator.stats(),
        "ingest": state.ingest.stats(),
        "persistence": state.config.is_persistence_configured()
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use facility_cell::{MedicalService, UpsertFacilityRequest};
    use shared_utils::test_utils::{
        hours_after_epoch, test_clock, SamplePayloads, TestConfig, TestLocations, TestServices,
    };

    use super::*;

    fn setup() -> (Router, AppState) {
        let state = AppState::build(
            TestConfig::default().to_arc(),
            Arc::new(test_clock()),
            &CancellationToken::new(),
        );
        state.facilities.register_service(MedicalService {
            code: TestServices::cardiology(),
            service_name: "Cardiologia".to_string(),
            classification_name: "Consulta".to_string(),
        });
        state
            .facilities
            .upsert(
                2077485,
                UpsertFacilityRequest::new(
                    "UBS Bela Vista",
                    TestLocations::avenida_paulista(),
                    vec![TestServices::cardiology()],
                ),
            )
            .unwrap();
        (create_router(state.clone()), state)
    }

    async fn call(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let (app, _) = setup();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, json) = call(app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["facilities"]["active_facilities"], 1);
        assert_eq!(json["slots"]["total_slots"], 0);
    }

    #[tokio::test]
    async fn test_ingest_search_hold_confirm_flow() {
        let (app, state) = setup();
        let slot_id = uuid::Uuid::new_v4();

        let created = SamplePayloads::slot_created(
            slot_id,
            1,
            2077485,
            TestServices::cardiology(),
            hours_after_epoch(6),
            1,
        );
        let (status, _) = call(app.clone(), "POST", "/slots/events", Some(created)).await;
        assert_eq!(status, StatusCode::OK);

        let search = json!({
            "location": { "lat": -23.5505, "lng": -46.6333 },
            "service": { "service": 125, "classification": 1 },
            "window": { "start": hours_after_epoch(0), "end": hours_after_epoch(12) },
            "radius_km": 10.0
        });
        let (status, json) = call(app.clone(), "POST", "/search", Some(search.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["results"][0]["slot_id"], slot_id.to_string());

        let hold = json!({ "slot_id": slot_id, "requester_id": "citizen-1" });
        let (status, _) = call(app.clone(), "POST", "/holds", Some(hold)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, json) = call(app.clone(), "POST", "/search", Some(search)).await;
        assert_eq!(json["total"], 0, "a fully held slot is no longer offered");

        let confirm = json!({ "requester_id": "citizen-1" });
        let uri = format!("/holds/{}/confirm", slot_id);
        let (status, json) = call(app, "POST", &uri, Some(confirm)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["slot"]["status"], "booked");
        assert_eq!(state.coordinator.stats().active_holds, 0);
    }
}
