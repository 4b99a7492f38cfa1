use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::{ServiceCode, TimeWindow};

use crate::models::{FacilityEvent, ServiceSlot};
use crate::router::SlotCellState;

#[derive(Debug, Deserialize)]
pub struct OpenSlotsQuery {
    pub srv: u16,
    pub clf: u16,
    pub facility: Option<u32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

pub async fn ingest_event(
    State(state): State<SlotCellState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let slot = state.ingest.ingest_json(&body)?;
    Ok(Json(json!(*slot)))
}

pub async fn ingest_batch(
    State(state): State<SlotCellState>,
    Json(events): Json<Vec<Value>>,
) -> Result<Json<Value>, AppError> {
    if events.is_empty() {
        return Err(AppError::BadRequest("Batch is empty".to_string()));
    }

    let report = state.ingest.ingest_batch(events);
    Ok(Json(json!(report)))
}

pub async fn enqueue_events(
    State(state): State<SlotCellState>,
    Json(events): Json<Vec<FacilityEvent>>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let total = events.len();
    for event in events {
        state.pipeline.submit(event).await?;
    }

    info!("Queued {} facility events", total);
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": total }))))
}

pub async fn open_slots(
    State(state): State<SlotCellState>,
    Query(query): Query<OpenSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ServiceCode::new(query.srv, query.clf);
    let window = match (query.from, query.to) {
        (None, None) => None,
        (from, to) => {
            let window = TimeWindow::new(
                from.unwrap_or(DateTime::<Utc>::MIN_UTC),
                to.unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
            if !window.is_valid() {
                return Err(AppError::BadRequest("'from' must not be after 'to'".to_string()));
            }
            Some(window)
        }
    };
    let limit = query.limit.unwrap_or(state.config.max_results).min(state.config.max_results);

    let slots: Vec<ServiceSlot> = match query.facility {
        Some(facility_id) => state.store.query_open_at(facility_id, service, window),
        None => state.store.query_open(service, window),
    }
    .take(limit)
    .map(|slot| ServiceSlot::clone(&slot))
    .collect();

    Ok(Json(json!({
        "slots": slots,
        "total": slots.len()
    })))
}

pub async fn get_slot(
    State(state): State<SlotCellState>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slot = state.store.get(slot_id)?;
    Ok(Json(json!(*slot)))
}

pub async fn slot_stats(State(state): State<SlotCellState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "store": state.store.stats(),
        "ingest": state.ingest.stats(),
        "pipeline_running": state.pipeline.is_running()
    })))
}
