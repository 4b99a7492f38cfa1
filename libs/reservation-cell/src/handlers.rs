use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Duration;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{PlaceHoldRequest, RequesterBody};
use crate::router::ReservationCellState;

pub async fn place_hold(
    State(state): State<ReservationCellState>,
    Json(request): Json<PlaceHoldRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // Out-of-range values are clamped just past the limit so the coordinator rejects them.
    let ceiling = state.coordinator.policy().max_ttl.num_seconds() + 1;
    let ttl = request
        .ttl_seconds
        .map(|seconds| Duration::seconds(seconds.clamp(0, ceiling)));
    let hold = state
        .coordinator
        .place_hold(request.slot_id, &request.requester_id, ttl)?;

    Ok((StatusCode::CREATED, Json(json!(hold))))
}

pub async fn confirm_hold(
    State(state): State<ReservationCellState>,
    Path(slot_id): Path<Uuid>,
    Json(body): Json<RequesterBody>,
) -> Result<Json<Value>, AppError> {
    let confirmed = state.coordinator.confirm(slot_id, &body.requester_id)?;
    Ok(Json(json!(confirmed)))
}

pub async fn release_hold(
    State(state): State<ReservationCellState>,
    Path(slot_id): Path<Uuid>,
    Json(body): Json<RequesterBody>,
) -> Result<Json<Value>, AppError> {
    let slot = state.coordinator.release(slot_id, &body.requester_id)?;

    Ok(Json(json!({
        "released": true,
        "slot": *slot
    })))
}
