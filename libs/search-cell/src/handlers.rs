use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::models::SearchRequest;
use crate::router::SearchCellState;

pub async fn search_slots(
    State(state): State<SearchCellState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Value>, AppError> {
    let results = state.planner.search(&request)?;

    Ok(Json(json!({
        "results": results,
        "total": results.len(),
        "urgency": request.urgency
    })))
}
