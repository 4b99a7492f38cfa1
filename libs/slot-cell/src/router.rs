use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;
use crate::services::{AvailabilityIngest, IngestPipeline, SlotStore};

#[derive(Clone)]
pub struct SlotCellState {
    pub store: Arc<SlotStore>,
    pub ingest: Arc<AvailabilityIngest>,
    pub pipeline: Arc<IngestPipeline>,
    pub config: Arc<AppConfig>,
}

pub fn slot_routes(state: SlotCellState) -> Router {
    Router::new()
        .route("/events", post(handlers::ingest_event))
        .route("/events/batch", post(handlers::ingest_batch))
        .route("/events/queue", post(handlers::enqueue_events))
        .route("/open", get(handlers::open_slots))
        .route("/stats", get(handlers::slot_stats))
        .route("/{slot_id}", get(handlers::get_slot))
        .with_state(state)
}
