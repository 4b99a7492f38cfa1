use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers;
use crate::services::QueryPlanner;

#[derive(Clone)]
pub struct SearchCellState {
    pub planner: Arc<QueryPlanner>,
}

pub fn search_routes(state: SearchCellState) -> Router {
    Router::new()
        .route("/", post(handlers::search_slots))
        .with_state(state)
}
