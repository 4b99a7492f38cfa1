use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers;
use crate::services::ReservationCoordinator;

#[derive(Clone)]
pub struct ReservationCellState {
    pub coordinator: Arc<ReservationCoordinator>,
}

pub fn reservation_routes(state: ReservationCellState) -> Router {
    Router::new()
        .route("/", post(handlers::place_hold))
        .route("/{slot_id}/confirm", post(handlers::confirm_hold))
        .route("/{slot_id}/release", post(handlers::release_hold))
        .with_state(state)
}
