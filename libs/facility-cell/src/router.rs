use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;
use crate::services::FacilityIndex;

#[derive(Clone)]
pub struct FacilityCellState {
    pub index: Arc<FacilityIndex>,
    pub config: Arc<AppConfig>,
}

pub fn facility_routes(state: FacilityCellState) -> Router {
    Router::new()
        .route(
            "/services",
            get(handlers::list_services).post(handlers::register_service),
        )
        .route("/nearby", get(handlers::nearby_facilities))
        .route("/{cnes}", get(handlers::get_facility).put(handlers::upsert_facility))
        .route("/{cnes}/deactivate", post(handlers::deactivate_facility))
        .route("/{cnes}/activate", post(handlers::activate_facility))
        .with_state(state)
}
