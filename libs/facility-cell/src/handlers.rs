use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use shared_models::error::AppError;
use shared_models::{GeoPoint, ServiceCode};

use crate::models::{MedicalService, NearbyFacility, UpsertFacilityRequest};
use crate::router::FacilityCellState;

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub srv: u16,
    pub clf: u16,
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

pub async fn list_services(
    State(state): State<FacilityCellState>,
) -> Result<Json<Value>, AppError> {
    let services = state.index.services();

    Ok(Json(json!({
        "services": services,
        "total": services.len()
    })))
}

pub async fn register_service(
    State(state): State<FacilityCellState>,
    Json(service): Json<MedicalService>,
) -> Result<Json<Value>, AppError> {
    if service.service_name.trim().is_empty() || service.classification_name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Service and classification names are required".to_string(),
        ));
    }

    state.index.register_service(service.clone());
    Ok(Json(json!(service)))
}

pub async fn nearby_facilities(
    State(state): State<FacilityCellState>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Value>, AppError> {
    let location = GeoPoint::new(query.lat, query.lng);
    if !location.is_valid() {
        return Err(AppError::BadRequest("Coordinates out of range".to_string()));
    }

    let service = ServiceCode::new(query.srv, query.clf);
    if !state.index.is_known_service(&service) {
        return Err(AppError::BadRequest(format!("Unknown service {}", service)));
    }

    let ceiling = state.config.radius_ceiling_km;
    let radius_km = query.radius_km.unwrap_or(ceiling).min(ceiling);
    if radius_km <= 0.0 {
        return Err(AppError::BadRequest("radius_km must be positive".to_string()));
    }
    let limit = query.limit.unwrap_or(state.config.max_results).min(state.config.max_results);

    let units: Vec<NearbyFacility> = state
        .index
        .nearest(&location, &service, radius_km)
        .iter()
        .take(limit)
        .map(NearbyFacility::from)
        .collect();

    info!("Nearby query for {} returned {} facilities", service, units.len());

    Ok(Json(json!({
        "facilities": units,
        "total": units.len(),
        "radius_km": radius_km
    })))
}

pub async fn get_facility(
    State(state): State<FacilityCellState>,
    Path(cnes): Path<u32>,
) -> Result<Json<Value>, AppError> {
    let facility = state.index.get(cnes)?;
    let services = state.index.services_by_name(cnes)?;

    Ok(Json(json!({
        "facility": *facility,
        "services": services
    })))
}

pub async fn upsert_facility(
    State(state): State<FacilityCellState>,
    Path(cnes): Path<u32>,
    Json(request): Json<UpsertFacilityRequest>,
) -> Result<Json<Value>, AppError> {
    let facility = state.index.upsert(cnes, request)?;
    Ok(Json(json!(*facility)))
}

pub async fn deactivate_facility(
    State(state): State<FacilityCellState>,
    Path(cnes): Path<u32>,
) -> Result<Json<Value>, AppError> {
    let facility = state.index.deactivate(cnes)?;

    Ok(Json(json!({
        "cnes": facility.cnes,
        "is_active": facility.is_active
    })))
}

pub async fn activate_facility(
    State(state): State<FacilityCellState>,
    Path(cnes): Path<u32>,
) -> Result<Json<Value>, AppError> {
    let facility = state.index.activate(cnes)?;

    Ok(Json(json!({
        "cnes": facility.cnes,
        "is_active": facility.is_active
    })))
}
