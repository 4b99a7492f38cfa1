use thiserror::Error;

use shared_models::error::AppError;
use shared_models::ServiceCode;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FacilityError {
    #[error("Facility not found: {0}")]
    NotFound(u32),

    #[error("Service {0} is not in the catalog")]
    UnknownService(ServiceCode),

    #[error("Invalid location: lat={lat}, lng={lng}")]
    InvalidLocation { lat: f64, lng: f64 },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<FacilityError> for AppError {
    fn from(err: FacilityError) -> Self {
        match err {
            FacilityError::NotFound(_) => AppError::NotFound(err.to_string()),
            FacilityError::UnknownService(_)
            | FacilityError::InvalidLocation { .. }
            | FacilityError::ValidationError(_) => AppError::ValidationError(err.to_string()),
        }
    }
}
