use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;
use slot_cell::{SlotError, SlotStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReservationError {
    #[error("Slot not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Hold conflict: {0}")]
    HoldConflict(String),

    #[error("Slot {0} has no remaining capacity")]
    CapacityExhausted(Uuid),

    #[error("Slot {slot_id} is {status} and cannot be reserved")]
    SlotUnavailable { slot_id: Uuid, status: SlotStatus },

    #[error("Expired: {0}")]
    Expired(String),

    #[error(transparent)]
    Store(SlotError),
}

impl From<SlotError> for ReservationError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::NotFound(slot_id) => ReservationError::NotFound(slot_id),
            other => ReservationError::Store(other),
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::NotFound(_) => AppError::NotFound(err.to_string()),
            ReservationError::InvalidRequest(_) => AppError::BadRequest(err.to_string()),
            ReservationError::HoldConflict(_)
            | ReservationError::CapacityExhausted(_)
            | ReservationError::SlotUnavailable { .. } => AppError::Conflict(err.to_string()),
            ReservationError::Expired(_) => AppError::Gone(err.to_string()),
            ReservationError::Store(inner) => AppError::from(inner),
        }
    }
}
