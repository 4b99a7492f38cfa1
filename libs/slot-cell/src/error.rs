use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::SlotStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlotError {
    #[error("Slot not found: {0}")]
    NotFound(Uuid),

    #[error("Update for unknown slot {0} is not a creation")]
    UnknownSlot(Uuid),

    #[error("Slot {0} already exists")]
    AlreadyExists(Uuid),

    #[error("Stale update for slot {slot_id}: sequence {received} is not after {stored}")]
    StaleUpdate { slot_id: Uuid, stored: u64, received: u64 },

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: SlotStatus, to: SlotStatus },

    #[error("Slot {slot_id} cannot be changed while {status}: {reason}")]
    Locked {
        slot_id: Uuid,
        status: SlotStatus,
        reason: String,
    },

    #[error("Capacity violation: {0}")]
    CapacityViolation(String),

    #[error("Ingest pipeline is shut down")]
    PipelineClosed,

    #[error("Snapshot persistence failed: {0}")]
    Persistence(String),
}

impl SlotError {
    pub fn is_stale(&self) -> bool {
        matches!(self, SlotError::StaleUpdate { .. })
    }
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::NotFound(_) | SlotError::UnknownSlot(_) => {
                AppError::NotFound(err.to_string())
            }
            SlotError::InvalidEvent(_) => AppError::BadRequest(err.to_string()),
            SlotError::AlreadyExists(_)
            | SlotError::StaleUpdate { .. }
            | SlotError::InvalidTransition { .. }
            | SlotError::Locked { .. }
            | SlotError::CapacityViolation(_) => AppError::Conflict(err.to_string()),
            SlotError::PipelineClosed | SlotError::Persistence(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}
