use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;
use slot_cell::ServiceSlot;

/// A seat set aside for one requester until `expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    pub hold_id: Uuid,
    pub slot_id: Uuid,
    pub requester_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_held_by(&self, requester_id: &str) -> bool {
        self.requester_id == requester_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub hold_id: Uuid,
    pub slot_id: Uuid,
    pub requester_id: String,
    pub facility_id: u32,
    pub start_time: DateTime<Utc>,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct HoldPolicy {
    pub default_ttl: Duration,
    pub max_ttl: Duration,
}

impl HoldPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_ttl: Duration::seconds(config.default_hold_ttl_seconds as i64),
            max_ttl: Duration::seconds(config.max_hold_ttl_seconds as i64),
        }
    }
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::minutes(5),
            max_ttl: Duration::minutes(15),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaceHoldRequest {
    pub slot_id: Uuid,
    pub requester_id: String,
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RequesterBody {
    pub requester_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub slots_visited: usize,
    pub holds_released: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReservationStats {
    pub active_holds: usize,
    pub slots_with_holds: usize,
}

/// Holds on one slot. Lapsed holds are remembered until the slot starts so
/// a late confirm or release reports `Expired` whether or not the sweeper
/// got to them first.
#[derive(Debug, Clone, Default)]
pub(crate) struct SlotHolds {
    pub live: Vec<Hold>,
    pub lapsed: Vec<Hold>,
}

impl SlotHolds {
    pub fn is_empty(&self) -> bool {
        self.live.is_empty() && self.lapsed.is_empty()
    }

    pub fn live_position(&self, requester_id: &str) -> Option<usize> {
        self.live.iter().position(|hold| hold.is_held_by(requester_id))
    }

    pub fn take_lapsed(&mut self, requester_id: &str) -> Option<Hold> {
        let position = self.lapsed.iter().position(|hold| hold.is_held_by(requester_id))?;
        Some(self.lapsed.remove(position))
    }

    pub fn forget_lapsed(&mut self, requester_id: &str) {
        self.lapsed.retain(|hold| !hold.is_held_by(requester_id));
    }
}

/// What a confirmation did to the slot; only `Confirmed` is a success for
/// the caller, the other outcomes still commit their seat bookkeeping.
#[derive(Debug)]
pub(crate) enum ConfirmOutcome {
    Confirmed(Booking),
    Expired,
    Withdrawn,
}

#[derive(Debug)]
pub(crate) enum ReleaseOutcome {
    Released(Hold),
    Expired,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedSlot {
    pub booking: Booking,
    pub slot: ServiceSlot,
}
