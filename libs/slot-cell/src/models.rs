use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::ServiceCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Open,
    Held,
    Booked,
    Cancelled,
}

impl SlotStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Booked | SlotStatus::Cancelled)
    }

    /// Forward-only graph. `Held -> Open` is the single return edge, taken when
    /// the last pending hold goes away while seats remain.
    pub fn can_transition_to(&self, target: &SlotStatus) -> bool {
        use SlotStatus::*;
        match (self, target) {
            (from, to) if from == to => true,
            (Open, Held) => true,
            (Held, Booked) => true,
            (Held, Open) => true,
            (Open, Cancelled) | (Held, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Open => "open",
            SlotStatus::Held => "held",
            SlotStatus::Booked => "booked",
            SlotStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSlot {
    pub slot_id: Uuid,
    /// CNES code of the facility offering the slot.
    pub facility_id: u32,
    pub service: ServiceCode,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub capacity: u32,
    pub remaining: u32,
    pub held: u32,
    pub booked: u32,
    /// Last applied ingest sequence number.
    pub sequence: u64,
    pub status: SlotStatus,
    pub updated_at: DateTime<Utc>,
}

impl ServiceSlot {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes as i64)
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }

    /// Seats are fully accounted for: capacity == remaining + held + booked.
    pub fn is_consistent(&self) -> bool {
        self.remaining
            .checked_add(self.held)
            .and_then(|sum| sum.checked_add(self.booked))
            .map(|sum| sum == self.capacity)
            .unwrap_or(false)
    }

    /// Status agrees with the seat counters.
    pub fn status_matches_counts(&self) -> bool {
        match self.status {
            SlotStatus::Open => self.held == 0,
            SlotStatus::Held => self.held > 0,
            SlotStatus::Booked => self.held == 0 && self.remaining == 0 && self.booked > 0,
            SlotStatus::Cancelled => true,
        }
    }

    /// Whether a citizen could place a hold right now.
    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, SlotStatus::Open | SlotStatus::Held)
            && self.remaining > 0
            && !self.has_started(now)
    }

    /// The slot as it would look with every pending hold rolled back.
    pub fn committed(&self) -> ServiceSlot {
        let mut committed = self.clone();
        committed.remaining += committed.held;
        committed.held = 0;
        if committed.status == SlotStatus::Held {
            committed.status = SlotStatus::Open;
        }
        committed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDraft {
    pub facility_id: u32,
    pub service: ServiceCode,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub capacity: u32,
}

/// A mutation carried by an ingest update.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotChange {
    Create(SlotDraft),
    SetStatus(SlotStatus),
    SetCapacity(u32),
    Reschedule {
        start_time: DateTime<Utc>,
        duration_minutes: u32,
    },
}

/// Facility-originated slot event as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FacilityEvent {
    SlotCreated {
        slot_id: Uuid,
        sequence: u64,
        facility_id: u32,
        service: ServiceCode,
        start_time: DateTime<Utc>,
        duration_minutes: u32,
        capacity: u32,
    },
    SlotCancelled {
        slot_id: Uuid,
        sequence: u64,
    },
    CapacityChanged {
        slot_id: Uuid,
        sequence: u64,
        capacity: u32,
    },
    SlotRescheduled {
        slot_id: Uuid,
        sequence: u64,
        start_time: DateTime<Utc>,
        duration_minutes: u32,
    },
}

impl FacilityEvent {
    pub fn slot_id(&self) -> Uuid {
        match self {
            FacilityEvent::SlotCreated { slot_id, .. }
            | FacilityEvent::SlotCancelled { slot_id, .. }
            | FacilityEvent::CapacityChanged { slot_id, .. }
            | FacilityEvent::SlotRescheduled { slot_id, .. } => *slot_id,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            FacilityEvent::SlotCreated { sequence, .. }
            | FacilityEvent::SlotCancelled { sequence, .. }
            | FacilityEvent::CapacityChanged { sequence, .. }
            | FacilityEvent::SlotRescheduled { sequence, .. } => *sequence,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FacilityEvent::SlotCreated { .. } => "slot_created",
            FacilityEvent::SlotCancelled { .. } => "slot_cancelled",
            FacilityEvent::CapacityChanged { .. } => "capacity_changed",
            FacilityEvent::SlotRescheduled { .. } => "slot_rescheduled",
        }
    }

    pub fn into_change(self) -> SlotChange {
        match self {
            FacilityEvent::SlotCreated {
                facility_id,
                service,
                start_time,
                duration_minutes,
                capacity,
                ..
            } => SlotChange::Create(SlotDraft {
                facility_id,
                service,
                start_time,
                duration_minutes,
                capacity,
            }),
            FacilityEvent::SlotCancelled { .. } => SlotChange::SetStatus(SlotStatus::Cancelled),
            FacilityEvent::CapacityChanged { capacity, .. } => SlotChange::SetCapacity(capacity),
            FacilityEvent::SlotRescheduled {
                start_time,
                duration_minutes,
                ..
            } => SlotChange::Reschedule {
                start_time,
                duration_minutes,
            },
        }
    }
}

/// Published on every committed status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotTransition {
    pub slot_id: Uuid,
    pub facility_id: u32,
    pub service: ServiceCode,
    pub from: SlotStatus,
    pub to: SlotStatus,
    pub remaining: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Applied,
    Stale,
    Invalid,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    pub position: usize,
    pub slot_id: Option<Uuid>,
    pub outcome: IngestOutcome,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub applied: u64,
    pub stale: u64,
    pub invalid: u64,
    pub rejected: u64,
    pub failures: Vec<IngestFailure>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatsSnapshot {
    pub applied: u64,
    pub stale: u64,
    pub invalid: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SlotStoreStats {
    pub total_slots: usize,
    pub open: usize,
    pub held: usize,
    pub booked: usize,
    pub cancelled: usize,
}
