use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_utils::Clock;
use slot_cell::{ServiceSlot, SlotStatus, SlotStore};

use crate::error::ReservationError;
use crate::models::{
    Booking, ConfirmOutcome, ConfirmedSlot, Hold, HoldPolicy, ReleaseOutcome, ReservationStats,
    SlotHolds, SweepReport,
};

/// Places, confirms and releases holds on top of the slot store.
///
/// Holds live in `holds`, keyed by slot. Every operation takes the
/// slot's holds entry first and the slot's write lock second, so the two
/// always change together.
pub struct ReservationCoordinator {
    store: Arc<SlotStore>,
    holds: DashMap<Uuid, SlotHolds>,
    clock: Arc<dyn Clock>,
    policy: HoldPolicy,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<SlotStore>, policy: HoldPolicy) -> Self {
        let clock = store.clock();
        Self {
            store,
            holds: DashMap::new(),
            clock,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<SlotStore> {
        &self.store
    }

    pub fn policy(&self) -> HoldPolicy {
        self.policy
    }

    pub fn place_hold(
        &self,
        slot_id: Uuid,
        requester_id: &str,
        ttl: Option<Duration>,
    ) -> Result<Hold, ReservationError> {
        validate_requester(requester_id)?;
        let ttl = ttl.unwrap_or(self.policy.default_ttl);
        if ttl <= Duration::zero() || ttl > self.policy.max_ttl {
            return Err(ReservationError::InvalidRequest(format!(
                "hold TTL must be between 1 and {} seconds",
                self.policy.max_ttl.num_seconds()
            )));
        }

        let (_, hold) = self.with_slot_holds(slot_id, |slot, holds, _, now| {
            if slot.status.is_terminal() {
                return Err(ReservationError::SlotUnavailable {
                    slot_id,
                    status: slot.status,
                });
            }
            if slot.has_started(now) {
                return Err(ReservationError::Expired(format!(
                    "slot {} started at {}",
                    slot_id, slot.start_time
                )));
            }
            if holds.live_position(requester_id).is_some() {
                return Err(ReservationError::HoldConflict(format!(
                    "requester already holds slot {}",
                    slot_id
                )));
            }
            if slot.remaining == 0 {
                return Err(ReservationError::CapacityExhausted(slot_id));
            }

            slot.remaining -= 1;
            slot.held += 1;
            slot.status = SlotStatus::Held;

            let hold = Hold {
                hold_id: Uuid::new_v4(),
                slot_id,
                requester_id: requester_id.to_string(),
                created_at: now,
                // A hold never outlives the appointment it is for.
                expires_at: (now + ttl).min(slot.start_time),
            };
            holds.forget_lapsed(requester_id);
            holds.live.push(hold.clone());
            Ok(hold)
        })?;

        info!("Hold {} placed on slot {} until {}", hold.hold_id, slot_id, hold.expires_at);
        Ok(hold)
    }

    pub fn confirm(
        &self,
        slot_id: Uuid,
        requester_id: &str,
    ) -> Result<ConfirmedSlot, ReservationError> {
        validate_requester(requester_id)?;

        let (slot, outcome) = self.with_slot_holds(slot_id, |slot, holds, _, now| {
            let Some(position) = holds.live_position(requester_id) else {
                return match holds.take_lapsed(requester_id) {
                    Some(_) => Ok(ConfirmOutcome::Expired),
                    None => Err(no_hold(slot_id)),
                };
            };
            let hold = holds.live.remove(position);

            if slot.status == SlotStatus::Cancelled {
                return_seat(slot);
                return Ok(ConfirmOutcome::Withdrawn);
            }

            slot.held -= 1;
            slot.booked += 1;
            slot.status = if slot.held > 0 {
                SlotStatus::Held
            } else if slot.remaining == 0 {
                SlotStatus::Booked
            } else {
                SlotStatus::Open
            };

            Ok(ConfirmOutcome::Confirmed(Booking {
                hold_id: hold.hold_id,
                slot_id,
                requester_id: hold.requester_id,
                facility_id: slot.facility_id,
                start_time: slot.start_time,
                confirmed_at: now,
            }))
        })?;

        match outcome {
            ConfirmOutcome::Confirmed(booking) => {
                info!(
                    "Hold {} confirmed on slot {} ({})",
                    booking.hold_id, slot_id, slot.status
                );
                Ok(ConfirmedSlot {
                    booking,
                    slot: ServiceSlot::clone(&slot),
                })
            }
            ConfirmOutcome::Expired => Err(ReservationError::Expired(format!(
                "hold on slot {} lapsed before confirmation",
                slot_id
            ))),
            ConfirmOutcome::Withdrawn => Err(ReservationError::SlotUnavailable {
                slot_id,
                status: slot.status,
            }),
        }
    }

    pub fn release(
        &self,
        slot_id: Uuid,
        requester_id: &str,
    ) -> Result<Arc<ServiceSlot>, ReservationError> {
        validate_requester(requester_id)?;

        let (slot, outcome) = self.with_slot_holds(slot_id, |slot, holds, _, _| {
            let Some(position) = holds.live_position(requester_id) else {
                return match holds.take_lapsed(requester_id) {
                    Some(_) => Ok(ReleaseOutcome::Expired),
                    None => Err(no_hold(slot_id)),
                };
            };

            let hold = holds.live.remove(position);
            return_seat(slot);
            Ok(ReleaseOutcome::Released(hold))
        })?;

        match outcome {
            ReleaseOutcome::Released(hold) => {
                info!("Hold {} released on slot {}", hold.hold_id, slot_id);
                Ok(slot)
            }
            ReleaseOutcome::Expired => Err(ReservationError::Expired(format!(
                "hold on slot {} had already lapsed",
                slot_id
            ))),
        }
    }

    /// Return every lapsed hold's seat to its slot.
    pub fn sweep_expired(&self) -> SweepReport {
        let now = self.clock.now();
        let due: Vec<Uuid> = self
            .holds
            .iter()
            .filter(|entry| entry.value().live.iter().any(|hold| hold.is_expired(now)))
            .map(|entry| *entry.key())
            .collect();

        let mut report = SweepReport::default();
        for slot_id in due {
            report.slots_visited += 1;
            match self.with_slot_holds(slot_id, |_, _, reaped, _| Ok(reaped)) {
                Ok((_, released)) => report.holds_released += released,
                Err(ReservationError::NotFound(_)) => {
                    warn!("Dropping holds for vanished slot {}", slot_id);
                    self.holds.remove(&slot_id);
                }
                Err(e) => warn!("Failed to sweep slot {}: {}", slot_id, e),
            }
        }
        let forgotten = self.forget_started(now);

        if report.holds_released > 0 {
            info!(
                "Released {} expired holds across {} slots",
                report.holds_released, report.slots_visited
            );
        }
        if forgotten > 0 {
            debug!("Forgot {} lapsed holds on started slots", forgotten);
        }
        report
    }

    pub fn holds_for(&self, slot_id: Uuid) -> Vec<Hold> {
        self.holds
            .get(&slot_id)
            .map(|entry| entry.value().live.clone())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> ReservationStats {
        let mut stats = ReservationStats::default();
        for entry in self.holds.iter() {
            let live = &entry.value().live;
            if !live.is_empty() {
                stats.slots_with_holds += 1;
                stats.active_holds += live.len();
            }
        }
        stats
    }

    /// Drop lapsed-hold records of slots that have started or no longer exist.
    fn forget_started(&self, now: DateTime<Utc>) -> usize {
        let mut forgotten = 0;
        self.holds.retain(|slot_id, holds| {
            if !holds.lapsed.is_empty() {
                let started = self
                    .store
                    .get(*slot_id)
                    .map(|slot| slot.has_started(now))
                    .unwrap_or(true);
                if started {
                    forgotten += holds.lapsed.len();
                    holds.lapsed.clear();
                }
            }
            !holds.is_empty()
        });
        forgotten
    }

    /// Run `op` with the slot and its holds locked together. Lapsed holds are
    /// reaped first and their count handed to `op`; nothing is kept unless
    /// the slot commit succeeds.
    fn with_slot_holds<T, F>(
        &self,
        slot_id: Uuid,
        op: F,
    ) -> Result<(Arc<ServiceSlot>, T), ReservationError>
    where
        F: FnOnce(
            &mut ServiceSlot,
            &mut SlotHolds,
            usize,
            DateTime<Utc>,
        ) -> Result<T, ReservationError>,
    {
        let mut entry = self.holds.entry(slot_id).or_default();
        let now = self.clock.now();
        let mut holds = entry.value().clone();

        let result = self.store.mutate(slot_id, |slot| {
            if slot.has_started(now) {
                holds.lapsed.clear();
            }
            let reaped = reap_expired(slot, &mut holds, now);
            if reaped > 0 {
                debug!("Reaped {} lapsed holds on slot {}", reaped, slot_id);
            }
            op(slot, &mut holds, reaped, now)
        });

        if result.is_ok() {
            *entry.value_mut() = holds;
        }
        let empty = entry.value().is_empty();
        drop(entry);
        if empty {
            self.holds.remove_if(&slot_id, |_, holds| holds.is_empty());
        }

        result
    }
}

fn validate_requester(requester_id: &str) -> Result<(), ReservationError> {
    if requester_id.trim().is_empty() {
        return Err(ReservationError::InvalidRequest("requester_id is required".to_string()));
    }
    Ok(())
}

fn no_hold(slot_id: Uuid) -> ReservationError {
    ReservationError::HoldConflict(format!("no hold on slot {} for requester", slot_id))
}

/// Give one held seat back to the slot.
fn return_seat(slot: &mut ServiceSlot) {
    slot.held -= 1;
    slot.remaining += 1;
    if slot.status == SlotStatus::Held && slot.held == 0 {
        slot.status = SlotStatus::Open;
    }
}

/// Move lapsed holds from `live` to `lapsed`, returning their seats.
fn reap_expired(slot: &mut ServiceSlot, holds: &mut SlotHolds, now: DateTime<Utc>) -> usize {
    let (expired, live): (Vec<Hold>, Vec<Hold>) =
        holds.live.drain(..).partition(|hold| hold.is_expired(now));
    holds.live = live;
    for _ in &expired {
        return_seat(slot);
    }
    let reaped = expired.len();
    holds.lapsed.extend(expired);
    reaped
}
