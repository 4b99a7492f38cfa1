use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::{ServiceCode, TimeWindow};
use shared_utils::Clock;

use crate::error::SlotError;
use crate::models::{ServiceSlot, SlotChange, SlotDraft, SlotStatus, SlotStoreStats, SlotTransition};
use crate::services::events::{SlotEventPublisher, TransitionReceiver};

type IndexKey = (DateTime<Utc>, Uuid);
type StartIndex = ArcSwap<BTreeSet<IndexKey>>;

const MAX_UUID: Uuid = Uuid::from_u128(u128::MAX);

/// One slot. Readers load `state` without locking; writers serialize on
/// `write_lock` and publish a whole new value, so a reader never observes a
/// half-applied update.
struct SlotRecord {
    state: ArcSwap<ServiceSlot>,
    write_lock: Mutex<()>,
}

impl SlotRecord {
    fn new(slot: ServiceSlot) -> Self {
        Self {
            state: ArcSwap::from_pointee(slot),
            write_lock: Mutex::new(()),
        }
    }
}

/// Authoritative in-memory availability.
///
/// Slots are sharded by id in a `DashMap`; each service keeps a copy-on-write
/// start-time index so `query_open` can walk slots in chronological order
/// without holding any lock.
pub struct SlotStore {
    slots: DashMap<Uuid, Arc<SlotRecord>>,
    by_service: DashMap<ServiceCode, Arc<StartIndex>>,
    events: SlotEventPublisher,
    clock: Arc<dyn Clock>,
}

impl SlotStore {
    pub fn new(clock: Arc<dyn Clock>, events: SlotEventPublisher) -> Self {
        Self {
            slots: DashMap::new(),
            by_service: DashMap::new(),
            events,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn subscribe(&self) -> TransitionReceiver {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot_id: Uuid) -> Result<Arc<ServiceSlot>, SlotError> {
        self.record(slot_id)
            .map(|record| record.state.load_full())
            .ok_or(SlotError::NotFound(slot_id))
    }

    /// Apply a sequenced update. Updates at or below the stored sequence are
    /// rejected as stale and leave the slot untouched; so does any update that
    /// fails validation.
    pub fn apply_update(
        &self,
        slot_id: Uuid,
        sequence: u64,
        change: SlotChange,
    ) -> Result<Arc<ServiceSlot>, SlotError> {
        match change {
            SlotChange::Create(draft) => self.create(slot_id, sequence, draft),
            change => {
                let record = self.record(slot_id).ok_or(SlotError::UnknownSlot(slot_id))?;
                let (slot, ()) = self.commit(&record, |slot| {
                    if sequence <= slot.sequence {
                        return Err(SlotError::StaleUpdate {
                            slot_id,
                            stored: slot.sequence,
                            received: sequence,
                        });
                    }
                    apply_change(slot, change)?;
                    slot.sequence = sequence;
                    Ok(())
                })?;
                Ok(slot)
            }
        }
    }

    /// Run `f` against a private copy of the slot under the slot's write lock.
    /// The copy replaces the current state only if `f` succeeds and the result
    /// still satisfies the seat and status invariants.
    pub fn mutate<T, E, F>(&self, slot_id: Uuid, f: F) -> Result<(Arc<ServiceSlot>, T), E>
    where
        F: FnOnce(&mut ServiceSlot) -> Result<T, E>,
        E: From<SlotError>,
    {
        let record = self.record(slot_id).ok_or(SlotError::NotFound(slot_id))?;
        self.commit(&record, f)
    }

    /// Bookable slots for `service`, ascending by start time, optionally
    /// restricted to a window (inclusive at both ends).
    pub fn query_open(&self, service: ServiceCode, window: Option<TimeWindow>) -> OpenSlots<'_> {
        self.open_slots(None, service, window)
    }

    pub fn query_open_at(
        &self,
        facility_id: u32,
        service: ServiceCode,
        window: Option<TimeWindow>,
    ) -> OpenSlots<'_> {
        self.open_slots(Some(facility_id), service, window)
    }

    /// Replace the store contents with previously persisted slots.
    pub fn restore(&self, slots: Vec<ServiceSlot>) -> usize {
        let mut restored = 0;
        for slot in slots {
            if !slot.is_consistent() {
                debug!("Skipping inconsistent persisted slot {}", slot.slot_id);
                continue;
            }
            let key = (slot.start_time, slot.slot_id);
            let service = slot.service;
            let record = Arc::new(SlotRecord::new(slot));
            if let Some(previous) = self.slots.insert(key.1, record) {
                let previous = previous.state.load();
                self.unindex(previous.service, (previous.start_time, previous.slot_id));
            }
            self.index(service, key);
            restored += 1;
        }

        info!("Restored {} slots", restored);
        restored
    }

    /// Committed state of every slot, with pending holds rolled back.
    pub fn committed_snapshot(&self) -> Vec<ServiceSlot> {
        let mut slots: Vec<ServiceSlot> = self
            .slots
            .iter()
            .map(|entry| entry.value().state.load().committed())
            .collect();
        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.slot_id.cmp(&b.slot_id)));
        slots
    }

    /// Drop index entries for slots that started already or can never be
    /// offered again. Slot records stay readable through `get`.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let indexes: Vec<Arc<StartIndex>> =
            self.by_service.iter().map(|entry| entry.value().clone()).collect();

        let mut pruned = 0;
        for index in indexes {
            let stale: Vec<IndexKey> = index
                .load()
                .iter()
                .filter(|(start, slot_id)| {
                    *start <= now
                        || self
                            .record(*slot_id)
                            .map(|record| record.state.load().status.is_terminal())
                            .unwrap_or(true)
                })
                .copied()
                .collect();
            if stale.is_empty() {
                continue;
            }
            pruned += stale.len();
            index.rcu(|set| {
                let mut next = BTreeSet::clone(set);
                for key in &stale {
                    next.remove(key);
                }
                next
            });
        }

        if pruned > 0 {
            debug!("Pruned {} index entries", pruned);
        }
        pruned
    }

    pub fn stats(&self) -> SlotStoreStats {
        let mut stats = SlotStoreStats::default();
        for entry in self.slots.iter() {
            stats.total_slots += 1;
            match entry.value().state.load().status {
                SlotStatus::Open => stats.open += 1,
                SlotStatus::Held => stats.held += 1,
                SlotStatus::Booked => stats.booked += 1,
                SlotStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    fn record(&self, slot_id: Uuid) -> Option<Arc<SlotRecord>> {
        self.slots.get(&slot_id).map(|entry| entry.value().clone())
    }

    fn create(
        &self,
        slot_id: Uuid,
        sequence: u64,
        draft: SlotDraft,
    ) -> Result<Arc<ServiceSlot>, SlotError> {
        if sequence == 0 {
            return Err(SlotError::InvalidEvent("sequence must start at 1".to_string()));
        }
        if draft.capacity == 0 || draft.duration_minutes == 0 {
            return Err(SlotError::InvalidEvent(
                "capacity and duration_minutes must be positive".to_string(),
            ));
        }

        let slot = Arc::new(ServiceSlot {
            slot_id,
            facility_id: draft.facility_id,
            service: draft.service,
            start_time: draft.start_time,
            duration_minutes: draft.duration_minutes,
            capacity: draft.capacity,
            remaining: draft.capacity,
            held: 0,
            booked: 0,
            sequence,
            status: SlotStatus::Open,
            updated_at: self.clock.now(),
        });

        match self.slots.entry(slot_id) {
            Entry::Occupied(entry) => {
                let stored = entry.get().state.load().sequence;
                if sequence <= stored {
                    return Err(SlotError::StaleUpdate {
                        slot_id,
                        stored,
                        received: sequence,
                    });
                }
                return Err(SlotError::AlreadyExists(slot_id));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(SlotRecord {
                    state: ArcSwap::new(slot.clone()),
                    write_lock: Mutex::new(()),
                }));
            }
        }

        self.index(slot.service, (slot.start_time, slot_id));
        debug!("Created slot {} at facility {} for {}", slot_id, slot.facility_id, slot.service);
        Ok(slot)
    }

    fn commit<T, E, F>(&self, record: &SlotRecord, f: F) -> Result<(Arc<ServiceSlot>, T), E>
    where
        F: FnOnce(&mut ServiceSlot) -> Result<T, E>,
        E: From<SlotError>,
    {
        let guard = record.write_lock.lock();
        let before = record.state.load_full();
        let mut next = ServiceSlot::clone(&before);

        let output = f(&mut next)?;

        if !next.is_consistent() {
            return Err(SlotError::CapacityViolation(format!(
                "capacity {} != remaining {} + held {} + booked {}",
                next.capacity, next.remaining, next.held, next.booked
            ))
            .into());
        }
        if !before.status.can_transition_to(&next.status) || !next.status_matches_counts() {
            return Err(SlotError::InvalidTransition {
                from: before.status,
                to: next.status,
            }
            .into());
        }

        next.updated_at = self.clock.now();
        let next = Arc::new(next);
        record.state.store(next.clone());

        if before.start_time != next.start_time {
            self.unindex(before.service, (before.start_time, before.slot_id));
            self.index(next.service, (next.start_time, next.slot_id));
        }
        drop(guard);

        if before.status != next.status {
            self.events.publish(SlotTransition {
                slot_id: next.slot_id,
                facility_id: next.facility_id,
                service: next.service,
                from: before.status,
                to: next.status,
                remaining: next.remaining,
                at: next.updated_at,
            });
        }

        Ok((next, output))
    }

    fn start_index(&self, service: ServiceCode) -> Arc<StartIndex> {
        self.by_service
            .entry(service)
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(BTreeSet::new())))
            .value()
            .clone()
    }

    fn index(&self, service: ServiceCode, key: IndexKey) {
        self.start_index(service).rcu(|set| {
            let mut next = BTreeSet::clone(set);
            next.insert(key);
            next
        });
    }

    fn unindex(&self, service: ServiceCode, key: IndexKey) {
        if let Some(index) = self.by_service.get(&service).map(|entry| entry.value().clone()) {
            index.rcu(|set| {
                let mut next = BTreeSet::clone(set);
                next.remove(&key);
                next
            });
        }
    }

    fn open_slots(
        &self,
        facility_id: Option<u32>,
        service: ServiceCode,
        window: Option<TimeWindow>,
    ) -> OpenSlots<'_> {
        let (lower, upper) = match window {
            Some(window) => (
                Bound::Included((window.start, Uuid::nil())),
                Bound::Included((window.end, MAX_UUID)),
            ),
            None => (Bound::Unbounded, Bound::Unbounded),
        };
        let index = match window {
            Some(window) if !window.is_valid() => None,
            _ => self.by_service.get(&service).map(|entry| entry.value().load_full()),
        };

        OpenSlots {
            store: self,
            index,
            cursor: lower,
            upper,
            facility_id,
            now: self.clock.now(),
        }
    }
}

fn apply_change(slot: &mut ServiceSlot, change: SlotChange) -> Result<(), SlotError> {
    match change {
        SlotChange::Create(_) => Err(SlotError::AlreadyExists(slot.slot_id)),
        SlotChange::SetStatus(status) => {
            slot.status = status;
            Ok(())
        }
        SlotChange::SetCapacity(capacity) => {
            if slot.status.is_terminal() {
                return Err(SlotError::Locked {
                    slot_id: slot.slot_id,
                    status: slot.status,
                    reason: "capacity is frozen".to_string(),
                });
            }
            let committed = slot.held + slot.booked;
            slot.remaining = capacity.checked_sub(committed).ok_or_else(|| {
                SlotError::CapacityViolation(format!(
                    "capacity {} is below {} held or booked seats",
                    capacity, committed
                ))
            })?;
            slot.capacity = capacity;
            Ok(())
        }
        SlotChange::Reschedule {
            start_time,
            duration_minutes,
        } => {
            if duration_minutes == 0 {
                return Err(SlotError::InvalidEvent(
                    "duration_minutes must be positive".to_string(),
                ));
            }
            if slot.status != SlotStatus::Open || slot.held > 0 || slot.booked > 0 {
                return Err(SlotError::Locked {
                    slot_id: slot.slot_id,
                    status: slot.status,
                    reason: "only untouched open slots can be rescheduled".to_string(),
                });
            }
            slot.start_time = start_time;
            slot.duration_minutes = duration_minutes;
            Ok(())
        }
    }
}

/// Lazy walk over bookable slots in start-time order.
///
/// Holds a snapshot of the service's start index; slot states are loaded as
/// the walk advances, so a slot that is booked or cancelled meanwhile is
/// skipped. Calling `query_open` again restarts from the beginning.
pub struct OpenSlots<'a> {
    store: &'a SlotStore,
    index: Option<Arc<BTreeSet<IndexKey>>>,
    cursor: Bound<IndexKey>,
    upper: Bound<IndexKey>,
    facility_id: Option<u32>,
    now: DateTime<Utc>,
}

impl Iterator for OpenSlots<'_> {
    type Item = Arc<ServiceSlot>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.index.as_ref()?;
        loop {
            let key = *index.range((self.cursor, self.upper)).next()?;
            self.cursor = Bound::Excluded(key);

            let Some(record) = self.store.record(key.1) else {
                continue;
            };
            let slot = record.state.load_full();

            // Rescheduled since the index snapshot was taken; the slot is
            // reachable under its new key instead.
            if slot.start_time != key.0 {
                continue;
            }
            if self.facility_id.is_some_and(|facility_id| facility_id != slot.facility_id) {
                continue;
            }
            if slot.is_bookable(self.now) {
                return Some(slot);
            }
        }
    }
}
