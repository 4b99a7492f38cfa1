use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SlotError;
use crate::models::{
    FacilityEvent, IngestFailure, IngestOutcome, IngestReport, IngestStatsSnapshot, ServiceSlot,
};
use crate::services::store::SlotStore;

#[derive(Debug, Default)]
pub struct IngestStats {
    applied: AtomicU64,
    stale: AtomicU64,
    invalid: AtomicU64,
    rejected: AtomicU64,
}

impl IngestStats {
    fn record(&self, outcome: IngestOutcome) {
        let counter = match outcome {
            IngestOutcome::Applied => &self.applied,
            IngestOutcome::Stale => &self.stale,
            IngestOutcome::Invalid => &self.invalid,
            IngestOutcome::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Turns facility events into sequenced store updates.
pub struct AvailabilityIngest {
    store: Arc<SlotStore>,
    stats: IngestStats,
}

impl AvailabilityIngest {
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self {
            store,
            stats: IngestStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<SlotStore> {
        &self.store
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn ingest(&self, event: FacilityEvent) -> Result<Arc<ServiceSlot>, SlotError> {
        let slot_id = event.slot_id();
        let sequence = event.sequence();
        let kind = event.kind();

        let result = validate(&event)
            .and_then(|()| self.store.apply_update(slot_id, sequence, event.into_change()));
        let outcome = classify(&result);
        self.stats.record(outcome);

        match &result {
            Ok(slot) => debug!(
                "Applied {} #{} to slot {} ({})",
                kind, sequence, slot_id, slot.status
            ),
            Err(err @ SlotError::StaleUpdate { .. }) => warn!("Dropping {}: {}", kind, err),
            Err(err) => warn!("Rejected {} #{} for slot {}: {}", kind, sequence, slot_id, err),
        }

        result
    }

    /// Decode one JSON event and apply it. Anything that fails to decode is
    /// an `InvalidEvent` and never reaches the store.
    pub fn ingest_json(&self, payload: &[u8]) -> Result<Arc<ServiceSlot>, SlotError> {
        let event = serde_json::from_slice::<FacilityEvent>(payload)
            .map_err(|e| self.malformed(e))?;
        self.ingest(event)
    }

    pub fn ingest_value(&self, value: Value) -> Result<Arc<ServiceSlot>, SlotError> {
        let event = serde_json::from_value::<FacilityEvent>(value).map_err(|e| self.malformed(e))?;
        self.ingest(event)
    }

    /// Apply events in order. Failures are reported per position; they never
    /// stop the batch.
    pub fn ingest_batch(&self, events: Vec<Value>) -> IngestReport {
        let mut report = IngestReport::default();

        for (position, value) in events.into_iter().enumerate() {
            let slot_id = value
                .get("slot_id")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse().ok());

            let result = self.ingest_value(value);
            let outcome = classify(&result);
            match outcome {
                IngestOutcome::Applied => report.applied += 1,
                IngestOutcome::Stale => report.stale += 1,
                IngestOutcome::Invalid => report.invalid += 1,
                IngestOutcome::Rejected => report.rejected += 1,
            }
            if let Err(err) = result {
                report.failures.push(IngestFailure {
                    position,
                    slot_id,
                    outcome,
                    error: err.to_string(),
                });
            }
        }

        info!(
            "Ingested batch: {} applied, {} stale, {} invalid, {} rejected",
            report.applied, report.stale, report.invalid, report.rejected
        );
        report
    }

    fn malformed(&self, err: serde_json::Error) -> SlotError {
        self.stats.record(IngestOutcome::Invalid);
        warn!("Malformed facility event: {}", err);
        SlotError::InvalidEvent(err.to_string())
    }
}

fn validate(event: &FacilityEvent) -> Result<(), SlotError> {
    if event.sequence() == 0 {
        return Err(SlotError::InvalidEvent("sequence must start at 1".to_string()));
    }

    match event {
        FacilityEvent::SlotCreated {
            capacity,
            duration_minutes,
            ..
        } => {
            if *capacity == 0 {
                return Err(SlotError::InvalidEvent("capacity must be positive".to_string()));
            }
            if *duration_minutes == 0 {
                return Err(SlotError::InvalidEvent(
                    "duration_minutes must be positive".to_string(),
                ));
            }
        }
        FacilityEvent::SlotRescheduled { duration_minutes, .. } if *duration_minutes == 0 => {
            return Err(SlotError::InvalidEvent("duration_minutes must be positive".to_string()));
        }
        _ => {}
    }

    Ok(())
}

fn classify(result: &Result<Arc<ServiceSlot>, SlotError>) -> IngestOutcome {
    match result {
        Ok(_) => IngestOutcome::Applied,
        Err(SlotError::StaleUpdate { .. }) => IngestOutcome::Stale,
        Err(SlotError::InvalidEvent(_)) => IngestOutcome::Invalid,
        Err(_) => IngestOutcome::Rejected,
    }
}
