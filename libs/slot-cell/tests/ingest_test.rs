// libs/slot-cell/tests/ingest_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use shared_utils::test_utils::{hours_after_epoch, test_clock, SamplePayloads, TestServices};
use slot_cell::*;

fn setup() -> AvailabilityIngest {
    let store = Arc::new(SlotStore::new(Arc::new(test_clock()), SlotEventPublisher::new(16)));
    AvailabilityIngest::new(store)
}

fn created(slot_id: Uuid, sequence: u64, capacity: u32) -> serde_json::Value {
    SamplePayloads::slot_created(
        slot_id,
        sequence,
        2077485,
        TestServices::cardiology(),
        hours_after_epoch(24),
        capacity,
    )
}

#[test]
fn test_ingest_creates_slot_from_json() {
    let ingest = setup();
    let slot_id = Uuid::new_v4();
    let payload = created(slot_id, 1, 3).to_string();

    let slot = ingest.ingest_json(payload.as_bytes()).expect("event applies");
    assert_eq!(slot.slot_id, slot_id);
    assert_eq!(slot.facility_id, 2077485);
    assert_eq!(slot.service, TestServices::cardiology());
    assert_eq!(slot.duration_minutes, 30);
    assert_eq!(slot.status, SlotStatus::Open);

    assert_eq!(ingest.stats().applied, 1);
}

#[test]
fn test_malformed_payload_is_invalid_event() {
    let ingest = setup();

    let result = ingest.ingest_json(b"{\"type\": \"slot_exploded\"}");
    assert_matches!(result, Err(SlotError::InvalidEvent(_)));

    let result = ingest.ingest_json(b"not json at all");
    assert_matches!(result, Err(SlotError::InvalidEvent(_)));

    assert_eq!(ingest.stats().invalid, 2);
    assert!(ingest.store().is_empty(), "nothing reaches the store");
}

#[test]
fn test_event_validation() {
    let ingest = setup();

    let zero_capacity = ingest.ingest_value(created(Uuid::new_v4(), 1, 0));
    assert_matches!(zero_capacity, Err(SlotError::InvalidEvent(_)));

    let zero_sequence = ingest.ingest_value(created(Uuid::new_v4(), 0, 2));
    assert_matches!(zero_sequence, Err(SlotError::InvalidEvent(_)));

    let slot_id = Uuid::new_v4();
    ingest.ingest_value(created(slot_id, 1, 2)).unwrap();
    let zero_duration = ingest.ingest_value(json!({
        "type": "slot_rescheduled",
        "slot_id": slot_id,
        "sequence": 2,
        "start_time": hours_after_epoch(30).to_rfc3339(),
        "duration_minutes": 0
    }));
    assert_matches!(zero_duration, Err(SlotError::InvalidEvent(_)));
}

#[test]
fn test_cancel_before_late_capacity_change() {
    let ingest = setup();
    let slot_id = Uuid::new_v4();
    ingest.ingest_value(created(slot_id, 1, 4)).unwrap();

    ingest
        .ingest_value(SamplePayloads::slot_cancelled(slot_id, 5))
        .expect("cancellation applies");
    let late = ingest.ingest_value(SamplePayloads::capacity_changed(slot_id, 4, 10));

    assert_matches!(late, Err(SlotError::StaleUpdate { stored: 5, received: 4, .. }));
    let slot = ingest.store().get(slot_id).unwrap();
    assert_eq!(slot.status, SlotStatus::Cancelled);
    assert_eq!(slot.capacity, 4);

    let stats = ingest.stats();
    assert_eq!((stats.applied, stats.stale), (2, 1));
}

#[test]
fn test_older_sequence_after_newer_leaves_state_unchanged() {
    let ingest = setup();
    let slot_id = Uuid::new_v4();
    ingest.ingest_value(created(slot_id, 1, 4)).unwrap();
    ingest
        .ingest_value(SamplePayloads::capacity_changed(slot_id, 7, 6))
        .unwrap();
    let before = ingest.store().get(slot_id).unwrap();

    let result = ingest.ingest_value(SamplePayloads::capacity_changed(slot_id, 5, 2));
    assert_matches!(result, Err(SlotError::StaleUpdate { stored: 7, received: 5, .. }));
    assert_eq!(*ingest.store().get(slot_id).unwrap(), *before);
}

#[test]
fn test_capacity_change_on_cancelled_slot_is_rejected() {
    let ingest = setup();
    let slot_id = Uuid::new_v4();
    ingest.ingest_value(created(slot_id, 1, 4)).unwrap();
    ingest.ingest_value(SamplePayloads::slot_cancelled(slot_id, 2)).unwrap();

    let result = ingest.ingest_value(SamplePayloads::capacity_changed(slot_id, 3, 6));
    assert_matches!(result, Err(SlotError::Locked { status: SlotStatus::Cancelled, .. }));
    assert_eq!(ingest.stats().rejected, 1);
}

#[test]
fn test_reschedule_event() {
    let ingest = setup();
    let slot_id = Uuid::new_v4();
    ingest.ingest_value(created(slot_id, 1, 1)).unwrap();

    let slot = ingest
        .ingest_value(SamplePayloads::slot_rescheduled(slot_id, 2, hours_after_epoch(48)))
        .unwrap();
    assert_eq!(slot.start_time, hours_after_epoch(48));
    assert_eq!(slot.sequence, 2);
}

#[test]
fn test_batch_reports_each_failure() {
    let ingest = setup();
    let slot_id = Uuid::new_v4();

    let report = ingest.ingest_batch(vec![
        created(slot_id, 1, 2),
        SamplePayloads::capacity_changed(slot_id, 3, 5),
        SamplePayloads::capacity_changed(slot_id, 2, 9),
        json!({ "type": "slot_cancelled" }),
        SamplePayloads::slot_cancelled(Uuid::new_v4(), 1),
    ]);

    assert_eq!(report.applied, 2);
    assert_eq!(report.stale, 1);
    assert_eq!(report.invalid, 1);
    assert_eq!(report.rejected, 1);

    let positions: Vec<usize> = report.failures.iter().map(|f| f.position).collect();
    assert_eq!(positions, vec![2, 3, 4]);
    assert_eq!(report.failures[0].slot_id, Some(slot_id));
    assert_eq!(report.failures[0].outcome, IngestOutcome::Stale);
    assert_eq!(report.failures[1].slot_id, None);

    assert_eq!(ingest.store().get(slot_id).unwrap().capacity, 5);
}

#[tokio::test]
async fn test_pipeline_applies_events_in_order_per_slot() {
    let ingest = Arc::new(setup());
    let pipeline = IngestPipeline::start(ingest.clone(), 3, 32, CancellationToken::new());

    let slot_ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
    for slot_id in &slot_ids {
        let create: FacilityEvent = serde_json::from_value(created(*slot_id, 1, 2)).unwrap();
        pipeline.submit(create).await.unwrap();
        for sequence in 2..=5 {
            pipeline
                .submit(FacilityEvent::CapacityChanged {
                    slot_id: *slot_id,
                    sequence,
                    capacity: sequence as u32 + 10,
                })
                .await
                .unwrap();
        }
    }

    pipeline.shutdown().await;

    for slot_id in &slot_ids {
        let slot = ingest.store().get(*slot_id).expect("slot created by a worker");
        assert_eq!(slot.sequence, 5);
        assert_eq!(slot.capacity, 15);
    }
    let stats = ingest.stats();
    assert_eq!(stats.applied, 30);
    assert_eq!(stats.stale, 0, "same-slot events keep their order");
}

#[tokio::test]
async fn test_pipeline_rejects_after_shutdown() {
    let ingest = Arc::new(setup());
    let token = CancellationToken::new();
    let pipeline = IngestPipeline::start(ingest, 1, 4, token.clone());
    assert!(pipeline.is_running());

    token.cancel();
    sleep(Duration::from_millis(10)).await;
    pipeline.shutdown().await;

    assert!(!pipeline.is_running());
    let result = pipeline
        .submit(FacilityEvent::SlotCancelled {
            slot_id: Uuid::new_v4(),
            sequence: 1,
        })
        .await;
    assert_matches!(result, Err(SlotError::PipelineClosed));
}
