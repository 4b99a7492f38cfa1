use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use facility_cell::FacilityIndex;
use reservation_cell::{HoldPolicy, HoldSweeper, ReservationCoordinator};
use search_cell::{PlannerConfig, QueryPlanner};
use shared_config::AppConfig;
use shared_utils::Clock;
use slot_cell::{
    persist_committed, restore_from, AvailabilityIngest, FileSnapshotStore, IngestPipeline,
    SlotEventPublisher, SlotStore, SnapshotStore,
};

/// Every long-lived component of the service, wired together once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub facilities: Arc<FacilityIndex>,
    pub slots: Arc<SlotStore>,
    pub ingest: Arc<AvailabilityIngest>,
    pub pipeline: Arc<IngestPipeline>,
    pub coordinator: Arc<ReservationCoordinator>,
    pub planner: Arc<QueryPlanner>,
    pub snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl AppState {
    /// Must be called from within a Tokio runtime: the ingest workers start here.
    pub fn build(
        config: Arc<AppConfig>,
        clock: Arc<dyn Clock>,
        shutdown: &CancellationToken,
    ) -> Self {
        let facilities = Arc::new(FacilityIndex::new(config.grid_cell_degrees));
        let events = SlotEventPublisher::new(config.event_channel_capacity);
        let slots = Arc::new(SlotStore::new(clock, events));
        let ingest = Arc::new(AvailabilityIngest::new(slots.clone()));
        let pipeline = Arc::new(IngestPipeline::start(
            ingest.clone(),
            config.ingest_workers,
            config.event_channel_capacity,
            shutdown.child_token(),
        ));
        let coordinator = Arc::new(ReservationCoordinator::new(
            slots.clone(),
            HoldPolicy::from_config(&config),
        ));
        let planner = Arc::new(QueryPlanner::new(
            facilities.clone(),
            slots.clone(),
            PlannerConfig::from_config(&config),
        ));
        let snapshots = config
            .snapshot_path
            .as_ref()
            .map(|path| Arc::new(FileSnapshotStore::new(path)) as Arc<dyn SnapshotStore>);

        Self {
            config,
            facilities,
            slots,
            ingest,
            pipeline,
            coordinator,
            planner,
            snapshots,
        }
    }

    /// Build the state and load the last snapshot. An unreadable snapshot
    /// stops startup, so it is never overwritten by an empty store.
    pub async fn start(
        config: Arc<AppConfig>,
        clock: Arc<dyn Clock>,
        shutdown: &CancellationToken,
    ) -> anyhow::Result<Self> {
        let state = Self::build(config, clock, shutdown);
        let restored = state.restore().await.with_context(|| {
            format!(
                "failed to restore slot snapshot from {}",
                state.config.snapshot_path.as_deref().unwrap_or_default()
            )
        })?;
        if restored > 0 {
            info!("Restored {} slots from snapshot", restored);
        }
        Ok(state)
    }

    pub async fn restore(&self) -> anyhow::Result<usize> {
        match &self.snapshots {
            Some(snapshots) => Ok(restore_from(&self.slots, snapshots.as_ref()).await?),
            None => Ok(0),
        }
    }

    pub async fn flush(&self) -> anyhow::Result<usize> {
        match &self.snapshots {
            Some(snapshots) => Ok(persist_committed(&self.slots, snapshots.as_ref()).await?),
            None => Ok(0),
        }
    }

    pub fn spawn_background(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let sweep_every = Duration::from_secs(self.config.hold_sweep_interval_seconds.max(1));
        let sweeper = HoldSweeper::new(self.coordinator.clone(), sweep_every);
        handles.push(sweeper.spawn(shutdown.child_token()));

        if self.snapshots.is_some() {
            let state = self.clone();
            let token = shutdown.child_token();
            let flush_every = Duration::from_secs(self.config.snapshot_interval_seconds.max(1));

            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(flush_every);
                // The first tick fires immediately; nothing new to write yet.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => match state.flush().await {
                            Ok(count) => info!("Snapshot written with {} slots", count),
                            Err(e) => error!("Snapshot flush failed: {}", e),
                        },
                    }
                }
            }));
        }

        handles
    }
}

#[cfg(test)]
mod tests {
    use shared_utils::test_utils::{test_clock, TestConfig};

    use super::*;

    fn config_with_snapshot(path: &std::path::Path) -> Arc<AppConfig> {
        let mut config = TestConfig::default().to_app_config();
        config.snapshot_path = Some(path.display().to_string());
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_unreadable_snapshot_stops_startup_and_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.json");
        let contents = r#"{"version":2,"saved_at":"2026-01-01T00:00:00Z","slots":[]}"#;
        std::fs::write(&path, contents).unwrap();

        let shutdown = CancellationToken::new();
        let started =
            AppState::start(config_with_snapshot(&path), Arc::new(test_clock()), &shutdown).await;
        shutdown.cancel();

        let error = started.err().expect("startup must fail on an unreadable snapshot");
        assert!(format!("{:#}", error).contains("unsupported snapshot version 2"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
    }

    #[tokio::test]
    async fn test_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.json");

        let shutdown = CancellationToken::new();
        let state = AppState::start(config_with_snapshot(&path), Arc::new(test_clock()), &shutdown)
            .await
            .expect("first start has no snapshot yet");
        shutdown.cancel();

        assert!(state.slots.is_empty());
        assert_eq!(state.flush().await.unwrap(), 0);
        assert!(path.exists(), "flush writes the first snapshot");
    }
}
