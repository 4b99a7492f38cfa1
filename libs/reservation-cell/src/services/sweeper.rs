use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::services::coordinator::ReservationCoordinator;

/// Background task returning lapsed holds to their slots on a fixed interval.
/// Each pass also prunes start-index entries for slots that can no longer be
/// offered.
pub struct HoldSweeper {
    coordinator: Arc<ReservationCoordinator>,
    period: Duration,
}

impl HoldSweeper {
    pub fn new(coordinator: Arc<ReservationCoordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period: period.max(Duration::from_millis(10)),
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Hold sweeper running every {:?}", self.period);
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => self.run_once(),
                }
            }

            info!("Hold sweeper stopped");
        })
    }

    pub fn run_once(&self) {
        let report = self.coordinator.sweep_expired();
        let pruned = self.coordinator.store().prune_expired();
        if report.holds_released > 0 || pruned > 0 {
            debug!(
                "Sweep released {} holds, pruned {} index entries",
                report.holds_released, pruned
            );
        }
    }
}
