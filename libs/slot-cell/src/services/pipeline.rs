use std::sync::Arc;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SlotError;
use crate::models::FacilityEvent;
use crate::services::ingest::AvailabilityIngest;

/// Asynchronous front door for facility feeds.
///
/// Events are routed to a worker chosen by slot id, so every update for a
/// given slot is applied by one worker in arrival order while different slots
/// proceed in parallel.
pub struct IngestPipeline {
    shards: RwLock<Vec<mpsc::Sender<FacilityEvent>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl IngestPipeline {
    pub fn start(
        ingest: Arc<AvailabilityIngest>,
        workers: usize,
        queue_depth: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let workers = workers.max(1);
        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let (sender, receiver) = mpsc::channel(queue_depth.max(1));
            shards.push(sender);
            handles.push(tokio::spawn(run_worker(
                worker_id,
                ingest.clone(),
                receiver,
                shutdown.clone(),
            )));
        }

        info!("Started ingest pipeline with {} workers", workers);

        Self {
            shards: RwLock::new(shards),
            workers: Mutex::new(handles),
            shutdown,
        }
    }

    pub async fn submit(&self, event: FacilityEvent) -> Result<(), SlotError> {
        if self.shutdown.is_cancelled() {
            return Err(SlotError::PipelineClosed);
        }

        let sender = {
            let shards = self.shards.read();
            if shards.is_empty() {
                return Err(SlotError::PipelineClosed);
            }
            let shard = (event.slot_id().as_u128() % shards.len() as u128) as usize;
            shards[shard].clone()
        };

        sender.send(event).await.map_err(|_| SlotError::PipelineClosed)
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Stop accepting events, let the workers drain what is already queued,
    /// and wait for them to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        drop(std::mem::take(&mut *self.shards.write()));

        let handles = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            return;
        }
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Ingest worker ended abnormally: {}", e);
            }
        }

        info!("Ingest pipeline drained");
    }
}

async fn run_worker(
    worker_id: usize,
    ingest: Arc<AvailabilityIngest>,
    mut receiver: mpsc::Receiver<FacilityEvent>,
    shutdown: CancellationToken,
) {
    debug!("Ingest worker {} started", worker_id);

    loop {
        tokio::select! {
            // Queued events win over cancellation so nothing accepted is lost.
            biased;
            event = receiver.recv() => match event {
                // Outcomes are counted and logged by the ingest itself.
                Some(event) => {
                    let _ = ingest.ingest(event);
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    debug!("Ingest worker {} stopped", worker_id);
}
