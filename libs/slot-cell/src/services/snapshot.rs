use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SlotError;
use crate::models::ServiceSlot;
use crate::services::store::SlotStore;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    saved_at: DateTime<Utc>,
    slots: Vec<ServiceSlot>,
}

/// Durable home for committed slot state.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, slots: &[ServiceSlot]) -> Result<(), SlotError>;
    async fn load(&self) -> Result<Vec<ServiceSlot>, SlotError>;
}

/// JSON snapshot on local disk. Writes go to a sibling temp file that is
/// renamed over the target, so a crash mid-write leaves the previous snapshot.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, slots: &[ServiceSlot]) -> Result<(), SlotError> {
        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            slots: slots.to_vec(),
        };
        let bytes = serde_json::to_vec(&file).map_err(|e| SlotError::Persistence(e.to_string()))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| SlotError::Persistence(format!("write {}: {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| {
                SlotError::Persistence(format!("rename into {}: {}", self.path.display(), e))
            })?;

        debug!("Wrote {} slots to {}", slots.len(), self.path.display());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<ServiceSlot>, SlotError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SlotError::Persistence(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let file: SnapshotFile =
            serde_json::from_slice(&bytes).map_err(|e| SlotError::Persistence(e.to_string()))?;
        if file.version != SNAPSHOT_VERSION {
            return Err(SlotError::Persistence(format!(
                "unsupported snapshot version {}",
                file.version
            )));
        }

        Ok(file.slots)
    }
}

/// Persist the store's committed state. Pending holds are not written.
pub async fn persist_committed(
    store: &SlotStore,
    target: &dyn SnapshotStore,
) -> Result<usize, SlotError> {
    let slots = store.committed_snapshot();
    target.save(&slots).await?;
    Ok(slots.len())
}

pub async fn restore_from(
    store: &SlotStore,
    source: &dyn SnapshotStore,
) -> Result<usize, SlotError> {
    let slots = source.load().await?;
    if slots.is_empty() {
        info!("No persisted slots to restore");
        return Ok(0);
    }
    Ok(store.restore(slots))
}
