pub mod events;
pub mod ingest;
pub mod pipeline;
pub mod snapshot;
pub mod store;

pub use events::{SlotEventPublisher, TransitionReceiver};
pub use ingest::{AvailabilityIngest, IngestStats};
pub use pipeline::IngestPipeline;
pub use snapshot::{persist_committed, restore_from, FileSnapshotStore, SnapshotStore};
pub use store::{OpenSlots, SlotStore};
