use tokio::sync::broadcast;
use tracing::debug;

use crate::models::SlotTransition;

pub type TransitionReceiver = broadcast::Receiver<SlotTransition>;

/// Fan-out of committed slot status changes to whoever is listening.
///
/// Publishing never blocks a writer: with no subscribers the transition is
/// dropped, and slow subscribers observe `RecvError::Lagged`.
#[derive(Clone)]
pub struct SlotEventPublisher {
    sender: broadcast::Sender<SlotTransition>,
}

impl SlotEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, transition: SlotTransition) {
        let slot_id = transition.slot_id;
        let (from, to) = (transition.from, transition.to);

        match self.sender.send(transition) {
            Ok(receivers) => debug!(
                "Slot {} {} -> {} sent to {} subscribers",
                slot_id, from, to, receivers
            ),
            Err(_) => debug!("Slot {} {} -> {} had no subscribers", slot_id, from, to),
        }
    }

    pub fn subscribe(&self) -> TransitionReceiver {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
