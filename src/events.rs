use tokio::sync::broadcast;

use crate::types::AllowlistEvent;

/// Fan-out bus for allowlist mutation events. Downstream indexers subscribe;
/// publishing with no subscribers is fine.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AllowlistEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AllowlistEvent) {
        tracing::info!(
            kind = event.kind.as_str(),
            key = event.key.as_str(),
            new_state = event.new_state,
            "Allowlist changed"
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AllowlistEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
