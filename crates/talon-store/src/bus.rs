//! In-process event bus backed by a tokio broadcast channel.

use async_trait::async_trait;
use talon_core::Result;
use talon_core::events::Event;
use talon_core::ports::EventBus;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 1024;

/// Fans events out to every live subscriber.
///
/// Publishing with no subscribers is not an error; the event is dropped.
pub struct BroadcastEventBus {
    sender: broadcast::Sender<Event>,
}

impl BroadcastEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: Event) -> Result<()> {
        let subject = event.subject();
        let receivers = self.sender.send(event).unwrap_or(0);
        trace!(subject = %subject, receivers, "Event published");
        Ok(())
    }
}
