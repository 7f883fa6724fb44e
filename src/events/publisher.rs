//! Broadcast-based lifecycle event publisher.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;

/// High-throughput publisher for lifecycle events.
///
/// ```
/// use matterflow_core::events::EventPublisher;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let publisher = EventPublisher::new(64);
/// let mut rx = publisher.subscribe();
/// publisher.publish("task.completed", json!({ "task_id": "t1" }));
/// assert_eq!(rx.recv().await.unwrap().name, "task.completed");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    /// Create a publisher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Publishing with no subscribers is fine; lifecycle
    /// events are best-effort observability, never control flow.
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: Utc::now(),
        };
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
