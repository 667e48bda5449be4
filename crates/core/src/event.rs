//! Domain events published by the agent loop and the document store.
//!
//! Nothing in the answer path depends on a subscriber being present;
//! the CLI and gateway subscribe to log turn summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The model produced one assistant message
    ResponseGenerated {
        thread_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool invocation finished (successfully or not)
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A turn reached Done and was committed to its thread
    TurnCompleted {
        thread_id: String,
        rounds: usize,
        forced: bool,
        timestamp: DateTime<Utc>,
    },

    /// A collection was chunked, embedded and stored
    DocumentIndexed {
        collection: String,
        chunks: usize,
        timestamp: DateTime<Utc>,
    },

    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::TurnCompleted {
            thread_id: "1".into(),
            rounds: 2,
            forced: false,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::TurnCompleted { thread_id, rounds, forced, .. } => {
                assert_eq!(thread_id, "1");
                assert_eq!(*rounds, 2);
                assert!(!forced);
            }
            _ => panic!("Expected TurnCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::DocumentIndexed {
            collection: "doc".into(),
            chunks: 3,
            timestamp: Utc::now(),
        });
    }
}
