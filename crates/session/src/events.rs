//! Event Bus - lifecycle events for session observers
//!
//! Design: plain enum events over a tokio broadcast channel. Observers
//! (diagnostics, admin listings) subscribe; publishing never blocks and
//! never fails because nobody is listening.

use registry::SessionId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle events published by the supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    Created { id: SessionId },
    Closed { id: SessionId },
    Expired { id: SessionId },
    ShutdownComplete { disposed: usize },
}

/// Simple event bus using tokio broadcast channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(SessionEvent::Created { id: 1 });

        match rx.recv().await {
            Ok(SessionEvent::Created { id: 1 }) => {}
            other => panic!("Expected Created event, got {:?}", other),
        }
    }
}
