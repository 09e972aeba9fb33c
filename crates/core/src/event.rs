//! Domain event system: decoupled observation of running trajectories.
//!
//! Events are published when something interesting happens in a session
//! or environment. Rollout drivers and CLIs can subscribe to collect
//! statistics without threading callbacks through the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A session applied one action to its environment
    StepCompleted {
        session_id: String,
        step_index: u32,
        observations: usize,
        done: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked by an environment
    ToolInvoked {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An environment emitted an internal diagnostic instead of a tool result
    DiagnosticEmitted {
        code: String,
        timestamp: DateTime<Utc>,
    },

    /// A reward pipeline scored a step
    RewardScored {
        session_id: String,
        step_index: u32,
        reward: f64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
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

        bus.publish(DomainEvent::ToolInvoked {
            tool_name: "commentary".into(),
            success: true,
            duration_ms: 3,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolInvoked { tool_name, success, .. } => {
                assert_eq!(tool_name, "commentary");
                assert!(success);
            }
            _ => panic!("Expected ToolInvoked event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::DiagnosticEmitted {
            code: "empty_final".into(),
            timestamp: Utc::now(),
        });
    }
}
