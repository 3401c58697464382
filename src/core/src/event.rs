//! Build progress events.
//!
//! The driver publishes one event per step transition plus a final
//! completed/failed event. Subscribers that fall behind lose old events;
//! the build never waits for them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// What an event carries besides its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Position of an instruction in the plan
    Step {
        step: usize,
        total: usize,
        instruction: String,
    },
    /// An image id, a container id or an error message
    Text { text: String },
}

/// Build progress event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildEvent {
    /// One of the [`events`] keys
    pub key: String,
    pub payload: EventPayload,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl BuildEvent {
    fn new(key: &str, payload: EventPayload) -> Self {
        Self {
            key: key.to_string(),
            payload,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Step transition for instruction `step` of `total` (1-based).
    pub fn step(key: &str, step: usize, total: usize, instruction: impl Into<String>) -> Self {
        Self::new(
            key,
            EventPayload::Step {
                step,
                total,
                instruction: instruction.into(),
            },
        )
    }

    pub fn text(key: &str, text: impl Into<String>) -> Self {
        Self::new(key, EventPayload::Text { text: text.into() })
    }

    /// Text of a [`EventPayload::Text`] event.
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Text { text } => Some(text),
            EventPayload::Step { .. } => None,
        }
    }
}

/// Broadcasts build events to any number of subscribers.
#[derive(Clone)]
pub struct EventEmitter {
    sender: Arc<broadcast::Sender<BuildEvent>>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Emit an event. Events without subscribers are dropped.
    pub fn emit(&self, event: BuildEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Event keys
pub mod events {
    pub const BUILD_STEP_STARTED: &str = "build.step.started";
    pub const BUILD_STEP_COMPLETED: &str = "build.step.completed";
    pub const BUILD_FAILED: &str = "build.failed";
    pub const BUILD_COMPLETED: &str = "build.completed";
    pub const CONTAINER_REMOVED: &str = "container.removed";
}
