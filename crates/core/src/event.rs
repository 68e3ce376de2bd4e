//! Domain event system: decoupled observation of the control loop.
//!
//! The loop publishes events as it advances; front ends subscribe to show
//! thinking, tool activity and streamed answer text. Events are a side
//! output only and never drive state transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A decision step completed
    DecisionMade {
        session_id: String,
        action: String,
        thinking: String,
        plan: String,
        fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool is about to run
    ToolStarted {
        session_id: String,
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// A tool finished (successfully or not)
    ToolExecuted {
        session_id: String,
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A piece of the final answer arrived from a streaming model call
    AnswerChunk {
        session_id: String,
        content: String,
    },

    /// The control loop paused or finished
    LoopFinished {
        session_id: String,
        stop: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred and was converted into a readable turn
    ErrorOccurred {
        context: String,
        error_message: String,
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
