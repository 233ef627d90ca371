//! Domain event system: diagnostics without coupling.
//!
//! Events are published when something interesting happens. The dispatcher
//! never surfaces failures to its caller, so these events (together with
//! `tracing` output) are how operators see what actually happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The model produced a usable structured answer.
    Succeeded,
    /// The model answered with an empty `response`; the overview was used.
    EmptyFallback,
    /// The model call failed; the overview was used.
    ErrorFallback,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::EmptyFallback => "empty_fallback",
            Self::ErrorFallback => "error_fallback",
        }
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A query went through the dispatcher
    DispatchCompleted {
        session_id: Option<String>,
        outcome: DispatchOutcome,
        error_kind: Option<String>,
        latency_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed on the model's request
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An image analysis request finished
    ImageAnalyzed {
        image_count: usize,
        success: bool,
        latency_ms: u64,
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
