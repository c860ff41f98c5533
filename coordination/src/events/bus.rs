//! Event bus for session coordination
//!
//! Pub/sub over a Tokio broadcast channel, with an optional in-memory
//! history for replay and tests.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use super::types::SessionEvent;
use crate::types::GroupId;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
    /// Every published event, when recording is enabled
    history: Option<Mutex<Vec<SessionEvent>>>,
}

impl EventBus {
    /// Create a new event bus without history
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: None,
        }
    }

    /// Create an event bus that keeps every published event
    pub fn with_history() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: Some(Mutex::new(Vec::new())),
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SessionEvent) {
        let event_type = event.event_type();

        if let Some(history) = &self.history {
            history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }

        // Broadcast to subscribers (ignore if no receivers)
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Recorded events, oldest first. Empty when history is disabled.
    pub fn history(&self) -> Vec<SessionEvent> {
        self.history
            .as_ref()
            .map(|h| h.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Recorded events matching `filter`.
    pub fn replay(&self, filter: &EventFilter) -> Vec<SessionEvent> {
        self.history()
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective replay
#[derive(Debug, Default)]
pub struct EventFilter {
    pub group: Option<GroupId>,
    pub round: Option<u32>,
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a new empty filter (matches all events)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    pub fn round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn types(mut self, event_types: Vec<&str>) -> Self {
        self.event_types = Some(event_types.into_iter().map(String::from).collect());
        self
    }

    pub fn matches(&self, event: &SessionEvent) -> bool {
        if let Some(group) = self.group {
            if event.group() != group {
                return false;
            }
        }

        if let Some(round) = self.round {
            if event.round() != Some(round) {
                return false;
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        true
    }
}
