//! Event types for the Huddle event system
//!
//! Provides shared event definitions and the EventBus used to fan progress
//! out to SSE clients and other in-process observers.

mod import_types;

pub use import_types::{PreparationReport, ProgressCount, ProgressSnapshot, ProgressStep};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Huddle event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HuddleEvent {
    /// Importer progress changed
    ///
    /// Emitted by the progress reporter, either immediately at a batching
    /// boundary or from the delayed flush.
    ImportProgressUpdated {
        /// Import record the progress belongs to
        import_id: Uuid,
        /// Progress at emission time
        progress: ProgressSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Preparer progress while an export file is being staged
    ImportPreparationProgress {
        import_id: Uuid,
        step: ProgressStep,
        report: PreparationReport,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Deferred import run finished (successfully or not)
    ImportRunFinished {
        import_id: Uuid,
        /// DONE or ERROR
        step: ProgressStep,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl HuddleEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            HuddleEvent::ImportProgressUpdated { .. } => "ImportProgressUpdated",
            HuddleEvent::ImportPreparationProgress { .. } => "ImportPreparationProgress",
            HuddleEvent::ImportRunFinished { .. } => "ImportRunFinished",
        }
    }

    /// Import record the event refers to
    pub fn import_id(&self) -> Uuid {
        match self {
            HuddleEvent::ImportProgressUpdated { import_id, .. }
            | HuddleEvent::ImportPreparationProgress { import_id, .. }
            | HuddleEvent::ImportRunFinished { import_id, .. } => *import_id,
        }
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use huddle_common::events::EventBus;
///
/// let event_bus = EventBus::new(100);
/// let rx = event_bus.subscribe();
/// assert_eq!(event_bus.subscriber_count(), 1);
/// # drop(rx);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HuddleEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<HuddleEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: HuddleEvent,
    ) -> Result<usize, broadcast::error::SendError<HuddleEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: HuddleEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
