//! Progress publishing with throttling
//!
//! The importer decides *when* progress is worth publishing (batching
//! boundaries); between boundaries this reporter makes sure observers still
//! see movement by arming one delayed flush at a time. An immediate publish
//! cancels the pending flush.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use huddle_common::events::{
    EventBus, HuddleEvent, PreparationReport, ProgressSnapshot, ProgressStep,
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::Progress;

/// Delay before a throttled progress update is flushed
pub const FLUSH_DELAY: Duration = Duration::from_millis(250);

/// Where progress goes. Publishing is fire-and-forget.
pub trait ProgressPublisher: Send + Sync {
    fn publish(&self, progress: ProgressSnapshot);

    /// Staging counts while a preparer works through an export
    fn publish_preparation(&self, _step: ProgressStep, _report: PreparationReport) {}

    /// The deferred run ended in `step` after `duration`
    fn publish_finished(&self, _step: ProgressStep, _duration: Duration) {}
}

/// [`ProgressPublisher`] that broadcasts on the process [`EventBus`]
#[derive(Clone)]
pub struct EventBusPublisher {
    event_bus: EventBus,
    import_id: Uuid,
}

impl EventBusPublisher {
    pub fn new(event_bus: EventBus, import_id: Uuid) -> Self {
        Self {
            event_bus,
            import_id,
        }
    }
}

impl ProgressPublisher for EventBusPublisher {
    fn publish(&self, progress: ProgressSnapshot) {
        self.event_bus.emit_lossy(HuddleEvent::ImportProgressUpdated {
            import_id: self.import_id,
            progress,
            timestamp: Utc::now(),
        });
    }

    fn publish_preparation(&self, step: ProgressStep, report: PreparationReport) {
        self.event_bus.emit_lossy(HuddleEvent::ImportPreparationProgress {
            import_id: self.import_id,
            step,
            report,
            timestamp: Utc::now(),
        });
    }

    fn publish_finished(&self, step: ProgressStep, duration: Duration) {
        self.event_bus.emit_lossy(HuddleEvent::ImportRunFinished {
            import_id: self.import_id,
            step,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
    }
}

/// Throttles progress publication for one importer
pub struct ProgressReporter {
    publisher: Arc<dyn ProgressPublisher>,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
    delay: Duration,
}

impl ProgressReporter {
    pub fn new(publisher: Arc<dyn ProgressPublisher>) -> Self {
        Self::with_delay(publisher, FLUSH_DELAY)
    }

    pub fn with_delay(publisher: Arc<dyn ProgressPublisher>, delay: Duration) -> Self {
        Self {
            publisher,
            pending: Arc::new(Mutex::new(None)),
            delay,
        }
    }

    pub fn publisher(&self) -> &Arc<dyn ProgressPublisher> {
        &self.publisher
    }

    /// Publish now, superseding any pending delayed flush
    pub fn report(&self, progress: ProgressSnapshot) {
        if let Some(handle) = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
        self.publisher.publish(progress);
    }

    /// Arm a delayed flush unless one is already pending.
    ///
    /// The flush publishes whatever `progress` holds when it fires. Returns
    /// whether a new flush was armed.
    pub fn schedule(&self, progress: Arc<RwLock<Progress>>) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.is_some() {
            return false;
        }

        let slot = Arc::clone(&self.pending);
        let publisher = Arc::clone(&self.publisher);
        let delay = self.delay;

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let snapshot = progress.read().await.snapshot();
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            publisher.publish(snapshot);
        }));
        true
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }
}
