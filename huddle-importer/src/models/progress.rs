//! Mutable progress record owned by an importer
//!
//! Callers outside the importer only ever see [`ProgressSnapshot`] copies.

use huddle_common::events::{ProgressCount, ProgressSnapshot, ProgressStep};

/// Current step plus the total/completed counter pair of one import
#[derive(Debug, Clone)]
pub struct Progress {
    key: String,
    name: String,
    step: ProgressStep,
    count: ProgressCount,
}

impl Progress {
    /// Fresh progress at `NEW` with zeroed counters
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            step: ProgressStep::New,
            count: ProgressCount::default(),
        }
    }

    pub fn step(&self) -> ProgressStep {
        self.step
    }

    pub fn count(&self) -> ProgressCount {
        self.count
    }

    /// Overwrite the current step. Ordering is the caller's business.
    pub fn set_step(&mut self, step: ProgressStep) {
        self.step = step;
    }

    /// Grow (or shrink, for negative `n`) the expected total
    pub fn add_to_total(&mut self, n: i64) -> ProgressSnapshot {
        self.count.total += n;
        self.snapshot()
    }

    pub fn add_completed(&mut self, n: i64) -> ProgressSnapshot {
        self.count.completed += n;
        self.snapshot()
    }

    /// Reset both counters to a persisted baseline (zero when absent)
    pub fn reload_count(&mut self, persisted: Option<ProgressCount>) {
        self.count = persisted.unwrap_or_default();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            key: self.key.clone(),
            name: self.name.clone(),
            step: self.step,
            count: self.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_progress_starts_at_new() {
        let progress = Progress::new("json", "JSON Export");
        let snapshot = progress.snapshot();

        assert_eq!(snapshot.step, ProgressStep::New);
        assert_eq!(snapshot.count, ProgressCount::default());
        assert_eq!(snapshot.key, "json");
        assert_eq!(snapshot.name, "JSON Export");
    }

    #[test]
    fn test_counters_accumulate() {
        let mut progress = Progress::new("json", "JSON Export");

        progress.add_to_total(10);
        let snapshot = progress.add_to_total(-3);
        assert_eq!(snapshot.count.total, 7);

        progress.add_completed(2);
        let snapshot = progress.add_completed(1);
        assert_eq!(snapshot.count.completed, 3);
        assert_eq!(snapshot.count.total, 7);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let mut progress = Progress::new("json", "JSON Export");
        let before = progress.snapshot();

        progress.set_step(ProgressStep::ImportingUsers);
        progress.add_completed(5);

        assert_eq!(before.step, ProgressStep::New);
        assert_eq!(before.count.completed, 0);
        assert_eq!(progress.step(), ProgressStep::ImportingUsers);
    }

    #[test]
    fn test_reload_count() {
        let mut progress = Progress::new("json", "JSON Export");
        progress.add_to_total(40);
        progress.add_completed(12);

        progress.reload_count(Some(ProgressCount { total: 100, completed: 0 }));
        assert_eq!(progress.count(), ProgressCount { total: 100, completed: 0 });

        progress.reload_count(None);
        assert_eq!(progress.count(), ProgressCount::default());
    }
}
