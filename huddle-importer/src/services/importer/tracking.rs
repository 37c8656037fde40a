//! Progress tracking: steps, counters and the persisted record

use std::sync::Arc;

use huddle_common::events::{ProgressSnapshot, ProgressStep};
use tracing::{debug, trace};

use super::{Importer, MESSAGE_BATCH, USER_CHANNEL_BATCH};
use crate::error::ImportError;
use crate::models::{ImportRecord, ImportRecordUpdate};

impl Importer {
    /// Set, persist and (outside the preparation steps) publish a new step
    pub async fn update_progress(&self, step: ProgressStep) -> Result<ProgressSnapshot, ImportError> {
        let snapshot = {
            let mut progress = self.progress.write().await;
            progress.set_step(step);
            progress.snapshot()
        };
        debug!(importer = %self.info.key, step = %step, "Progress step changed");

        let mut fields = ImportRecordUpdate::status(step);
        if persists_completed(step) {
            // the last completions may not have reached a batch boundary
            fields.count_completed = Some(snapshot.count.completed);
        }
        self.update_record(fields).await?;

        if !step.is_preparing() {
            self.reporter.report(snapshot.clone());
        }
        Ok(snapshot)
    }

    /// Grow the expected total. Always persisted, never published.
    pub async fn add_count_to_total(&self, n: i64) -> Result<ProgressSnapshot, ImportError> {
        let snapshot = self.progress.write().await.add_to_total(n);
        self.update_record(ImportRecordUpdate::count_total(snapshot.count.total))
            .await?;
        Ok(snapshot)
    }

    /// Zero both counters, in memory and on the record
    pub async fn reset_count(&self) -> Result<ProgressSnapshot, ImportError> {
        let snapshot = {
            let mut progress = self.progress.write().await;
            progress.reload_count(None);
            progress.snapshot()
        };
        self.update_record(ImportRecordUpdate {
            count_total: Some(0),
            count_completed: Some(0),
            ..Default::default()
        })
        .await?;
        Ok(snapshot)
    }

    /// Count finished records.
    ///
    /// At a batching boundary (every 50th user/channel, every 500th message,
    /// or once completed reaches total) the count is persisted and published
    /// immediately. In between a single delayed flush is armed.
    pub async fn add_count_completed(&self, n: i64) -> Result<ProgressSnapshot, ImportError> {
        let snapshot = self.progress.write().await.add_completed(n);
        trace!(
            importer = %self.info.key,
            completed = snapshot.count.completed,
            total = snapshot.count.total,
            "Records completed"
        );

        if is_batch_boundary(&snapshot) {
            self.update_record(ImportRecordUpdate::count_completed(snapshot.count.completed))
                .await?;
            self.reporter.report(self.get_progress().await);
        } else {
            self.reporter.schedule(Arc::clone(&self.progress));
        }
        Ok(snapshot)
    }

    /// Apply a partial update to the bound record and re-read it.
    ///
    /// Without a bound record this is a no-op returning `None`.
    pub async fn update_record(
        &self,
        fields: ImportRecordUpdate,
    ) -> Result<Option<ImportRecord>, ImportError> {
        let Some(id) = self.record.read().await.as_ref().map(|record| record.id) else {
            return Ok(None);
        };
        if fields.is_empty() {
            return Ok(self.record().await);
        }

        self.services.imports.update(id, &fields).await?;
        let refreshed = self.services.imports.find_one(id).await?.ok_or_else(|| {
            huddle_common::Error::NotFound(format!("Import record {} disappeared", id))
        })?;

        *self.record.write().await = Some(refreshed.clone());
        Ok(Some(refreshed))
    }

    /// Reset the counters to what the record holds
    pub(super) async fn reload_count(&self) {
        let persisted = self.record.read().await.as_ref().map(|record| record.count);
        self.progress.write().await.reload_count(persisted);
    }

    /// Re-read the validity flag from the store.
    ///
    /// An importer without a record is always valid; a record that vanished
    /// is not.
    pub(super) async fn is_still_valid(&self) -> Result<bool, ImportError> {
        let Some(id) = self.record.read().await.as_ref().map(|record| record.id) else {
            return Ok(true);
        };

        let current = self.services.imports.find_one(id).await?;
        let valid = current.as_ref().is_some_and(|record| record.valid);
        if let Some(record) = current {
            *self.record.write().await = Some(record);
        }
        Ok(valid)
    }
}

/// Steps that close a run write the completed count along with the status
fn persists_completed(step: ProgressStep) -> bool {
    step == ProgressStep::Finishing || step.is_terminal()
}

/// Whether completing up to this snapshot forces an immediate publish
fn is_batch_boundary(snapshot: &ProgressSnapshot) -> bool {
    let range = if snapshot.step.is_importing_users_or_channels() {
        USER_CHANNEL_BATCH
    } else {
        MESSAGE_BATCH
    };
    let completed = snapshot.count.completed;
    completed % range == 0 || completed >= snapshot.count.total
}
