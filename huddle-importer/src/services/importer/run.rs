//! Starting an import and the deferred conversion sequence

use std::sync::Arc;
use std::time::Instant;

use huddle_common::events::{ProgressSnapshot, ProgressStep};
use tracing::{error, info, warn};

use super::callbacks::RunCallbacks;
use super::Importer;
use crate::error::ImportError;
use crate::models::Selection;
use crate::services::settings_override::{restore_after, ConfigOverrideSet};

impl Importer {
    /// Validate the request, move to IMPORTING_STARTED and spawn the run.
    ///
    /// Returns as soon as the run is scheduled; progress is observed through
    /// the publisher or [`Importer::get_progress`]. Invalid requests are
    /// rejected before anything changes.
    pub async fn start_import(
        self: &Arc<Self>,
        selection: Selection,
        started_by: &str,
    ) -> Result<ProgressSnapshot, ImportError> {
        selection.validate(&self.info.name)?;
        if started_by.trim().is_empty() {
            return Err(ImportError::Unauthenticated);
        }

        self.update_progress(ProgressStep::ImportingStarted).await?;
        self.reload_count().await;

        let importer = Arc::clone(self);
        let started_by = started_by.to_string();
        tokio::spawn(async move {
            importer.run_import(selection, started_by).await;
        });

        Ok(self.get_progress().await)
    }

    /// The deferred sequence. Never returns an error: failures end in ERROR.
    async fn run_import(&self, selection: Selection, started_by: String) {
        let started = Instant::now();
        let settings = Arc::clone(&self.services.settings);

        let outcome = restore_after(settings.as_ref(), async {
            let result = self.convert_all(&selection, &started_by).await;
            if let Err(e) = &result {
                error!(importer = %self.info.key, error = %e, "Import failed");
                self.mark_failed().await;
            }
            result
        })
        .await;

        // capture or restore failed; conversion errors were handled above
        if let Err(e) = &outcome {
            error!(importer = %self.info.key, error = %e, "Import-sensitive settings not handled");
            if !self.get_progress().await.step.is_terminal() {
                self.mark_failed().await;
            }
        }

        let elapsed = started.elapsed();
        let step = self.get_progress().await.step;
        info!(
            importer = %self.info.key,
            step = %step,
            duration_ms = elapsed.as_millis() as u64,
            "Import took {} milliseconds",
            elapsed.as_millis()
        );
        self.services.publisher.publish_finished(step, elapsed);
    }

    /// Relax the settings, convert users, channels and messages, finish up
    async fn convert_all(&self, selection: &Selection, started_by: &str) -> Result<(), ImportError> {
        ConfigOverrideSet::relaxed()
            .apply(self.services.settings.as_ref())
            .await?;

        let callbacks = RunCallbacks::new(self, selection);
        let converter = &self.services.converter;

        self.update_progress(ProgressStep::ImportingUsers).await?;
        converter.convert_users(&callbacks).await?;

        self.update_progress(ProgressStep::ImportingChannels).await?;
        converter.convert_channels(started_by, &callbacks).await?;

        self.update_progress(ProgressStep::ImportingMessages).await?;
        converter.convert_messages(&callbacks).await?;

        self.update_progress(ProgressStep::Finishing).await?;
        let cleanup = Arc::clone(converter);
        tokio::spawn(async move {
            if let Err(e) = cleanup.clear_successfully_imported_data().await {
                warn!(error = %e, "Failed to clear imported staging data");
            }
        });

        self.update_progress(ProgressStep::Done).await?;
        Ok(())
    }
}
