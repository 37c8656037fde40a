//! Import orchestrator
//!
//! One [`Importer`] drives one import record through its lifecycle:
//!
//! NEW → UPLOADING → PREPARING_* → USER_SELECTION → IMPORTING_STARTED →
//! IMPORTING_USERS → IMPORTING_CHANNELS → IMPORTING_MESSAGES → FINISHING → DONE
//!
//! with ERROR reachable from any importing step. Parsing the export is
//! delegated to a format-specific [`FilePreparer`]; turning staged records
//! into live entities is delegated to the [`DataConverter`]. The importer
//! owns the progress record, persists it on the import record and decides
//! when progress is published.
//!
//! Operations are split by concern:
//! - `tracking`: step transitions, counters, record updates
//! - `selection`: building the operator selection from staged data
//! - `callbacks`: inclusion and completion hooks handed to the converter
//! - `run`: starting the import and the deferred conversion sequence

use std::path::Path;
use std::sync::Arc;

use huddle_common::events::{ProgressSnapshot, ProgressStep};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::db::{ImportStore, SettingsStore, StagingStore};
use crate::error::ImportError;
use crate::models::{ImportRecord, ImportRecordUpdate, ImporterInfo, Progress};
use crate::services::converter::DataConverter;
use crate::services::preparers::FilePreparer;
use crate::services::progress_reporter::{ProgressPublisher, ProgressReporter};

mod callbacks;
mod run;
mod selection;
mod tracking;

/// Batching boundary while users and channels are converted
pub const USER_CHANNEL_BATCH: i64 = 50;

/// Batching boundary for every other step
pub const MESSAGE_BATCH: i64 = 500;

/// Collaborators an importer works with
#[derive(Clone)]
pub struct ImporterServices {
    pub settings: Arc<dyn SettingsStore>,
    pub imports: Arc<dyn ImportStore>,
    pub staging: Arc<dyn StagingStore>,
    pub converter: Arc<dyn DataConverter>,
    pub publisher: Arc<dyn ProgressPublisher>,
}

/// Orchestrates one import
pub struct Importer {
    info: ImporterInfo,
    services: ImporterServices,
    preparer: Option<Arc<dyn FilePreparer>>,
    progress: Arc<RwLock<Progress>>,
    record: RwLock<Option<ImportRecord>>,
    reporter: ProgressReporter,
}

impl Importer {
    /// Create an importer, optionally bound to an existing import record.
    ///
    /// The initial step mirrors the record's status and the counters are
    /// loaded from it.
    pub fn new(
        info: ImporterInfo,
        services: ImporterServices,
        record: Option<ImportRecord>,
    ) -> Result<Self, ImportError> {
        info.validate()?;

        let mut progress = Progress::new(info.key.clone(), info.name.clone());
        if let Some(record) = &record {
            progress.set_step(record.status);
            progress.reload_count(Some(record.count));
        }

        let reporter = ProgressReporter::new(Arc::clone(&services.publisher));

        Ok(Self {
            info,
            services,
            preparer: None,
            progress: Arc::new(RwLock::new(progress)),
            record: RwLock::new(record),
            reporter,
        })
    }

    /// Attach the format-specific preparer used by [`Importer::prepare_using_local_file`]
    pub fn with_preparer(mut self, preparer: Arc<dyn FilePreparer>) -> Self {
        self.preparer = Some(preparer);
        self
    }

    pub fn info(&self) -> &ImporterInfo {
        &self.info
    }

    pub fn staging(&self) -> &Arc<dyn StagingStore> {
        &self.services.staging
    }

    pub fn publisher(&self) -> &Arc<dyn ProgressPublisher> {
        &self.services.publisher
    }

    /// Cached copy of the bound import record
    pub async fn record(&self) -> Option<ImportRecord> {
        self.record.read().await.clone()
    }

    pub async fn get_progress(&self) -> ProgressSnapshot {
        self.progress.read().await.snapshot()
    }

    /// An upload started: step → UPLOADING, file metadata stored on the record
    pub async fn start_file_upload(
        &self,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<Option<ImportRecord>, ImportError> {
        self.update_progress(ProgressStep::Uploading).await?;
        self.update_record(ImportRecordUpdate::file(
            file_name,
            content_type.map(str::to_string),
        ))
        .await
    }

    /// Parse an export file already on local disk.
    ///
    /// Step → PREPARING_STARTED, then the preparer takes over. Without a
    /// preparer only the transition happens. A preparer failure moves the
    /// import to ERROR.
    pub async fn prepare_using_local_file(&self, path: &Path) -> Result<ProgressSnapshot, ImportError> {
        self.update_progress(ProgressStep::PreparingStarted).await?;

        let Some(preparer) = self.preparer.clone() else {
            return Ok(self.get_progress().await);
        };

        info!(importer = %self.info.key, file = %path.display(), "Preparing export file");
        match preparer.prepare(self, path).await {
            Ok(report) => {
                info!(
                    importer = %self.info.key,
                    users = report.users,
                    channels = report.channels,
                    messages = report.messages,
                    "Export file prepared"
                );
                Ok(self.get_progress().await)
            }
            Err(e) => {
                error!(importer = %self.info.key, error = %e, "Failed to prepare export file");
                self.mark_failed().await;
                Err(e)
            }
        }
    }

    /// Move to ERROR, logging instead of failing if that cannot be persisted
    async fn mark_failed(&self) {
        if let Err(e) = self.update_progress(ProgressStep::Error).await {
            error!(importer = %self.info.key, error = %e, "Failed to record ERROR step");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support;
