//! Hooks handed to the converter during a run

use async_trait::async_trait;
use tracing::warn;

use super::Importer;
use crate::error::ImportError;
use crate::models::{Selection, StagedData};
use crate::services::converter::ImportCallbacks;

/// Inclusion and completion hooks bound to one run's selection
pub(super) struct RunCallbacks<'a> {
    importer: &'a Importer,
    selection: &'a Selection,
}

impl<'a> RunCallbacks<'a> {
    pub(super) fn new(importer: &'a Importer, selection: &'a Selection) -> Self {
        Self {
            importer,
            selection,
        }
    }

    /// Stop the converter and fail if the record was invalidated
    async fn ensure_valid(&self) -> Result<(), ImportError> {
        if self.importer.is_still_valid().await? {
            return Ok(());
        }
        warn!(importer = %self.importer.info.key, "Import record invalidated, aborting run");
        self.importer.services.converter.abort();
        Err(ImportError::RunInvalidated)
    }

    fn includes(&self, data: &StagedData) -> bool {
        match data {
            StagedData::User(user) => self
                .selection
                .includes_user(user.primary_id(), self.importer.info.is_api_importer()),
            StagedData::Channel(channel) => self.selection.includes_channel(channel.selection_id()),
            StagedData::Message(_) => true,
        }
    }
}

#[async_trait]
impl ImportCallbacks for RunCallbacks<'_> {
    async fn before_import(&self, data: &StagedData) -> Result<bool, ImportError> {
        self.ensure_valid().await?;
        Ok(self.includes(data))
    }

    async fn after_import(&self, _data: &StagedData) -> Result<(), ImportError> {
        self.importer.add_count_completed(1).await?;
        self.ensure_valid().await
    }
}
