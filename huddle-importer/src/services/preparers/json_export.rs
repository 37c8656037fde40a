//! JSON export preparer
//!
//! Reads a single JSON document of the form
//!
//! ```json
//! {
//!   "users":    [{"import_ids": ["U1"], "username": "ada", "emails": ["ada@example.com"]}],
//!   "channels": [{"import_ids": ["C1"], "name": "general", "type": "public", "members": ["U1"]}],
//!   "messages": [{"import_ids": ["M1"], "channel": "C1", "sender": "U1", "text": "hi", "ts": "2026-01-01T00:00:00Z"}]
//! }
//! ```
//!
//! and stages every record, replacing whatever was staged before.

use std::path::Path;

use async_trait::async_trait;
use huddle_common::events::{PreparationReport, ProgressStep};
use serde::Deserialize;
use tracing::debug;

use super::FilePreparer;
use crate::db::StagingStore;
use crate::error::ImportError;
use crate::models::{ImporterInfo, StagedChannel, StagedData, StagedMessage, StagedUser};
use crate::services::importer::Importer;

/// Importer key served by this preparer
pub const JSON_IMPORTER_KEY: &str = "json";

#[derive(Debug, Default, Deserialize)]
struct JsonExport {
    #[serde(default)]
    users: Vec<StagedUser>,
    #[serde(default)]
    channels: Vec<StagedChannel>,
    #[serde(default)]
    messages: Vec<StagedMessage>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExportPreparer;

impl JsonExportPreparer {
    pub fn info() -> ImporterInfo {
        ImporterInfo::new(JSON_IMPORTER_KEY, "JSON Export")
    }
}

#[async_trait]
impl FilePreparer for JsonExportPreparer {
    async fn prepare(&self, importer: &Importer, path: &Path) -> Result<PreparationReport, ImportError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ImportError::InvalidFile(format!("{}: {}", path.display(), e)))?;
        let export: JsonExport = serde_json::from_str(&content)
            .map_err(|e| ImportError::InvalidFile(format!("{}: {}", path.display(), e)))?;

        let staging = importer.staging().as_ref();
        let cleared = staging.clear_all().await?;
        if cleared > 0 {
            debug!(cleared, "Dropped previously staged records");
        }
        importer.reset_count().await?;

        let mut report = PreparationReport::default();

        importer.update_progress(ProgressStep::PreparingUsers).await?;
        for user in export.users {
            stage(staging, StagedData::User(user)).await?;
            report.users += 1;
        }
        importer
            .publisher()
            .publish_preparation(ProgressStep::PreparingUsers, report.clone());

        importer.update_progress(ProgressStep::PreparingChannels).await?;
        for channel in export.channels {
            stage(staging, StagedData::Channel(channel)).await?;
            report.channels += 1;
        }
        importer
            .publisher()
            .publish_preparation(ProgressStep::PreparingChannels, report.clone());

        importer.update_progress(ProgressStep::PreparingMessages).await?;
        for message in export.messages {
            stage(staging, StagedData::Message(message)).await?;
            report.messages += 1;
        }
        importer
            .publisher()
            .publish_preparation(ProgressStep::PreparingMessages, report.clone());

        let total = report.users + report.channels + report.messages;
        importer.add_count_to_total(total as i64).await?;
        importer.update_progress(ProgressStep::UserSelection).await?;

        Ok(report)
    }
}

async fn stage(staging: &dyn StagingStore, data: StagedData) -> Result<(), ImportError> {
    match staging.stage(&data).await {
        Ok(_) => Ok(()),
        Err(huddle_common::Error::InvalidInput(msg)) => Err(ImportError::InvalidFile(msg)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::importer::test_support::Fixture;
    use huddle_common::events::ProgressCount;
    use std::sync::Arc;
    use tempfile::TempDir;

    const EXPORT: &str = r#"{
        "users": [
            {"import_ids": ["U1"], "username": "ada", "emails": ["ada@example.com"]},
            {"import_ids": ["U2"], "username": "bot", "type": "bot"}
        ],
        "channels": [
            {"import_ids": ["C1"], "name": "general", "members": ["U1", "U2"], "creator": "U1"},
            {"import_ids": ["D1"], "type": "direct", "members": ["U1", "U2"]}
        ],
        "messages": [
            {"import_ids": ["M1"], "channel": "C1", "sender": "U1", "text": "hi", "ts": "2026-01-01T00:00:00Z"}
        ]
    }"#;

    fn write_export(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_prepare_stages_everything() {
        let fixture = Fixture::new(JsonExportPreparer::info()).await;
        let importer = fixture.importer().with_preparer(Arc::new(JsonExportPreparer));
        let (_dir, path) = write_export(EXPORT);

        let progress = importer.prepare_using_local_file(&path).await.unwrap();

        assert_eq!(progress.step, ProgressStep::UserSelection);
        assert_eq!(progress.count, ProgressCount { total: 5, completed: 0 });
        assert_eq!(fixture.staging.len().await, 5);
        assert_eq!(fixture.stored_record().await.count.total, 5);

        let preparation = fixture.publisher.preparation.lock().unwrap().clone();
        assert_eq!(preparation.len(), 3);
        assert_eq!(
            preparation[2].1,
            PreparationReport { users: 2, channels: 2, messages: 1 }
        );
    }

    #[tokio::test]
    async fn test_preparing_again_replaces_total() {
        let fixture = Fixture::new(JsonExportPreparer::info()).await;
        let importer = fixture.importer().with_preparer(Arc::new(JsonExportPreparer));
        let (_dir, path) = write_export(EXPORT);

        importer.prepare_using_local_file(&path).await.unwrap();
        let progress = importer.prepare_using_local_file(&path).await.unwrap();

        assert_eq!(progress.count, ProgressCount { total: 5, completed: 0 });
        assert_eq!(fixture.staging.len().await, 5);
        let record = fixture.stored_record().await;
        assert_eq!(record.count.total, 5);
        assert_eq!(record.count.completed, 0);
    }

    #[tokio::test]
    async fn test_preparing_steps_are_not_published() {
        let fixture = Fixture::new(JsonExportPreparer::info()).await;
        let importer = fixture.importer().with_preparer(Arc::new(JsonExportPreparer));
        let (_dir, path) = write_export(EXPORT);

        importer.prepare_using_local_file(&path).await.unwrap();

        let steps: Vec<ProgressStep> = fixture.publisher.published().iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![ProgressStep::UserSelection]);
    }

    #[tokio::test]
    async fn test_malformed_export_moves_to_error() {
        let fixture = Fixture::new(JsonExportPreparer::info()).await;
        let importer = fixture.importer().with_preparer(Arc::new(JsonExportPreparer));
        let (_dir, path) = write_export("{\"users\": [");

        let result = importer.prepare_using_local_file(&path).await;

        assert!(matches!(result, Err(ImportError::InvalidFile(_))));
        assert_eq!(importer.get_progress().await.step, ProgressStep::Error);
        assert_eq!(fixture.stored_record().await.status, ProgressStep::Error);
    }

    #[tokio::test]
    async fn test_record_without_import_ids_is_rejected() {
        let fixture = Fixture::new(JsonExportPreparer::info()).await;
        let importer = fixture.importer().with_preparer(Arc::new(JsonExportPreparer));
        let (_dir, path) = write_export(r#"{"users": [{"import_ids": []}]}"#);

        let result = importer.prepare_using_local_file(&path).await;

        assert!(matches!(result, Err(ImportError::InvalidFile(_))));
    }
}
