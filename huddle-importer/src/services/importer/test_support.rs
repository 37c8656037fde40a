//! In-memory collaborators for importer tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use huddle_common::{Error, Result};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Importer, ImporterServices};
use crate::db::{ImportStore, StagingStore};
use crate::error::ImportError;
use crate::models::{
    ImportRecord, ImportRecordUpdate, ImporterInfo, StagedChannel, StagedData, StagedUser,
};
use crate::services::converter::{DataConverter, ImportCallbacks};
use crate::services::progress_reporter::tests::RecordingPublisher;
use crate::services::settings_override::tests::{stock_values, MemorySettingsStore};

#[derive(Default)]
pub(crate) struct MemoryImportStore {
    records: Mutex<HashMap<Uuid, ImportRecord>>,
    pub updates: Mutex<Vec<ImportRecordUpdate>>,
}

#[async_trait]
impl ImportStore for MemoryImportStore {
    async fn insert(&self, record: &ImportRecord) -> Result<()> {
        self.records.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_one(&self, id: Uuid) -> Result<Option<ImportRecord>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, fields: &ImportRecordUpdate) -> Result<()> {
        self.updates.lock().await.push(fields.clone());
        if let Some(record) = self.records.lock().await.get_mut(&id) {
            fields.apply_to(record);
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryStagingStore {
    rows: Mutex<Vec<StagedData>>,
}

impl MemoryStagingStore {
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn all(&self) -> Vec<StagedData> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl StagingStore for MemoryStagingStore {
    async fn stage(&self, data: &StagedData) -> Result<Uuid> {
        if data.import_ids().is_empty() {
            return Err(Error::InvalidInput("no import ids".to_string()));
        }
        self.rows.lock().await.push(data.clone());
        Ok(Uuid::new_v4())
    }

    async fn get_all_users_for_selection(&self) -> Result<Vec<StagedUser>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter_map(|row| match row {
                StagedData::User(user) => Some(user.clone()),
                _ => None,
            })
            .collect())
    }

    async fn get_all_channels_for_selection(&self) -> Result<Vec<StagedChannel>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter_map(|row| match row {
                StagedData::Channel(channel) if !channel.is_direct() => Some(channel.clone()),
                _ => None,
            })
            .collect())
    }

    async fn check_if_direct_messages_exists(&self) -> Result<bool> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .any(|row| matches!(row, StagedData::Channel(channel) if channel.is_direct())))
    }

    async fn count_messages(&self) -> Result<i64> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| matches!(row, StagedData::Message(_)))
            .count() as i64)
    }

    async fn clear_successfully_imported(&self) -> Result<u64> {
        Ok(0)
    }

    async fn clear_all(&self) -> Result<u64> {
        let mut rows = self.rows.lock().await;
        let removed = rows.len() as u64;
        rows.clear();
        Ok(removed)
    }
}

/// Converter walking the staged rows of a [`MemoryStagingStore`]
#[derive(Default)]
pub(crate) struct ScriptedConverter {
    pub staging: Arc<MemoryStagingStore>,
    pub converted: Mutex<Vec<String>>,
    pub cleared: AtomicBool,
    pub aborted: AtomicBool,
    /// Invalidate this record once the user phase finished
    pub invalidate_after_users: Option<(Arc<MemoryImportStore>, Uuid)>,
    /// Fail the message phase outright
    pub fail_messages: bool,
}

impl ScriptedConverter {
    pub async fn converted(&self) -> Vec<String> {
        self.converted.lock().await.clone()
    }

    async fn convert(
        &self,
        filter: fn(&StagedData) -> bool,
        consult_selection: bool,
        callbacks: &dyn ImportCallbacks,
    ) -> std::result::Result<(), ImportError> {
        let rows: Vec<StagedData> = self.staging.all().await.into_iter().filter(filter).collect();
        for row in rows {
            if self.is_aborted() {
                return Err(ImportError::RunInvalidated);
            }
            if consult_selection && !callbacks.before_import(&row).await? {
                continue;
            }
            self.converted.lock().await.push(row.import_ids()[0].clone());
            callbacks.after_import(&row).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DataConverter for ScriptedConverter {
    async fn convert_users(&self, callbacks: &dyn ImportCallbacks) -> std::result::Result<(), ImportError> {
        self.convert(|row| matches!(row, StagedData::User(_)), true, callbacks)
            .await?;
        if let Some((store, id)) = &self.invalidate_after_users {
            store.invalidate(*id).await?;
        }
        Ok(())
    }

    async fn convert_channels(
        &self,
        _started_by: &str,
        callbacks: &dyn ImportCallbacks,
    ) -> std::result::Result<(), ImportError> {
        self.convert(|row| matches!(row, StagedData::Channel(_)), true, callbacks)
            .await
    }

    async fn convert_messages(&self, callbacks: &dyn ImportCallbacks) -> std::result::Result<(), ImportError> {
        if self.fail_messages {
            return Err(ImportError::ConversionFailure("message store offline".to_string()));
        }
        self.convert(|row| matches!(row, StagedData::Message(_)), false, callbacks)
            .await
    }

    async fn clear_successfully_imported_data(&self) -> std::result::Result<(), ImportError> {
        self.cleared.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// An import record plus in-memory stores around it
pub(crate) struct Fixture {
    pub info: ImporterInfo,
    pub record_id: Uuid,
    pub settings: Arc<MemorySettingsStore>,
    pub imports: Arc<MemoryImportStore>,
    pub staging: Arc<MemoryStagingStore>,
    pub converter: Arc<ScriptedConverter>,
    pub publisher: Arc<RecordingPublisher>,
}

impl Fixture {
    pub async fn new(info: ImporterInfo) -> Self {
        Self::with_converter(info, |_, _, _| ScriptedConverter::default()).await
    }

    /// Build the converter with access to the staging store, import store and record id
    pub async fn with_converter<F>(info: ImporterInfo, build: F) -> Self
    where
        F: FnOnce(Arc<MemoryStagingStore>, Arc<MemoryImportStore>, Uuid) -> ScriptedConverter,
    {
        let imports = Arc::new(MemoryImportStore::default());
        let record = ImportRecord::new(info.key.clone());
        imports.insert(&record).await.unwrap();

        let staging = Arc::new(MemoryStagingStore::default());
        let mut converter = build(Arc::clone(&staging), Arc::clone(&imports), record.id);
        converter.staging = Arc::clone(&staging);

        Self {
            info,
            record_id: record.id,
            settings: Arc::new(MemorySettingsStore::with(&stock_values()).await),
            imports,
            staging,
            converter: Arc::new(converter),
            publisher: Arc::new(RecordingPublisher::default()),
        }
    }

    pub fn services(&self) -> ImporterServices {
        ImporterServices {
            settings: self.settings.clone(),
            imports: self.imports.clone(),
            staging: self.staging.clone(),
            converter: self.converter.clone(),
            publisher: self.publisher.clone(),
        }
    }

    /// Importer bound to the fixture's record
    pub fn importer(&self) -> Importer {
        let record = self
            .imports
            .records
            .try_lock()
            .unwrap()
            .get(&self.record_id)
            .cloned();
        Importer::new(self.info.clone(), self.services(), record).unwrap()
    }

    pub async fn stored_record(&self) -> ImportRecord {
        self.imports.find_one(self.record_id).await.unwrap().unwrap()
    }

    pub async fn stage(&self, rows: Vec<StagedData>) {
        for row in rows {
            self.staging.stage(&row).await.unwrap();
        }
    }

    /// Wait until the deferred run reported its end
    pub async fn wait_for_finish(&self) {
        for _ in 0..500 {
            if !self.publisher.finished().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("import run did not finish");
    }
}
