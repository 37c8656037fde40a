//! Import-sensitive settings
//!
//! An import has to create users from foreign domains, keep their usernames
//! and carry attachments of any size and type. The five settings guarding
//! that are captured before a run, relaxed during it and put back afterwards.

use std::future::Future;

use tracing::{debug, warn};

use crate::db::{SettingValue, SettingsStore};
use crate::error::ImportError;

pub const ALLOWED_DOMAINS_LIST: &str = "Accounts_AllowedDomainsList";
pub const ALLOW_USERNAME_CHANGE: &str = "Accounts_AllowUsernameChange";
pub const MAX_FILE_SIZE: &str = "FileUpload_MaxFileSize";
pub const MEDIA_TYPE_WHITE_LIST: &str = "FileUpload_MediaTypeWhiteList";
pub const MEDIA_TYPE_BLACK_LIST: &str = "FileUpload_MediaTypeBlackList";

/// Values of the five import-sensitive settings.
///
/// `None` stands for "absent"; applying the set writes the relaxed value in
/// its place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrideSet {
    pub allowed_domains_list: Option<SettingValue>,
    pub allow_username_change: Option<SettingValue>,
    pub max_file_size: Option<SettingValue>,
    pub media_type_white_list: Option<SettingValue>,
    pub media_type_black_list: Option<SettingValue>,
}

impl ConfigOverrideSet {
    /// The relaxed configuration used while importing
    pub fn relaxed() -> Self {
        Self::default()
    }

    /// Read the current values
    pub async fn capture(store: &dyn SettingsStore) -> Result<Self, ImportError> {
        Ok(Self {
            allowed_domains_list: store.find_by_id(ALLOWED_DOMAINS_LIST).await?,
            allow_username_change: store.find_by_id(ALLOW_USERNAME_CHANGE).await?,
            max_file_size: store.find_by_id(MAX_FILE_SIZE).await?,
            media_type_white_list: store.find_by_id(MEDIA_TYPE_WHITE_LIST).await?,
            media_type_black_list: store.find_by_id(MEDIA_TYPE_BLACK_LIST).await?,
        })
    }

    /// Write every value, substituting the relaxed default for absent ones
    pub async fn apply(&self, store: &dyn SettingsStore) -> Result<(), ImportError> {
        for (id, value) in self.resolved() {
            store.update_value_by_id(id, value).await?;
        }
        Ok(())
    }

    fn resolved(&self) -> [(&'static str, SettingValue); 5] {
        [
            (
                ALLOWED_DOMAINS_LIST,
                self.allowed_domains_list.clone().unwrap_or_else(|| "".into()),
            ),
            (
                ALLOW_USERNAME_CHANGE,
                self.allow_username_change.clone().unwrap_or(SettingValue::Bool(true)),
            ),
            (
                MAX_FILE_SIZE,
                self.max_file_size.clone().unwrap_or(SettingValue::Int(-1)),
            ),
            (
                MEDIA_TYPE_WHITE_LIST,
                self.media_type_white_list.clone().unwrap_or_else(|| "*".into()),
            ),
            (
                MEDIA_TYPE_BLACK_LIST,
                self.media_type_black_list.clone().unwrap_or_else(|| "".into()),
            ),
        ]
    }
}

/// Capture the current settings, run `work`, then restore what was captured.
///
/// `work` is not polled until the capture succeeded. Restoration runs once,
/// after `work` completes, whatever `work` produced. A capture or restore
/// failure is returned as the outer error.
pub async fn restore_after<F, T>(store: &dyn SettingsStore, work: F) -> Result<T, ImportError>
where
    F: Future<Output = T>,
{
    let saved = ConfigOverrideSet::capture(store).await?;
    debug!(saved = ?saved, "Captured import-sensitive settings");

    let output = work.await;

    if let Err(e) = saved.apply(store).await {
        warn!(error = %e, "Failed to restore import-sensitive settings");
        return Err(e);
    }
    debug!("Restored import-sensitive settings");
    Ok(output)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory settings store recording every write
    #[derive(Default)]
    pub(crate) struct MemorySettingsStore {
        pub values: Mutex<HashMap<String, SettingValue>>,
        pub writes: Mutex<Vec<(String, SettingValue)>>,
    }

    impl MemorySettingsStore {
        pub async fn with(values: &[(&str, SettingValue)]) -> Self {
            let store = Self::default();
            {
                let mut map = store.values.lock().await;
                for (id, value) in values {
                    map.insert(id.to_string(), value.clone());
                }
            }
            store
        }

        pub async fn get(&self, id: &str) -> Option<SettingValue> {
            self.values.lock().await.get(id).cloned()
        }
    }

    #[async_trait]
    impl SettingsStore for MemorySettingsStore {
        async fn find_by_id(&self, id: &str) -> huddle_common::Result<Option<SettingValue>> {
            Ok(self.values.lock().await.get(id).cloned())
        }

        async fn update_value_by_id(&self, id: &str, value: SettingValue) -> huddle_common::Result<()> {
            self.writes.lock().await.push((id.to_string(), value.clone()));
            self.values.lock().await.insert(id.to_string(), value);
            Ok(())
        }
    }

    pub(crate) fn stock_values() -> Vec<(&'static str, SettingValue)> {
        vec![
            (ALLOWED_DOMAINS_LIST, "example.com".into()),
            (ALLOW_USERNAME_CHANGE, SettingValue::Bool(false)),
            (MAX_FILE_SIZE, SettingValue::Int(104_857_600)),
            (MEDIA_TYPE_WHITE_LIST, "image/*".into()),
            (MEDIA_TYPE_BLACK_LIST, "image/svg+xml".into()),
        ]
    }

    #[tokio::test]
    async fn test_relaxed_values() {
        let store = MemorySettingsStore::default();

        ConfigOverrideSet::relaxed().apply(&store).await.unwrap();

        assert_eq!(store.get(ALLOWED_DOMAINS_LIST).await, Some("".into()));
        assert_eq!(store.get(ALLOW_USERNAME_CHANGE).await, Some(SettingValue::Bool(true)));
        assert_eq!(store.get(MAX_FILE_SIZE).await, Some(SettingValue::Int(-1)));
        assert_eq!(store.get(MEDIA_TYPE_WHITE_LIST).await, Some("*".into()));
        assert_eq!(store.get(MEDIA_TYPE_BLACK_LIST).await, Some("".into()));
    }

    #[tokio::test]
    async fn test_capture_then_apply_restores() {
        let store = MemorySettingsStore::with(&stock_values()).await;

        let saved = ConfigOverrideSet::capture(&store).await.unwrap();
        ConfigOverrideSet::relaxed().apply(&store).await.unwrap();
        saved.apply(&store).await.unwrap();

        for (id, value) in stock_values() {
            assert_eq!(store.get(id).await, Some(value), "setting {}", id);
        }
    }

    #[tokio::test]
    async fn test_absent_setting_restored_to_relaxed_default() {
        let store = MemorySettingsStore::with(&[(MAX_FILE_SIZE, SettingValue::Int(10))]).await;

        let saved = ConfigOverrideSet::capture(&store).await.unwrap();
        assert!(saved.allowed_domains_list.is_none());
        saved.apply(&store).await.unwrap();

        assert_eq!(store.get(MAX_FILE_SIZE).await, Some(SettingValue::Int(10)));
        assert_eq!(store.get(MEDIA_TYPE_WHITE_LIST).await, Some("*".into()));
    }

    #[tokio::test]
    async fn test_restore_after_runs_once_after_work() {
        let store = MemorySettingsStore::with(&stock_values()).await;

        let output = restore_after(&store, async {
            ConfigOverrideSet::relaxed().apply(&store).await.unwrap();
            assert_eq!(store.get(MAX_FILE_SIZE).await, Some(SettingValue::Int(-1)));
            Err::<(), _>(ImportError::ConversionFailure("boom".into()))
        })
        .await
        .unwrap();

        assert!(output.is_err());
        assert_eq!(store.get(MAX_FILE_SIZE).await, Some(SettingValue::Int(104_857_600)));
        // five relaxed writes, five restoring writes
        assert_eq!(store.writes.lock().await.len(), 10);
    }
}
