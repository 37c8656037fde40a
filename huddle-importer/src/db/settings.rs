//! Settings database operations
//!
//! Key-value access to the `settings` table. Values are stored as JSON text
//! so a string, a boolean and a number each come back as what was written.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use huddle_common::{Error, Result};

/// Value of one setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SettingValue {
    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode stored text. Values written by hand without JSON quoting come
    /// back as plain text.
    fn from_stored(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| SettingValue::Text(raw.to_string()))
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

/// Read/write access to named settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current value, `None` when the setting is absent or NULL
    async fn find_by_id(&self, id: &str) -> Result<Option<SettingValue>>;

    /// Write a value, creating the setting if needed
    async fn update_value_by_id(&self, id: &str, value: SettingValue) -> Result<()>;
}

/// [`SettingsStore`] over the shared SQLite database
#[derive(Clone)]
pub struct SqliteSettingsStore {
    db: SqlitePool,
}

impl SqliteSettingsStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<SettingValue>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?")
                .bind(id)
                .fetch_optional(&self.db)
                .await
                .map_err(Error::Database)?;

        Ok(row
            .and_then(|(value,)| value)
            .map(|raw| SettingValue::from_stored(&raw)))
    }

    async fn update_value_by_id(&self, id: &str, value: SettingValue) -> Result<()> {
        let json = value.to_json()?;

        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(id)
        .bind(json)
        .execute(&self.db)
        .await
        .map_err(Error::Database)?;

        tracing::debug!(setting = id, value = ?value, "Setting updated");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
