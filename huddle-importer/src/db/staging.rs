//! Staged import data
//!
//! Parsed export records wait in `import_data` until the converter picks
//! them up. Each row keeps an `imported` flag and the last conversion error.

use async_trait::async_trait;
use huddle_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    ImportRecordType, StagedChannel, StagedData, StagedEntry, StagedUser,
};

/// Read/write access to staged records
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Park one parsed record, returning its staging id
    async fn stage(&self, data: &StagedData) -> Result<Uuid>;

    async fn get_all_users_for_selection(&self) -> Result<Vec<StagedUser>>;

    /// Staged channels except direct conversations
    async fn get_all_channels_for_selection(&self) -> Result<Vec<StagedChannel>>;

    /// Whether any direct conversation is staged
    async fn check_if_direct_messages_exists(&self) -> Result<bool>;

    async fn count_messages(&self) -> Result<i64>;

    /// Drop rows already converted; returns how many went
    async fn clear_successfully_imported(&self) -> Result<u64>;

    /// Drop everything staged, e.g. before a new file is prepared
    async fn clear_all(&self) -> Result<u64>;
}

/// [`StagingStore`] over the shared SQLite database
#[derive(Clone)]
pub struct SqliteStagingStore {
    db: SqlitePool,
}

impl SqliteStagingStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Staged rows of one type not yet converted, oldest first
    pub async fn pending(&self, record_type: ImportRecordType) -> Result<Vec<StagedEntry>> {
        let rows = sqlx::query(
            "SELECT id, data FROM import_data WHERE data_type = ? AND imported = 0 ORDER BY created_at, rowid",
        )
        .bind(record_type.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> Result<StagedEntry> {
                let id: String = row.try_get("id")?;
                let data: String = row.try_get("data")?;
                Ok(StagedEntry {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| Error::Internal(format!("Invalid staging id '{}': {}", id, e)))?,
                    data: StagedData::from_json(record_type, &data)?,
                })
            })
            .collect()
    }

    pub async fn mark_imported(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE import_data SET imported = 1, error = NULL WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Record why a row could not be converted; the row stays pending
    pub async fn mark_error(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query("UPDATE import_data SET error = ? WHERE id = ?")
            .bind(error)
            .bind(id.to_string())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn all_of_type<T>(&self, record_type: ImportRecordType) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let payloads: Vec<String> = sqlx::query_scalar(
            "SELECT data FROM import_data WHERE data_type = ? ORDER BY created_at, rowid",
        )
        .bind(record_type.as_str())
        .fetch_all(&self.db)
        .await?;

        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl StagingStore for SqliteStagingStore {
    async fn stage(&self, data: &StagedData) -> Result<Uuid> {
        if data.import_ids().is_empty() {
            return Err(Error::InvalidInput(format!(
                "staged {} has no import ids",
                data.record_type().as_str()
            )));
        }

        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO import_data (id, data_type, data) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(data.record_type().as_str())
            .bind(data.to_json()?)
            .execute(&self.db)
            .await?;
        Ok(id)
    }

    async fn get_all_users_for_selection(&self) -> Result<Vec<StagedUser>> {
        self.all_of_type(ImportRecordType::User).await
    }

    async fn get_all_channels_for_selection(&self) -> Result<Vec<StagedChannel>> {
        let channels: Vec<StagedChannel> = self.all_of_type(ImportRecordType::Channel).await?;
        Ok(channels.into_iter().filter(|channel| !channel.is_direct()).collect())
    }

    async fn check_if_direct_messages_exists(&self) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM import_data WHERE data_type = 'channel' AND json_extract(data, '$.type') = 'direct')",
        )
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn count_messages(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM import_data WHERE data_type = 'message'")
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }

    async fn clear_successfully_imported(&self) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM import_data WHERE imported = 1")
            .execute(&self.db)
            .await?
            .rows_affected();
        tracing::debug!(removed, "Cleared imported staging rows");
        Ok(removed)
    }

    async fn clear_all(&self) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM import_data")
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(removed)
    }
}
