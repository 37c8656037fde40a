//! Import record persistence
//!
//! Rows in the `imports` table. Partial updates use `COALESCE` so only the
//! fields set on an [`ImportRecordUpdate`] are written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use huddle_common::events::{ProgressCount, ProgressStep};
use huddle_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ImportRecord, ImportRecordUpdate};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Persistence of import records
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn insert(&self, record: &ImportRecord) -> Result<()>;

    async fn find_one(&self, id: Uuid) -> Result<Option<ImportRecord>>;

    /// Write the set fields of `fields`; other columns keep their value
    async fn update(&self, id: Uuid, fields: &ImportRecordUpdate) -> Result<()>;

    /// Clear the validity flag, asking a running import to stop
    async fn invalidate(&self, id: Uuid) -> Result<()> {
        self.update(id, &ImportRecordUpdate::invalidate()).await
    }
}

/// [`ImportStore`] over the shared SQLite database
#[derive(Clone)]
pub struct SqliteImportStore {
    db: SqlitePool,
}

impl SqliteImportStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Most recently created record for an importer
    pub async fn find_latest(&self, importer_key: &str) -> Result<Option<ImportRecord>> {
        let row = sqlx::query(
            "SELECT * FROM imports WHERE importer_key = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(importer_key)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| record_from_row(&row)).transpose()
    }
}

#[async_trait]
impl ImportStore for SqliteImportStore {
    async fn insert(&self, record: &ImportRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO imports (
                id, importer_key, status, count_total, count_completed,
                valid, file, content_type, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.importer_key)
        .bind(record.status.as_str())
        .bind(record.count.total)
        .bind(record.count.completed)
        .bind(record.valid)
        .bind(&record.file)
        .bind(&record.content_type)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        tracing::debug!(import_id = %record.id, importer = %record.importer_key, "Import record created");
        Ok(())
    }

    async fn find_one(&self, id: Uuid) -> Result<Option<ImportRecord>> {
        let row = sqlx::query("SELECT * FROM imports WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn update(&self, id: Uuid, fields: &ImportRecordUpdate) -> Result<()> {
        retry_on_lock("import record update", DEFAULT_MAX_LOCK_WAIT_MS, || async move {
            sqlx::query(
                r#"
                UPDATE imports SET
                    status = COALESCE(?, status),
                    count_total = COALESCE(?, count_total),
                    count_completed = COALESCE(?, count_completed),
                    valid = COALESCE(?, valid),
                    file = COALESCE(?, file),
                    content_type = COALESCE(?, content_type),
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(fields.status.map(|s| s.as_str()))
            .bind(fields.count_total)
            .bind(fields.count_completed)
            .bind(fields.valid)
            .bind(&fields.file)
            .bind(&fields.content_type)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.db)
            .await?;
            Ok(())
        })
        .await
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ImportRecord> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ImportRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid import id '{}': {}", id, e)))?,
        importer_key: row.try_get("importer_key")?,
        status: status.parse::<ProgressStep>().map_err(Error::Internal)?,
        count: ProgressCount {
            total: row.try_get("count_total")?,
            completed: row.try_get("count_completed")?,
        },
        valid: row.try_get("valid")?,
        file: row.try_get("file")?,
        content_type: row.try_get("content_type")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}
