//! Data conversion from staged records to live users, rooms and messages
//!
//! The importer hands the converter a set of callbacks; the converter asks
//! `before_import` whether a staged user or channel should be converted and
//! calls `after_import` once per converted record. A callback error stops the
//! phase and is returned unchanged.
//!
//! Per-record write failures are not fatal: the error text is stored on the
//! staging row, the row stays pending and conversion moves on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{SqliteStagingStore, StagingStore};
use crate::error::ImportError;
use crate::models::{
    ImportRecordType, StagedChannel, StagedData, StagedEntry, StagedMessage, StagedUser,
};

/// Hooks the importer passes to each conversion phase
#[async_trait]
pub trait ImportCallbacks: Send + Sync {
    /// Whether a staged user or channel should be converted
    async fn before_import(&self, data: &StagedData) -> Result<bool, ImportError>;

    /// Called after each record was converted
    async fn after_import(&self, data: &StagedData) -> Result<(), ImportError>;
}

/// Turns staged records into live entities
///
/// `convert_messages` never consults `before_import`; message filtering
/// follows from which channels and users were converted.
#[async_trait]
pub trait DataConverter: Send + Sync {
    async fn convert_users(&self, callbacks: &dyn ImportCallbacks) -> Result<(), ImportError>;

    /// `started_by` owns channels whose creator is unknown
    async fn convert_channels(
        &self,
        started_by: &str,
        callbacks: &dyn ImportCallbacks,
    ) -> Result<(), ImportError>;

    async fn convert_messages(&self, callbacks: &dyn ImportCallbacks) -> Result<(), ImportError>;

    async fn clear_successfully_imported_data(&self) -> Result<(), ImportError>;

    /// Ask the converter to stop at the next record
    fn abort(&self);

    fn is_aborted(&self) -> bool;
}

/// [`DataConverter`] writing the `users`, `rooms` and `messages` tables
pub struct SqliteDataConverter {
    db: SqlitePool,
    staging: SqliteStagingStore,
    aborted: AtomicBool,
}

impl SqliteDataConverter {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            staging: SqliteStagingStore::new(db.clone()),
            db,
            aborted: AtomicBool::new(false),
        }
    }

    fn ensure_running(&self) -> Result<(), ImportError> {
        if self.is_aborted() {
            return Err(ImportError::RunInvalidated);
        }
        Ok(())
    }

    /// Live id for an imported user/room, keyed by import id
    async fn id_map(&self, table: &str) -> Result<HashMap<String, String>, ImportError> {
        let query = format!("SELECT import_id, id FROM {} WHERE import_id IS NOT NULL", table);
        let rows: Vec<(String, String)> = sqlx::query_as(&query).fetch_all(&self.db).await?;
        Ok(rows.into_iter().collect())
    }

    /// Store the failure on the staging row and carry on
    async fn record_failure(&self, entry: &StagedEntry, error: &str) -> Result<(), ImportError> {
        warn!(
            staging_id = %entry.id,
            record_type = entry.data.record_type().as_str(),
            error,
            "Failed to convert staged record"
        );
        self.staging.mark_error(entry.id, error).await?;
        Ok(())
    }

    async fn write_user(&self, user: &StagedUser) -> Result<(), sqlx::Error> {
        let username = user
            .username
            .clone()
            .or_else(|| user.name.clone())
            .unwrap_or_else(|| user.primary_id().to_string());

        sqlx::query(
            r#"
            INSERT INTO users (id, import_id, username, email, name, user_type, active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(import_id) DO UPDATE SET
                username = excluded.username,
                email = excluded.email,
                name = excluded.name,
                user_type = excluded.user_type,
                active = excluded.active
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user.primary_id())
        .bind(username)
        .bind(user.emails.first())
        .bind(&user.name)
        .bind(user.kind.as_str())
        .bind(!user.deleted)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn write_room(
        &self,
        channel: &StagedChannel,
        created_by: &str,
        users: &HashMap<String, String>,
    ) -> Result<(), ImportError> {
        let members: Vec<&String> = channel
            .members
            .iter()
            .filter_map(|member| users.get(member))
            .collect();
        let members = serde_json::to_string(&members)
            .map_err(|e| ImportError::Store(huddle_common::Error::from(e)))?;

        sqlx::query(
            r#"
            INSERT INTO rooms (id, import_id, name, room_type, archived, members, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(import_id) DO UPDATE SET
                name = excluded.name,
                room_type = excluded.room_type,
                archived = excluded.archived,
                members = excluded.members
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(channel.primary_id())
        .bind(&channel.name)
        .bind(channel.room_type.as_str())
        .bind(channel.archived)
        .bind(members)
        .bind(created_by)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn write_message(
        &self,
        message: &StagedMessage,
        room_id: &str,
        user_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, import_id, room_id, user_id, text, ts)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(import_id) DO UPDATE SET text = excluded.text, ts = excluded.ts
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(message.primary_id())
        .bind(room_id)
        .bind(user_id)
        .bind(&message.text)
        .bind(message.ts.to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Mark the row converted, then hand it to the completion callback
    async fn complete(
        &self,
        entry: &StagedEntry,
        callbacks: &dyn ImportCallbacks,
    ) -> Result<(), ImportError> {
        self.staging.mark_imported(entry.id).await?;
        callbacks.after_import(&entry.data).await
    }
}

#[async_trait]
impl DataConverter for SqliteDataConverter {
    async fn convert_users(&self, callbacks: &dyn ImportCallbacks) -> Result<(), ImportError> {
        let entries = self.staging.pending(ImportRecordType::User).await?;
        info!(count = entries.len(), "Converting users");

        for entry in &entries {
            self.ensure_running()?;
            let StagedData::User(user) = &entry.data else {
                continue;
            };
            if !callbacks.before_import(&entry.data).await? {
                debug!(user = user.primary_id(), "User not selected, skipping");
                continue;
            }

            match self.write_user(user).await {
                Ok(()) => self.complete(entry, callbacks).await?,
                Err(e) => self.record_failure(entry, &e.to_string()).await?,
            }
        }
        Ok(())
    }

    async fn convert_channels(
        &self,
        started_by: &str,
        callbacks: &dyn ImportCallbacks,
    ) -> Result<(), ImportError> {
        let entries = self.staging.pending(ImportRecordType::Channel).await?;
        let users = self.id_map("users").await?;
        info!(count = entries.len(), "Converting channels");

        for entry in &entries {
            self.ensure_running()?;
            let StagedData::Channel(channel) = &entry.data else {
                continue;
            };
            if !callbacks.before_import(&entry.data).await? {
                debug!(channel = channel.primary_id(), "Channel not selected, skipping");
                continue;
            }

            let created_by = channel
                .creator
                .as_ref()
                .and_then(|creator| users.get(creator))
                .map(String::as_str)
                .unwrap_or(started_by);

            match self.write_room(channel, created_by, &users).await {
                Ok(()) => self.complete(entry, callbacks).await?,
                Err(ImportError::Store(e)) => self.record_failure(entry, &e.to_string()).await?,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn convert_messages(&self, callbacks: &dyn ImportCallbacks) -> Result<(), ImportError> {
        let entries = self.staging.pending(ImportRecordType::Message).await?;
        let rooms = self.id_map("rooms").await?;
        let users = self.id_map("users").await?;
        info!(count = entries.len(), "Converting messages");

        for entry in &entries {
            self.ensure_running()?;
            let StagedData::Message(message) = &entry.data else {
                continue;
            };

            let Some(room_id) = rooms.get(&message.channel) else {
                self.record_failure(entry, &format!("channel {} was not imported", message.channel))
                    .await?;
                continue;
            };
            let Some(user_id) = users.get(&message.sender) else {
                self.record_failure(entry, &format!("sender {} was not imported", message.sender))
                    .await?;
                continue;
            };

            match self.write_message(message, room_id, user_id).await {
                Ok(()) => self.complete(entry, callbacks).await?,
                Err(e) => self.record_failure(entry, &e.to_string()).await?,
            }
        }
        Ok(())
    }

    async fn clear_successfully_imported_data(&self) -> Result<(), ImportError> {
        let removed = self.staging.clear_successfully_imported().await?;
        info!(removed, "Cleared successfully imported staging data");
        Ok(())
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoomType, UserKind};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::AtomicUsize;

    /// Selects everything except the listed ids, counting completions
    #[derive(Default)]
    struct TestCallbacks {
        skip: Vec<String>,
        completed: AtomicUsize,
    }

    #[async_trait]
    impl ImportCallbacks for TestCallbacks {
        async fn before_import(&self, data: &StagedData) -> Result<bool, ImportError> {
            Ok(!data.import_ids().iter().any(|id| self.skip.contains(id)))
        }

        async fn after_import(&self, _data: &StagedData) -> Result<(), ImportError> {
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn setup() -> (SqlitePool, SqliteDataConverter) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        huddle_common::db::create_tables(&pool).await.unwrap();

        let staging = SqliteStagingStore::new(pool.clone());
        for (id, kind) in [("U1", UserKind::User), ("U2", UserKind::Bot)] {
            staging
                .stage(&StagedData::User(StagedUser {
                    import_ids: vec![id.to_string()],
                    username: Some(id.to_lowercase()),
                    emails: vec![format!("{}@example.com", id.to_lowercase())],
                    name: None,
                    deleted: false,
                    kind,
                }))
                .await
                .unwrap();
        }
        for (id, room_type) in [("C1", RoomType::Public), ("D1", RoomType::Direct)] {
            staging
                .stage(&StagedData::Channel(StagedChannel {
                    import_ids: vec![id.to_string()],
                    name: Some(id.to_lowercase()),
                    archived: false,
                    room_type,
                    members: vec!["U1".to_string(), "U2".to_string()],
                    creator: Some("U1".to_string()),
                }))
                .await
                .unwrap();
        }
        for (id, channel) in [("M1", "C1"), ("M2", "C9")] {
            staging
                .stage(&StagedData::Message(StagedMessage {
                    import_ids: vec![id.to_string()],
                    channel: channel.to_string(),
                    sender: "U1".to_string(),
                    text: format!("message {}", id),
                    ts: chrono::Utc::now(),
                }))
                .await
                .unwrap();
        }

        let converter = SqliteDataConverter::new(pool.clone());
        (pool, converter)
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_conversion() {
        let (pool, converter) = setup().await;
        let callbacks = TestCallbacks::default();

        converter.convert_users(&callbacks).await.unwrap();
        converter.convert_channels("admin", &callbacks).await.unwrap();
        converter.convert_messages(&callbacks).await.unwrap();

        assert_eq!(count(&pool, "users").await, 2);
        assert_eq!(count(&pool, "rooms").await, 2);
        assert_eq!(count(&pool, "messages").await, 1);
        // 2 users + 2 rooms + 1 message; M2 points at an unknown channel
        assert_eq!(callbacks.completed.load(Ordering::SeqCst), 5);

        let error: Option<String> = sqlx::query_scalar(
            "SELECT error FROM import_data WHERE json_extract(data, '$.import_ids[0]') = 'M2'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(error.unwrap().contains("C9"));
    }

    #[tokio::test]
    async fn test_room_owner_and_members_use_live_ids() {
        let (pool, converter) = setup().await;
        let callbacks = TestCallbacks::default();

        converter.convert_users(&callbacks).await.unwrap();
        converter.convert_channels("admin", &callbacks).await.unwrap();

        let u1: String = sqlx::query_scalar("SELECT id FROM users WHERE import_id = 'U1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        let (created_by, members): (String, String) =
            sqlx::query_as("SELECT created_by, members FROM rooms WHERE import_id = 'C1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(created_by, u1);
        let members: Vec<String> = serde_json::from_str(&members).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.contains(&u1));
    }

    #[tokio::test]
    async fn test_unselected_records_stay_pending() {
        let (pool, converter) = setup().await;
        let callbacks = TestCallbacks {
            skip: vec!["U2".to_string(), "C1".to_string()],
            ..Default::default()
        };

        converter.convert_users(&callbacks).await.unwrap();
        converter.convert_channels("admin", &callbacks).await.unwrap();

        assert_eq!(count(&pool, "users").await, 1);
        assert_eq!(count(&pool, "rooms").await, 1);

        let staging = SqliteStagingStore::new(pool.clone());
        assert_eq!(staging.pending(ImportRecordType::User).await.unwrap().len(), 1);
        assert_eq!(staging.pending(ImportRecordType::Channel).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_aborted_converter_stops() {
        let (pool, converter) = setup().await;
        let callbacks = TestCallbacks::default();

        converter.abort();
        assert!(converter.is_aborted());

        let result = converter.convert_users(&callbacks).await;
        assert!(matches!(result, Err(ImportError::RunInvalidated)));
        assert_eq!(count(&pool, "users").await, 0);
    }

    #[tokio::test]
    async fn test_clear_successfully_imported_data() {
        let (pool, converter) = setup().await;
        let callbacks = TestCallbacks::default();

        converter.convert_users(&callbacks).await.unwrap();
        converter.clear_successfully_imported_data().await.unwrap();

        assert_eq!(count(&pool, "import_data").await, 4);
    }
}
