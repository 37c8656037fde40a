//! huddle-importer library interface
//!
//! Exposes the importer, its stores and the HTTP router for integration testing

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, ImportError};

use axum::Router;
use chrono::{DateTime, Utc};
use huddle_common::events::{EventBus, ProgressSnapshot};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::db::{ImportStore, SqliteImportStore, SqliteSettingsStore, SqliteStagingStore};
use crate::models::{ImportRecord, Selection};
use crate::services::{
    EventBusPublisher, Importer, ImporterRegistry, ImporterServices, SqliteDataConverter,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Importers that can be created by key
    pub registry: Arc<ImporterRegistry>,
    /// Live orchestrators, one per import record
    pub importers: Arc<RwLock<HashMap<Uuid, Arc<Importer>>>>,
    /// Serializes the running check with the start of a run
    start_lock: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self::with_registry(db, event_bus, ImporterRegistry::with_defaults())
    }

    pub fn with_registry(db: SqlitePool, event_bus: EventBus, registry: ImporterRegistry) -> Self {
        Self {
            db,
            event_bus,
            registry: Arc::new(registry),
            importers: Arc::new(RwLock::new(HashMap::new())),
            start_lock: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn import_store(&self) -> SqliteImportStore {
        SqliteImportStore::new(self.db.clone())
    }

    /// SQLite-backed collaborators publishing under `import_id`
    pub fn services_for(&self, import_id: Uuid) -> ImporterServices {
        ImporterServices {
            settings: Arc::new(SqliteSettingsStore::new(self.db.clone())),
            imports: Arc::new(self.import_store()),
            staging: Arc::new(SqliteStagingStore::new(self.db.clone())),
            converter: Arc::new(SqliteDataConverter::new(self.db.clone())),
            publisher: Arc::new(EventBusPublisher::new(self.event_bus.clone(), import_id)),
        }
    }

    /// Create a record for `importer_key` and the importer driving it
    pub async fn create_import(&self, importer_key: &str) -> Result<Arc<Importer>, ApiError> {
        if self.registry.get(importer_key).is_none() {
            return Err(ApiError::BadRequest(format!(
                "Unknown importer: {}",
                importer_key
            )));
        }

        let record = ImportRecord::new(importer_key);
        self.import_store().insert(&record).await?;
        tracing::info!(import_id = %record.id, importer = importer_key, "Import record created");

        let id = record.id;
        let importer = Arc::new(self.build_importer(record)?);
        self.evict_finished().await;
        self.importers.write().await.insert(id, Arc::clone(&importer));
        Ok(importer)
    }

    /// Start a run on import `id` unless any import, this one included, is mid-run
    pub async fn start_import(
        &self,
        id: Uuid,
        selection: Selection,
        started_by: &str,
    ) -> Result<ProgressSnapshot, ApiError> {
        let _guard = self.start_lock.lock().await;

        if self.another_import_running(id).await {
            return Err(ApiError::Conflict("Another import is already running".to_string()));
        }
        let importer = self.importer_for(id).await?;
        if importer.get_progress().await.step.is_running() {
            return Err(ApiError::Conflict(format!("Import {} is already running", id)));
        }

        let progress = importer.start_import(selection, started_by).await?;
        self.evict_finished().await;
        Ok(progress)
    }

    /// Drop cached importers whose run is over, in memory and on the record.
    ///
    /// They are rebuilt from the store by [`AppState::importer_for`] when asked for again.
    pub async fn evict_finished(&self) -> usize {
        let cached: Vec<(Uuid, Arc<Importer>)> = self
            .importers
            .read()
            .await
            .iter()
            .map(|(key, importer)| (*key, Arc::clone(importer)))
            .collect();

        let mut finished = Vec::new();
        for (key, importer) in cached {
            let recorded = importer
                .record()
                .await
                .map_or(true, |record| record.status.is_terminal());
            if recorded && importer.get_progress().await.step.is_terminal() {
                finished.push(key);
            }
        }

        if !finished.is_empty() {
            let mut importers = self.importers.write().await;
            for key in &finished {
                importers.remove(key);
            }
            tracing::debug!(evicted = finished.len(), "Evicted finished importers");
        }
        finished.len()
    }

    /// The importer bound to record `id`, rebuilt from the store when not cached
    pub async fn importer_for(&self, id: Uuid) -> Result<Arc<Importer>, ApiError> {
        if let Some(importer) = self.importers.read().await.get(&id) {
            return Ok(Arc::clone(importer));
        }

        let record = self
            .import_store()
            .find_one(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Import {}", id)))?;
        let importer = Arc::new(self.build_importer(record)?);

        let mut importers = self.importers.write().await;
        Ok(Arc::clone(importers.entry(id).or_insert(importer)))
    }

    /// Whether any importer other than `id` is mid-run
    pub async fn another_import_running(&self, id: Uuid) -> bool {
        let importers: Vec<(Uuid, Arc<Importer>)> = self
            .importers
            .read()
            .await
            .iter()
            .map(|(key, importer)| (*key, Arc::clone(importer)))
            .collect();

        for (key, importer) in importers {
            if key != id && importer.get_progress().await.step.is_running() {
                return true;
            }
        }
        false
    }

    pub async fn set_last_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }

    fn build_importer(&self, record: ImportRecord) -> Result<Importer, ApiError> {
        let definition = self.registry.get(&record.importer_key).ok_or_else(|| {
            ApiError::NotFound(format!("Importer {} is not registered", record.importer_key))
        })?;

        let services = self.services_for(record.id);
        let importer = Importer::new(definition.info.clone(), services, Some(record))?;
        Ok(match &definition.preparer {
            Some(preparer) => importer.with_preparer(Arc::clone(preparer)),
            None => importer,
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::import_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
