//! Import workflow API handlers
//!
//! POST /import, then per record: upload, prepare, selection, start,
//! progress and cancel.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use huddle_common::events::ProgressSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::ImportStore;
use crate::error::{ApiError, ApiResult};
use crate::models::{ImportRecord, Selection};
use crate::AppState;

/// POST /import request
#[derive(Debug, Deserialize)]
pub struct CreateImportRequest {
    pub importer_key: String,
}

/// POST /import/:id/upload request
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// POST /import/:id/prepare request
#[derive(Debug, Deserialize)]
pub struct PrepareRequest {
    /// Export file on the server's local disk
    #[serde(default)]
    pub path: Option<String>,
}

/// POST /import/:id/start request
#[derive(Debug, Deserialize)]
pub struct StartImportRequest {
    pub selection: Selection,
    #[serde(default)]
    pub started_by: String,
}

/// POST /import/:id/cancel response
#[derive(Debug, Serialize)]
pub struct CancelImportResponse {
    pub import_id: Uuid,
    pub valid: bool,
    pub progress: ProgressSnapshot,
}

/// POST /import
///
/// Create an import record for a registered importer.
pub async fn create_import(
    State(state): State<AppState>,
    Json(request): Json<CreateImportRequest>,
) -> ApiResult<(StatusCode, Json<ImportRecord>)> {
    let importer = state.create_import(&request.importer_key).await?;
    let record = importer
        .record()
        .await
        .ok_or_else(|| ApiError::Internal("Import record missing after creation".to_string()))?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /import/:id/upload
pub async fn start_upload(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Json<ImportRecord>> {
    if request.file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("file_name is required".to_string()));
    }

    let importer = state.importer_for(import_id).await?;
    let record = importer
        .start_file_upload(&request.file_name, request.content_type.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import {}", import_id)))?;

    tracing::info!(import_id = %import_id, file = %request.file_name, "Upload started");
    Ok(Json(record))
}

/// POST /import/:id/prepare
///
/// Runs the importer's preparer on a local file and answers once staging is
/// done.
pub async fn prepare_import(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
    Json(request): Json<PrepareRequest>,
) -> ApiResult<Json<ProgressSnapshot>> {
    let path = request
        .path
        .filter(|path| !path.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("path is required".to_string()))?;

    let importer = state.importer_for(import_id).await?;
    match importer.prepare_using_local_file(std::path::Path::new(&path)).await {
        Ok(progress) => Ok(Json(progress)),
        Err(e) => {
            state
                .set_last_error(format!("Preparing import {} failed: {}", import_id, e))
                .await;
            Err(e.into())
        }
    }
}

/// GET /import/:id/selection
pub async fn get_selection(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
) -> ApiResult<Json<Selection>> {
    let importer = state.importer_for(import_id).await?;
    Ok(Json(importer.build_selection().await?))
}

/// POST /import/:id/start
///
/// Returns 202 Accepted once the run is scheduled; 409 if another import is
/// already running in this process.
pub async fn start_import(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
    Json(request): Json<StartImportRequest>,
) -> ApiResult<(StatusCode, Json<ProgressSnapshot>)> {
    let progress = state
        .start_import(import_id, request.selection, &request.started_by)
        .await?;

    tracing::info!(
        import_id = %import_id,
        started_by = %request.started_by,
        "Import run scheduled"
    );
    Ok((StatusCode::ACCEPTED, Json(progress)))
}

/// GET /import/:id/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
) -> ApiResult<Json<ProgressSnapshot>> {
    let importer = state.importer_for(import_id).await?;
    Ok(Json(importer.get_progress().await))
}

/// POST /import/:id/cancel
///
/// Marks the record invalid. A running import notices at its next
/// checkpoint and ends in ERROR.
pub async fn cancel_import(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
) -> ApiResult<Json<CancelImportResponse>> {
    let importer = state.importer_for(import_id).await?;
    let progress = importer.get_progress().await;
    if progress.step.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Import {} already finished: {}",
            import_id, progress.step
        )));
    }

    let store = state.import_store();
    store.invalidate(import_id).await?;
    let record = store
        .find_one(import_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import {}", import_id)))?;

    tracing::info!(import_id = %import_id, step = %progress.step, "Import cancelled");

    Ok(Json(CancelImportResponse {
        import_id,
        valid: record.valid,
        progress,
    }))
}

/// Build import workflow routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(create_import))
        .route("/import/:import_id/upload", post(start_upload))
        .route("/import/:import_id/prepare", post(prepare_import))
        .route("/import/:import_id/selection", get(get_selection))
        .route("/import/:import_id/start", post(start_import))
        .route("/import/:import_id/progress", get(get_progress))
        .route("/import/:import_id/cancel", post(cancel_import))
}
