//! Shared setup for huddle-importer integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use huddle_common::events::{EventBus, ProgressSnapshot};
use huddle_importer::models::ImportRecord;
use huddle_importer::services::Importer;
use huddle_importer::AppState;
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

/// Two users, three channels (one direct), three messages.
///
/// M3 lives in C2, so deselecting C2 leaves M3 unconvertible.
pub const EXPORT: &str = r#"{
    "users": [
        {"import_ids": ["U1"], "username": "ada", "emails": ["ada@example.com"], "name": "Ada"},
        {"import_ids": ["U2"], "username": "grace", "emails": ["grace@example.com"]}
    ],
    "channels": [
        {"import_ids": ["C1"], "name": "general", "type": "public", "members": ["U1", "U2"], "creator": "U1"},
        {"import_ids": ["C2"], "name": "random", "type": "private", "members": ["U2"]},
        {"import_ids": ["D1"], "type": "direct", "members": ["U1", "U2"]}
    ],
    "messages": [
        {"import_ids": ["M1"], "channel": "C1", "sender": "U1", "text": "hello", "ts": "2026-01-01T09:00:00Z"},
        {"import_ids": ["M2"], "channel": "D1", "sender": "U2", "text": "hi ada", "ts": "2026-01-01T09:01:00Z"},
        {"import_ids": ["M3"], "channel": "C2", "sender": "U2", "text": "anyone?", "ts": "2026-01-01T09:02:00Z"}
    ]
}"#;

/// App state over a fresh database in a temp folder
pub async fn test_state() -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let pool = huddle_importer::db::init_database_pool(&dir.path().join("huddle.db"))
        .await
        .unwrap();
    (dir, AppState::new(pool, EventBus::new(100)))
}

/// Write [`EXPORT`] (or `content`) next to the database
pub fn write_export(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("export.json");
    std::fs::write(&path, content).unwrap();
    path
}

/// Send a request and decode the JSON body (Null when empty)
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Poll until the importer reaches DONE or ERROR
pub async fn wait_until_terminal(importer: &Importer) -> ProgressSnapshot {
    for _ in 0..250 {
        let progress = importer.get_progress().await;
        if progress.step.is_terminal() {
            return progress;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("import did not finish: {:?}", importer.get_progress().await);
}

/// Poll until the importer's bound record holds DONE or ERROR
pub async fn wait_until_recorded(importer: &Importer) -> ImportRecord {
    for _ in 0..250 {
        if let Some(record) = importer.record().await {
            if record.status.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("import record not finished: {:?}", importer.record().await);
}
