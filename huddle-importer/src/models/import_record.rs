//! Persisted import operation
//!
//! One row in the `imports` table per import. The importer reads it once at
//! construction and afterwards only changes it through [`ImportRecordUpdate`].

use chrono::{DateTime, Utc};
use huddle_common::events::{ProgressCount, ProgressStep};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: Uuid,
    pub importer_key: String,
    pub status: ProgressStep,
    pub count: ProgressCount,
    /// Cleared by an operator to stop a running import
    pub valid: bool,
    pub file: Option<String>,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportRecord {
    pub fn new(importer_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            importer_key: importer_key.into(),
            status: ProgressStep::New,
            count: ProgressCount::default(),
            valid: true,
            file: None,
            content_type: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of an [`ImportRecord`]; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportRecordUpdate {
    pub status: Option<ProgressStep>,
    pub count_total: Option<i64>,
    pub count_completed: Option<i64>,
    pub valid: Option<bool>,
    pub file: Option<String>,
    pub content_type: Option<String>,
}

impl ImportRecordUpdate {
    pub fn status(step: ProgressStep) -> Self {
        Self {
            status: Some(step),
            ..Default::default()
        }
    }

    pub fn count_total(total: i64) -> Self {
        Self {
            count_total: Some(total),
            ..Default::default()
        }
    }

    pub fn count_completed(completed: i64) -> Self {
        Self {
            count_completed: Some(completed),
            ..Default::default()
        }
    }

    pub fn invalidate() -> Self {
        Self {
            valid: Some(false),
            ..Default::default()
        }
    }

    /// File metadata; content type only when the uploader supplied one
    pub fn file(file_name: impl Into<String>, content_type: Option<String>) -> Self {
        Self {
            file: Some(file_name.into()),
            content_type,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the set fields to an in-memory record
    pub fn apply_to(&self, record: &mut ImportRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(total) = self.count_total {
            record.count.total = total;
        }
        if let Some(completed) = self.count_completed {
            record.count.completed = completed;
        }
        if let Some(valid) = self.valid {
            record.valid = valid;
        }
        if let Some(file) = &self.file {
            record.file = Some(file.clone());
        }
        if let Some(content_type) = &self.content_type {
            record.content_type = Some(content_type.clone());
        }
        record.updated_at = Utc::now();
    }
}
