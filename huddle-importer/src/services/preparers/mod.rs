//! Format-specific export preparers
//!
//! A preparer reads an export file, stages its users, channels and messages
//! and drives the importer through the PREPARING_* steps.

use std::path::Path;

use async_trait::async_trait;
use huddle_common::events::PreparationReport;

use crate::error::ImportError;
use crate::services::importer::Importer;

pub mod json_export;

pub use json_export::JsonExportPreparer;

#[async_trait]
pub trait FilePreparer: Send + Sync {
    /// Stage the contents of `path` for `importer`
    async fn prepare(&self, importer: &Importer, path: &Path) -> Result<PreparationReport, ImportError>;
}
