//! Importer identity

use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// Key of the importer driven through the REST API instead of a file
pub const API_IMPORTER_KEY: &str = "api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterInfo {
    /// Stable key stored on the import record (e.g. "json")
    pub key: String,
    /// Display name
    pub name: String,
}

impl ImporterInfo {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.key.trim().is_empty() {
            return Err(ImportError::InvalidConfiguration(
                "importer key must not be empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ImportError::InvalidConfiguration(format!(
                "importer '{}' has no name",
                self.key
            )));
        }
        Ok(())
    }

    pub fn is_api_importer(&self) -> bool {
        self.key == API_IMPORTER_KEY
    }
}
