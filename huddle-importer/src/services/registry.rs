//! Known importers, looked up by key

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ImportError;
use crate::models::{ImporterInfo, API_IMPORTER_KEY};
use crate::services::preparers::{FilePreparer, JsonExportPreparer};

/// An importer's identity plus the preparer that parses its exports.
///
/// API importers receive records through the staging store directly and
/// have no preparer.
#[derive(Clone)]
pub struct ImporterDefinition {
    pub info: ImporterInfo,
    pub preparer: Option<Arc<dyn FilePreparer>>,
}

#[derive(Clone, Default)]
pub struct ImporterRegistry {
    definitions: HashMap<String, ImporterDefinition>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the JSON export importer and the API importer
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(JsonExportPreparer::info(), Some(Arc::new(JsonExportPreparer)));
        registry.insert(ImporterInfo::new(API_IMPORTER_KEY, "API"), None);
        registry
    }

    /// Add or replace an importer
    pub fn register(
        &mut self,
        info: ImporterInfo,
        preparer: Option<Arc<dyn FilePreparer>>,
    ) -> Result<(), ImportError> {
        info.validate()?;
        self.insert(info, preparer);
        Ok(())
    }

    fn insert(&mut self, info: ImporterInfo, preparer: Option<Arc<dyn FilePreparer>>) {
        self.definitions
            .insert(info.key.clone(), ImporterDefinition { info, preparer });
    }

    pub fn get(&self, key: &str) -> Option<&ImporterDefinition> {
        self.definitions.get(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
