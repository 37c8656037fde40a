//! Import services
//!
//! The orchestrator ([`Importer`]) and the collaborators it is wired with:
//! settings override, progress throttle, data converter, file preparers and
//! the registry of known importers.

pub mod converter;
pub mod importer;
pub mod preparers;
pub mod progress_reporter;
pub mod registry;
pub mod settings_override;

pub use converter::{DataConverter, ImportCallbacks, SqliteDataConverter};
pub use importer::{Importer, ImporterServices};
pub use preparers::{FilePreparer, JsonExportPreparer};
pub use progress_reporter::{EventBusPublisher, ProgressPublisher, ProgressReporter};
pub use registry::{ImporterDefinition, ImporterRegistry};
pub use settings_override::{restore_after, ConfigOverrideSet};
