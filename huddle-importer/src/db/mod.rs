//! Database access for huddle-importer
//!
//! Store traits consumed by the importer, with SQLite implementations over
//! the shared `huddle.db`.

pub mod imports;
pub mod settings;
pub mod staging;

pub use imports::{ImportStore, SqliteImportStore};
pub use settings::{SettingValue, SettingsStore, SqliteSettingsStore};
pub use staging::{SqliteStagingStore, StagingStore};

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Opens (or creates) the shared database and ensures every importer table exists.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    let pool = huddle_common::db::init_database(db_path).await?;
    Ok(pool)
}
