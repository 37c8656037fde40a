//! Database initialization
//!
//! Opens (or creates) the shared SQLite database and makes sure every table
//! the import pipeline touches exists. All statements are idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Settings the importer overrides during a run, with their stock values.
///
/// Values are stored as JSON text so strings, booleans and numbers survive a
/// round trip through the `settings` table.
pub const DEFAULT_SETTINGS: [(&str, &str); 5] = [
    ("Accounts_AllowedDomainsList", "\"\""),
    ("Accounts_AllowUsernameChange", "true"),
    ("FileUpload_MaxFileSize", "104857600"),
    ("FileUpload_MediaTypeWhiteList", "\"\""),
    ("FileUpload_MediaTypeBlackList", "\"image/svg+xml\""),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets progress polling read while the import task writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_tables(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table used by the import pipeline
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_imports_table(pool).await?;
    create_import_data_table(pool).await?;
    create_users_table(pool).await?;
    create_rooms_table(pool).await?;
    create_messages_table(pool).await?;

    info!("Database tables initialized");
    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs (value is JSON text).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the imports table (one row per import operation)
pub async fn create_imports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imports (
            id TEXT PRIMARY KEY,
            importer_key TEXT NOT NULL,
            status TEXT NOT NULL,
            count_total INTEGER NOT NULL DEFAULT 0,
            count_completed INTEGER NOT NULL DEFAULT 0,
            valid INTEGER NOT NULL DEFAULT 1,
            file TEXT,
            content_type TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the staging table holding parsed-but-not-converted records
pub async fn create_import_data_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_data (
            id TEXT PRIMARY KEY,
            data_type TEXT NOT NULL,
            data TEXT NOT NULL,
            imported INTEGER NOT NULL DEFAULT 0,
            error TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_import_data_type ON import_data(data_type, imported)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            import_id TEXT UNIQUE,
            username TEXT NOT NULL,
            email TEXT,
            name TEXT,
            user_type TEXT NOT NULL DEFAULT 'user',
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_rooms_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY,
            import_id TEXT UNIQUE,
            name TEXT,
            room_type TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            members TEXT NOT NULL DEFAULT '[]',
            created_by TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            import_id TEXT UNIQUE,
            room_id TEXT NOT NULL REFERENCES rooms(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            text TEXT NOT NULL,
            ts TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed stock values for the settings the importer relies on
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, value).await?;
    }
    Ok(())
}

/// Insert a setting if missing, or reset it when its value is NULL
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query(
        "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ? AND value IS NULL",
    )
    .bind(default_value)
    .bind(key)
    .execute(pool)
    .await?
    .rows_affected();

    if reset > 0 {
        info!("Reset NULL setting '{}' to default value: {}", key, default_value);
    }

    Ok(())
}
