//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration only: where the data folder lives, which port to
//! bind, how verbose to log. Runtime configuration lives in the `settings`
//! table and is read through the settings store.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`HUDDLE_ROOT_FOLDER`)
//! 3. TOML config file (`~/.config/huddle/config.toml`, then `/etc/huddle/config.toml`)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "HUDDLE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "huddle.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port (optional, service default otherwise)
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Locate the first existing config file for the platform
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("huddle").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/huddle/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/huddle (or /var/lib/huddle for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("huddle"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/huddle"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("huddle"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/huddle"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("huddle"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\huddle"))
    } else {
        PathBuf::from("./huddle_data")
    }
}

/// Resolves the root folder following the priority order above
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            config_path: None,
        }
    }

    /// Command-line override (wins over everything else)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Explicit TOML file instead of the platform search path
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        let config_path = self.config_path.clone().or_else(find_config_file);
        if let Some(config_path) = config_path {
            match load_toml_config(&config_path) {
                Ok(TomlConfig {
                    root_folder: Some(root),
                    ..
                }) => {
                    info!(
                        module = %self.module_name,
                        "Root folder from {}: {}",
                        config_path.display(),
                        root.display()
                    );
                    return root;
                }
                Ok(_) => debug!("{} has no root_folder entry", config_path.display()),
                Err(e) => warn!("Ignoring config file {}: {}", config_path.display(), e),
            }
        }

        let root = default_root_folder();
        info!(module = %self.module_name, "Root folder (compiled default): {}", root.display());
        root
    }
}

/// Creates the root folder and derives paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}
