//! Bootstrap configuration for huddle-importer
//!
//! Port resolution priority: command line / `HUDDLE_IMPORTER_PORT` → TOML →
//! compiled default. The log filter falls back to the TOML logging level
//! when `RUST_LOG` is not set.

use huddle_common::config::{find_config_file, load_toml_config, TomlConfig};
use huddle_common::Result;
use std::path::Path;
use tracing::{info, warn};

/// Port used when neither the command line nor the TOML file names one
pub const DEFAULT_PORT: u16 = 5810;

/// Environment variable read by clap for `--port`
pub const PORT_ENV: &str = "HUDDLE_IMPORTER_PORT";

/// Load the TOML config from `path`, or from the first platform location that
/// exists. A missing file yields the defaults; a malformed one is an error.
pub fn load_bootstrap_config(path: Option<&Path>) -> Result<TomlConfig> {
    let found = match path {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    match found {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Pick the listening port
pub fn resolve_port(cli_port: Option<u16>, toml_config: &TomlConfig) -> u16 {
    if let (Some(cli), Some(toml)) = (cli_port, toml_config.port) {
        if cli != toml {
            warn!(
                "Port given on the command line ({}) and in TOML config ({}). Using command line.",
                cli, toml
            );
        }
    }

    cli_port.or(toml_config.port).unwrap_or(DEFAULT_PORT)
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset
pub fn default_log_filter(toml_config: &TomlConfig) -> String {
    let level = toml_config.logging.level.trim();
    if level.is_empty() {
        "info".to_string()
    } else {
        level.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_port(port: Option<u16>) -> TomlConfig {
        TomlConfig {
            port,
            ..Default::default()
        }
    }

    #[test]
    fn test_cli_port_wins() {
        assert_eq!(resolve_port(Some(6000), &with_port(Some(7000))), 6000);
    }

    #[test]
    fn test_toml_port_used_without_cli() {
        assert_eq!(resolve_port(None, &with_port(Some(7000))), 7000);
    }

    #[test]
    fn test_default_port() {
        assert_eq!(resolve_port(None, &with_port(None)), DEFAULT_PORT);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 5999\n[logging]\nlevel = \"DEBUG\"\n").unwrap();

        let config = load_bootstrap_config(Some(&path)).unwrap();

        assert_eq!(config.port, Some(5999));
        assert_eq!(default_log_filter(&config), "debug");
    }

    #[test]
    fn test_missing_explicit_file_gives_defaults() {
        let dir = TempDir::new().unwrap();

        let config = load_bootstrap_config(Some(&dir.path().join("absent.toml"))).unwrap();

        assert!(config.port.is_none());
        assert_eq!(default_log_filter(&config), "info");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        assert!(load_bootstrap_config(Some(&path)).is_err());
    }
}
