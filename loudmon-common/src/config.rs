//! Configuration file discovery, loading and writing
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `LOUDMON_CONFIG` environment variable
//! 3. Per-user config directory (`~/.config/loudmon/<file>` on Linux)
//! 4. System-wide `/etc/loudmon/<file>` (Linux only)
//!
//! A missing file is never fatal: callers get `T::default()` and a warning.
//! A file that exists but does not parse is a configuration error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LOUDMON_CONFIG";

/// Directory name used under the platform config dir
const APP_DIR: &str = "loudmon";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a resolved config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
    SystemConfigDir,
}

/// Resolve the config file to read, if any
///
/// An explicit path (CLI or environment) is returned even when the file does
/// not exist so the caller can report it; discovered locations are only
/// returned when present on disk.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    file_name: &str,
) -> Option<(PathBuf, ConfigSource)> {
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), ConfigSource::CommandLine));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), ConfigSource::Environment));
        }
    }

    if let Some(user_config) = dirs::config_dir().map(|d| d.join(APP_DIR).join(file_name)) {
        if user_config.exists() {
            return Some((user_config, ConfigSource::UserConfigDir));
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR).join(file_name);
        if system_config.exists() {
            return Some((system_config, ConfigSource::SystemConfigDir));
        }
    }

    None
}

/// Load a TOML config file, falling back to defaults when it is absent
///
/// Explicitly requested files (`ConfigSource::CommandLine`) must exist.
pub fn load_toml_config<T>(resolved: Option<(PathBuf, ConfigSource)>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some((path, source)) = resolved else {
        warn!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        if source == ConfigSource::CommandLine {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        warn!(
            "Config file {} ({:?}) does not exist, using built-in defaults",
            path.display(),
            source
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a config value as TOML
///
/// Writes to a sibling temp file first and renames it over the target so a
/// reader never observes a half-written file.
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    info!("Wrote configuration to {}", path.display());
    Ok(())
}
