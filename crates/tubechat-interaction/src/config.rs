//! Configuration file management for Tubechat.
//!
//! Supports reading the backend address from `~/.config/tubechat/config.toml`
//! or the `TUBECHAT_BASE_URL` environment variable. Both are optional; the
//! default points at a local backend.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tubechat_core::{Result, TubechatError};

/// Environment variable overriding the configured base URL.
pub const ENV_BASE_URL: &str = "TUBECHAT_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Backend connection configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base address of the processing/query backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Root structure of config.toml.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigRoot {
    #[serde(default)]
    backend: Option<BackendConfig>,
}

/// Loads the backend configuration.
///
/// Resolution order: `TUBECHAT_BASE_URL`, then the `[backend]` table of
/// `~/.config/tubechat/config.toml`, then the built-in default. A missing
/// file is not an error; an unreadable or unparseable one is.
pub fn load_backend_config() -> Result<BackendConfig> {
    if let Ok(value) = std::env::var(ENV_BASE_URL) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(BackendConfig {
                base_url: trimmed.to_string(),
            });
        }
    }

    load_backend_config_from(&config_path()?)
}

/// Loads the backend configuration from a specific config.toml path.
pub fn load_backend_config_from(path: &Path) -> Result<BackendConfig> {
    if !path.exists() {
        return Ok(BackendConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        TubechatError::config(format!(
            "Failed to read configuration file at {}: {}",
            path.display(),
            e
        ))
    })?;

    let root: ConfigRoot = toml::from_str(&content).map_err(|e| {
        TubechatError::config(format!(
            "Failed to parse configuration file at {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(root.backend.unwrap_or_default())
}

/// Returns the path to the configuration file: ~/.config/tubechat/config.toml
fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TubechatError::config("Could not determine home directory"))?;
    Ok(home.join(".config").join("tubechat").join("config.toml"))
}
