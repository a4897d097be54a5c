//! Configuration file support for the dropdocs CLI.
//!
//! Configuration is stored at `~/.config/dropdocs/config.toml` (XDG standard)
//! or `~/Library/Application Support/com.dropdocs.dropdocs/config.toml` on
//! macOS. `DROPDOCS_CONFIG_DIR` overrides the directory. The credential file
//! (`credentials.json`) lives in the same directory.
//!
//! # Example configuration
//!
//! ```toml
//! app_key = "abc123xyz"
//!
//! [provider]
//! title = "Work Dropbox"
//! request_timeout = "60s"
//! traversal_budget = 500
//!
//! [provider.upload_retry]
//! max_attempts = 3
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dropdocs_provider::ProviderConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "DROPDOCS_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";
const CREDENTIAL_FILE: &str = "credentials.json";

/// Configuration file could not be understood.
#[derive(Debug, Error)]
#[error("invalid config file {path}: {message}")]
pub struct ConfigError {
    pub path: PathBuf,
    pub message: String,
}

/// Main configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// App key used by `login` when `--app-key` is not given
    pub app_key: Option<String>,

    /// Spool root; defaults to `spool/` under the configuration directory
    pub spool_dir: Option<PathBuf>,

    /// Adapter settings
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    /// Load configuration from `dir`, or return the defaults if there is no file.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).map_err(|e| ConfigError {
                path: path.clone(),
                message: e.message().to_string(),
            })?
        } else {
            Config::default()
        };

        config.provider.spool_dir = config
            .spool_dir
            .clone()
            .unwrap_or_else(|| dir.join("spool"));
        Ok(config)
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?)
    }
}

/// Get the configuration directory.
///
/// Uses `DROPDOCS_CONFIG_DIR` when set, otherwise the XDG config directory on
/// Linux and Application Support on macOS.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let base_dirs = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    #[cfg(target_os = "macos")]
    {
        Ok(base_dirs
            .home_dir()
            .join("Library/Application Support/com.dropdocs.dropdocs"))
    }

    #[cfg(not(target_os = "macos"))]
    {
        Ok(base_dirs.config_dir().join("dropdocs"))
    }
}

/// Path to the configuration file.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Path to the credential preferences file.
pub fn credential_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CREDENTIAL_FILE))
}
