//! Configuration file support for the hapifs CLI.
//!
//! Configuration lives in `config.toml` inside the platform config directory
//! (`~/.config/hapifs` on Linux). Set `HAPIFS_CONFIG_DIR` to use another
//! directory. The stored credentials (`credentials.json`) and the cache
//! snapshot (`cache.json`) live next to it.
//!
//! # Example configuration
//!
//! ```toml
//! [defaults]
//! gatekeeper = "https://gatekeeper.example.com"
//! user = "alice"
//! timeout_secs = 30
//! cache = true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "HAPIFS_CONFIG_DIR";

/// Main configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Default settings applied to all commands
    #[serde(default)]
    pub defaults: Defaults,
}

/// Default settings
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Gatekeeper base URL used by `login` when none is given
    pub gatekeeper: Option<String>,

    /// User name used by `login` when none is given
    pub user: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Keep the path cache on disk between invocations (default: true)
    pub cache: Option<bool>,
}

impl Defaults {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn persistent_cache(&self) -> bool {
        self.cache.unwrap_or(true)
    }
}

impl Config {
    /// Load configuration from the default path, or return empty config if not found.
    pub fn load() -> Result<Self> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

/// Get the configuration directory.
///
/// `HAPIFS_CONFIG_DIR` wins; otherwise the platform config directory.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let dirs = directories::ProjectDirs::from("com", "fullarmor", "hapifs")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file.
pub fn config_path() -> Result<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Where stored credentials live.
pub fn credentials_path() -> Result<PathBuf> {
    config_dir().map(|dir| dir.join("credentials.json"))
}

/// Where the durable cache snapshot lives.
pub fn cache_path() -> Result<PathBuf> {
    config_dir().map(|dir| dir.join("cache.json"))
}
