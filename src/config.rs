//! Player configuration and credentials
//!
//! Configuration is resolved in priority order:
//! 1. Explicit file path (highest priority)
//! 2. `TUNEBOX_CONFIG` environment variable
//! 3. Platform config directory (`<config dir>/tunebox/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! The cache and settings locations are opaque to this crate; they are handed
//! through to the streaming provider unchanged.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable pointing at an alternate config file
pub const CONFIG_ENV: &str = "TUNEBOX_CONFIG";

/// Player configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Provider cache directory (opaque passthrough)
    pub cache_location: PathBuf,

    /// Provider settings directory (opaque passthrough)
    pub settings_location: PathBuf,

    /// User-agent string reported to the provider
    pub user_agent: String,

    /// Audio output settings
    pub output: OutputConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            cache_location: default_app_dir(dirs::cache_dir()),
            settings_location: default_app_dir(dirs::data_local_dir()),
            user_agent: "tunebox".to_string(),
            output: OutputConfig::default(),
        }
    }
}

/// Audio output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output device name (None = default device)
    pub device: Option<String>,

    /// Device sample rate in Hz; decoded audio is played at this rate as-is
    pub sample_rate: u32,

    /// Lock-free ring capacity in stereo frames between pump and callback
    pub ring_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 48_000,
            ring_capacity: 2048,
        }
    }
}

fn default_app_dir(base: Option<PathBuf>) -> PathBuf {
    base.map(|d| d.join("tunebox"))
        .unwrap_or_else(|| PathBuf::from("tmp"))
}

/// Load configuration following the priority order documented at module level.
///
/// An explicit path that does not exist or fails to parse is an error; a
/// missing config file further down the chain silently falls through to the
/// compiled defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<PlayerConfig> {
    if let Some(path) = explicit {
        return read_config_file(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return read_config_file(Path::new(&path));
    }

    if let Some(dir) = dirs::config_dir() {
        let path = dir.join("tunebox").join("config.toml");
        if path.exists() {
            return read_config_file(&path);
        }
    }

    Ok(PlayerConfig::default())
}

fn read_config_file(path: &Path) -> Result<PlayerConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
}

/// Provider account credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Local validation, performed before any provider interaction.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::Credentials("username is empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::Credentials("password is empty".to_string()));
        }
        Ok(())
    }
}
