//! TOML-based monitor configuration.
//!
//! Stores the few tunables the enforcement monitor needs:
//! - The host application id (never debited or blocked)
//! - The grace exception validity window
//! - The tick period
//!
//! Configuration is stored at `~/.config/screenbudget/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use super::data_dir;
use crate::error::ConfigError;

fn default_host_app() -> String {
    "org.screenbudget.app".to_string()
}

fn default_grace_window_secs() -> u64 {
    120
}

fn default_tick_period_ms() -> u64 {
    1000
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/screenbudget/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The monitoring process's own application id. Foregrounding the host
    /// never consumes budget and never blocks.
    #[serde(default = "default_host_app")]
    pub host_app: String,
    /// How long an armed "open anyway" exception stays valid, in seconds.
    #[serde(default = "default_grace_window_secs")]
    pub grace_window_secs: u64,
    /// Monitor tick period in milliseconds.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_app: default_host_app(),
            grace_window_secs: default_grace_window_secs(),
            tick_period_ms: default_tick_period_ms(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load the configuration, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Load the configuration, propagating failures.
    pub fn try_load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Save the configuration to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value by key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "host_app" => Some(self.host_app.clone()),
            "grace_window_secs" => Some(self.grace_window_secs.to_string()),
            "tick_period_ms" => Some(self.tick_period_ms.to_string()),
            _ => None,
        }
    }

    /// Set a config value by key. Does not save; call [`Config::save`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parse_u64 = |value: &str| {
            value.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        };
        match key {
            "host_app" => self.host_app = value.to_string(),
            "grace_window_secs" => self.grace_window_secs = parse_u64(value)?,
            "tick_period_ms" => self.tick_period_ms = parse_u64(value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}
