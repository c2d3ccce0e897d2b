//! Persisted bridge configuration.
//!
//! Lives at `{devflow_home}/config.json`. The interesting payload is the
//! daemon TCP endpoint: once the bridge has reached a daemon over TCP it
//! persists `(host, port)` here, so the UI reconnects across restarts
//! without re-discovering the endpoint. An optional mode override forces
//! subprocess or TCP bridging regardless of platform default.

use crate::bridge::BridgeMode;
use crate::error::config::ConfigError;
use crate::{DEVFLOW_DAEMON_HOSTNAME, DEVFLOW_DAEMON_PORT};

use common::ErrorLocation;

use std::panic::Location;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonEndpoint {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for DaemonEndpoint {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub daemon: DaemonEndpoint,

    /// Forces a bridge mode instead of the platform default.
    #[serde(default)]
    pub mode_override: Option<BridgeMode>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            daemon: DaemonEndpoint::default(),
            mode_override: None,
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_host() -> String {
    DEVFLOW_DAEMON_HOSTNAME.to_string()
}
fn default_port() -> u16 {
    DEVFLOW_DAEMON_PORT
}

impl BridgeConfig {
    /// Load config from `{config_dir}/config.json`.
    ///
    /// A missing file yields defaults; a present-but-corrupt file is an
    /// error rather than a silent reset, so a bad edit does not quietly
    /// discard a persisted endpoint.
    #[track_caller]
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Read {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        let config: BridgeConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/config.json` using atomic write.
    ///
    /// Temp file + rename, so a crash mid-write cannot corrupt the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if directory creation, serialization,
    /// writing, or the rename fails.
    #[track_caller]
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is invalid.
    #[track_caller]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                    self.version
                ),
            });
        }

        if self.daemon.host.is_empty() {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: "daemon.host cannot be empty".to_string(),
            });
        }

        // Port 0 is only meaningful for ephemeral bind requests; a
        // persisted endpoint must be reconnectable.
        if self.daemon.port == 0 {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: "daemon.port cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}
