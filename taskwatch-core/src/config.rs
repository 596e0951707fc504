// Configuration file handling

use crate::layout::Direction;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use taskwatch_client::MonitorConfig;
use taskwatch_client::client::DEFAULT_BASE_URL;
use taskwatch_client::monitor::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_TIMEOUT_MS};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/taskwatch/config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub monitor: MonitorSettings,
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
        }
    }
}

impl MonitorSettings {
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig::default()
            .with_interval_ms(self.interval_ms)
            .with_request_timeout_ms(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    pub node_sep: f64,
    pub rank_sep: f64,
    pub direction: Direction,
    /// Free space around the graph when fitting the viewport, as a fraction
    /// of the graph size.
    pub fit_padding: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 200.0,
            node_height: 50.0,
            node_sep: 50.0,
            rank_sep: 100.0,
            direction: Direction::TopToBottom,
            fit_padding: 0.5,
            viewport_width: 1280.0,
            viewport_height: 720.0,
        }
    }
}

impl Config {
    /// Load from `path` (a leading `~` is expanded). A missing file yields
    /// the defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let path = expand_path(path);
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_file(&path)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor.interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.monitor.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor.request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        for (field, value) in [
            ("layout.node_width", self.layout.node_width),
            ("layout.node_height", self.layout.node_height),
            ("layout.viewport_width", self.layout.viewport_width),
            ("layout.viewport_height", self.layout.viewport_height),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {}", value),
                });
            }
        }
        for (field, value) in [
            ("layout.node_sep", self.layout.node_sep),
            ("layout.rank_sep", self.layout.rank_sep),
            ("layout.fit_padding", self.layout.fit_padding),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must not be negative, got {}", value),
                });
            }
        }
        Ok(())
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
