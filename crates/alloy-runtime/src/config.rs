//! Host configuration (`alloy.toml`).
//!
//! ```toml
//! thread_name = "alloy-host"
//! log_filter = "info,alloy_core=debug"
//! log_format = "json"
//!
//! [bridge]
//! max_request_bytes = 1048576
//!
//! [[bridge.default_headers]]
//! name = "server"
//! value = "alloy"
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use alloy_core::BridgeConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name given to the scheduler thread when none is configured.
pub const DEFAULT_THREAD_NAME: &str = "alloy-host";

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Name of the thread that drives the host scheduler.
    pub thread_name: String,
    /// `EnvFilter` directives. `RUST_LOG` takes precedence.
    pub log_filter: String,
    pub log_format: LogFormat,
    pub bridge: BridgeConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("thread_name must not be empty")]
    EmptyThreadName,

    #[error("bridge.max_request_bytes must be greater than zero")]
    ZeroRequestLimit,
}

impl HostConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        if self.bridge.max_request_bytes == 0 {
            return Err(ConfigError::ZeroRequestLimit);
        }
        Ok(())
    }
}
