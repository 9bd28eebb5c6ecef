//! Logger configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `LOGGER__*` environment variables (`__` separates
//! nested keys, e.g. `LOGGER__SAMPLER__PERIOD_MS=500`).

use obd_protocol::{ClientConfig, ObdProtocol};
use obd_sampler::SamplerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::LoggerError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LOGGER";

/// OBD-II adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Serial device for the ELM327 (e.g., "/dev/ttyUSB0")
    pub device: String,
    /// Serial baud rate (default: 38400)
    pub baud_rate: u32,
    /// Bus protocol selected during the handshake
    pub protocol: ObdProtocol,
    /// Per-read timeout (ms)
    pub timeout_ms: u64,
    /// Use the built-in simulated ECU instead of a serial port
    pub simulate: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 38400,
            protocol: ObdProtocol::Auto,
            timeout_ms: 1000,
            simulate: false,
        }
    }
}

impl AdapterConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            protocol: self.protocol,
            timeout_ms: self.timeout_ms,
            ..Default::default()
        }
    }
}

/// Log file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the dated log folders
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./logs"),
        }
    }
}

/// Top-level logger configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub adapter: AdapterConfig,
    pub sampler: SamplerConfig,
    pub storage: StorageConfig,
    /// Max tracing level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl LoggerConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, LoggerError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: LoggerConfig = builder.build()?.try_deserialize()?;
        if loaded.log_level.is_empty() {
            loaded.log_level = "info".to_string();
        }
        Ok(loaded)
    }
}
