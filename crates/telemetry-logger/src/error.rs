//! Logger Error Types

use thiserror::Error;

/// Errors raised outside the OBD core: configuration, logging setup, storage
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Log file I/O failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Record could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Adapter link could not be opened
    #[error("Adapter error: {0}")]
    Adapter(#[from] obd_protocol::ObdError),

    /// Tracing subscriber already installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}
