//! OBD-II Error Types

use thiserror::Error;

/// Errors that can occur during OBD-II communication
///
/// These never escape the typed read surface: the reader collapses every
/// variant into [`crate::Reading::Unavailable`]. They exist for diagnostics
/// and for the handshake, which reports through a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObdError {
    /// Transport link is not open
    #[error("Transport link is not open")]
    LinkClosed,

    /// Timeout waiting for response
    #[error("Timeout waiting for OBD response after {0}ms")]
    Timeout(u64),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Mode/PID echo does not match the issued request
    #[error(
        "Echo mismatch: expected {expected_mode:02X} {expected_pid:02X}, got {mode:02X} {pid:02X}"
    )]
    EchoMismatch {
        expected_mode: u8,
        expected_pid: u8,
        mode: u8,
        pid: u8,
    },

    /// Payload shorter than the width the PID requires
    #[error("PID {pid:02X} payload too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort {
        pid: u8,
        expected: usize,
        actual: usize,
    },

    /// Response line is not valid hex
    #[error("Malformed response: {0:?}")]
    MalformedHex(String),

    /// Adapter reported a status instead of data (NO DATA, ?, ...)
    #[error("Adapter error: {0}")]
    AdapterError(String),

    /// Adapter handshake rejected a command
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// Read attempted before a successful initialise
    #[error("OBD client is not initialised")]
    NotInitialised,
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        ObdError::Serial(err.to_string())
    }
}

impl From<tokio_serial::Error> for ObdError {
    fn from(err: tokio_serial::Error) -> Self {
        ObdError::Serial(err.to_string())
    }
}
