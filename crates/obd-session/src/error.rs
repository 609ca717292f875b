//! OBD Session Error Types

use crate::session::ConnectionState;
use thiserror::Error;

/// Errors that can occur during an adapter session
///
/// Per-query outcomes such as "no data" or "no response" are not errors; they
/// are reported through [`QueryOutcome`](crate::QueryOutcome).
#[derive(Debug, Error)]
pub enum ObdError {
    /// Serial device could not be opened, read, written or closed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Adapter gave no usable answer during the handshake
    #[error("Handshake failed: no response to '{command}'")]
    HandshakeFailed { command: &'static str },

    /// Operation requires a connected session
    #[error("Session is not connected (state: {0})")]
    NotConnected(ConnectionState),

    /// No sensor at this table index
    #[error("No sensor at index {0}")]
    SensorIndexOutOfRange(usize),

    /// Sensor decoded to a different kind of value than required
    #[error("Unexpected value from sensor '{sensor}'")]
    UnexpectedValue { sensor: &'static str },

    /// Adapter not responding
    #[error("OBD adapter not responding")]
    AdapterNotResponding,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        ObdError::Transport(err.to_string())
    }
}

impl From<tokio_serial::Error> for ObdError {
    fn from(err: tokio_serial::Error) -> Self {
        ObdError::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for ObdError {
    fn from(err: config::ConfigError) -> Self {
        ObdError::Config(err.to_string())
    }
}
