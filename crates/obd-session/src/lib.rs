//! ELM327 Protocol Session Engine
//!
//! This crate talks to ELM327-compatible OBD-II adapters over a serial link:
//! the reset/echo/probe handshake, prompt-delimited command framing, reply
//! normalization, sensor query dispatch through an [`obd_sensors::SensorTable`]
//! and decoding of stored and pending diagnostic trouble codes.

mod config;
pub mod dtc;
mod error;
pub mod framing;
pub mod mock;
pub mod normalize;
mod session;
mod transport;

pub use config::SessionConfig;
pub use dtc::{DiagnosticCode, DtcClass, DtcStatus, TroubleCode};
pub use error::ObdError;
pub use mock::MockAdapter;
pub use session::{
    ConnectionState, ObdSession, QueryOutcome, SensorPartition, SensorReading, SupportedPids,
};
pub use transport::{SerialTransport, Transport};

pub use obd_sensors;

/// Adapter commands issued by the session
pub mod command {
    /// Soft reset; the reply is the firmware banner
    pub const RESET: &str = "atz";
    /// Disable command echo
    pub const ECHO_OFF: &str = "ate0";
    /// Supported PIDs 01-20, used as liveness probe
    pub const PROBE: &str = "0100";
    /// Supported-PID bitmap requests, in order
    pub const SUPPORTED_PIDS: [&str; 4] = ["0100", "0120", "0140", "0160"];
    /// Request stored trouble codes (Mode 03)
    pub const READ_DTC: &str = "03";
    /// Clear trouble codes and freeze frame data (Mode 04)
    pub const CLEAR_DTC: &str = "04";
    /// Request pending trouble codes (Mode 07)
    pub const PENDING_DTC: &str = "07";
}
