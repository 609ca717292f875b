//! Session configuration

use crate::error::ObdError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `OBD_PORT`
const ENV_PREFIX: &str = "OBD";

/// Adapter session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Serial port device path (e.g., "/dev/ttyUSB0" or "COM3")
    pub port: String,
    /// Baud rate for serial communication
    pub baud_rate: u32,
    /// Timeout for a single read (milliseconds)
    pub read_timeout_ms: u64,
    /// Pause after the reset command while the adapter reboots (milliseconds)
    pub reset_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 38400,
            read_timeout_ms: 2000,
            reset_delay_ms: 1000,
        }
    }
}

impl SessionConfig {
    /// Config for a given port with default timings
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Load from an optional config file, overridden by `OBD_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ObdError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}
