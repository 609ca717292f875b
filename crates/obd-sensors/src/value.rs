//! Decoded sensor values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value produced by a sensor decode function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorValue {
    /// Scaled numeric reading in the descriptor's unit
    Number(f64),
    /// Bitstring of '0'/'1' characters, one per payload bit
    Bitmap(String),
    /// Monitor status (PID 01)
    Monitor(MonitorStatus),
    /// Payload passed through without interpretation
    Raw(String),
    /// Payload that could not be parsed as hex
    Unparsed(String),
}

impl SensorValue {
    /// Numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SensorValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Monitor status, if this is one
    pub fn as_monitor(&self) -> Option<&MonitorStatus> {
        match self {
            SensorValue::Monitor(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Number(n) => write!(f, "{n}"),
            SensorValue::Bitmap(s) | SensorValue::Raw(s) | SensorValue::Unparsed(s) => {
                f.write_str(s)
            }
            SensorValue::Monitor(m) => write!(
                f,
                "{} DTC(s), MIL {}",
                m.stored_count,
                if m.mil { "On" } else { "Off" }
            ),
        }
    }
}

/// Monitor status since DTCs cleared (Mode 01 PID 01)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// Malfunction indicator lamp state
    pub mil: bool,
    /// Number of stored (confirmed) trouble codes
    pub stored_count: u8,
    /// Compression ignition (diesel) monitors in use
    pub compression_ignition: bool,
    /// Continuous monitor tests
    pub tests: Vec<MonitorTest>,
}

/// One on-board monitor test and its readiness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorTest {
    pub name: String,
    pub available: bool,
    pub complete: bool,
}

impl MonitorTest {
    /// Human-readable readiness text
    pub fn status_text(&self) -> &'static str {
        match (self.available, self.complete) {
            (false, _) => "Unsupported",
            (true, true) => "Supported - Completed",
            (true, false) => "Supported - Incompleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_test_status_text() {
        let mut test = MonitorTest {
            name: "Misfire".to_string(),
            available: false,
            complete: true,
        };
        assert_eq!(test.status_text(), "Unsupported");

        test.available = true;
        assert_eq!(test.status_text(), "Supported - Completed");

        test.complete = false;
        assert_eq!(test.status_text(), "Supported - Incompleted");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(SensorValue::Number(12.5).to_string(), "12.5");
        let status = MonitorStatus {
            mil: true,
            stored_count: 2,
            ..Default::default()
        };
        assert_eq!(SensorValue::Monitor(status).to_string(), "2 DTC(s), MIL On");
    }
}
