//! Sensor Descriptor Table

use crate::decode;
use crate::value::SensorValue;

/// Index of the supported-PID bitmap probe (`0100`)
pub const SUPPORTED_PIDS_INDEX: usize = 0;

/// Index of the monitor status sensor (`0101`)
pub const MONITOR_STATUS_INDEX: usize = 1;

/// Decode function from hex payload to value
pub type DecodeFn = fn(&str) -> SensorValue;

/// A queryable sensor
#[derive(Debug, Clone, Copy)]
pub struct SensorDescriptor {
    /// Identifier, e.g. "rpm"
    pub short_name: &'static str,
    /// Display name, e.g. "Engine RPM"
    pub name: &'static str,
    /// Adapter command, e.g. "010C"
    pub command: &'static str,
    /// Unit of the decoded value (empty when unitless)
    pub unit: &'static str,
    /// Payload decoder
    pub decode: DecodeFn,
}

impl SensorDescriptor {
    pub const fn new(
        short_name: &'static str,
        name: &'static str,
        command: &'static str,
        unit: &'static str,
        decode: DecodeFn,
    ) -> Self {
        Self {
            short_name,
            name,
            command,
            unit,
            decode,
        }
    }

    /// PID byte carried by the command (`"010C"` => `0x0C`)
    pub fn pid(&self) -> Option<u8> {
        let pid = self.command.get(2..4)?;
        u8::from_str_radix(pid, 16).ok()
    }

    /// Decode a hex payload with this sensor's formula
    pub fn decode(&self, payload: &str) -> SensorValue {
        (self.decode)(payload)
    }
}

#[rustfmt::skip]
const STANDARD_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor::new("pids", "Supported PIDs", "0100", "", decode::bitmap),
    SensorDescriptor::new("dtc_status", "Status Since DTC Cleared", "0101", "", decode::monitor_status),
    SensorDescriptor::new("dtc_ff", "DTC Causing Freeze Frame", "0102", "", decode::raw),
    SensorDescriptor::new("fuel_status", "Fuel System Status", "0103", "", decode::raw),
    SensorDescriptor::new("load", "Calculated Load Value", "0104", "%", decode::percent_scale),
    SensorDescriptor::new("temp", "Coolant Temperature", "0105", "C", decode::temperature),
    SensorDescriptor::new("short_term_fuel_trim_1", "Short Term Fuel Trim Bank 1", "0106", "%", decode::fuel_trim_percent),
    SensorDescriptor::new("long_term_fuel_trim_1", "Long Term Fuel Trim Bank 1", "0107", "%", decode::fuel_trim_percent),
    SensorDescriptor::new("short_term_fuel_trim_2", "Short Term Fuel Trim Bank 2", "0108", "%", decode::fuel_trim_percent),
    SensorDescriptor::new("long_term_fuel_trim_2", "Long Term Fuel Trim Bank 2", "0109", "%", decode::fuel_trim_percent),
    SensorDescriptor::new("fuel_pressure", "Fuel Rail Pressure", "010A", "kPa", decode::fuel_pressure),
    SensorDescriptor::new("manifold_pressure", "Intake Manifold Pressure", "010B", "kPa", decode::intake_pressure),
    SensorDescriptor::new("rpm", "Engine RPM", "010C", "rpm", decode::rpm),
    SensorDescriptor::new("speed", "Vehicle Speed", "010D", "km/h", decode::speed),
    SensorDescriptor::new("timing_advance", "Timing Advance", "010E", "degrees", decode::timing_advance),
    SensorDescriptor::new("intake_air_temp", "Intake Air Temperature", "010F", "C", decode::temperature),
    SensorDescriptor::new("maf", "Air Flow Rate (MAF)", "0110", "g/s", decode::maf),
    SensorDescriptor::new("throttle_pos", "Throttle Position", "0111", "%", decode::percent_scale),
    SensorDescriptor::new("secondary_air_status", "Secondary Air Status", "0112", "", decode::raw),
    SensorDescriptor::new("o2_sensor_positions", "Location of O2 Sensors", "0113", "", decode::raw),
    SensorDescriptor::new("o211", "O2 Sensor: 1 - 1", "0114", "V", decode::o2_voltage),
    SensorDescriptor::new("o212", "O2 Sensor: 1 - 2", "0115", "V", decode::o2_voltage),
    SensorDescriptor::new("o213", "O2 Sensor: 1 - 3", "0116", "V", decode::o2_voltage),
    SensorDescriptor::new("o214", "O2 Sensor: 1 - 4", "0117", "V", decode::o2_voltage),
    SensorDescriptor::new("o221", "O2 Sensor: 2 - 1", "0118", "V", decode::o2_voltage),
    SensorDescriptor::new("o222", "O2 Sensor: 2 - 2", "0119", "V", decode::o2_voltage),
    SensorDescriptor::new("o223", "O2 Sensor: 2 - 3", "011A", "V", decode::o2_voltage),
    SensorDescriptor::new("o224", "O2 Sensor: 2 - 4", "011B", "V", decode::o2_voltage),
    SensorDescriptor::new("obd_standard", "OBD Designation", "011C", "", decode::raw),
    SensorDescriptor::new("o2_sensor_position_b", "Location of O2 Sensors (Alt)", "011D", "", decode::raw),
    SensorDescriptor::new("aux_input", "Auxiliary Input Status", "011E", "", decode::raw),
    SensorDescriptor::new("engine_time", "Time Since Engine Start", "011F", "min", decode::seconds_to_minutes),
    SensorDescriptor::new("engine_mil_time", "Engine Run with MIL On", "014D", "min", decode::minutes),
];

/// Ordered sensor descriptors, looked up by index
#[derive(Debug, Clone)]
pub struct SensorTable {
    sensors: Vec<SensorDescriptor>,
}

impl SensorTable {
    /// Create a table from custom descriptors
    pub fn new(sensors: Vec<SensorDescriptor>) -> Self {
        Self { sensors }
    }

    /// The standard Mode 01 table
    pub fn standard() -> Self {
        Self::new(STANDARD_SENSORS.to_vec())
    }

    pub fn get(&self, index: usize) -> Option<&SensorDescriptor> {
        self.sensors.get(index)
    }

    /// Find a sensor by short name
    pub fn find(&self, short_name: &str) -> Option<(usize, &SensorDescriptor)> {
        self.sensors
            .iter()
            .enumerate()
            .find(|(_, s)| s.short_name == short_name)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.iter()
    }

    /// Display names in table order
    pub fn names(&self) -> Vec<&'static str> {
        self.sensors.iter().map(|s| s.name).collect()
    }
}

impl Default for SensorTable {
    fn default() -> Self {
        Self::standard()
    }
}
