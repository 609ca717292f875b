//! OBD-II Sensor Table
//!
//! Ordered descriptors for the Mode 01 sensors an ELM327 adapter can be asked
//! for, together with the decode functions that turn a hex payload (response
//! header already stripped) into a typed value.

pub mod decode;
mod table;
mod value;

pub use table::{
    DecodeFn, SensorDescriptor, SensorTable, MONITOR_STATUS_INDEX, SUPPORTED_PIDS_INDEX,
};
pub use value::{MonitorStatus, MonitorTest, SensorValue};
