//! ELM327 Protocol Session
//!
//! Owns the transport to one adapter and runs the handshake, sensor queries
//! and trouble code requests over it. Queries are only issued while the
//! session is [`ConnectionState::Connected`].

use crate::command;
use crate::config::SessionConfig;
use crate::dtc::{self, DtcStatus, TroubleCode, CODES_PER_FRAME};
use crate::error::ObdError;
use crate::framing;
use crate::normalize::{self, Interpreted};
use crate::transport::{SerialTransport, Transport};
use obd_sensors::decode::hex_to_bitstring;
use obd_sensors::{
    MonitorStatus, SensorTable, SensorValue, MONITOR_STATUS_INDEX, SUPPORTED_PIDS_INDEX,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// PIDs covered by each supported-PID bitmap reply
const PIDS_PER_RANGE: usize = 32;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Failed => f.write_str("failed"),
        }
    }
}

/// Result of a single query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    /// The adapter answered with a value
    Value(T),
    /// The adapter reported the request has no data
    NoData,
    /// The adapter did not answer; the query may be retried
    NoResponse,
}

impl<T> QueryOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryOutcome<U> {
        match self {
            QueryOutcome::Value(v) => QueryOutcome::Value(f(v)),
            QueryOutcome::NoData => QueryOutcome::NoData,
            QueryOutcome::NoResponse => QueryOutcome::NoResponse,
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            QueryOutcome::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, QueryOutcome::NoData)
    }

    pub fn is_no_response(&self) -> bool {
        matches!(self, QueryOutcome::NoResponse)
    }
}

/// A decoded sensor reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub short_name: &'static str,
    pub name: &'static str,
    pub value: SensorValue,
    pub unit: &'static str,
}

/// Supported-PID vector for PIDs 0x01..=0x80
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedPids {
    bits: Vec<bool>,
}

impl SupportedPids {
    /// Build from a '0'/'1' bitstring; bit `i` (from 0) marks PID `i + 1`
    pub fn from_bitstring(bits: &str) -> Self {
        Self {
            bits: bits.chars().map(|c| c == '1').collect(),
        }
    }

    /// Whether the vehicle reports this PID as supported; PID 0 always is
    pub fn is_supported(&self, pid: u8) -> bool {
        match pid {
            0 => true,
            pid => self.bits.get(pid as usize - 1).copied().unwrap_or(false),
        }
    }

    /// The vector as '0'/'1' characters
    pub fn bitstring(&self) -> String {
        self.bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Supported PIDs in ascending order
    pub fn pids(&self) -> Vec<u8> {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .filter_map(|(i, _)| u8::try_from(i + 1).ok())
            .collect()
    }
}

/// Sensor table indices split by vehicle support
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorPartition {
    pub supported: Vec<usize>,
    pub unsupported: Vec<usize>,
}

/// Session with one ELM327-class adapter
pub struct ObdSession<T: Transport> {
    transport: T,
    config: SessionConfig,
    sensors: SensorTable,
    state: ConnectionState,
    /// Reset banner, present only while connected
    firmware: Option<String>,
    span: Span,
}

impl ObdSession<SerialTransport> {
    /// Open the configured serial port and run the handshake
    pub async fn open(config: SessionConfig) -> Result<Self, ObdError> {
        let transport = SerialTransport::open(&config)?;
        Self::connect(transport, config).await
    }
}

impl<T: Transport> ObdSession<T> {
    /// Create a disconnected session; performs no I/O
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let span = info_span!("obd_session", port = %config.port);
        Self {
            transport,
            config,
            sensors: SensorTable::standard(),
            state: ConnectionState::Disconnected,
            firmware: None,
            span,
        }
    }

    /// Create a session and run the handshake
    pub async fn connect(transport: T, config: SessionConfig) -> Result<Self, ObdError> {
        let mut session = Self::new(transport, config);
        session.handshake().await?;
        Ok(session)
    }

    /// Use a custom sensor table
    pub fn with_sensor_table(mut self, sensors: SensorTable) -> Self {
        self.sensors = sensors;
        self
    }

    /// Record all session events under the given span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Adapter firmware banner, known only while connected
    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sensor_table(&self) -> &SensorTable {
        &self.sensors
    }

    /// Display names of the sensor table, in order
    pub fn sensor_names(&self) -> Vec<&'static str> {
        self.sensors.names()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Reset the adapter, disable echo and probe the vehicle
    ///
    /// Allowed from `Disconnected` or `Failed`; a no-op when connected.
    pub async fn handshake(&mut self) -> Result<(), ObdError> {
        let span = self.span.clone();
        self.run_handshake().instrument(span).await
    }

    async fn run_handshake(&mut self) -> Result<(), ObdError> {
        if self.is_connected() {
            debug!("Handshake skipped: already connected");
            return Ok(());
        }

        info!("Connecting to adapter");
        self.firmware = None;

        match self.handshake_exchanges().await {
            Ok(firmware) => {
                info!(firmware = %firmware, "Adapter connected");
                self.firmware = Some(firmware);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Handshake failed");
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn handshake_exchanges(&mut self) -> Result<String, ObdError> {
        framing::send_command(&mut self.transport, command::RESET).await?;
        tokio::time::sleep(self.config.reset_delay()).await;

        let firmware = framing::read_result(&mut self.transport)
            .await?
            .map(|reply| reply.trim().to_string())
            .filter(|reply| !reply.is_empty())
            .ok_or(ObdError::HandshakeFailed {
                command: command::RESET,
            })?;
        info!(response = %firmware, "Reset response");

        framing::send_command(&mut self.transport, command::ECHO_OFF).await?;
        let echo = framing::read_result(&mut self.transport).await?;
        debug!(response = ?echo, "Echo off response");

        framing::send_command(&mut self.transport, command::PROBE).await?;
        let ready = framing::read_result(&mut self.transport)
            .await?
            .ok_or(ObdError::HandshakeFailed {
                command: command::PROBE,
            })?;
        info!(response = %ready, "Probe response");

        Ok(firmware)
    }

    /// Reset the adapter (when connected) and release the transport
    ///
    /// The session ends up `Disconnected` whatever the outcome.
    pub async fn close(&mut self) -> Result<(), ObdError> {
        let span = self.span.clone();
        self.run_close().instrument(span).await
    }

    async fn run_close(&mut self) -> Result<(), ObdError> {
        let mut result = Ok(());
        if self.is_connected() {
            info!("Resetting adapter before close");
            if let Err(e) = framing::send_command(&mut self.transport, command::RESET).await {
                warn!(error = %e, "Reset on close failed");
                result = Err(e);
            }
        }

        let closed = self.transport.close().await;
        if let Err(e) = &closed {
            warn!(error = %e, "Transport close failed");
        }

        self.firmware = None;
        self.state = ConnectionState::Disconnected;
        info!("Session closed");
        result.and(closed)
    }

    /// Query the sensor at `index` of the sensor table
    pub async fn query_sensor(
        &mut self,
        index: usize,
    ) -> Result<QueryOutcome<SensorReading>, ObdError> {
        self.ensure_connected()?;
        let span = self.span.clone();
        self.read_sensor(index).instrument(span).await
    }

    /// Query a sensor by its short name, e.g. `"rpm"`
    pub async fn query_sensor_named(
        &mut self,
        short_name: &str,
    ) -> Result<Option<QueryOutcome<SensorReading>>, ObdError> {
        self.ensure_connected()?;
        let index = self.sensors.find(short_name).map(|(index, _)| index);
        match index {
            Some(index) => Ok(Some(self.query_sensor(index).await?)),
            None => Ok(None),
        }
    }

    /// Send an arbitrary command and return its normalized payload
    pub async fn query_raw(&mut self, command: &str) -> Result<QueryOutcome<String>, ObdError> {
        self.ensure_connected()?;
        let span = self.span.clone();
        self.query_payload(command).instrument(span).await
    }

    /// Decoded monitor status (PID 01): MIL, stored code count, monitor tests
    pub async fn monitor_tests(&mut self) -> Result<QueryOutcome<MonitorStatus>, ObdError> {
        self.ensure_connected()?;
        let span = self.span.clone();
        self.read_monitor_status().instrument(span).await
    }

    /// Supported-PID vector for PIDs 0x01..=0x80
    ///
    /// A range the vehicle does not answer counts as unsupported.
    pub async fn supported_pids(&mut self) -> Result<SupportedPids, ObdError> {
        self.ensure_connected()?;
        let span = self.span.clone();
        self.read_supported_pids().instrument(span).await
    }

    /// Split the sensor table into supported and unsupported sensors
    pub async fn partition_sensors(&mut self) -> Result<SensorPartition, ObdError> {
        let supported = self.supported_pids().await?;
        let mut partition = SensorPartition::default();

        for (index, sensor) in self.sensors.iter().enumerate() {
            let is_supported = index == SUPPORTED_PIDS_INDEX
                || sensor.pid().is_some_and(|pid| supported.is_supported(pid));
            if is_supported {
                partition.supported.push(index);
            } else {
                partition.unsupported.push(index);
            }
        }

        debug!(
            supported = partition.supported.len(),
            unsupported = partition.unsupported.len(),
            "Partitioned sensors"
        );
        Ok(partition)
    }

    /// Read stored (Active) and pending/freeze (Passive) trouble codes
    pub async fn get_dtc(&mut self) -> Result<Vec<TroubleCode>, ObdError> {
        self.ensure_connected()?;
        let span = self.span.clone();
        self.read_trouble_codes().instrument(span).await
    }

    /// Clear trouble codes and freeze frame data; returns the adapter's acknowledgment
    pub async fn clear_dtc(&mut self) -> Result<QueryOutcome<String>, ObdError> {
        self.ensure_connected()?;
        let span = self.span.clone();
        self.run_clear().instrument(span).await
    }

    async fn run_clear(&mut self) -> Result<QueryOutcome<String>, ObdError> {
        info!("Clearing trouble codes");
        let outcome = match self.exchange(command::CLEAR_DTC).await? {
            Some(ack) => QueryOutcome::Value(ack),
            None => QueryOutcome::NoResponse,
        };
        Ok(outcome)
    }

    async fn read_trouble_codes(&mut self) -> Result<Vec<TroubleCode>, ObdError> {
        let stored_count = match self.read_monitor_status().await? {
            QueryOutcome::Value(status) => {
                info!(stored = status.stored_count, mil = status.mil, "Monitor status");
                status.stored_count
            }
            QueryOutcome::NoData => {
                debug!("Monitor status has no data, assuming no stored codes");
                0
            }
            QueryOutcome::NoResponse => return Err(ObdError::AdapterNotResponding),
        };

        let mut codes = Vec::new();
        let frames = usize::from(stored_count).div_ceil(CODES_PER_FRAME);

        for frame in 0..frames {
            let Some(raw) = self.exchange(command::READ_DTC).await? else {
                warn!(frame, "No reply to stored code request");
                break;
            };
            debug!(frame, response = %raw, "Stored code frame");

            let extracted = dtc::codes_from_frame(&raw);
            codes.extend(extracted.codes.into_iter().map(|code| TroubleCode {
                status: DtcStatus::Active,
                code,
            }));
            if extracted.padded {
                break;
            }
        }

        match self.exchange(command::PENDING_DTC).await? {
            None => debug!("No reply to pending code request"),
            Some(raw) if normalize::is_no_data(&raw) => debug!("No freeze frame"),
            Some(raw) => {
                debug!(response = %raw, "Pending code frame");
                let extracted = dtc::codes_from_frame(&raw);
                codes.extend(extracted.codes.into_iter().map(|code| TroubleCode {
                    status: DtcStatus::Passive,
                    code,
                }));
            }
        }

        info!(count = codes.len(), "Read trouble codes");
        Ok(codes)
    }

    fn ensure_connected(&self) -> Result<(), ObdError> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            state => {
                debug!(%state, "Rejecting request on unconnected session");
                Err(ObdError::NotConnected(state))
            }
        }
    }

    async fn exchange(&mut self, command: &str) -> Result<Option<String>, ObdError> {
        framing::send_command(&mut self.transport, command).await?;
        framing::read_result(&mut self.transport).await
    }

    async fn query_payload(&mut self, command: &str) -> Result<QueryOutcome<String>, ObdError> {
        let outcome = match self.exchange(command).await? {
            None => {
                debug!(command, "No response");
                QueryOutcome::NoResponse
            }
            Some(raw) => match normalize::interpret_result(&raw) {
                Interpreted::NoData => QueryOutcome::NoData,
                Interpreted::Payload(payload) => QueryOutcome::Value(payload),
            },
        };
        Ok(outcome)
    }

    async fn read_sensor(&mut self, index: usize) -> Result<QueryOutcome<SensorReading>, ObdError> {
        let sensor = *self
            .sensors
            .get(index)
            .ok_or(ObdError::SensorIndexOutOfRange(index))?;

        let outcome = self.query_payload(sensor.command).await?;
        Ok(outcome.map(|payload| SensorReading {
            short_name: sensor.short_name,
            name: sensor.name,
            value: sensor.decode(&payload),
            unit: sensor.unit,
        }))
    }

    async fn read_monitor_status(&mut self) -> Result<QueryOutcome<MonitorStatus>, ObdError> {
        match self.read_sensor(MONITOR_STATUS_INDEX).await? {
            QueryOutcome::Value(reading) => match reading.value {
                SensorValue::Monitor(status) => Ok(QueryOutcome::Value(status)),
                other => {
                    warn!(value = ?other, "Monitor status did not decode");
                    Err(ObdError::UnexpectedValue {
                        sensor: reading.short_name,
                    })
                }
            },
            QueryOutcome::NoData => Ok(QueryOutcome::NoData),
            QueryOutcome::NoResponse => Ok(QueryOutcome::NoResponse),
        }
    }

    async fn read_supported_pids(&mut self) -> Result<SupportedPids, ObdError> {
        let mut bits = String::with_capacity(command::SUPPORTED_PIDS.len() * PIDS_PER_RANGE);

        for range_command in command::SUPPORTED_PIDS {
            let range = match self.query_payload(range_command).await? {
                QueryOutcome::Value(payload) => hex_to_bitstring(&payload).unwrap_or_else(|| {
                    warn!(command = range_command, payload = %payload, "Bitmap is not hex");
                    String::new()
                }),
                outcome => {
                    debug!(command = range_command, ?outcome, "Range not reported");
                    String::new()
                }
            };
            bits.extend(range.chars().chain(iter::repeat('0')).take(PIDS_PER_RANGE));
        }

        Ok(SupportedPids::from_bitstring(&bits))
    }
}
