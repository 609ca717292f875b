//! Byte transport to the adapter
//!
//! The session only needs a handful of blocking-style operations from the
//! link: read with a timeout, write, discard buffers and close. A read that
//! produces nothing within the timeout returns `Ok(0)`.

use crate::config::SessionConfig;
use crate::error::ObdError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{
    ClearBuffer, DataBits, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits,
};
use tracing::{debug, info};

/// Byte stream to an ELM327-class adapter
#[async_trait]
pub trait Transport: Send {
    /// Read up to `buf.len()` bytes; `Ok(0)` when nothing arrived within the timeout
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ObdError>;

    /// Write all bytes
    async fn write(&mut self, data: &[u8]) -> Result<(), ObdError>;

    /// Discard bytes received but not yet read
    fn flush_input(&mut self) -> Result<(), ObdError>;

    /// Discard bytes written but not yet transmitted
    fn flush_output(&mut self) -> Result<(), ObdError>;

    /// Release the device
    async fn close(&mut self) -> Result<(), ObdError>;
}

/// Serial port transport (8 data bits, no parity, 1 stop bit)
pub struct SerialTransport {
    /// `None` once closed
    stream: Option<SerialStream>,
    /// Serial port device path
    device: String,
    /// Per-read timeout
    timeout: Duration,
}

impl SerialTransport {
    /// Open the configured serial device
    pub fn open(config: &SessionConfig) -> Result<Self, ObdError> {
        info!("Opening serial port {} at {} baud", config.port, config.baud_rate);

        let stream = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(config.read_timeout())
            .open_native_async()?;

        info!("Serial port {} opened", config.port);

        Ok(Self {
            stream: Some(stream),
            device: config.port.clone(),
            timeout: config.read_timeout(),
        })
    }

    /// Device path this transport was opened on
    pub fn device(&self) -> &str {
        &self.device
    }

    fn stream(&mut self) -> Result<&mut SerialStream, ObdError> {
        self.stream
            .as_mut()
            .ok_or_else(|| ObdError::Transport(format!("{} is closed", self.device)))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ObdError> {
        let timeout = self.timeout;
        let stream = self.stream()?;
        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => Ok(0),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), ObdError> {
        let stream = self.stream()?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    fn flush_input(&mut self) -> Result<(), ObdError> {
        self.stream()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), ObdError> {
        self.stream()?.clear(ClearBuffer::Output)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ObdError> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing serial port {}", self.device);
            stream.shutdown().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ObdError> {
        (**self).read(buf).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), ObdError> {
        (**self).write(data).await
    }

    fn flush_input(&mut self) -> Result<(), ObdError> {
        (**self).flush_input()
    }

    fn flush_output(&mut self) -> Result<(), ObdError> {
        (**self).flush_output()
    }

    async fn close(&mut self) -> Result<(), ObdError> {
        (**self).close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_device_is_transport_error() {
        let config = SessionConfig::for_port("/dev/does-not-exist-obd");
        match SerialTransport::open(&config) {
            Err(ObdError::Transport(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a nonexistent device"),
        }
    }
}
