//! Transport Link abstraction
//!
//! `Transport` trait with `send`/`receive`/`is_open`. Implementations:
//! - `SerialTransport`: ELM327 adapter on a serial port via `tokio-serial`
//! - `MockTransport`: scripted replies and sent-frame log (in `mock.rs`)
//! - `SimulatedEcu`: deterministic plausible engine data (in `mock.rs`)

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::error::ObdError;

/// Byte-oriented, half-duplex link to an OBD-II adapter.
///
/// Delivery order is preserved. Only one request may be outstanding at a
/// time; the `&mut self` receivers enforce this.
#[async_trait]
pub trait Transport: Send {
    /// Write `bytes` to the adapter.
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ObdError>;

    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when nothing arrived in time.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, ObdError>;

    /// Whether the link is usable.
    fn is_open(&self) -> bool;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ObdError> {
        (**self).send(bytes).await
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, ObdError> {
        (**self).receive(buf, timeout).await
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// ELM327 adapter on a serial port
pub struct SerialTransport {
    /// Serial port device path (e.g., "/dev/ttyUSB0" or "COM3")
    device: String,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Open the serial port at `baud_rate`
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, ObdError> {
        info!("Opening serial transport {} at {} baud", device, baud_rate);
        let stream = tokio_serial::new(device, baud_rate).open_native_async()?;
        Ok(Self {
            device: device.to_string(),
            stream: Some(stream),
        })
    }

    /// Drop the port handle after an I/O failure
    fn close(&mut self, cause: &std::io::Error) {
        if self.stream.take().is_some() {
            warn!("Closed serial transport {}: {}", self.device, cause);
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ObdError> {
        let stream = self.stream.as_mut().ok_or(ObdError::LinkClosed)?;
        debug!("TX {:?}", String::from_utf8_lossy(bytes));
        let written = match stream.write_all(bytes).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.close(&e);
            return Err(e.into());
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, ObdError> {
        let stream = self.stream.as_mut().ok_or(ObdError::LinkClosed)?;
        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(n)) => {
                debug!("RX {:?}", String::from_utf8_lossy(&buf[..n]));
                Ok(n)
            }
            Ok(Err(e)) => {
                self.close(&e);
                Err(e.into())
            }
            Err(_) => Ok(0),
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
