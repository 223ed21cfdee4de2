//! Core traits for serial device abstraction.
//!
//! A [`SerialProvider`] is the host capability surface: it reports whether
//! serial access exists at all and hands out devices on request. A
//! [`SerialBackend`] is one such device before it is opened; opening it yields
//! the raw byte channels that [`DeviceHandle`](super::DeviceHandle) guards.

use super::error::PortError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

/// Default baud rate used when nothing else is configured.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default size of the raw read buffer, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 255;

/// Raw byte-readable side of an open device.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Raw byte-writable side of an open device.
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Configuration parameters for a serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Size of the buffer used for each raw read.
    pub buffer_size: usize,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl PortConfiguration {
    /// Default configuration at the given baud rate.
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Whether the host offers serial access at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Supported,
    Unsupported,
}

impl Capability {
    pub fn is_supported(self) -> bool {
        matches!(self, Capability::Supported)
    }
}

/// A serial device that can be opened into a pair of raw byte channels.
///
/// Implementations only deal with the physical (or simulated) connection.
/// Channel locking, idempotent close and the open-device registry live in
/// [`DeviceHandle`](super::DeviceHandle) and [`DeviceHost`](super::DeviceHost).
#[async_trait]
pub trait SerialBackend: Send + Sync + std::fmt::Debug {
    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Open the device and return its readable and writable channels.
    async fn open(&self, config: &PortConfiguration)
        -> Result<(ByteReader, ByteWriter), PortError>;

    /// Release any backend-side resources once the channels are dropped.
    async fn close(&self) -> Result<(), PortError> {
        Ok(())
    }
}

/// The host environment's serial capability surface.
#[async_trait]
pub trait SerialProvider: Send + Sync {
    /// Report whether serial access is available on this host.
    fn capability(&self) -> Capability;

    /// Ask the host for a device to use.
    ///
    /// Fails with [`PortError::SelectionCancelled`] when nothing was selected.
    async fn request_port(&self) -> Result<Box<dyn SerialBackend>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.buffer_size, 255);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
    }

    #[test]
    fn test_with_baud_rate_keeps_defaults() {
        let config = PortConfiguration::with_baud_rate(115200);
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_serialport_conversions() {
        let bits: serialport::DataBits = DataBits::Seven.into();
        assert_eq!(bits, serialport::DataBits::Seven);

        let flow: serialport::FlowControl = FlowControl::Hardware.into();
        assert_eq!(flow, serialport::FlowControl::Hardware);

        let parity: serialport::Parity = Parity::Even.into();
        assert_eq!(parity, serialport::Parity::Even);

        let stop: serialport::StopBits = StopBits::Two.into();
        assert_eq!(stop, serialport::StopBits::Two);
    }

    #[test]
    fn test_capability() {
        assert!(Capability::Supported.is_supported());
        assert!(!Capability::Unsupported.is_supported());
    }
}
