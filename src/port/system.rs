//! Operating-system serial ports.
//!
//! `SystemSerialProvider` selects a port the way a user would in a device
//! picker: the configured name (after alias resolution) if there is one,
//! otherwise the first port the OS enumerates. Opening goes through
//! tokio-serial so reads never block the runtime.
//!
//! Without the `async-serial` feature the provider reports
//! [`Capability::Unsupported`].

use super::error::PortError;
use super::traits::{Capability, SerialBackend, SerialProvider};
#[cfg(feature = "async-serial")]
use super::traits::{ByteReader, ByteWriter, PortConfiguration};
use async_trait::async_trait;
use tracing::debug;

/// Serial provider backed by the operating system.
#[derive(Debug, Clone, Default)]
pub struct SystemSerialProvider {
    /// Port to select; `None` picks the first enumerated port.
    preferred: Option<String>,
}

impl SystemSerialProvider {
    /// Provider that always selects `port_name`.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            preferred: Some(port_name.into()),
        }
    }

    /// Provider that selects the first port the OS reports.
    pub fn first_available() -> Self {
        Self { preferred: None }
    }

    /// Names of the ports currently visible to the OS.
    pub fn available_ports() -> Result<Vec<String>, PortError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|info| info.port_name)
            .collect())
    }
}

#[async_trait]
impl SerialProvider for SystemSerialProvider {
    fn capability(&self) -> Capability {
        if cfg!(feature = "async-serial") && serialport::available_ports().is_ok() {
            Capability::Supported
        } else {
            Capability::Unsupported
        }
    }

    async fn request_port(&self) -> Result<Box<dyn SerialBackend>, PortError> {
        let name = match &self.preferred {
            Some(name) => name.clone(),
            None => Self::available_ports()?
                .into_iter()
                .next()
                .ok_or_else(|| PortError::selection_cancelled("no serial ports found"))?,
        };
        debug!("Selected serial port {}", name);
        system_backend(name)
    }
}

#[cfg(feature = "async-serial")]
fn system_backend(name: String) -> Result<Box<dyn SerialBackend>, PortError> {
    Ok(Box::new(TokioSerialBackend { name }))
}

#[cfg(not(feature = "async-serial"))]
fn system_backend(_name: String) -> Result<Box<dyn SerialBackend>, PortError> {
    Err(PortError::selection_cancelled(
        "built without the async-serial feature",
    ))
}

/// A named OS serial port opened through tokio-serial.
#[cfg(feature = "async-serial")]
#[derive(Debug)]
pub struct TokioSerialBackend {
    name: String,
}

#[cfg(feature = "async-serial")]
impl TokioSerialBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(feature = "async-serial")]
#[async_trait]
impl SerialBackend for TokioSerialBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(
        &self,
        config: &PortConfiguration,
    ) -> Result<(ByteReader, ByteWriter), PortError> {
        let builder = tokio_serial::new(&self.name, config.baud_rate)
            .data_bits(config.data_bits.into())
            .flow_control(config.flow_control.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into());

        let stream = tokio_serial::SerialStream::open(&builder).map_err(|e| match e.kind {
            tokio_serial::ErrorKind::NoDevice => PortError::not_found(&self.name),
            tokio_serial::ErrorKind::InvalidInput => PortError::config(e.to_string()),
            _ => PortError::Serial(e),
        })?;

        let (reader, writer) = tokio::io::split(stream);
        Ok((Box::new(reader), Box::new(writer)))
    }
}
