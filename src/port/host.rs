//! Device acquisition and host-wide bulk teardown.

use super::device::DeviceHandle;
use super::error::PortError;
use super::traits::{Capability, PortConfiguration, SerialProvider};
use crate::error::{SessionError, SessionResult};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a bulk close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSummary {
    /// Devices a close was attempted on.
    pub attempted: usize,
    /// Devices whose backend reported an error while closing.
    pub failed: usize,
}

/// Hands out devices from a [`SerialProvider`] and remembers every device it
/// opened so they can all be closed on teardown.
///
/// One host is typically shared by every session in a process.
pub struct DeviceHost {
    provider: Arc<dyn SerialProvider>,
    devices: Mutex<Vec<Arc<DeviceHandle>>>,
}

impl DeviceHost {
    pub fn new(provider: Arc<dyn SerialProvider>) -> Self {
        Self {
            provider,
            devices: Mutex::new(Vec::new()),
        }
    }

    /// Query the provider's serial capability.
    pub fn capability(&self) -> Capability {
        self.provider.capability()
    }

    /// Request a device from the provider and open it with `config`.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoDeviceCapability` if the host has no serial support
    /// - `SessionError::OpenFailed` if selection was cancelled or the open failed
    pub async fn acquire(&self, config: &PortConfiguration) -> SessionResult<Arc<DeviceHandle>> {
        if !self.capability().is_supported() {
            info!("No serial capability available on this host");
            return Err(SessionError::NoDeviceCapability);
        }

        let backend = self
            .provider
            .request_port()
            .await
            .map_err(SessionError::OpenFailed)?;
        let device = DeviceHandle::open(backend, config)
            .await
            .map_err(SessionError::OpenFailed)?;

        info!("Acquired {} at {} baud", device.name(), config.baud_rate);
        self.devices.lock().push(Arc::clone(&device));
        Ok(device)
    }

    /// All devices handed out by this host that are still open.
    pub fn list_open_devices(&self) -> Vec<Arc<DeviceHandle>> {
        let mut devices = self.devices.lock();
        devices.retain(|device| device.is_open());
        devices.clone()
    }

    /// Close every open device concurrently.
    ///
    /// A failure on one device never prevents the others from being closed;
    /// failures are logged and counted, never returned as errors.
    pub async fn close_all(&self) -> CloseSummary {
        let devices = self.list_open_devices();
        if devices.is_empty() {
            return CloseSummary::default();
        }

        debug!("Closing {} open device(s)", devices.len());
        let results = join_all(devices.iter().map(|device| async move {
            debug!("Closing port {}", device.name());
            device
                .try_close()
                .await
                .map_err(|e| (device.name().to_string(), e))
        }))
        .await;

        let failed = results
            .into_iter()
            .filter_map(Result::err)
            .inspect(|(name, e): &(String, PortError)| {
                warn!("Ignoring error while closing {}: {}", name, e);
            })
            .count();

        self.devices.lock().retain(|device| device.is_open());

        CloseSummary {
            attempted: devices.len(),
            failed,
        }
    }
}

impl std::fmt::Debug for DeviceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHost")
            .field("capability", &self.capability())
            .field("devices", &self.devices.lock().len())
            .finish()
    }
}
