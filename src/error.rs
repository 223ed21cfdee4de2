use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by session operations.
///
/// Only acquisition and restarting a reader can fail. Teardown paths
/// (`stop_reading`, `release_all`, device close, pipeline detach) log their
/// failures instead of returning them.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The host offers no serial support at all.
    #[error("Serial devices are not supported on this host")]
    NoDeviceCapability,

    /// Device selection was cancelled or the device failed to open.
    #[error("Failed to open serial device: {0}")]
    OpenFailed(#[source] PortError),

    /// A device-level operation failed on an acquired device.
    #[error("Serial device error: {0}")]
    Port(#[from] PortError),
}
