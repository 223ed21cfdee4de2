//! Port abstraction layer for serial communication.
//!
//! Backends and providers are traits so the session layer can be driven by
//! real hardware or by the in-memory mock. A [`DeviceHandle`] wraps an open
//! backend and hands out its byte channels one consumer at a time; the
//! [`DeviceHost`] tracks every device it opened so they can all be closed
//! together.

pub mod device;
pub mod error;
pub mod host;
pub mod mock;
pub mod system;
pub mod traits;

pub use device::{ChannelLock, DeviceHandle, ReadableChannel, WritableChannel};
pub use error::PortError;
pub use host::{CloseSummary, DeviceHost};
pub use mock::{MockSerialPort, MockSerialProvider};
pub use system::SystemSerialProvider;
pub use traits::*;

#[cfg(feature = "async-serial")]
pub use system::TokioSerialBackend;
