//! Serial Session Library
//!
//! Reads text from a serial device on a fixed cadence. A session acquires a
//! device through a provider, decodes its byte stream as UTF-8 and appends
//! every decoded chunk to an accumulator that presentation layers read.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `port`: Device handles, providers and the device host
//! - `pipeline`: Streaming UTF-8 decode pipeline
//! - `scheduler`: Fixed-cadence, non-overlapping poll loop
//! - `accumulator`: Received text store
//! - `session`: Session controller and its state machine
//! - `state`: Session states and status snapshots
//! - `error`: Session-level errors
//! - `logging`: Tracing subscriber setup
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_session::{DeviceHost, SessionController, SessionOptions, SystemSerialProvider};
//! use std::sync::Arc;
//!
//! # async fn run() -> serial_session::SessionResult<()> {
//! let host = Arc::new(DeviceHost::new(Arc::new(SystemSerialProvider::first_available())));
//! let session = SessionController::new(host, SessionOptions::default());
//!
//! session.acquire().await?;
//! session.start_reading().await?;
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! session.stop_reading().await;
//!
//! println!("{}", session.accumulator().text());
//! session.release_all().await;
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod port;
pub mod scheduler;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use accumulator::{Accumulator, ReceivedChunk};
pub use error::{SessionError, SessionResult};
pub use pipeline::{DecodePipeline, Pulled, Utf8StreamDecoder};
pub use port::{
    Capability, CloseSummary, DataBits, DeviceHandle, DeviceHost, FlowControl, MockSerialPort,
    MockSerialProvider, Parity, PortConfiguration, PortError, SerialBackend, SerialProvider,
    StopBits, SystemSerialProvider,
};
pub use scheduler::{PollHandle, PollScheduler};
pub use session::{SessionController, SessionOptions};
pub use state::{SessionState, SessionStatus};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
