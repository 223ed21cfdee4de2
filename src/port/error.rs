//! Port-specific error types.
//!
//! Defines error types for device handle operations, separate from
//! session-level errors to maintain clean separation of concerns.

use thiserror::Error;

/// Errors that can occur during serial device operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred on the raw byte channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Attempted to open a device that's already open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// Attempted to use a device that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// The requested channel is held by another reader or writer.
    #[error("The {0} channel is locked by another consumer")]
    ChannelLocked(&'static str),

    /// Device selection was cancelled or nothing could be selected.
    #[error("Device selection cancelled: {0}")]
    SelectionCancelled(String),

    /// The decoded-text reader was released or already reported end of stream.
    #[error("Reader has been released")]
    ReaderReleased,

    /// The piping task was cancelled before the stream ended.
    #[error("Read was cancelled")]
    Cancelled,

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a SelectionCancelled error from a reason.
    pub fn selection_cancelled(reason: impl Into<String>) -> Self {
        Self::SelectionCancelled(reason.into())
    }
}
