//! Open device handle with exclusive channel locks.
//!
//! A [`DeviceHandle`] owns the raw readable and writable channels of one open
//! device. Each channel can be checked out by exactly one consumer at a time
//! as a [`ChannelLock`]; dropping the lock hands the channel back so a later
//! consumer can take it again.

use super::error::PortError;
use super::traits::{ByteReader, ByteWriter, PortConfiguration, SerialBackend};
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Locked readable side of a device.
pub type ReadableChannel = ChannelLock<ByteReader>;

/// Locked writable side of a device.
pub type WritableChannel = ChannelLock<ByteWriter>;

#[derive(Default)]
struct Channels {
    readable: Option<ByteReader>,
    writable: Option<ByteWriter>,
}

/// An open serial device.
///
/// Handles are shared as `Arc<DeviceHandle>` between the session that uses
/// the device and the [`DeviceHost`](super::DeviceHost) registry that can
/// close it during bulk teardown. Closing is idempotent and never fails from
/// the caller's point of view.
pub struct DeviceHandle {
    name: String,
    config: PortConfiguration,
    backend: Box<dyn SerialBackend>,
    channels: Mutex<Channels>,
    open: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl DeviceHandle {
    /// Open `backend` with `config` and wrap its channels.
    pub async fn open(
        backend: Box<dyn SerialBackend>,
        config: &PortConfiguration,
    ) -> Result<Arc<Self>, PortError> {
        let (readable, writable) = backend.open(config).await?;
        let (closed_tx, _) = watch::channel(false);

        debug!("Opened {} at {} baud", backend.name(), config.baud_rate);

        Ok(Arc::new(Self {
            name: backend.name().to_string(),
            config: config.clone(),
            backend,
            channels: Mutex::new(Channels {
                readable: Some(readable),
                writable: Some(writable),
            }),
            open: AtomicBool::new(true),
            closed_tx,
        }))
    }

    /// Get the name/path of the underlying port.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration the device was opened with.
    pub fn config(&self) -> &PortConfiguration {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Lock the raw readable channel.
    ///
    /// # Errors
    ///
    /// - `PortError::NotOpen` if the device has been closed
    /// - `PortError::ChannelLocked` if another consumer holds the channel
    pub fn readable(self: &Arc<Self>) -> Result<ReadableChannel, PortError> {
        let mut channels = self.channels.lock();
        if !self.is_open() {
            return Err(PortError::NotOpen);
        }
        let channel = channels
            .readable
            .take()
            .ok_or(PortError::ChannelLocked("readable"))?;

        Ok(ChannelLock {
            channel: Some(channel),
            device: Arc::clone(self),
            restore: restore_readable,
        })
    }

    /// Lock the raw writable channel.
    ///
    /// # Errors
    ///
    /// Same as [`DeviceHandle::readable`].
    pub fn writable(self: &Arc<Self>) -> Result<WritableChannel, PortError> {
        let mut channels = self.channels.lock();
        if !self.is_open() {
            return Err(PortError::NotOpen);
        }
        let channel = channels
            .writable
            .take()
            .ok_or(PortError::ChannelLocked("writable"))?;

        Ok(ChannelLock {
            channel: Some(channel),
            device: Arc::clone(self),
            restore: restore_writable,
        })
    }

    /// Resolves once the device has been closed.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Close the device.
    ///
    /// Closing an already-closed device is a no-op. Backend errors are logged
    /// and swallowed since callers are almost always already tearing down.
    pub async fn close(&self) {
        if let Err(e) = self.try_close().await {
            warn!("Ignoring error while closing {}: {}", self.name, e);
        }
    }

    /// Close the device and report backend failures.
    ///
    /// The device counts as closed afterwards even if the backend failed.
    pub(crate) async fn try_close(&self) -> Result<(), PortError> {
        {
            let mut channels = self.channels.lock();
            if !self.open.swap(false, Ordering::AcqRel) {
                return Ok(());
            }
            *channels = Channels::default();
        }

        self.closed_tx.send_replace(true);
        debug!("Closing {}", self.name);
        self.backend.close().await
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("name", &self.name)
            .field("baud_rate", &self.config.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}

fn restore_readable(channels: &mut Channels, channel: ByteReader) {
    channels.readable = Some(channel);
}

fn restore_writable(channels: &mut Channels, channel: ByteWriter) {
    channels.writable = Some(channel);
}

/// Exclusive access to one channel of a [`DeviceHandle`].
///
/// The channel returns to the device when the lock is dropped, unless the
/// device was closed in the meantime.
pub struct ChannelLock<T> {
    channel: Option<T>,
    device: Arc<DeviceHandle>,
    restore: fn(&mut Channels, T),
}

impl<T> ChannelLock<T> {
    /// The device this channel belongs to.
    pub fn device(&self) -> &Arc<DeviceHandle> {
        &self.device
    }
}

impl<T> Drop for ChannelLock<T> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            let mut channels = self.device.channels.lock();
            if self.device.is_open() {
                (self.restore)(&mut channels, channel);
            }
        }
    }
}

fn released() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "channel released")
}

impl AsyncRead for ChannelLock<ByteReader> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.channel.as_mut() {
            Some(channel) => Pin::new(channel).poll_read(cx, buf),
            None => Poll::Ready(Err(released())),
        }
    }
}

impl AsyncWrite for ChannelLock<ByteWriter> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.channel.as_mut() {
            Some(channel) => Pin::new(channel).poll_write(cx, buf),
            None => Poll::Ready(Err(released())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.channel.as_mut() {
            Some(channel) => Pin::new(channel).poll_flush(cx),
            None => Poll::Ready(Err(released())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.channel.as_mut() {
            Some(channel) => Pin::new(channel).poll_shutdown(cx),
            None => Poll::Ready(Err(released())),
        }
    }
}
