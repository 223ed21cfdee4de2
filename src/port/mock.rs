//! Mock serial devices for testing.
//!
//! Provides a `MockSerialPort` that simulates a serial device without
//! requiring actual hardware, and a `MockSerialProvider` that hands such
//! ports out the way a host would. Bytes are delivered through an in-memory
//! duplex pipe, so reads block until the test feeds data and report end of
//! stream once the test disconnects the device.

use super::error::PortError;
use super::traits::{
    ByteReader, ByteWriter, Capability, PortConfiguration, SerialBackend, SerialProvider,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex;

/// Capacity of the in-memory pipe between the test and the device.
const MOCK_PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Default)]
struct MockIo {
    /// Bytes fed before the device was opened.
    pending: Vec<u8>,
    /// The test's end of the pipe while the device is open.
    remote: Option<DuplexStream>,
}

#[derive(Debug, Default)]
struct MockShared {
    io: Mutex<MockIo>,
    fail_open: AtomicBool,
    fail_close: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

/// Mock serial device.
///
/// Clones share state, so a test keeps one clone to drive the device while
/// the provider hands another to the session.
///
/// # Example
/// ```
/// use serial_session::port::{DeviceHandle, MockSerialPort, PortConfiguration};
/// use tokio::io::AsyncReadExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mock = MockSerialPort::new("MOCK0");
/// mock.feed(b"Hello").await;
///
/// let device = DeviceHandle::open(Box::new(mock.clone()), &PortConfiguration::default())
///     .await
///     .unwrap();
/// let mut reader = device.readable().unwrap();
/// let mut buf = [0u8; 5];
/// reader.read_exact(&mut buf).await.unwrap();
/// assert_eq!(&buf, b"Hello");
/// # }
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    shared: Arc<MockShared>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(MockShared::default()),
        }
    }

    /// Deliver bytes to the device.
    ///
    /// Bytes fed before the device is opened are delivered on open.
    pub async fn feed(&self, data: &[u8]) {
        let mut io = self.shared.io.lock().await;
        match io.remote.as_mut() {
            Some(remote) => {
                // The device side only goes away on close; nothing to deliver then.
                let _ = remote.write_all(data).await;
            }
            None => io.pending.extend_from_slice(data),
        }
    }

    /// Simulate the device going away: the reader sees end of stream.
    pub async fn disconnect(&self) {
        let mut io = self.shared.io.lock().await;
        io.remote = None;
    }

    /// Make subsequent opens fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent closes report an error.
    pub fn set_fail_close(&self, fail: bool) {
        self.shared.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Number of close attempts, including failed ones.
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SerialBackend for MockSerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(
        &self,
        _config: &PortConfiguration,
    ) -> Result<(ByteReader, ByteWriter), PortError> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(PortError::Io(std::io::Error::other("simulated open failure")));
        }

        let mut io = self.shared.io.lock().await;
        if io.remote.is_some() {
            return Err(PortError::AlreadyOpen);
        }

        let (local, mut remote) = tokio::io::duplex(MOCK_PIPE_CAPACITY);
        let pending = std::mem::take(&mut io.pending);
        if !pending.is_empty() {
            remote.write_all(&pending).await?;
        }
        io.remote = Some(remote);
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        let (reader, writer) = tokio::io::split(local);
        Ok((Box::new(reader), Box::new(writer)))
    }

    async fn close(&self) -> Result<(), PortError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        self.shared.io.lock().await.remote = None;

        if self.shared.fail_close.load(Ordering::SeqCst) {
            return Err(PortError::Io(std::io::Error::other("simulated close failure")));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("opens", &self.open_count())
            .field("closes", &self.close_count())
            .finish()
    }
}

/// Host stand-in that hands out queued mock ports in order.
///
/// When the queue is empty a request behaves like a user dismissing the
/// device picker.
pub struct MockSerialProvider {
    capability: Capability,
    ports: parking_lot::Mutex<VecDeque<MockSerialPort>>,
    requests: AtomicUsize,
}

impl MockSerialProvider {
    /// A provider with serial support and no ports queued.
    pub fn new() -> Self {
        Self {
            capability: Capability::Supported,
            ports: parking_lot::Mutex::new(VecDeque::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// A provider on a host without any serial support.
    pub fn unsupported() -> Self {
        Self {
            capability: Capability::Unsupported,
            ..Self::new()
        }
    }

    /// A provider that will hand out `ports` in order.
    pub fn with_ports(ports: impl IntoIterator<Item = MockSerialPort>) -> Self {
        let provider = Self::new();
        provider.ports.lock().extend(ports);
        provider
    }

    /// Queue another port for selection.
    pub fn push_port(&self, port: MockSerialPort) {
        self.ports.lock().push_back(port);
    }

    /// Number of times a port was requested.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Default for MockSerialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SerialProvider for MockSerialProvider {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn request_port(&self) -> Result<Box<dyn SerialBackend>, PortError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if !self.capability.is_supported() {
            return Err(PortError::selection_cancelled("serial is not supported"));
        }

        match self.ports.lock().pop_front() {
            Some(port) => Ok(Box::new(port)),
            None => Err(PortError::selection_cancelled("no device selected")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_pending_bytes_delivered_on_open() {
        let port = MockSerialPort::new("MOCK0");
        port.feed(b"early").await;

        let (mut reader, _writer) = port.open(&PortConfiguration::default()).await.unwrap();
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"early");
        assert_eq!(port.open_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream() {
        let port = MockSerialPort::new("MOCK0");
        let (mut reader, _writer) = port.open(&PortConfiguration::default()).await.unwrap();

        port.feed(b"ab").await;
        port.disconnect().await;

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"ab");
    }

    #[tokio::test]
    async fn test_double_open_rejected() {
        let port = MockSerialPort::new("MOCK0");
        let _channels = port.open(&PortConfiguration::default()).await.unwrap();

        let second = port.open(&PortConfiguration::default()).await;
        assert!(matches!(second, Err(PortError::AlreadyOpen)));
    }

    #[tokio::test]
    async fn test_open_failure() {
        let port = MockSerialPort::new("MOCK0");
        port.set_fail_open(true);

        assert!(port.open(&PortConfiguration::default()).await.is_err());
        assert_eq!(port.open_count(), 0);
    }

    #[tokio::test]
    async fn test_close_failure_still_counts() {
        let port = MockSerialPort::new("MOCK0");
        port.set_fail_close(true);

        assert!(port.close().await.is_err());
        assert_eq!(port.close_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_hands_out_ports_in_order() {
        let provider =
            MockSerialProvider::with_ports([MockSerialPort::new("A"), MockSerialPort::new("B")]);

        assert_eq!(provider.request_port().await.unwrap().name(), "A");
        assert_eq!(provider.request_port().await.unwrap().name(), "B");
        assert!(matches!(
            provider.request_port().await,
            Err(PortError::SelectionCancelled(_))
        ));
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let provider = MockSerialProvider::unsupported();
        provider.push_port(MockSerialPort::new("A"));

        assert_eq!(provider.capability(), Capability::Unsupported);
        assert!(provider.request_port().await.is_err());
    }
}
