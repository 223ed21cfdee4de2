//! Shared test utilities for serial-session tests.
//!
//! - Mock hosts pre-loaded with mock ports
//! - Session options with a short poll interval
//! - Polling helpers for asynchronous conditions

#![allow(dead_code)]

use serial_session::{
    DeviceHost, MockSerialPort, MockSerialProvider, SessionController, SessionOptions,
    SessionState,
};
use std::sync::Arc;
use std::time::Duration;

/// Poll interval used by integration tests.
pub const FAST_POLL: Duration = Duration::from_millis(5);

/// Upper bound for any single asynchronous wait.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// A device host whose provider hands out `ports` in order.
pub fn mock_host(ports: Vec<MockSerialPort>) -> (Arc<DeviceHost>, Arc<MockSerialProvider>) {
    let provider = Arc::new(MockSerialProvider::with_ports(ports));
    let host = Arc::new(DeviceHost::new(provider.clone()));
    (host, provider)
}

/// Options with a fast poll interval and defaults otherwise.
pub fn fast_options() -> SessionOptions {
    SessionOptions {
        poll_interval: FAST_POLL,
        ..SessionOptions::default()
    }
}

/// A session over a single mock port, plus the port itself.
pub fn mock_session(port_name: &str) -> (SessionController, MockSerialPort) {
    let port = MockSerialPort::new(port_name);
    let (host, _) = mock_host(vec![port.clone()]);
    (SessionController::new(host, fast_options()), port)
}

/// Wait until `condition` holds, panicking after [`WAIT_TIMEOUT`].
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Wait until the session reaches `state`.
pub async fn wait_for_state(session: &SessionController, state: SessionState) {
    let mut states = session.subscribe();
    let reached = tokio::time::timeout(WAIT_TIMEOUT, states.wait_for(|s| *s == state)).await;
    assert!(
        matches!(reached, Ok(Ok(_))),
        "session never reached {} (now {})",
        state,
        session.state()
    );
}

/// Wait until the accumulated text equals `expected`.
pub async fn wait_for_text(session: &SessionController, expected: &str) {
    wait_until(&format!("text {:?}", expected), || {
        session.accumulator().text() == expected
    })
    .await;
}
