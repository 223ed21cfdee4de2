//! Hardware integration tests.
//!
//! These tests need a real serial device that sends text on its own
//! (a GPS module, a sensor, a board printing a banner).
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0   # or COM3 on Windows
//! export TEST_BAUD=9600           # optional, default: 9600
//! cargo test --features hardware-tests -- --ignored
//! ```

#![cfg(feature = "hardware-tests")]

use serial_session::{
    DeviceHost, PortConfiguration, SessionController, SessionOptions, SessionState,
    SystemSerialProvider,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Test port configuration from environment.
struct TestPortConfig {
    port_name: String,
    baud_rate: u32,
}

impl TestPortConfig {
    fn from_env() -> Option<Self> {
        let port_name = env::var("TEST_PORT").ok()?;
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600);

        Some(TestPortConfig {
            port_name,
            baud_rate,
        })
    }
}

#[tokio::test]
#[ignore]
async fn test_real_port_lifecycle() {
    let Some(test) = TestPortConfig::from_env() else {
        println!("TEST_PORT not set; skipping");
        return;
    };

    let host = Arc::new(DeviceHost::new(Arc::new(SystemSerialProvider::new(
        test.port_name.clone(),
    ))));
    let session = SessionController::new(
        host.clone(),
        SessionOptions {
            port: PortConfiguration::with_baud_rate(test.baud_rate),
            poll_interval: Duration::from_millis(50),
            max_chunks: None,
        },
    );

    session.acquire().await.expect("failed to open test port");
    assert_eq!(session.port_name(), Some(test.port_name.clone()));

    session.start_reading().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    session.stop_reading().await;
    assert_eq!(session.state(), SessionState::PortAcquired);
    println!("Received: {:?}", session.accumulator().text());

    // Reading can resume on the same handle.
    session.start_reading().await.unwrap();
    session.stop_reading().await;

    let summary = session.release_all().await;
    assert_eq!(summary.failed, 0);
    assert!(host.list_open_devices().is_empty());
}

#[test]
#[ignore]
fn test_list_ports() {
    let ports = SystemSerialProvider::available_ports().expect("enumeration failed");
    println!("Available serial ports ({}):", ports.len());
    for (idx, name) in ports.iter().enumerate() {
        println!("  {}. {}", idx + 1, name);
    }
}
