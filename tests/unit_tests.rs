//! Unit tests for serial-session data types
//!
//! This module contains tests for:
//! - `state`: SessionState transitions and JSON mapping
//! - `port::traits`: PortConfiguration defaults and enum mapping
//! - `error`: SessionError display and source chains
//!
//! Tests follow the Arrange-Act-Assert pattern.

use serial_session::{
    DataBits, FlowControl, Parity, PortConfiguration, PortError, ReceivedChunk, SessionError,
    SessionState, SessionStatus, StopBits,
};
use std::error::Error as _;

// ============================================================================
// SessionState Tests
// ============================================================================

#[cfg(test)]
mod session_state_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn test_transition_guards() {
        assert!(SessionState::Idle.can_acquire());
        assert!(!SessionState::Idle.can_start());
        assert!(!SessionState::Idle.can_stop());

        assert!(!SessionState::PortAcquired.can_acquire());
        assert!(SessionState::PortAcquired.can_start());

        assert!(SessionState::Reading.can_stop());
        assert!(!SessionState::Reading.can_start());
    }

    #[test]
    fn test_json_mapping() {
        let json = serde_json::to_string(&SessionState::PortAcquired).unwrap();
        assert_eq!(json, "\"port_acquired\"");

        let state: SessionState = serde_json::from_str("\"reading\"").unwrap();
        assert_eq!(state, SessionState::Reading);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::PortAcquired.to_string(), "port acquired");
    }
}

// ============================================================================
// SessionStatus Tests
// ============================================================================

#[cfg(test)]
mod session_status_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_serializes_chunks() {
        // Arrange
        let chunks = ["He", "llo"]
            .iter()
            .enumerate()
            .map(|(seq, text)| ReceivedChunk {
                seq: seq as u64,
                text: text.to_string(),
                received_at: chrono::Utc::now(),
            })
            .collect();
        let status = SessionStatus {
            id: uuid::Uuid::nil(),
            state: SessionState::Reading,
            port_name: Some("/dev/ttyUSB0".to_string()),
            baud_rate: 9600,
            chunks,
            evicted_chunks: 0,
            ticks: 7,
        };

        // Act
        let value = serde_json::to_value(&status).unwrap();

        // Assert
        assert_eq!(value["state"], "reading");
        assert_eq!(value["chunks"][1]["seq"], 1);
        assert_eq!(value["chunks"][1]["text"], "llo");
        assert_eq!(value["ticks"], 7);
        assert_eq!(status.text(), "Hello");
    }
}

// ============================================================================
// PortConfiguration Tests
// ============================================================================

#[cfg(test)]
mod port_config_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600, "Default baud rate should be 9600");
        assert_eq!(config.buffer_size, 255, "Default buffer should be 255 bytes");
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.flow_control, FlowControl::None);
    }

    #[test]
    fn test_with_baud_rate() {
        let config = PortConfiguration::with_baud_rate(115200);
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.buffer_size, 255);
    }

    #[test]
    fn test_enum_mapping_to_serialport() {
        assert_eq!(
            serialport::DataBits::from(DataBits::Seven),
            serialport::DataBits::Seven
        );
        assert_eq!(serialport::Parity::from(Parity::Odd), serialport::Parity::Odd);
        assert_eq!(
            serialport::FlowControl::from(FlowControl::Hardware),
            serialport::FlowControl::Hardware
        );
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{
            "baud_rate": 57600,
            "buffer_size": 64,
            "data_bits": "seven",
            "flow_control": "software",
            "parity": "even",
            "stop_bits": "two"
        }"#;

        let config: PortConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.baud_rate, 57600);
        assert_eq!(config.flow_control, FlowControl::Software);
        assert_eq!(config.stop_bits, StopBits::Two);
    }
}

// ============================================================================
// Error Tests
// ============================================================================

#[cfg(test)]
mod error_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_open_failed_keeps_cause() {
        let err = SessionError::OpenFailed(PortError::not_found("/dev/ttyUSB9"));

        assert_eq!(
            err.to_string(),
            "Failed to open serial device: Serial port not found: /dev/ttyUSB9"
        );
        let source = err.source().expect("OpenFailed has a source");
        assert_eq!(source.to_string(), "Serial port not found: /dev/ttyUSB9");
    }

    #[test]
    fn test_port_error_converts() {
        let err: SessionError = PortError::NotOpen.into();
        assert!(matches!(err, SessionError::Port(PortError::NotOpen)));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: PortError = io.into();
        assert!(matches!(err, PortError::Io(_)));
    }
}
