use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accumulator::ReceivedChunk;

/// Lifecycle state of a serial session.
///
/// ```text
/// Idle ──acquire──> PortAcquired ──start_reading──> Reading
///  ^                 │      ^                         │
///  └──release_all────┘      └──stop_reading / EOF─────┘
/// ```
///
/// `release_all` returns to `Idle` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    PortAcquired,
    Reading,
}

impl SessionState {
    /// Whether acquiring a device is currently allowed.
    pub fn can_acquire(self) -> bool {
        self == SessionState::Idle
    }

    /// Whether reading can be started.
    pub fn can_start(self) -> bool {
        self == SessionState::PortAcquired
    }

    /// Whether there is reading to stop.
    pub fn can_stop(self) -> bool {
        self == SessionState::Reading
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::PortAcquired => write!(f, "port acquired"),
            Self::Reading => write!(f, "reading"),
        }
    }
}

/// Point-in-time view of a session for presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub state: SessionState,
    /// Name of the acquired port, if any.
    pub port_name: Option<String>,
    pub baud_rate: u32,
    /// Retained received chunks in arrival order.
    pub chunks: Vec<ReceivedChunk>,
    /// Chunks dropped by a bounded accumulator.
    pub evicted_chunks: u64,
    /// Poll ticks completed so far.
    pub ticks: u64,
}

impl SessionStatus {
    /// All retained text, concatenated.
    pub fn text(&self) -> String {
        self.chunks.iter().map(|chunk| chunk.text.as_str()).collect()
    }
}
