//! Received-text store.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// One chunk of decoded text as it arrived from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedChunk {
    /// Position in the stream of chunks, starting at 0. Never reused.
    pub seq: u64,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    chunks: VecDeque<ReceivedChunk>,
    limit: Option<usize>,
    next_seq: u64,
    evicted: u64,
}

/// Ordered, append-only sequence of received text chunks.
///
/// Clones share the same storage: the session's poll tick appends, any number
/// of readers take snapshots. Unbounded unless created with
/// [`Accumulator::bounded`], in which case the oldest chunks are evicted.
///
/// Only the session writes; consumers get read access.
///
/// ```compile_fail
/// let acc = serial_session::Accumulator::new();
/// acc.append("injected".to_string());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    inner: Arc<RwLock<Inner>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_chunks` chunks (minimum 1).
    pub fn bounded(max_chunks: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                limit: Some(max_chunks.max(1)),
                ..Inner::default()
            })),
        }
    }

    /// Add a chunk at the end. Called from the session's poll tick.
    pub(crate) fn append(&self, text: String) {
        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.chunks.push_back(ReceivedChunk {
            seq,
            text,
            received_at: Utc::now(),
        });

        if let Some(limit) = inner.limit {
            while inner.chunks.len() > limit {
                inner.chunks.pop_front();
                inner.evicted += 1;
            }
        }
    }

    /// All retained text, concatenated in arrival order.
    pub fn text(&self) -> String {
        self.inner
            .read()
            .chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect()
    }

    /// Copy of all retained chunks.
    pub fn snapshot(&self) -> Vec<ReceivedChunk> {
        self.inner.read().chunks.iter().cloned().collect()
    }

    /// Retained chunks with `seq >= from`, for consumers that render
    /// incrementally.
    pub fn chunks_since(&self, from: u64) -> Vec<ReceivedChunk> {
        self.inner
            .read()
            .chunks
            .iter()
            .filter(|chunk| chunk.seq >= from)
            .cloned()
            .collect()
    }

    /// Number of retained chunks.
    pub fn len(&self) -> usize {
        self.inner.read().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().chunks.is_empty()
    }

    /// Sequence number the next chunk will get.
    pub fn next_seq(&self) -> u64 {
        self.inner.read().next_seq
    }

    /// Chunks dropped to stay within the bound.
    pub fn evicted(&self) -> u64 {
        self.inner.read().evicted
    }
}
