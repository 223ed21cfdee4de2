//! Decode pipeline between a device's raw byte channel and text consumers.
//!
//! Attaching a pipeline locks the device's readable channel and spawns a
//! piping task that reads raw bytes, decodes them with a
//! [`Utf8StreamDecoder`] and hands the text to a bounded channel. Consumers
//! pull one chunk at a time; the bounded channel keeps the piping task from
//! running ahead of them.
//!
//! ```text
//! device.readable ──> piping task (decode) ──> chunk channel ──> pull()
//! ```
//!
//! Teardown order matters: the reader is released first, then the piping
//! task's completion is awaited. Awaiting first could wait forever on a
//! piping task blocked handing a chunk to a reader nobody pulls from.

pub mod decoder;

pub use decoder::Utf8StreamDecoder;

use crate::port::{DeviceHandle, PortError, ReadableChannel};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// Decoded chunks buffered ahead of the consumer.
const CHUNK_CHANNEL_CAPACITY: usize = 4;

/// Result of a single pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pulled {
    /// Decoded text.
    Chunk(String),
    /// A read completed without producing text, e.g. half of a multi-byte
    /// character.
    Empty,
    /// The byte stream is exhausted. Reported exactly once.
    Ended,
}

struct ChunkReader {
    chunks: mpsc::Receiver<String>,
    ended: bool,
}

/// A live decode pipeline attached to one device.
pub struct DecodePipeline {
    device_name: String,
    reader: Mutex<Option<ChunkReader>>,
    cancel_tx: watch::Sender<bool>,
    completion: parking_lot::Mutex<Option<JoinHandle<Result<(), PortError>>>>,
}

impl DecodePipeline {
    /// Lock `device`'s readable channel and start decoding it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - `PortError::NotOpen` if the device is closed
    /// - `PortError::ChannelLocked` if another pipeline holds the channel
    pub fn attach(device: &Arc<DeviceHandle>) -> Result<Self, PortError> {
        let channel = device.readable()?;
        let buffer_size = device.config().buffer_size.max(1);
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let completion = tokio::spawn(pipe(channel, chunk_tx, cancel_rx, buffer_size));
        debug!("Attached decode pipeline to {}", device.name());

        Ok(Self {
            device_name: device.name().to_string(),
            reader: Mutex::new(Some(ChunkReader {
                chunks: chunk_rx,
                ended: false,
            })),
            cancel_tx,
            completion: parking_lot::Mutex::new(Some(completion)),
        })
    }

    /// Name of the device this pipeline reads from.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Wait for the next decoded chunk.
    ///
    /// Concurrent pulls are serialized. A pending pull returns
    /// [`Pulled::Ended`] as soon as the pipeline is cancelled.
    ///
    /// # Errors
    ///
    /// `PortError::ReaderReleased` once `Ended` has been reported or the
    /// pipeline has been detached.
    pub async fn pull(&self) -> Result<Pulled, PortError> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(PortError::ReaderReleased)?;
        if reader.ended {
            return Err(PortError::ReaderReleased);
        }

        let mut cancelled = self.cancel_tx.subscribe();
        let next = tokio::select! {
            biased;
            _ = cancelled.wait_for(|c| *c) => None,
            chunk = reader.chunks.recv() => chunk,
        };

        Ok(match next {
            Some(text) if text.is_empty() => Pulled::Empty,
            Some(text) => Pulled::Chunk(text),
            None => {
                reader.ended = true;
                Pulled::Ended
            }
        })
    }

    /// Request early termination. Safe to call while a pull is pending.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Release the reader, then wait for the piping task to settle.
    ///
    /// Errors reported by the piping task are expected here (cancelling the
    /// reader is what stops it) and are only logged. Calling `detach` more
    /// than once is harmless.
    pub async fn detach(&self) {
        self.cancel();
        // Reader first, then completion.
        drop(self.reader.lock().await.take());

        let completion = self.completion.lock().take();
        if let Some(completion) = completion {
            match completion.await {
                Ok(Ok(())) => debug!("Decode pipeline for {} finished", self.device_name),
                Ok(Err(e)) => debug!(
                    "Decode pipeline for {} ended during teardown: {}",
                    self.device_name, e
                ),
                Err(e) => debug!(
                    "Decode pipeline task for {} did not complete: {}",
                    self.device_name, e
                ),
            }
        }
    }
}

impl Drop for DecodePipeline {
    fn drop(&mut self) {
        // Without a detach the piping task still owns the channel lock.
        self.cancel();
    }
}

impl std::fmt::Debug for DecodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodePipeline")
            .field("device", &self.device_name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Piping task: raw bytes in, decoded text out.
///
/// Ends with `Ok` at end of stream or when the device is closed, and with an
/// error when cancelled, when the reader goes away, or on a read failure. The
/// channel lock is released when the task returns.
async fn pipe(
    mut channel: ReadableChannel,
    chunks: mpsc::Sender<String>,
    mut cancelled: watch::Receiver<bool>,
    buffer_size: usize,
) -> Result<(), PortError> {
    let device = Arc::clone(channel.device());
    let mut decoder = Utf8StreamDecoder::new();
    let mut buf = vec![0u8; buffer_size];

    loop {
        let read = tokio::select! {
            biased;
            _ = cancelled.wait_for(|c| *c) => return Err(PortError::Cancelled),
            _ = device.closed() => 0,
            read = channel.read(&mut buf) => read?,
        };

        let (text, done) = if read == 0 {
            (decoder.finish(), true)
        } else {
            (decoder.decode(&buf[..read]), false)
        };

        if !(done && text.is_empty()) {
            tokio::select! {
                biased;
                _ = cancelled.wait_for(|c| *c) => return Err(PortError::Cancelled),
                sent = chunks.send(text) => sent.map_err(|_| PortError::ReaderReleased)?,
            }
        }

        if done {
            return Ok(());
        }
    }
}
