//! Session controller.
//!
//! A [`SessionController`] owns everything a reading session needs: the
//! acquired device, the decode pipeline attached to it, the poll loop that
//! drains the pipeline and the accumulator the loop writes to. All mutable
//! session state lives here; presentation layers only call the four
//! operations and read [`SessionController::state`] and
//! [`SessionController::accumulator`].
//!
//! # Teardown order
//!
//! Stopping always runs in the same order: cancel the poll handle, cancel and
//! detach the pipeline (reader released before the piping task is awaited),
//! then wait for the poll loop to exit. Errors on the way are logged, never
//! returned.

use crate::accumulator::Accumulator;
use crate::config::Config;
use crate::error::{SessionError, SessionResult};
use crate::pipeline::{DecodePipeline, Pulled};
use crate::port::{CloseSummary, DeviceHandle, DeviceHost, PortConfiguration};
use crate::scheduler::{PollHandle, PollScheduler};
use crate::state::{SessionState, SessionStatus};
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default cadence of the poll loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Configuration passed through to the device on open.
    pub port: PortConfiguration,
    /// Time between pulls.
    pub poll_interval: Duration,
    /// Bound on retained chunks; `None` keeps everything.
    pub max_chunks: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            port: PortConfiguration::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_chunks: None,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: config.serial.port_configuration(),
            poll_interval: config.polling.interval(),
            max_chunks: config.accumulator.max_chunks,
        }
    }
}

#[derive(Default)]
struct SessionCore {
    state: SessionState,
    device: Option<Arc<DeviceHandle>>,
    pipeline: Option<Arc<DecodePipeline>>,
    poll: Option<PollHandle>,
}

/// State shared between the controller and its poll loop.
struct Shared {
    id: Uuid,
    core: Mutex<SessionCore>,
    accumulator: Accumulator,
    state_tx: watch::Sender<SessionState>,
    /// Completed poll ticks over the session's lifetime.
    ticks: AtomicU64,
}

impl Shared {
    fn set_state(&self, core: &mut SessionCore, state: SessionState) {
        if core.state != state {
            debug!("Session {}: {} -> {}", self.id, core.state, state);
            core.state = state;
            self.state_tx.send_replace(state);
        }
    }

    /// One poll tick: pull a chunk and store it, or wind down on end of stream.
    async fn tick(&self, pipeline: &Arc<DecodePipeline>) -> ControlFlow<()> {
        let pulled = pipeline.pull().await;
        self.ticks.fetch_add(1, Ordering::Relaxed);
        match pulled {
            Ok(Pulled::Chunk(text)) => {
                self.accumulator.append(text);
                ControlFlow::Continue(())
            }
            Ok(Pulled::Empty) => ControlFlow::Continue(()),
            Ok(Pulled::Ended) => {
                self.finish_stream(pipeline).await;
                ControlFlow::Break(())
            }
            Err(e) => {
                debug!("Session {}: reader unavailable: {}", self.id, e);
                self.finish_stream(pipeline).await;
                ControlFlow::Break(())
            }
        }
    }

    /// Leave `Reading` after the stream ended on its own.
    ///
    /// Does nothing if `pipeline` is no longer the session's current one,
    /// i.e. a stop already took it.
    async fn finish_stream(&self, pipeline: &Arc<DecodePipeline>) {
        let owned = {
            let mut core = self.core.lock();
            let current = core
                .pipeline
                .as_ref()
                .is_some_and(|p| Arc::ptr_eq(p, pipeline));
            if current {
                core.pipeline = None;
                // This loop is the one running us; it exits once we return.
                drop(core.poll.take());
                self.set_state(&mut core, SessionState::PortAcquired);
            }
            current
        };

        if owned {
            info!(
                "Session {}: stream from {} ended",
                self.id,
                pipeline.device_name()
            );
            pipeline.detach().await;
        }
    }
}

/// Orchestrates one device, its decode pipeline and the poll loop.
pub struct SessionController {
    host: Arc<DeviceHost>,
    options: SessionOptions,
    shared: Arc<Shared>,
    /// Serializes the public operations.
    ops: tokio::sync::Mutex<()>,
}

impl SessionController {
    pub fn new(host: Arc<DeviceHost>, options: SessionOptions) -> Self {
        let accumulator = match options.max_chunks {
            Some(max_chunks) => Accumulator::bounded(max_chunks),
            None => Accumulator::new(),
        };
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            host,
            options,
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                core: Mutex::new(SessionCore::default()),
                accumulator,
                state_tx,
                ticks: AtomicU64::new(0),
            }),
            ops: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Host the session acquires devices from.
    pub fn host(&self) -> &Arc<DeviceHost> {
        &self.host
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        self.shared.core.lock().state
    }

    /// Watch state changes, e.g. to enable and disable controls.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Resolves once the session is no longer reading, whether through
    /// `stop_reading`, `release_all` or the end of the stream. Resolves
    /// immediately if it is not reading now.
    pub async fn reading_finished(&self) {
        let mut states = self.subscribe();
        // The sender lives in `self`, so this cannot fail while borrowed.
        let _ = states
            .wait_for(|state| *state != SessionState::Reading)
            .await;
    }

    /// Text received so far. Read-only for consumers; only the poll tick
    /// appends.
    pub fn accumulator(&self) -> &Accumulator {
        &self.shared.accumulator
    }

    /// Poll ticks completed since the session was created.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    /// Whether a poll loop is registered and still running.
    pub fn is_polling(&self) -> bool {
        self.shared
            .core
            .lock()
            .poll
            .as_ref()
            .is_some_and(|poll| !poll.is_finished())
    }

    /// Name of the acquired port, if any.
    pub fn port_name(&self) -> Option<String> {
        self.shared
            .core
            .lock()
            .device
            .as_ref()
            .map(|device| device.name().to_string())
    }

    pub fn status(&self) -> SessionStatus {
        let (state, port_name) = {
            let core = self.shared.core.lock();
            (
                core.state,
                core.device.as_ref().map(|device| device.name().to_string()),
            )
        };

        SessionStatus {
            id: self.shared.id,
            state,
            port_name,
            baud_rate: self.options.port.baud_rate,
            chunks: self.shared.accumulator.snapshot(),
            evicted_chunks: self.shared.accumulator.evicted(),
            ticks: self.ticks(),
        }
    }

    /// Acquire a device and attach a decode pipeline to it.
    ///
    /// Only acts in `Idle`; in any other state this is a no-op.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoDeviceCapability` if the host has no serial support
    /// - `SessionError::OpenFailed` if selection was cancelled or the open failed
    ///
    /// The session stays `Idle` on error.
    pub async fn acquire(&self) -> SessionResult<()> {
        let _op = self.ops.lock().await;
        let state = self.state();
        if !state.can_acquire() {
            debug!("Session {}: acquire ignored while {}", self.id(), state);
            return Ok(());
        }

        let device = match self.host.acquire(&self.options.port).await {
            Ok(device) => device,
            Err(e) => {
                info!("Session {}: acquire failed: {}", self.id(), e);
                return Err(e);
            }
        };

        let pipeline = match DecodePipeline::attach(&device) {
            Ok(pipeline) => Arc::new(pipeline),
            Err(e) => {
                device.close().await;
                return Err(SessionError::OpenFailed(e));
            }
        };

        info!("Session {}: acquired {}", self.id(), device.name());
        let mut core = self.shared.core.lock();
        core.device = Some(device);
        core.pipeline = Some(pipeline);
        self.shared.set_state(&mut core, SessionState::PortAcquired);
        Ok(())
    }

    /// Start polling the acquired device.
    ///
    /// Only acts in `PortAcquired`; in any other state this is a no-op. A
    /// fresh pipeline is attached if the previous one was torn down by a
    /// stop or by the end of its stream.
    ///
    /// # Errors
    ///
    /// `SessionError::Port` if a new pipeline cannot be attached, e.g.
    /// because the device was closed underneath the session. The session
    /// stays `PortAcquired`.
    pub async fn start_reading(&self) -> SessionResult<()> {
        let _op = self.ops.lock().await;
        let (device, pipeline) = {
            let core = self.shared.core.lock();
            if !core.state.can_start() {
                debug!("Session {}: start ignored while {}", self.id(), core.state);
                return Ok(());
            }
            (core.device.clone(), core.pipeline.clone())
        };
        let Some(device) = device else {
            return Ok(());
        };

        let pipeline = match pipeline {
            Some(pipeline) => pipeline,
            None => Arc::new(DecodePipeline::attach(&device)?),
        };

        let tick_shared = Arc::clone(&self.shared);
        let tick_pipeline = Arc::clone(&pipeline);
        let mut core = self.shared.core.lock();
        // Scheduled under the lock so the first tick sees the new pipeline.
        core.poll = Some(PollScheduler::schedule(
            self.options.poll_interval,
            move || {
                let shared = Arc::clone(&tick_shared);
                let pipeline = Arc::clone(&tick_pipeline);
                async move { shared.tick(&pipeline).await }
            },
        ));
        core.pipeline = Some(pipeline);
        self.shared.set_state(&mut core, SessionState::Reading);
        info!(
            "Session {}: reading {} every {:?}",
            self.id(),
            device.name(),
            self.options.poll_interval
        );
        Ok(())
    }

    /// Stop polling and release the pipeline. The device stays open so
    /// reading can resume without acquiring again.
    ///
    /// Always succeeds; a no-op when nothing is reading.
    pub async fn stop_reading(&self) {
        let _op = self.ops.lock().await;
        self.teardown_reading().await;
    }

    /// Stop everything, drop the session's device and close every device
    /// the host has open.
    ///
    /// Close failures are logged and counted in the returned summary.
    pub async fn release_all(&self) -> CloseSummary {
        let _op = self.ops.lock().await;
        self.teardown_reading().await;

        let device = {
            let mut core = self.shared.core.lock();
            self.shared.set_state(&mut core, SessionState::Idle);
            core.device.take()
        };
        if let Some(device) = &device {
            debug!("Session {}: releasing {}", self.id(), device.name());
        }

        let summary = self.host.close_all().await;
        info!(
            "Session {}: released {} device(s), {} close error(s)",
            self.id(),
            summary.attempted,
            summary.failed
        );
        summary
    }

    async fn teardown_reading(&self) {
        let (poll, pipeline) = {
            let mut core = self.shared.core.lock();
            let poll = core.poll.take();
            let pipeline = core.pipeline.take();
            if core.state.can_stop() {
                self.shared.set_state(&mut core, SessionState::PortAcquired);
            }
            (poll, pipeline)
        };

        if poll.is_none() && pipeline.is_none() {
            return;
        }

        if let Some(poll) = &poll {
            poll.cancel();
        }
        if let Some(pipeline) = pipeline {
            pipeline.cancel();
            pipeline.detach().await;
        }
        if let Some(poll) = poll {
            poll.join().await;
        }
        debug!("Session {}: reading stopped", self.id());
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let (poll, pipeline, device) = {
            let mut core = self.shared.core.lock();
            (core.poll.take(), core.pipeline.take(), core.device.take())
        };

        if let Some(poll) = poll {
            poll.abort();
        }
        if let Some(pipeline) = pipeline {
            pipeline.cancel();
        }

        let Some(device) = device else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Session {}: closing {} on drop", self.shared.id, device.name());
                runtime.spawn(async move { device.close().await });
            }
            Err(_) => warn!(
                "Session {} dropped outside a runtime; {} is left open",
                self.shared.id,
                device.name()
            ),
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("options", &self.options)
            .finish()
    }
}
