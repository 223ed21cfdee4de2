//! Fixed-cadence polling.
//!
//! Ticks never overlap: the pull for a tick is awaited before the next tick
//! is considered, and ticks that elapse meanwhile are skipped rather than
//! queued. Two pulls can therefore never race for the same reader.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Shortest interval accepted by the scheduler.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Longest interval accepted by the scheduler. Keeps deadlines representable.
const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Spawns repeating pulls.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollScheduler;

impl PollScheduler {
    /// Run `pull` every `interval` until cancelled or until it returns
    /// `ControlFlow::Break`.
    ///
    /// The first tick fires one interval after scheduling. Intervals are
    /// clamped to the range 1 ms to 24 h.
    pub fn schedule<F, Fut>(interval: Duration, mut pull: F) -> PollHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let period = interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        let (cancel_tx, mut cancelled) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));
        let tick_count = Arc::clone(&ticks);

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.wait_for(|c| *c) => break,
                    _ = timer.tick() => {}
                }

                let flow = pull().await;
                tick_count.fetch_add(1, Ordering::Relaxed);
                if flow.is_break() {
                    break;
                }
            }
            debug!("Poll loop stopped");
        });

        PollHandle {
            cancel_tx,
            task: Some(task),
            ticks,
        }
    }
}

/// Handle to a scheduled poll loop.
///
/// Dropping the handle stops future ticks just like [`PollHandle::cancel`].
pub struct PollHandle {
    cancel_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl PollHandle {
    /// Stop future ticks. An in-flight pull is allowed to finish.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Number of ticks whose pull has completed.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Whether the poll loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait for the poll loop to exit, including any in-flight
    /// pull.
    pub async fn join(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!("Poll task ended abnormally: {}", e);
            }
        }
    }

    /// Cancel and abort the poll loop without waiting, interrupting any
    /// in-flight pull.
    pub fn abort(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("ticks", &self.ticks())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_ticks_repeatedly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = PollScheduler::schedule(Duration::from_millis(5), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.join().await;
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_slow_pull_suppresses_overlapping_ticks() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let (a, b) = (Arc::clone(&in_flight), Arc::clone(&max_in_flight));

        let handle = PollScheduler::schedule(Duration::from_millis(2), move || {
            let (in_flight, max_in_flight) = (Arc::clone(&a), Arc::clone(&b));
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.join().await;

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_break_stops_loop() {
        let handle = PollScheduler::schedule(Duration::from_millis(2), || async {
            ControlFlow::Break(())
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
        assert_eq!(handle.ticks(), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_stops_ticks() {
        let handle = PollScheduler::schedule(Duration::from_millis(2), || async {
            ControlFlow::Continue(())
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.cancel();
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let settled = handle.ticks();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(handle.is_cancelled());
        assert!(handle.is_finished());
        assert_eq!(handle.ticks(), settled);
    }

    #[tokio::test]
    async fn test_oversized_interval_is_clamped() {
        let handle = PollScheduler::schedule(Duration::MAX, || async {
            ControlFlow::Continue(())
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished(), "poll loop died");
        assert_eq!(handle.ticks(), 0);

        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("join hung");
    }

    #[tokio::test]
    async fn test_cancel_lets_in_flight_pull_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&finished);
        let handle = PollScheduler::schedule(Duration::from_millis(1), move || {
            let done = Arc::clone(&done);
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                done.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.join().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
