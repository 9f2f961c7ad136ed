//! # Refill Scheduler
//!
//! Background thread that refills every registered bucket at a fixed period.
//!
//! ```text
//!     ┌─────────┐   start()   ┌─────────┐
//!     │ Stopped │ ──────────► │ Running │ ──► every period: registry.refill_all()
//!     │         │ ◄────────── │         │
//!     └─────────┘   stop()    └─────────┘
//! ```
//!
//! The scheduler owns an `Arc` to the registry it was built with; nothing is
//! global. A single worker thread performs the firings, so two firings never
//! overlap. If a firing overruns the period, the missed ticks are skipped
//! rather than replayed back to back.

use super::registry::BucketRegistry;
use crate::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name given to the worker thread.
const THREAD_NAME: &str = "tierbucket-refill";

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No worker thread; no firings happen.
    Stopped,
    /// Worker thread is firing at the configured period.
    Running,
}

struct Worker {
    handle: thread::JoinHandle<()>,
    stop_tx: mpsc::Sender<()>,
}

/// Periodic refill driver for a [`BucketRegistry`].
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tierbucket::{BucketRegistry, RefillScheduler, Tier};
///
/// let registry = Arc::new(BucketRegistry::new());
/// registry.register_or_upgrade("alice", Tier::Free);
///
/// let mut scheduler = RefillScheduler::with_period(registry.clone(), Duration::from_secs(5))?;
/// scheduler.start()?;
/// assert!(scheduler.is_running());
///
/// scheduler.stop();
/// assert!(!scheduler.is_running());
/// # Ok::<(), tierbucket::Error>(())
/// ```
pub struct RefillScheduler {
    registry: Arc<BucketRegistry>,
    period: Duration,
    worker: Option<Worker>,
    ticks: Arc<AtomicU64>,
}

impl RefillScheduler {
    /// Creates a stopped scheduler using the registry's configured interval.
    pub fn new(registry: Arc<BucketRegistry>) -> Self {
        let period = Duration::from_millis(registry.config().refill_interval_ms);
        Self {
            registry,
            period,
            worker: None,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a stopped scheduler with an explicit period.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if `period` is zero.
    pub fn with_period(registry: Arc<BucketRegistry>, period: Duration) -> Result<Self, Error> {
        if period.is_zero() {
            return Err(Error::InvalidConfig("refill period must be greater than 0"));
        }
        let mut scheduler = Self::new(registry);
        scheduler.period = period;
        Ok(scheduler)
    }

    /// Spawns the worker thread and moves to [`SchedulerState::Running`].
    ///
    /// The first firing happens one period after this call.
    ///
    /// # Errors
    ///
    /// - [`Error::SchedulerRunning`] if already running.
    /// - [`Error::Spawn`] if the OS refuses to create the thread.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.worker.is_some() {
            return Err(Error::SchedulerRunning);
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let registry = self.registry.clone();
        let ticks = self.ticks.clone();
        let period = self.period;

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(registry, ticks, period, stop_rx))?;

        self.worker = Some(Worker { handle, stop_tx });
        Ok(())
    }

    /// Cancels future firings and waits for an in-flight firing to finish.
    ///
    /// No-op when already stopped.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        // The worker may already be gone; a closed channel stops it just as well
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            warn!("Refill thread panicked before shutdown");
        }
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> SchedulerState {
        if self.worker.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// True while the worker thread is active.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Interval between firings.
    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Firings performed so far, manual ones included.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Performs one firing on the calling thread. Returns buckets refilled.
    ///
    /// Safe to call while the worker is running: refills are atomic per
    /// bucket and clamp at capacity, so an extra firing only credits early.
    pub fn tick_now(&self) -> usize {
        fire(&self.registry, &self.ticks)
    }

    /// Registry this scheduler refills.
    pub fn registry(&self) -> &Arc<BucketRegistry> {
        &self.registry
    }
}

impl Drop for RefillScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RefillScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefillScheduler")
            .field("state", &self.state())
            .field("period", &self.period)
            .field("ticks", &self.ticks())
            .finish()
    }
}

fn fire(registry: &BucketRegistry, ticks: &AtomicU64) -> usize {
    let refilled = registry.refill_all();
    let tick = ticks.fetch_add(1, Ordering::AcqRel) + 1;
    debug!(tick, refilled, "refill tick");
    refilled
}

fn run(
    registry: Arc<BucketRegistry>,
    ticks: Arc<AtomicU64>,
    period: Duration,
    stop_rx: mpsc::Receiver<()>,
) {
    info!("Started refill scheduler (period: {}ms)", period.as_millis());

    let mut next = Instant::now() + period;
    loop {
        let wait = next.saturating_duration_since(Instant::now());
        match stop_rx.recv_timeout(wait) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("Refill scheduler stopping");
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                fire(&registry, &ticks);

                next += period;
                let now = Instant::now();
                if next <= now {
                    debug!("Refill tick overran its period, skipping missed ticks");
                    next = now + period;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tier;

    fn drained_registry() -> Arc<BucketRegistry> {
        let registry = Arc::new(BucketRegistry::new());
        registry.register_or_upgrade("alice", Tier::Free);
        registry.hit_api("alice");
        registry.hit_api("alice");
        registry
    }

    #[test]
    fn test_starts_stopped() {
        let scheduler = RefillScheduler::new(Arc::new(BucketRegistry::new()));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.period(), Duration::from_secs(5));
        assert_eq!(scheduler.ticks(), 0);
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = RefillScheduler::with_period(Arc::new(BucketRegistry::new()), Duration::ZERO);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_start_stop_transitions() {
        let mut scheduler =
            RefillScheduler::with_period(drained_registry(), Duration::from_secs(60)).unwrap();

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(scheduler.start(), Err(Error::SchedulerRunning)));

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        // Stopping twice is harmless, restarting works
        scheduler.stop();
        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        scheduler.stop();

        // Long period: nothing fired
        assert_eq!(scheduler.ticks(), 0);
    }

    #[test]
    fn test_tick_now() {
        let registry = drained_registry();
        let scheduler = RefillScheduler::new(registry.clone());

        assert_eq!(scheduler.tick_now(), 1);
        assert_eq!(registry.get_bucket("alice").unwrap().available(), 1);
        assert_eq!(scheduler.ticks(), 1);
    }

    #[test]
    fn test_background_refill() {
        let registry = drained_registry();
        let mut scheduler =
            RefillScheduler::with_period(registry.clone(), Duration::from_millis(20)).unwrap();

        scheduler.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        scheduler.stop();

        assert!(scheduler.ticks() >= 2);
        // Refilled to the FREE ceiling and no further
        assert_eq!(registry.get_bucket("alice").unwrap().available(), 2);
    }

    #[test]
    fn test_no_firings_after_stop() {
        let registry = drained_registry();
        let mut scheduler =
            RefillScheduler::with_period(registry.clone(), Duration::from_millis(10)).unwrap();

        scheduler.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        scheduler.stop();

        let ticks = scheduler.ticks();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(scheduler.ticks(), ticks);
    }

    #[test]
    fn test_drop_stops_worker() {
        let registry = drained_registry();
        let ticks = {
            let mut scheduler =
                RefillScheduler::with_period(registry.clone(), Duration::from_millis(10)).unwrap();
            scheduler.start().unwrap();
            thread::sleep(Duration::from_millis(30));
            scheduler.ticks.clone()
        };

        let after_drop = ticks.load(Ordering::Acquire);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::Acquire), after_drop);
        // Registry outlives the scheduler
        assert_eq!(Arc::strong_count(&registry), 1);
    }
}
