use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::device::AudioDevice;
use crate::models::error::MonitorError;
use crate::session::cancel::CancelToken;

/// What the reconnect loop drives.
pub trait ReconnectTarget: Send + Sync {
    /// Close whatever stream is open before retrying.
    fn teardown(&self);

    /// Resolve the device that should be captured right now.
    fn resolve(&self) -> Result<AudioDevice, MonitorError>;

    /// Open a stream on `device`.
    fn connect(&self, device: &AudioDevice) -> Result<(), MonitorError>;
}

#[derive(Default)]
struct LoopStats {
    loops_started: AtomicU64,
    attempts: AtomicU64,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

/// Loop bookkeeping, read and written under one lock so that a request
/// arriving while a loop winds down is never lost.
#[derive(Default)]
struct LoopFlags {
    in_flight: bool,
    rerun: bool,
}

/// Snapshot of supervisor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectStats {
    pub loops_started: u64,
    pub attempts: u64,
    pub peak_concurrent_loops: usize,
}

/// Restarts capture after device loss.
///
/// At most one loop runs at a time. A request made while a loop is running
/// starts no new loop; it marks the running one, which tears down and
/// connects once more after its current connect succeeds.
/// The loop never gives up on its own; only `shutdown` ends it early.
pub struct ReconnectSupervisor {
    settle_delay: Duration,
    retry_interval: Duration,
    flags: Arc<Mutex<LoopFlags>>,
    shutdown: CancelToken,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    stats: Arc<LoopStats>,
}

impl ReconnectSupervisor {
    pub fn new(settle_delay: Duration, retry_interval: Duration) -> Self {
        Self {
            settle_delay,
            retry_interval,
            flags: Arc::new(Mutex::new(LoopFlags::default())),
            shutdown: CancelToken::new(),
            handle: Mutex::new(None),
            stats: Arc::new(LoopStats::default()),
        }
    }

    /// Start a reconnect loop against `target`, or fold the request into the
    /// loop already running.
    ///
    /// Returns `true` if a new loop was started.
    pub fn request(&self, target: Arc<dyn ReconnectTarget>) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        {
            let mut flags = self.flags.lock();
            if flags.in_flight {
                flags.rerun = true;
                log::debug!("Reconnect already in progress, another pass queued");
                return false;
            }
            flags.in_flight = true;
            flags.rerun = false;
        }

        let flags = Arc::clone(&self.flags);
        let shutdown = self.shutdown.clone();
        let stats = Arc::clone(&self.stats);
        let settle_delay = self.settle_delay;
        let retry_interval = self.retry_interval;

        let spawned = thread::Builder::new()
            .name("reconnect-supervisor".into())
            .spawn(move || {
                Self::run_loop(target.as_ref(), &flags, &shutdown, &stats, settle_delay, retry_interval);
            });

        match spawned {
            Ok(handle) => {
                // The previous loop already cleared the in-flight flag, so it
                // has finished or is about to.
                *self.handle.lock() = Some(handle);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn reconnect thread: {}", e);
                self.flags.lock().in_flight = false;
                false
            }
        }
    }

    fn run_loop(
        target: &dyn ReconnectTarget,
        flags: &Mutex<LoopFlags>,
        shutdown: &CancelToken,
        stats: &LoopStats,
        settle_delay: Duration,
        retry_interval: Duration,
    ) {
        let active = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_active.fetch_max(active, Ordering::SeqCst);
        stats.loops_started.fetch_add(1, Ordering::SeqCst);

        log::info!("Reconnecting capture");
        loop {
            target.teardown();
            let connected =
                Self::connect_with_retry(target, flags, shutdown, stats, settle_delay, retry_interval);

            let mut state = flags.lock();
            if connected && state.rerun && !shutdown.is_cancelled() {
                drop(state);
                log::info!("Reconnect requested during the last pass, reconnecting again");
                continue;
            }
            state.in_flight = false;
            state.rerun = false;
            stats.active.fetch_sub(1, Ordering::SeqCst);
            return;
        }
    }

    /// Resolve and connect until a connect succeeds or the loop is cancelled.
    ///
    /// Returns `true` on a successful connect.
    fn connect_with_retry(
        target: &dyn ReconnectTarget,
        flags: &Mutex<LoopFlags>,
        shutdown: &CancelToken,
        stats: &LoopStats,
        settle_delay: Duration,
        retry_interval: Duration,
    ) -> bool {
        while !shutdown.is_cancelled() {
            stats.attempts.fetch_add(1, Ordering::SeqCst);
            // Requests made before this resolve are covered by it.
            flags.lock().rerun = false;

            match target.resolve() {
                Ok(device) => {
                    if shutdown.wait_timeout(settle_delay) {
                        return false;
                    }
                    match target.connect(&device) {
                        Ok(()) => {
                            log::info!("Reconnected to {}", device.name);
                            return true;
                        }
                        Err(e) => log::warn!("Reconnect to {} failed: {}", device.name, e),
                    }
                }
                Err(e) => log::debug!("Mic not found: {}", e),
            }

            if shutdown.wait_timeout(retry_interval) {
                return false;
            }
        }
        false
    }

    pub fn is_reconnecting(&self) -> bool {
        self.flags.lock().in_flight
    }

    pub fn stats(&self) -> ReconnectStats {
        ReconnectStats {
            loops_started: self.stats.loops_started.load(Ordering::SeqCst),
            attempts: self.stats.attempts.load(Ordering::SeqCst),
            peak_concurrent_loops: self.stats.peak_active.load(Ordering::SeqCst),
        }
    }

    /// Cancel any running loop and wait for it. Later requests are refused.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Reconnect thread panicked");
            }
        }
    }
}

impl Drop for ReconnectSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
