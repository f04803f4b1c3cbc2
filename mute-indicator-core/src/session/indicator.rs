use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::LightingColor;
use crate::models::error::MonitorError;
use crate::session::cancel::CancelToken;
use crate::traits::lighting::LightingDevice;

struct RefreshWorker {
    cancel: CancelToken,
    handle: thread::JoinHandle<()>,
}

impl RefreshWorker {
    fn stop(self) {
        self.cancel.cancel();
        if self.handle.join().is_err() {
            log::error!("Indicator refresh thread panicked");
        }
    }
}

/// Decrements the live-worker count when a refresh thread exits, even by panic.
struct LiveWorker(Arc<AtomicUsize>);

impl LiveWorker {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives the lighting hardware from mute transitions.
///
/// While muted, a background worker re-asserts the alert colour every
/// `interval`. Transitions are serialized under one lock: the previous
/// worker is always cancelled and joined before new state is asserted, so
/// at most one worker is ever alive.
pub struct IndicatorDriver {
    lighting: Arc<dyn LightingDevice>,
    color: LightingColor,
    interval: Duration,
    worker: Mutex<Option<RefreshWorker>>,
    live_workers: Arc<AtomicUsize>,
}

impl IndicatorDriver {
    pub fn new(lighting: Arc<dyn LightingDevice>, color: LightingColor, interval: Duration) -> Self {
        Self {
            lighting,
            color,
            interval,
            worker: Mutex::new(None),
            live_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start the alert-colour refresh loop.
    pub fn on_muted(&self) -> Result<(), MonitorError> {
        let mut worker = self.worker.lock();
        if let Some(previous) = worker.take() {
            previous.stop();
        }

        let cancel = CancelToken::new();
        let lighting = Arc::clone(&self.lighting);
        let live_workers = Arc::clone(&self.live_workers);
        let color = self.color;
        let interval = self.interval;
        let worker_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name("indicator-refresh".into())
            .spawn(move || {
                let _live = LiveWorker::enter(&live_workers);
                loop {
                    if let Err(e) = lighting.set_color(color) {
                        log::warn!("Failed to set indicator colour: {}", e);
                    }
                    if worker_cancel.wait_timeout(interval) {
                        break;
                    }
                }
            })
            .map_err(|e| MonitorError::Unknown(format!("failed to spawn indicator thread: {}", e)))?;

        log::info!("Making lighting {:?}", color);
        *worker = Some(RefreshWorker { cancel, handle });
        Ok(())
    }

    /// Stop the refresh loop, wait for it to exit, then restore the lighting
    /// exactly once.
    pub fn on_unmuted(&self) {
        let mut worker = self.worker.lock();
        if let Some(previous) = worker.take() {
            previous.stop();
        }

        log::info!("Restoring lighting");
        if let Err(e) = self.lighting.restore() {
            log::warn!("Failed to restore lighting: {}", e);
        }
    }

    /// Restore the lighting if the alert loop is running.
    pub fn shutdown(&self) {
        if self.is_active() {
            self.on_unmuted();
        }
    }

    pub fn is_active(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Number of refresh threads currently alive.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }
}

impl Drop for IndicatorDriver {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.stop();
        }
    }
}
