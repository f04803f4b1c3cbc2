use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cancellation signal shared between a background loop and its owner.
///
/// Loops sleep through `wait_timeout`, which wakes immediately on
/// `cancel()`, so joining a cancelled loop never waits out a full interval.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (cancelled, condvar) = &*self.inner;
        *cancelled.lock() = true;
        condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `timeout` or until cancelled. Returns `true` if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (cancelled, condvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut guard = cancelled.lock();
        while !*guard {
            if condvar.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        *guard
    }
}
