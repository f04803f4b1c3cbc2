use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::device::AudioDevice;
use crate::models::error::MonitorError;
use crate::models::state::CaptureState;
use crate::traits::capture_provider::{CaptureCallbacks, CaptureProvider};

/// Provider plus the liveness flag of the stream it is running.
/// Guarded as one critical section: only one start or stop at a time.
struct StreamSlot {
    provider: Box<dyn CaptureProvider>,
    live: Option<Arc<AtomicBool>>,
}

#[derive(Default)]
struct SessionStatus {
    state: CaptureState,
    device: Option<AudioDevice>,
}

/// Owns the single live capture stream.
///
/// Each `start` hands the provider callbacks gated by a fresh liveness flag.
/// `stop` clears the flag before halting the provider, so buffers delivered
/// late by the audio thread never reach the sink.
pub struct CaptureSession {
    slot: Mutex<StreamSlot>,
    status: Mutex<SessionStatus>,
    callbacks: CaptureCallbacks,
}

impl CaptureSession {
    pub fn new(provider: Box<dyn CaptureProvider>, callbacks: CaptureCallbacks) -> Self {
        Self {
            slot: Mutex::new(StreamSlot {
                provider,
                live: None,
            }),
            status: Mutex::new(SessionStatus::default()),
            callbacks,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.status.lock().state
    }

    /// The device being captured, if a stream is open.
    pub fn current_device(&self) -> Option<AudioDevice> {
        self.status.lock().device.clone()
    }

    pub fn is_capturing_device(&self, device_id: &str) -> bool {
        self.status
            .lock()
            .device
            .as_ref()
            .is_some_and(|d| d.id == device_id)
    }

    /// Open a stream on `device`. Transitions: any → capturing.
    ///
    /// A stream that is already open is torn down first. On failure the
    /// state is left as it was.
    pub fn start(&self, device: &AudioDevice) -> Result<(), MonitorError> {
        let mut slot = self.slot.lock();
        Self::teardown(&mut slot);

        let live = Arc::new(AtomicBool::new(true));
        let callbacks = self.gated_callbacks(&live);

        if let Err(e) = slot.provider.start(device, callbacks) {
            live.store(false, Ordering::SeqCst);
            // Some providers leave a half-open stream behind on failure.
            if let Err(stop_err) = slot.provider.stop() {
                log::warn!("Error releasing failed capture: {}", stop_err);
            }
            return Err(e);
        }

        slot.live = Some(live);
        {
            let mut status = self.status.lock();
            status.state = CaptureState::Capturing;
            status.device = Some(device.clone());
        }
        log::info!("Using mic: {}", device.name);
        Ok(())
    }

    /// Close the stream if one is open. Transitions: capturing → stopped.
    ///
    /// Idempotent. Provider errors are logged and swallowed.
    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        Self::teardown(&mut slot);

        let mut status = self.status.lock();
        if status.state.is_capturing() {
            status.state = CaptureState::Stopped;
        }
        status.device = None;
    }

    /// Close the stream and mark the session as waiting for its device.
    /// Transitions: any → reconnecting.
    pub fn begin_reconnect(&self) {
        let mut slot = self.slot.lock();
        Self::teardown(&mut slot);

        let mut status = self.status.lock();
        status.state = CaptureState::Reconnecting;
        status.device = None;
    }

    fn teardown(slot: &mut StreamSlot) {
        let Some(live) = slot.live.take() else {
            return;
        };
        live.store(false, Ordering::SeqCst);
        if let Err(e) = slot.provider.stop() {
            log::warn!("Error stopping capture: {}", e);
        }
    }

    fn gated_callbacks(&self, live: &Arc<AtomicBool>) -> CaptureCallbacks {
        let on_buffer = {
            let live = Arc::clone(live);
            let sink = Arc::clone(&self.callbacks.on_buffer);
            Arc::new(move |pcm: &[u8]| {
                if live.load(Ordering::Acquire) {
                    sink(pcm);
                }
            })
        };

        let on_failure = {
            let live = Arc::clone(live);
            let sink = Arc::clone(&self.callbacks.on_failure);
            Arc::new(move |error: MonitorError| {
                // First failure wins and silences the stream.
                if live.swap(false, Ordering::AcqRel) {
                    sink(error);
                }
            })
        };

        CaptureCallbacks {
            on_buffer,
            on_failure,
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        Self::teardown(self.slot.get_mut());
    }
}
