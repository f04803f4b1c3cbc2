use std::sync::Arc;

use crate::models::device::AudioDevice;
use crate::models::error::MonitorError;

/// Callback invoked when a PCM buffer is available.
///
/// The slice holds interleaved signed 16-bit little-endian samples at the
/// device's native rate. Fires on the provider's real-time audio thread.
pub type PcmBufferCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Callback invoked when a running stream dies (device invalidated, driver
/// error). Fires at most once per `start`, on the audio thread.
pub type CaptureFailureCallback = Arc<dyn Fn(MonitorError) + Send + Sync + 'static>;

/// Callbacks handed to a provider on `start`.
#[derive(Clone)]
pub struct CaptureCallbacks {
    pub on_buffer: PcmBufferCallback,
    pub on_failure: CaptureFailureCallback,
}

/// Interface for platform-specific microphone capture.
///
/// Implemented by:
/// - `WasapiMicCapture` (Windows)
pub trait CaptureProvider: Send {
    /// Open a stream on `device` and begin delivering buffers.
    ///
    /// Returns once the stream is running or failed to open. Callbacks fire
    /// on a dedicated audio thread, so keep processing minimal.
    fn start(&mut self, device: &AudioDevice, callbacks: CaptureCallbacks) -> Result<(), MonitorError>;

    /// Halt the stream and release the device. Must be safe to call when
    /// nothing is running.
    fn stop(&mut self) -> Result<(), MonitorError>;

    /// Whether a stream is currently open.
    fn is_capturing(&self) -> bool;
}
