use crate::models::device::AudioDevice;

/// Outbound notifications from a `DeviceMonitor`.
///
/// Methods are called from the audio-event dispatch thread, the reconnect
/// thread or the OS notification thread, never from the UI thread.
/// Implementations should marshal to the UI thread if needed.
pub trait MonitorDelegate: Send + Sync {
    /// Called whenever the set of capture devices may have changed.
    fn on_device_list_changed(&self, devices: &[AudioDevice]);

    /// Called once when the microphone becomes muted.
    fn on_muted(&self);

    /// Called once when the microphone becomes live again.
    fn on_unmuted(&self);
}
