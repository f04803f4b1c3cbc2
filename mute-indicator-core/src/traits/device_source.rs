use crate::models::device::AudioDevice;
use crate::models::error::MonitorError;

/// Live query over the OS capture-device topology.
///
/// Implementations report raw endpoints; `is_default` flags are derived by
/// `DeviceCatalog`, so they may be left `false` here.
pub trait DeviceSource: Send + Sync {
    /// Active capture-capable endpoints.
    fn active_capture_devices(&self) -> Result<Vec<AudioDevice>, MonitorError>;

    /// The endpoint the OS currently designates as default for capture, if any.
    fn default_capture_device(&self) -> Result<Option<AudioDevice>, MonitorError>;
}
