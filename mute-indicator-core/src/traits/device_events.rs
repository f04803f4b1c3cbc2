use std::sync::Arc;

use crate::models::device::DeviceState;
use crate::models::error::MonitorError;

/// Receiver of OS device-topology notifications.
///
/// Called on whatever thread the OS delivers notifications on, so
/// implementations must not block for long.
pub trait DeviceChangeListener: Send + Sync {
    fn on_device_added(&self, device_id: &str);

    fn on_device_removed(&self, device_id: &str);

    fn on_device_state_changed(&self, device_id: &str, new_state: DeviceState);

    /// `device_id` is `None` when the last capture endpoint went away.
    fn on_default_device_changed(&self, device_id: Option<&str>);
}

/// Source of device-topology notifications.
///
/// At most one listener is registered at a time.
pub trait DeviceEventSource: Send + Sync {
    fn register(&self, listener: Arc<dyn DeviceChangeListener>) -> Result<(), MonitorError>;

    /// Detach the current listener. A no-op when nothing is registered.
    fn unregister(&self) -> Result<(), MonitorError>;
}
