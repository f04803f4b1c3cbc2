use crate::models::config::LightingColor;
use crate::models::error::MonitorError;

/// Lighting hardware used as the mute indicator.
///
/// Implemented by:
/// - `LogitechLighting` (Windows, Logitech LED SDK)
pub trait LightingDevice: Send + Sync {
    /// Connect to the lighting engine. Failure at process start is fatal.
    fn init(&self) -> Result<(), MonitorError>;

    /// Set every zone to `color`. The driver may drop colour state over
    /// time, so callers re-assert periodically.
    fn set_color(&self, color: LightingColor) -> Result<(), MonitorError>;

    /// Hand the lighting back to whatever it showed before we took over.
    fn restore(&self) -> Result<(), MonitorError>;

    /// Disconnect from the lighting engine.
    fn shutdown(&self);
}
