use std::time::Duration;

/// Default drift threshold between consecutive buffer means.
pub const DEFAULT_MUTE_EPSILON: f32 = 1e-4;

/// An indicator colour. Channels are percentages (0..=100), the unit the
/// Logitech LED SDK takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightingColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl LightingColor {
    pub const RED: Self = Self::new(100, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Configuration for a device monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Two consecutive buffer means closer than this classify as muted (default: 1e-4).
    pub mute_epsilon: f32,

    /// Wait between resolving a device and opening its stream (default: 100 ms).
    pub settle_delay: Duration,

    /// Wait between failed reconnect attempts (default: 1000 ms).
    pub retry_interval: Duration,

    /// Cadence at which the alert colour is re-asserted while muted (default: 1000 ms).
    pub indicator_refresh_interval: Duration,

    /// Colour shown while muted (default: red).
    pub alert_color: LightingColor,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.mute_epsilon.is_finite() || self.mute_epsilon <= 0.0 {
            return Err(format!("mute epsilon must be positive: {}", self.mute_epsilon));
        }
        if self.retry_interval.is_zero() {
            return Err("retry interval must be non-zero".into());
        }
        if self.indicator_refresh_interval.is_zero() {
            return Err("indicator refresh interval must be non-zero".into());
        }
        let LightingColor { red, green, blue } = self.alert_color;
        if red > 100 || green > 100 || blue > 100 {
            return Err(format!(
                "alert colour channels are percentages, got ({}, {}, {})",
                red, green, blue
            ));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mute_epsilon: DEFAULT_MUTE_EPSILON,
            settle_delay: Duration::from_millis(100),
            retry_interval: Duration::from_millis(1000),
            indicator_refresh_interval: Duration::from_millis(1000),
            alert_color: LightingColor::RED,
        }
    }
}
