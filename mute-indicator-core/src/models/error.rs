use thiserror::Error;

/// Errors produced by the device monitor and its platform backends.
///
/// None of these reach an interactive user; callers either retry
/// (reconnect loop) or log and continue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("device not found for selection: {selection}")]
    DeviceNotFound { selection: String },

    #[error("device enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("capture already running")]
    CaptureAlreadyRunning,

    #[error("lighting driver failed: {0}")]
    IndicatorFailed(String),

    #[error("lighting driver unavailable: {0}")]
    IndicatorUnavailable(String),

    #[error("settings error: {0}")]
    SettingsFailed(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("device notification registration failed: {0}")]
    RegistrationFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
