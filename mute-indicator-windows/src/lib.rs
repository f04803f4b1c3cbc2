//! # mute-indicator-windows
//!
//! Windows backend for the microphone mute indicator.
//!
//! Provides:
//! - `WasapiDeviceSource`: Capture endpoint enumeration via the MMDevice API
//! - `WasapiMicCapture`: 16-bit PCM microphone capture via WASAPI shared mode
//! - `WasapiNotificationSource`: Hot-plug and default-device events via `IMMNotificationClient`
//! - `LogitechLighting`: Keyboard/mouse lighting via the Logitech LED SDK
//!
//! ## Platform Requirements
//! - Windows 10+
//! - Logitech G HUB (provides `LogitechLedEnginesWrapper.dll`)
//!
//! ## Usage
//! ```ignore
//! use mute_indicator_core::{ChannelDelegate, DeviceMonitor, MonitorBackend, MonitorConfig};
//! use mute_indicator_windows::{LogitechLighting, WasapiDeviceSource, WasapiMicCapture, WasapiNotificationSource};
//!
//! let backend = MonitorBackend {
//!     devices: Arc::new(WasapiDeviceSource::new()),
//!     capture: Box::new(WasapiMicCapture::new()),
//!     events: Arc::new(WasapiNotificationSource::new()),
//!     lighting: Arc::new(LogitechLighting::new()),
//! };
//! let (delegate, events) = ChannelDelegate::new();
//! let monitor = DeviceMonitor::new(backend, settings, delegate, MonitorConfig::default())?;
//! monitor.begin_capture();
//! ```

#[cfg(target_os = "windows")]
pub mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod logitech;
#[cfg(target_os = "windows")]
pub mod notifications;
#[cfg(target_os = "windows")]
pub mod wasapi_mic;

#[cfg(target_os = "windows")]
pub use com::ComGuard;
#[cfg(target_os = "windows")]
pub use device_enumerator::WasapiDeviceSource;
#[cfg(target_os = "windows")]
pub use logitech::LogitechLighting;
#[cfg(target_os = "windows")]
pub use notifications::WasapiNotificationSource;
#[cfg(target_os = "windows")]
pub use wasapi_mic::WasapiMicCapture;
