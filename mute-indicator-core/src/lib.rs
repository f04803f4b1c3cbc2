//! # mute-indicator-core
//!
//! Platform-agnostic microphone mute detection.
//!
//! Watches a capture device, classifies each PCM buffer as muted or live and
//! drives a lighting indicator while the microphone is muted. Device loss,
//! hot-plug and default-device changes are handled by a background reconnect
//! loop. Platform backends (Windows WASAPI, Logitech LED) implement the traits
//! in `traits/` and plug into the generic `DeviceMonitor`.
//!
//! ## Architecture
//!
//! ```text
//! mute-indicator-core (this crate)
//! ├── traits/       ← DeviceSource, CaptureProvider, DeviceEventSource, LightingDevice, MonitorDelegate, SettingsStore
//! ├── models/       ← MonitorError, AudioDevice, DeviceSelection, CaptureState, MuteState, MonitorConfig
//! ├── processing/   ← PCM aggregation, MuteDetector
//! ├── session/      ← DeviceMonitor (orchestrator), CaptureSession, ReconnectSupervisor, IndicatorDriver
//! └── storage/      ← AppSettings, JsonSettingsFile, SettingsContext
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{LightingColor, MonitorConfig};
pub use models::device::{AudioDevice, DeviceSelection, DeviceState, SYSTEM_DEFAULT_ID};
pub use models::diagnostics::MonitorDiagnostics;
pub use models::error::MonitorError;
pub use models::state::{CaptureState, MuteState};
pub use processing::aggregate::pcm16_mean;
pub use processing::mute_detector::MuteDetector;
pub use session::channel_delegate::{ChannelDelegate, MonitorEvent};
pub use session::monitor::{DeviceMonitor, MonitorBackend};
pub use storage::settings::{AppSettings, JsonSettingsFile, MemorySettingsStore, SettingsContext};
pub use traits::capture_provider::{CaptureCallbacks, CaptureFailureCallback, CaptureProvider, PcmBufferCallback};
pub use traits::device_events::{DeviceChangeListener, DeviceEventSource};
pub use traits::device_source::DeviceSource;
pub use traits::lighting::LightingDevice;
pub use traits::monitor_delegate::MonitorDelegate;
pub use traits::settings_store::SettingsStore;
