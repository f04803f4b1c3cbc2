use std::fmt;

use serde::{Deserialize, Serialize};

/// Persisted identifier meaning "follow the OS default capture device".
pub const SYSTEM_DEFAULT_ID: &str = "SystemDefault";

/// A capture endpoint as seen at enumeration time.
///
/// Snapshots are produced fresh on every enumeration and never mutated;
/// two snapshots describe the same endpoint iff their `id`s match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_default: false,
        }
    }
}

/// Which microphone the monitor should follow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DeviceSelection {
    /// Track whatever the OS currently designates as the default capture device.
    #[default]
    SystemDefault,
    /// A pinned endpoint id.
    Device(String),
}

impl DeviceSelection {
    /// Parse a persisted id. `None`, the empty string and the sentinel all
    /// map to `SystemDefault`.
    pub fn from_id(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            None | Some("") | Some(SYSTEM_DEFAULT_ID) => Self::SystemDefault,
            Some(id) => Self::Device(id.to_string()),
        }
    }

    /// The id to persist for this selection.
    pub fn as_id(&self) -> &str {
        match self {
            Self::SystemDefault => SYSTEM_DEFAULT_ID,
            Self::Device(id) => id,
        }
    }

    pub fn is_system_default(&self) -> bool {
        matches!(self, Self::SystemDefault)
    }
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_id())
    }
}

/// Endpoint state reported by OS device-change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Present and enabled
    Active,
    /// Disabled in the sound control panel
    Disabled,
    /// Driver reports the device as not present
    NotPresent,
    /// Jack-detected device with nothing plugged in
    Unplugged,
}

impl DeviceState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}
