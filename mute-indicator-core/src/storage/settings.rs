use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::models::device::DeviceSelection;
use crate::models::error::MonitorError;
use crate::traits::settings_store::SettingsStore;

/// Default settings file, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Persisted user settings.
///
/// Serialized as `{"SelectedDeviceId": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(rename = "SelectedDeviceId", default)]
    pub selected_device_id: Option<String>,
}

impl AppSettings {
    pub fn from_selection(selection: &DeviceSelection) -> Self {
        Self {
            selected_device_id: Some(selection.as_id().to_string()),
        }
    }

    pub fn selection(&self) -> DeviceSelection {
        DeviceSelection::from_id(self.selected_device_id.as_deref())
    }
}

/// JSON settings file.
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonSettingsFile {
    fn default() -> Self {
        Self::new(DEFAULT_SETTINGS_FILE)
    }
}

impl SettingsStore for JsonSettingsFile {
    fn load(&self) -> Result<AppSettings, MonitorError> {
        if !self.path.exists() {
            return Ok(AppSettings::default());
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| MonitorError::SettingsFailed(format!("failed to read settings: {}", e)))?;
        let settings: Option<AppSettings> = serde_json::from_str(&json)
            .map_err(|e| MonitorError::SettingsFailed(format!("failed to parse settings: {}", e)))?;
        Ok(settings.unwrap_or_default())
    }

    fn save(&self, settings: &AppSettings) -> Result<(), MonitorError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                MonitorError::SettingsFailed(format!("failed to create settings directory: {}", e))
            })?;
        }
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| MonitorError::SettingsFailed(format!("failed to serialize settings: {}", e)))?;
        fs::write(&self.path, json)
            .map_err(|e| MonitorError::SettingsFailed(format!("failed to write settings: {}", e)))?;
        Ok(())
    }
}

/// Settings kept in memory only.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<AppSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    pub fn snapshot(&self) -> AppSettings {
        self.settings.lock().clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<AppSettings, MonitorError> {
        Ok(self.snapshot())
    }

    fn save(&self, settings: &AppSettings) -> Result<(), MonitorError> {
        *self.settings.lock() = settings.clone();
        Ok(())
    }
}

/// The current device selection plus the store it is persisted to.
///
/// Written only by the selection command and the not-found fallback; read
/// by device resolution on any thread. Readers may briefly see the
/// previous selection.
pub struct SettingsContext {
    selection: RwLock<DeviceSelection>,
    store: Box<dyn SettingsStore>,
}

impl SettingsContext {
    /// Load the persisted selection. Any load failure silently yields
    /// `SystemDefault`.
    pub fn load(store: Box<dyn SettingsStore>) -> Self {
        let selection = match store.load() {
            Ok(settings) => settings.selection(),
            Err(e) => {
                log::debug!("Using default device selection: {}", e);
                DeviceSelection::SystemDefault
            }
        };
        Self {
            selection: RwLock::new(selection),
            store,
        }
    }

    pub fn selection(&self) -> DeviceSelection {
        self.selection.read().clone()
    }

    /// Select a device and persist the choice. The in-memory selection is
    /// updated even if persisting fails.
    pub fn select(&self, selection: DeviceSelection) -> Result<(), MonitorError> {
        let settings = AppSettings::from_selection(&selection);
        *self.selection.write() = selection;
        self.store.save(&settings)
    }

    /// Follow the system default for this run without touching the
    /// persisted choice, so a pinned device is tried again next start.
    pub fn fall_back_to_default(&self) {
        *self.selection.write() = DeviceSelection::SystemDefault;
    }
}
