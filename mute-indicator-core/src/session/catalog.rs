use std::sync::Arc;

use crate::models::device::{AudioDevice, DeviceSelection};
use crate::models::error::MonitorError;
use crate::storage::settings::SettingsContext;
use crate::traits::device_source::DeviceSource;

/// Enumerates capture devices and resolves a selection to a concrete one.
///
/// Pure queries over live OS state; nothing here is cached.
pub struct DeviceCatalog {
    source: Arc<dyn DeviceSource>,
    settings: Arc<SettingsContext>,
}

impl DeviceCatalog {
    pub fn new(source: Arc<dyn DeviceSource>, settings: Arc<SettingsContext>) -> Self {
        Self { source, settings }
    }

    /// Active capture devices, with the OS default flagged.
    pub fn list_devices(&self) -> Result<Vec<AudioDevice>, MonitorError> {
        let default_id = self.source.default_capture_device()?.map(|d| d.id);
        let devices = self
            .source
            .active_capture_devices()?
            .into_iter()
            .map(|mut device| {
                device.is_default = default_id.as_deref() == Some(device.id.as_str());
                device
            })
            .collect();
        Ok(devices)
    }

    /// Resolve `selection` against the live device set.
    pub fn resolve(&self, selection: &DeviceSelection) -> Result<AudioDevice, MonitorError> {
        let not_found = || MonitorError::DeviceNotFound {
            selection: selection.to_string(),
        };

        match selection {
            DeviceSelection::SystemDefault => {
                let mut device = self.source.default_capture_device()?.ok_or_else(not_found)?;
                device.is_default = true;
                Ok(device)
            }
            DeviceSelection::Device(id) => self
                .list_devices()?
                .into_iter()
                .find(|device| &device.id == id)
                .ok_or_else(not_found),
        }
    }

    /// Resolve whatever is currently selected in settings.
    pub fn resolve_selected(&self) -> Result<AudioDevice, MonitorError> {
        self.resolve(&self.settings.selection())
    }

    pub fn settings(&self) -> &SettingsContext {
        &self.settings
    }
}
