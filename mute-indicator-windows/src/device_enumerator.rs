//! Capture endpoint enumeration via the MMDevice API.

use windows::core::*;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Foundation::ERROR_NOT_FOUND;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use mute_indicator_core::models::device::AudioDevice;
use mute_indicator_core::models::error::MonitorError;
use mute_indicator_core::traits::device_source::DeviceSource;

use crate::com::ComGuard;

/// `DeviceSource` over `IMMDeviceEnumerator`.
///
/// Queries are answered from live OS state on the calling thread; no COM
/// object outlives a call, so the source can be shared across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiDeviceSource;

impl WasapiDeviceSource {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceSource for WasapiDeviceSource {
    fn active_capture_devices(&self) -> std::result::Result<Vec<AudioDevice>, MonitorError> {
        let _com = ComGuard::enter()?;
        let enumerator = create_enumerator()?;

        unsafe {
            let collection = enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .map_err(|e| enumeration_error("EnumAudioEndpoints", e))?;
            let count = collection
                .GetCount()
                .map_err(|e| enumeration_error("GetCount", e))?;

            let mut devices = Vec::with_capacity(count as usize);
            for i in 0..count {
                // Devices can vanish between GetCount and Item.
                let Ok(device) = collection.Item(i) else { continue };
                if let Some(device) = describe(&device) {
                    devices.push(device);
                }
            }
            Ok(devices)
        }
    }

    fn default_capture_device(&self) -> std::result::Result<Option<AudioDevice>, MonitorError> {
        let _com = ComGuard::enter()?;
        let enumerator = create_enumerator()?;

        unsafe {
            match enumerator.GetDefaultAudioEndpoint(eCapture, eConsole) {
                Ok(device) => Ok(describe(&device)),
                Err(e) if e.code() == ERROR_NOT_FOUND.to_hresult() => Ok(None),
                Err(e) => Err(enumeration_error("GetDefaultAudioEndpoint", e)),
            }
        }
    }
}

pub(crate) fn create_enumerator() -> std::result::Result<IMMDeviceEnumerator, MonitorError> {
    unsafe {
        CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| enumeration_error("failed to create enumerator", e))
    }
}

fn enumeration_error(context: &str, error: Error) -> MonitorError {
    MonitorError::EnumerationFailed(format!("{}: {}", context, error))
}

/// Id and friendly name of an endpoint. `None` if the id cannot be read.
fn describe(device: &IMMDevice) -> Option<AudioDevice> {
    let id = device_id(device)?;
    let name = friendly_name(device).unwrap_or_else(|| id.clone());
    Some(AudioDevice::new(id, name))
}

pub(crate) fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let raw = device.GetId().ok()?;
        let id = raw.to_string().ok();
        CoTaskMemFree(Some(raw.0 as *const _));
        id
    }
}

/// Read PKEY_Device_FriendlyName from the endpoint's property store.
fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        let name = value.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}
