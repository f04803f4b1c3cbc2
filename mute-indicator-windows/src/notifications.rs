//! Device change notifications via `IMMNotificationClient`.

use std::sync::Arc;

use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Foundation::*;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, EDataFlow, ERole, IMMDeviceEnumerator, IMMNotificationClient,
    IMMNotificationClient_Impl, DEVICE_STATE, DEVICE_STATE_ACTIVE, DEVICE_STATE_DISABLED,
    DEVICE_STATE_UNPLUGGED,
};
use windows::Win32::UI::Shell::PropertiesSystem::*;
use windows_core::implement;

use mute_indicator_core::models::device::DeviceState;
use mute_indicator_core::models::error::MonitorError;
use mute_indicator_core::traits::device_events::{DeviceChangeListener, DeviceEventSource};

use crate::com::ComGuard;
use crate::device_enumerator::create_enumerator;

/// COM callback object that forwards endpoint events to a listener.
///
/// Only capture-flow, console-role default changes are forwarded; the
/// other roles fire alongside and would trigger redundant reconnects.
#[implement(IMMNotificationClient)]
struct NotificationClient {
    listener: Arc<dyn DeviceChangeListener>,
}

fn convert_state(state: DEVICE_STATE) -> DeviceState {
    match state {
        DEVICE_STATE_ACTIVE => DeviceState::Active,
        DEVICE_STATE_DISABLED => DeviceState::Disabled,
        DEVICE_STATE_UNPLUGGED => DeviceState::Unplugged,
        _ => DeviceState::NotPresent,
    }
}

unsafe fn read_id(id: &PCWSTR) -> Option<String> {
    if id.is_null() {
        None
    } else {
        id.to_string().ok()
    }
}

impl IMMNotificationClient_Impl for NotificationClient_Impl {
    fn OnDeviceStateChanged(&self, pwstrdeviceid: &PCWSTR, dwnewstate: DEVICE_STATE) -> windows::core::Result<()> {
        if let Some(id) = unsafe { read_id(pwstrdeviceid) } {
            self.listener.on_device_state_changed(&id, convert_state(dwnewstate));
        }
        Ok(())
    }

    fn OnDeviceAdded(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        if let Some(id) = unsafe { read_id(pwstrdeviceid) } {
            self.listener.on_device_added(&id);
        }
        Ok(())
    }

    fn OnDeviceRemoved(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        if let Some(id) = unsafe { read_id(pwstrdeviceid) } {
            self.listener.on_device_removed(&id);
        }
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        flow: EDataFlow,
        role: ERole,
        pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        if flow != eCapture || role != eConsole {
            return Ok(());
        }
        let id = unsafe { read_id(pwstrdefaultdeviceid) };
        self.listener.on_default_device_changed(id.as_deref());
        Ok(())
    }

    fn OnPropertyValueChanged(&self, _pwstrdeviceid: &PCWSTR, _key: &PROPERTYKEY) -> windows::core::Result<()> {
        Ok(())
    }
}

struct Registration {
    enumerator: IMMDeviceEnumerator,
    client: IMMNotificationClient,
}

// SAFETY: both interfaces are created in the multithreaded apartment, where
// COM allows calls from any thread.
unsafe impl Send for Registration {}

/// `DeviceEventSource` backed by `RegisterEndpointNotificationCallback`.
///
/// Callbacks arrive on an OS-owned thread. The registering thread must stay
/// in the multithreaded apartment while the registration is live.
#[derive(Default)]
pub struct WasapiNotificationSource {
    registration: Mutex<Option<Registration>>,
}

impl WasapiNotificationSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn release(registration: Registration) -> Result<(), MonitorError> {
        unsafe {
            registration
                .enumerator
                .UnregisterEndpointNotificationCallback(&registration.client)
                .map_err(|e| MonitorError::RegistrationFailed(format!("unregister failed: {}", e)))
        }
    }
}

impl DeviceEventSource for WasapiNotificationSource {
    fn register(&self, listener: Arc<dyn DeviceChangeListener>) -> Result<(), MonitorError> {
        let _com = ComGuard::enter()?;
        let mut registration = self.registration.lock();
        if let Some(previous) = registration.take() {
            Self::release(previous)?;
        }

        let enumerator = create_enumerator()?;
        let client: IMMNotificationClient = NotificationClient { listener }.into();
        unsafe {
            enumerator
                .RegisterEndpointNotificationCallback(&client)
                .map_err(|e| MonitorError::RegistrationFailed(e.to_string()))?;
        }

        *registration = Some(Registration { enumerator, client });
        Ok(())
    }

    fn unregister(&self) -> Result<(), MonitorError> {
        let _com = ComGuard::enter()?;
        match self.registration.lock().take() {
            Some(registration) => Self::release(registration),
            None => Ok(()),
        }
    }
}

impl Drop for WasapiNotificationSource {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.get_mut().take() {
            if let Err(e) = Self::release(registration) {
                log::warn!("{}", e);
            }
        }
    }
}
