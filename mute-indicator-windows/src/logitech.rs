//! Logitech G LED SDK lighting driver.
//!
//! The SDK ships as `LogitechLedEnginesWrapper.dll` alongside Logitech G HUB.
//! It is loaded at runtime so the binary still starts (and reports a clear
//! error) on machines without it.

use parking_lot::Mutex;
use windows::core::{s, w, PCSTR};
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use mute_indicator_core::models::config::LightingColor;
use mute_indicator_core::models::error::MonitorError;
use mute_indicator_core::traits::lighting::LightingDevice;

type LogiLedInit = unsafe extern "C" fn() -> bool;
type LogiLedSaveCurrentLighting = unsafe extern "C" fn() -> bool;
type LogiLedSetLighting = unsafe extern "C" fn(i32, i32, i32) -> bool;
type LogiLedRestoreLighting = unsafe extern "C" fn() -> bool;
type LogiLedShutdown = unsafe extern "C" fn();

/// Entry points resolved from a loaded SDK module.
struct LedApi {
    module: HMODULE,
    save_current_lighting: LogiLedSaveCurrentLighting,
    set_lighting: LogiLedSetLighting,
    restore_lighting: LogiLedRestoreLighting,
    shutdown: LogiLedShutdown,
}

// SAFETY: the module handle is only used to free the library, and the SDK
// entry points are only called under the driver's mutex.
unsafe impl Send for LedApi {}

impl LedApi {
    fn load() -> Result<(Self, LogiLedInit), MonitorError> {
        unsafe {
            let module = LoadLibraryW(w!("LogitechLedEnginesWrapper.dll")).map_err(|e| {
                MonitorError::IndicatorUnavailable(format!("LogitechLedEnginesWrapper.dll: {}", e))
            })?;

            match Self::resolve(module) {
                Ok(resolved) => Ok(resolved),
                Err(e) => {
                    let _ = FreeLibrary(module);
                    Err(e)
                }
            }
        }
    }

    unsafe fn resolve(module: HMODULE) -> Result<(Self, LogiLedInit), MonitorError> {
        let init: LogiLedInit = std::mem::transmute(symbol(module, s!("LogiLedInit"))?);
        let api = Self {
            module,
            save_current_lighting: std::mem::transmute(symbol(module, s!("LogiLedSaveCurrentLighting"))?),
            set_lighting: std::mem::transmute(symbol(module, s!("LogiLedSetLighting"))?),
            restore_lighting: std::mem::transmute(symbol(module, s!("LogiLedRestoreLighting"))?),
            shutdown: std::mem::transmute(symbol(module, s!("LogiLedShutdown"))?),
        };
        Ok((api, init))
    }
}

unsafe fn symbol(module: HMODULE, name: PCSTR) -> Result<unsafe extern "system" fn() -> isize, MonitorError> {
    GetProcAddress(module, name).ok_or_else(|| {
        MonitorError::IndicatorUnavailable(format!(
            "missing export {}",
            name.to_string().unwrap_or_default()
        ))
    })
}

/// `LightingDevice` over the Logitech LED SDK.
///
/// All SDK calls are serialized behind one mutex.
#[derive(Default)]
pub struct LogitechLighting {
    api: Mutex<Option<LedApi>>,
}

impl LogitechLighting {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_api<T>(&self, f: impl FnOnce(&LedApi) -> Result<T, MonitorError>) -> Result<T, MonitorError> {
        match self.api.lock().as_ref() {
            Some(api) => f(api),
            None => Err(MonitorError::IndicatorUnavailable("LED SDK not initialized".into())),
        }
    }
}

impl LightingDevice for LogitechLighting {
    /// Load the SDK, connect to the lighting engine and snapshot the
    /// current lighting so `restore` can return to it.
    fn init(&self) -> Result<(), MonitorError> {
        let mut api = self.api.lock();
        if api.is_some() {
            return Ok(());
        }

        let (loaded, init) = LedApi::load()?;
        unsafe {
            if !init() {
                let _ = FreeLibrary(loaded.module);
                return Err(MonitorError::IndicatorUnavailable(
                    "LogiLedInit failed; is Logitech G HUB running?".into(),
                ));
            }
            if !(loaded.save_current_lighting)() {
                log::warn!("Failed to save current lighting");
            }
        }

        log::info!("Logitech LED SDK initialized");
        *api = Some(loaded);
        Ok(())
    }

    fn set_color(&self, color: LightingColor) -> Result<(), MonitorError> {
        self.with_api(|api| {
            let ok = unsafe {
                (api.set_lighting)(color.red.into(), color.green.into(), color.blue.into())
            };
            if ok {
                Ok(())
            } else {
                Err(MonitorError::IndicatorFailed("LogiLedSetLighting failed".into()))
            }
        })
    }

    fn restore(&self) -> Result<(), MonitorError> {
        self.with_api(|api| {
            if unsafe { (api.restore_lighting)() } {
                Ok(())
            } else {
                Err(MonitorError::IndicatorFailed("LogiLedRestoreLighting failed".into()))
            }
        })
    }

    fn shutdown(&self) {
        if let Some(api) = self.api.lock().take() {
            unsafe {
                (api.shutdown)();
                if let Err(e) = FreeLibrary(api.module) {
                    log::warn!("Failed to unload LED SDK: {}", e);
                }
            }
            log::info!("Logitech LED SDK shut down");
        }
    }
}

impl Drop for LogitechLighting {
    fn drop(&mut self) {
        self.shutdown();
    }
}
