//! Per-thread COM apartment scope.

use std::marker::PhantomData;

use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use mute_indicator_core::models::error::MonitorError;

/// Joins the multithreaded apartment for the lifetime of the guard.
///
/// A thread already in a single-threaded apartment is tolerated: COM is
/// usable there, and the guard leaves it alone on drop.
pub struct ComGuard {
    initialized: bool,
    // COM initialization is per thread.
    _not_send: PhantomData<*const ()>,
}

impl ComGuard {
    pub fn enter() -> Result<Self, MonitorError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_ok() {
            return Ok(Self {
                initialized: true,
                _not_send: PhantomData,
            });
        }
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self {
                initialized: false,
                _not_send: PhantomData,
            });
        }
        Err(MonitorError::Unknown(format!("CoInitializeEx failed: {:?}", hr)))
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}
