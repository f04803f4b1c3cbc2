//! In-memory platform backends for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::config::LightingColor;
use crate::models::device::{AudioDevice, DeviceState};
use crate::models::error::MonitorError;
use crate::traits::capture_provider::{CaptureCallbacks, CaptureProvider};
use crate::traits::device_events::{DeviceChangeListener, DeviceEventSource};
use crate::traits::device_source::DeviceSource;
use crate::traits::lighting::LightingDevice;

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

// MARK: - Devices

#[derive(Default)]
struct DeviceTable {
    devices: Vec<AudioDevice>,
    default_id: Option<String>,
    fail: bool,
}

pub struct FakeDeviceSource {
    table: Mutex<DeviceTable>,
}

impl FakeDeviceSource {
    /// The first device, if any, starts out as the default.
    pub fn with_devices(devices: &[(&str, &str)]) -> Arc<Self> {
        let table = DeviceTable {
            devices: devices
                .iter()
                .map(|(id, name)| AudioDevice::new(*id, *name))
                .collect(),
            default_id: devices.first().map(|(id, _)| id.to_string()),
            fail: false,
        };
        Arc::new(Self {
            table: Mutex::new(table),
        })
    }

    pub fn add(&self, id: &str, name: &str) {
        self.table.lock().devices.push(AudioDevice::new(id, name));
    }

    pub fn remove(&self, id: &str) {
        let mut table = self.table.lock();
        table.devices.retain(|d| d.id != id);
        if table.default_id.as_deref() == Some(id) {
            table.default_id = None;
        }
    }

    pub fn set_default(&self, id: Option<&str>) {
        self.table.lock().default_id = id.map(str::to_string);
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.table.lock().fail = fail;
    }
}

impl DeviceSource for FakeDeviceSource {
    fn active_capture_devices(&self) -> Result<Vec<AudioDevice>, MonitorError> {
        let table = self.table.lock();
        if table.fail {
            return Err(MonitorError::EnumerationFailed("enumerator unavailable".into()));
        }
        Ok(table.devices.clone())
    }

    fn default_capture_device(&self) -> Result<Option<AudioDevice>, MonitorError> {
        let table = self.table.lock();
        if table.fail {
            return Err(MonitorError::EnumerationFailed("enumerator unavailable".into()));
        }
        let Some(default_id) = table.default_id.as_deref() else {
            return Ok(None);
        };
        Ok(table.devices.iter().find(|d| d.id == default_id).cloned())
    }
}

// MARK: - Capture

#[derive(Default)]
struct CaptureShared {
    callbacks: Option<CaptureCallbacks>,
    device: Option<String>,
    running: bool,
    open_streams: usize,
    max_open_streams: usize,
    start_count: usize,
    stop_count: usize,
    fail_next_start: bool,
    die_during_next_start: bool,
    fail_stop: bool,
}

/// Capture provider driven by the test. Clones share state, so a test keeps
/// one handle while the session owns another.
#[derive(Clone, Default)]
pub struct FakeCapture {
    shared: Arc<Mutex<CaptureShared>>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started_device(&self) -> Option<String> {
        self.shared.lock().device.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn start_count(&self) -> usize {
        self.shared.lock().start_count
    }

    pub fn stop_count(&self) -> usize {
        self.shared.lock().stop_count
    }

    /// Most streams ever open at once.
    pub fn max_concurrent_streams(&self) -> usize {
        self.shared.lock().max_open_streams
    }

    pub fn fail_next_start(&self, fail: bool) {
        self.shared.lock().fail_next_start = fail;
    }

    /// Make the next successful start report a stream failure before it
    /// returns, the way a device yanked mid-open does.
    pub fn die_during_next_start(&self, die: bool) {
        self.shared.lock().die_during_next_start = die;
    }

    pub fn fail_stop(&self, fail: bool) {
        self.shared.lock().fail_stop = fail;
    }

    /// Deliver one buffer through the callbacks of the most recent start,
    /// whether or not that stream has since been stopped.
    pub fn push_samples(&self, samples: &[i16]) {
        let callbacks = self.shared.lock().callbacks.clone();
        if let Some(callbacks) = callbacks {
            let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
            (callbacks.on_buffer)(&pcm);
        }
    }

    /// Deliver a buffer of `frames` identical samples whose mean is `level`.
    pub fn push_level(&self, level: f32, frames: usize) {
        let sample = (level * 32768.0) as i16;
        self.push_samples(&vec![sample; frames]);
    }

    /// Simulate the stream dying underneath the provider.
    pub fn fail_stream(&self, message: &str) {
        let callbacks = {
            let mut shared = self.shared.lock();
            if shared.running {
                shared.running = false;
                shared.open_streams -= 1;
            }
            shared.callbacks.clone()
        };
        if let Some(callbacks) = callbacks {
            (callbacks.on_failure)(MonitorError::CaptureFailed(message.to_string()));
        }
    }
}

impl CaptureProvider for FakeCapture {
    fn start(&mut self, device: &AudioDevice, callbacks: CaptureCallbacks) -> Result<(), MonitorError> {
        let mut shared = self.shared.lock();
        shared.start_count += 1;

        if shared.fail_next_start {
            shared.fail_next_start = false;
            return Err(MonitorError::CaptureFailed("device busy".into()));
        }
        if shared.running {
            shared.max_open_streams = shared.max_open_streams.max(shared.open_streams + 1);
            return Err(MonitorError::CaptureAlreadyRunning);
        }

        shared.running = true;
        shared.open_streams += 1;
        shared.max_open_streams = shared.max_open_streams.max(shared.open_streams);
        shared.device = Some(device.id.clone());
        shared.callbacks = Some(callbacks.clone());

        if shared.die_during_next_start {
            shared.die_during_next_start = false;
            shared.running = false;
            shared.open_streams -= 1;
            drop(shared);
            (callbacks.on_failure)(MonitorError::CaptureFailed("device lost while opening".into()));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MonitorError> {
        let mut shared = self.shared.lock();
        shared.stop_count += 1;
        if shared.running {
            shared.running = false;
            shared.open_streams -= 1;
        }
        if shared.fail_stop {
            return Err(MonitorError::CaptureFailed("stop failed".into()));
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.shared.lock().running
    }
}

// MARK: - Device events

#[derive(Default)]
pub struct FakeEventSource {
    listener: Mutex<Option<Arc<dyn DeviceChangeListener>>>,
    fail_register: AtomicBool,
}

impl FakeEventSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn is_registered(&self) -> bool {
        self.listener.lock().is_some()
    }

    fn listener(&self) -> Option<Arc<dyn DeviceChangeListener>> {
        self.listener.lock().clone()
    }

    pub fn fire_added(&self, id: &str) {
        if let Some(listener) = self.listener() {
            listener.on_device_added(id);
        }
    }

    pub fn fire_removed(&self, id: &str) {
        if let Some(listener) = self.listener() {
            listener.on_device_removed(id);
        }
    }

    pub fn fire_state_changed(&self, id: &str, state: DeviceState) {
        if let Some(listener) = self.listener() {
            listener.on_device_state_changed(id, state);
        }
    }

    pub fn fire_default_changed(&self, id: Option<&str>) {
        if let Some(listener) = self.listener() {
            listener.on_default_device_changed(id);
        }
    }
}

impl DeviceEventSource for FakeEventSource {
    fn register(&self, listener: Arc<dyn DeviceChangeListener>) -> Result<(), MonitorError> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(MonitorError::RegistrationFailed("callback rejected".into()));
        }
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn unregister(&self) -> Result<(), MonitorError> {
        self.listener.lock().take();
        Ok(())
    }
}

// MARK: - Lighting

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightingCall {
    Init,
    SetColor(LightingColor),
    Restore,
    Shutdown,
}

/// Records every call, including ones configured to fail.
#[derive(Default)]
pub struct FakeLighting {
    calls: Mutex<Vec<LightingCall>>,
    fail_set_color: AtomicBool,
    fail_restore: AtomicBool,
}

impl FakeLighting {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<LightingCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &LightingCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn fail_set_color(&self, fail: bool) {
        self.fail_set_color.store(fail, Ordering::SeqCst);
    }

    pub fn fail_restore(&self, fail: bool) {
        self.fail_restore.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: LightingCall, fail: &AtomicBool) -> Result<(), MonitorError> {
        self.calls.lock().push(call);
        if fail.load(Ordering::SeqCst) {
            return Err(MonitorError::IndicatorFailed("hardware not responding".into()));
        }
        Ok(())
    }
}

impl LightingDevice for FakeLighting {
    fn init(&self) -> Result<(), MonitorError> {
        self.calls.lock().push(LightingCall::Init);
        Ok(())
    }

    fn set_color(&self, color: LightingColor) -> Result<(), MonitorError> {
        self.record(LightingCall::SetColor(color), &self.fail_set_color)
    }

    fn restore(&self) -> Result<(), MonitorError> {
        self.record(LightingCall::Restore, &self.fail_restore)
    }

    fn shutdown(&self) {
        self.calls.lock().push(LightingCall::Shutdown);
    }
}
