use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::Mutex;

use crate::models::config::MonitorConfig;
use crate::models::device::{AudioDevice, DeviceSelection, DeviceState};
use crate::models::diagnostics::MonitorDiagnostics;
use crate::models::error::MonitorError;
use crate::models::state::{CaptureState, MuteState};
use crate::processing::aggregate::pcm16_mean;
use crate::processing::mute_detector::MuteDetector;
use crate::session::capture::CaptureSession;
use crate::session::catalog::DeviceCatalog;
use crate::session::indicator::IndicatorDriver;
use crate::session::reconnect::{ReconnectSupervisor, ReconnectTarget};
use crate::storage::settings::SettingsContext;
use crate::traits::capture_provider::{CaptureCallbacks, CaptureProvider};
use crate::traits::device_events::{DeviceChangeListener, DeviceEventSource};
use crate::traits::device_source::DeviceSource;
use crate::traits::lighting::LightingDevice;
use crate::traits::monitor_delegate::MonitorDelegate;

/// Platform pieces a monitor is assembled from.
pub struct MonitorBackend {
    pub devices: Arc<dyn DeviceSource>,
    pub capture: Box<dyn CaptureProvider>,
    pub events: Arc<dyn DeviceEventSource>,
    pub lighting: Arc<dyn LightingDevice>,
}

enum Dispatch {
    Transition(MuteState),
    Shutdown,
}

#[derive(Default)]
struct BufferCounters {
    buffers: AtomicU64,
    transitions: AtomicU64,
}

struct MonitorInner {
    catalog: DeviceCatalog,
    settings: Arc<SettingsContext>,
    session: CaptureSession,
    supervisor: ReconnectSupervisor,
    indicator: Arc<IndicatorDriver>,
    delegate: Arc<dyn MonitorDelegate>,
    detector: Arc<Mutex<MuteDetector>>,
    counters: Arc<BufferCounters>,
    dispatch: Sender<Dispatch>,
    this: Weak<MonitorInner>,
}

impl MonitorInner {
    fn request_reconnect(&self) {
        if let Some(this) = self.this.upgrade() {
            self.supervisor.request(this);
        }
    }

    fn publish_device_list(&self) {
        match self.catalog.list_devices() {
            Ok(devices) => self.delegate.on_device_list_changed(&devices),
            Err(e) => log::warn!("Failed to enumerate capture devices: {}", e),
        }
    }

    fn fall_back_to_default(&self) {
        if !self.settings.selection().is_system_default() {
            log::info!("Selected mic not found, following system default");
            self.settings.fall_back_to_default();
        }
    }

    fn begin_capture(&self) {
        match self.catalog.resolve_selected() {
            Ok(device) => {
                if let Err(e) = self.session.start(&device) {
                    log::warn!("Failed to start capture on {}: {}", device.name, e);
                    self.request_reconnect();
                }
            }
            Err(e) => {
                log::info!("Mic not found: {}", e);
                self.fall_back_to_default();
                self.publish_device_list();
                self.request_reconnect();
            }
        }
    }

    fn on_capture_failed(&self, error: MonitorError) {
        log::warn!("Capture stream failed: {}", error);
        self.request_reconnect();
    }
}

impl ReconnectTarget for MonitorInner {
    fn teardown(&self) {
        self.session.begin_reconnect();
    }

    fn resolve(&self) -> Result<AudioDevice, MonitorError> {
        self.catalog.resolve_selected()
    }

    fn connect(&self, device: &AudioDevice) -> Result<(), MonitorError> {
        self.session.start(device)
    }
}

/// Registered with the OS event source. Holds the monitor weakly so the
/// registration never keeps a dropped monitor alive.
struct MonitorListener {
    inner: Weak<MonitorInner>,
}

impl DeviceChangeListener for MonitorListener {
    fn on_device_added(&self, device_id: &str) {
        let Some(inner) = self.inner.upgrade() else { return };
        log::debug!("Device added: {}", device_id);

        inner.publish_device_list();
        if inner.catalog.resolve_selected().is_err() {
            inner.fall_back_to_default();
            inner.request_reconnect();
        }
    }

    fn on_device_removed(&self, device_id: &str) {
        let Some(inner) = self.inner.upgrade() else { return };
        log::debug!("Device removed: {}", device_id);

        inner.publish_device_list();
        if inner.session.is_capturing_device(device_id) {
            inner.request_reconnect();
        }
    }

    fn on_device_state_changed(&self, device_id: &str, new_state: DeviceState) {
        let Some(inner) = self.inner.upgrade() else { return };
        log::debug!("Device {} changed state to {:?}", device_id, new_state);

        inner.publish_device_list();
        if !new_state.is_active() && inner.session.is_capturing_device(device_id) {
            inner.request_reconnect();
        }
    }

    fn on_default_device_changed(&self, device_id: Option<&str>) {
        let Some(inner) = self.inner.upgrade() else { return };
        log::debug!("Default capture device changed: {:?}", device_id);

        inner.publish_device_list();
        if !inner.settings.selection().is_system_default() {
            return;
        }
        let current = inner.session.current_device();
        if current.as_ref().map(|d| d.id.as_str()) != device_id {
            inner.request_reconnect();
        }
    }
}

/// Composition root of the mute indicator.
///
/// Data flow:
/// ```text
/// [DeviceCatalog] → [CaptureSession] → [MuteDetector] → dispatch thread → [IndicatorDriver]
///                          ↑                                           └→ [MonitorDelegate]
/// OS device events → [ReconnectSupervisor]
/// ```
///
/// Classification runs on the provider's audio thread; transitions are
/// handed to a dispatch thread so the audio thread never waits on lighting
/// I/O. The channel keeps them in buffer-arrival order.
pub struct DeviceMonitor {
    inner: Arc<MonitorInner>,
    events: Arc<dyn DeviceEventSource>,
    dispatcher: Mutex<Option<thread::JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl DeviceMonitor {
    /// Wire up the engine, register for device events and publish the
    /// initial device list. Capture does not start until `begin_capture`.
    pub fn new(
        backend: MonitorBackend,
        settings: Arc<SettingsContext>,
        delegate: Arc<dyn MonitorDelegate>,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        config.validate().map_err(MonitorError::ConfigurationFailed)?;

        let MonitorBackend {
            devices,
            capture,
            events,
            lighting,
        } = backend;

        let (dispatch_tx, dispatch_rx) = mpsc::channel();
        let detector = Arc::new(Mutex::new(MuteDetector::new(config.mute_epsilon)));
        let counters = Arc::new(BufferCounters::default());
        let indicator = Arc::new(IndicatorDriver::new(
            lighting,
            config.alert_color,
            config.indicator_refresh_interval,
        ));

        let inner = Arc::new_cyclic(|this: &Weak<MonitorInner>| {
            let callbacks = Self::capture_callbacks(this, &detector, &counters, &dispatch_tx);
            MonitorInner {
                catalog: DeviceCatalog::new(devices, Arc::clone(&settings)),
                settings,
                session: CaptureSession::new(capture, callbacks),
                supervisor: ReconnectSupervisor::new(config.settle_delay, config.retry_interval),
                indicator: Arc::clone(&indicator),
                delegate: Arc::clone(&delegate),
                detector,
                counters,
                dispatch: dispatch_tx,
                this: this.clone(),
            }
        });

        events.register(Arc::new(MonitorListener {
            inner: Arc::downgrade(&inner),
        }))?;

        let dispatcher = match Self::spawn_dispatcher(dispatch_rx, indicator, delegate) {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(unregister_err) = events.unregister() {
                    log::warn!("Failed to unregister device events: {}", unregister_err);
                }
                return Err(e);
            }
        };

        let monitor = Self {
            inner,
            events,
            dispatcher: Mutex::new(Some(dispatcher)),
            shut_down: AtomicBool::new(false),
        };
        monitor.inner.publish_device_list();
        Ok(monitor)
    }

    fn capture_callbacks(
        this: &Weak<MonitorInner>,
        detector: &Arc<Mutex<MuteDetector>>,
        counters: &Arc<BufferCounters>,
        dispatch: &Sender<Dispatch>,
    ) -> CaptureCallbacks {
        let on_buffer = {
            let detector = Arc::clone(detector);
            let counters = Arc::clone(counters);
            let dispatch = dispatch.clone();
            Arc::new(move |pcm: &[u8]| {
                counters.buffers.fetch_add(1, Ordering::Relaxed);
                let Some(mean) = pcm16_mean(pcm) else { return };

                let transition = detector.lock().observe(mean);
                if let Some(state) = transition {
                    counters.transitions.fetch_add(1, Ordering::Relaxed);
                    // Only fails once the dispatcher is gone at shutdown.
                    let _ = dispatch.send(Dispatch::Transition(state));
                }
            })
        };

        let on_failure = {
            let this = this.clone();
            Arc::new(move |error: MonitorError| {
                if let Some(inner) = this.upgrade() {
                    inner.on_capture_failed(error);
                }
            })
        };

        CaptureCallbacks {
            on_buffer,
            on_failure,
        }
    }

    fn spawn_dispatcher(
        receiver: Receiver<Dispatch>,
        indicator: Arc<IndicatorDriver>,
        delegate: Arc<dyn MonitorDelegate>,
    ) -> Result<thread::JoinHandle<()>, MonitorError> {
        thread::Builder::new()
            .name("mute-dispatch".into())
            .spawn(move || {
                for message in receiver {
                    match message {
                        Dispatch::Transition(MuteState::Muted) => {
                            if let Err(e) = indicator.on_muted() {
                                log::error!("Failed to start mute indicator: {}", e);
                            }
                            delegate.on_muted();
                        }
                        Dispatch::Transition(MuteState::Unmuted) => {
                            indicator.on_unmuted();
                            delegate.on_unmuted();
                        }
                        Dispatch::Shutdown => break,
                    }
                }
            })
            .map_err(|e| MonitorError::Unknown(format!("failed to spawn dispatch thread: {}", e)))
    }

    /// Resolve the selected device and start capturing. If it cannot be
    /// resolved, fall back to the system default and keep retrying in the
    /// background.
    pub fn begin_capture(&self) {
        self.inner.begin_capture();
    }

    /// Select and persist a device, then force a reconnect cycle onto it.
    pub fn select_device(&self, selection: DeviceSelection) {
        log::info!("Selecting mic: {}", selection);
        if let Err(e) = self.inner.settings.select(selection) {
            log::error!("Failed to save settings: {}", e);
        }
        self.inner.publish_device_list();
        self.inner.request_reconnect();
    }

    /// Active capture devices, with the OS default flagged.
    pub fn devices(&self) -> Result<Vec<AudioDevice>, MonitorError> {
        self.inner.catalog.list_devices()
    }

    pub fn selection(&self) -> DeviceSelection {
        self.inner.settings.selection()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.inner.session.state()
    }

    pub fn current_device(&self) -> Option<AudioDevice> {
        self.inner.session.current_device()
    }

    pub fn mute_state(&self) -> MuteState {
        self.inner.detector.lock().state()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.supervisor.is_reconnecting()
    }

    pub fn indicator_active(&self) -> bool {
        self.inner.indicator.is_active()
    }

    pub fn diagnostics(&self) -> MonitorDiagnostics {
        let reconnect = self.inner.supervisor.stats();
        MonitorDiagnostics {
            buffers_received: self.inner.counters.buffers.load(Ordering::Relaxed),
            mute_transitions: self.inner.counters.transitions.load(Ordering::Relaxed),
            reconnect_loops_started: reconnect.loops_started,
            reconnect_attempts: reconnect.attempts,
            peak_concurrent_reconnect_loops: reconnect.peak_concurrent_loops,
        }
    }

    /// Stop everything: device events, reconnect loop, capture, dispatch and
    /// the indicator loop. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.events.unregister() {
            log::warn!("Failed to unregister device events: {}", e);
        }
        self.inner.supervisor.shutdown();
        self.inner.session.stop();

        let _ = self.inner.dispatch.send(Dispatch::Shutdown);
        if let Some(handle) = self.dispatcher.lock().take() {
            if handle.join().is_err() {
                log::error!("Dispatch thread panicked");
            }
        }

        self.inner.indicator.shutdown();
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::LightingColor;
    use crate::session::channel_delegate::{ChannelDelegate, MonitorEvent};
    use crate::storage::settings::{AppSettings, MemorySettingsStore};
    use crate::testing::{
        wait_until, FakeCapture, FakeDeviceSource, FakeEventSource, FakeLighting, LightingCall,
    };
    use crate::traits::settings_store::SettingsStore;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Harness {
        monitor: DeviceMonitor,
        source: Arc<FakeDeviceSource>,
        capture: FakeCapture,
        events: Arc<FakeEventSource>,
        lighting: Arc<FakeLighting>,
        store: Arc<MemorySettingsStore>,
        receiver: Receiver<MonitorEvent>,
    }

    /// Forwards to a shared store so tests can inspect what was persisted.
    struct SharedStore(Arc<MemorySettingsStore>);

    impl SettingsStore for SharedStore {
        fn load(&self) -> Result<AppSettings, MonitorError> {
            self.0.load()
        }

        fn save(&self, settings: &AppSettings) -> Result<(), MonitorError> {
            self.0.save(settings)
        }
    }

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            settle_delay: Duration::from_millis(1),
            retry_interval: Duration::from_millis(5),
            indicator_refresh_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn harness_with(selected: Option<&str>, source: Arc<FakeDeviceSource>) -> Harness {
        harness_with_config(selected, source, fast_config())
    }

    fn harness_with_config(
        selected: Option<&str>,
        source: Arc<FakeDeviceSource>,
        config: MonitorConfig,
    ) -> Harness {
        let capture = FakeCapture::new();
        let events = FakeEventSource::new();
        let lighting = FakeLighting::new();
        let store = Arc::new(MemorySettingsStore::new(AppSettings {
            selected_device_id: selected.map(str::to_string),
        }));
        let settings = Arc::new(SettingsContext::load(Box::new(SharedStore(Arc::clone(&store)))));
        let (delegate, receiver) = ChannelDelegate::new();

        let backend = MonitorBackend {
            devices: Arc::clone(&source) as Arc<dyn DeviceSource>,
            capture: Box::new(capture.clone()),
            events: Arc::clone(&events) as Arc<dyn DeviceEventSource>,
            lighting: Arc::clone(&lighting) as Arc<dyn LightingDevice>,
        };
        let monitor = DeviceMonitor::new(backend, settings, delegate, config).unwrap();

        Harness {
            monitor,
            source,
            capture,
            events,
            lighting,
            store,
            receiver,
        }
    }

    fn harness(selected: Option<&str>) -> Harness {
        let source = FakeDeviceSource::with_devices(&[("mic-a", "Headset"), ("mic-b", "Webcam")]);
        harness_with(selected, source)
    }

    impl Harness {
        /// Next mute/unmute event, skipping device list updates.
        fn next_mute_event(&self, timeout: Duration) -> Option<MonitorEvent> {
            let deadline = std::time::Instant::now() + timeout;
            loop {
                let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                match self.receiver.recv_timeout(remaining) {
                    Ok(MonitorEvent::DeviceListChanged(_)) => continue,
                    Ok(event) => return Some(event),
                    Err(_) => return None,
                }
            }
        }

        fn drain(&self) -> Vec<MonitorEvent> {
            self.receiver.try_iter().collect()
        }

        fn wait_capturing(&self, device_id: &str) -> bool {
            wait_until(TIMEOUT, || {
                self.monitor.capture_state() == CaptureState::Capturing
                    && self.monitor.current_device().is_some_and(|d| d.id == device_id)
            })
        }
    }

    fn device_list_count(events: &[MonitorEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, MonitorEvent::DeviceListChanged(_)))
            .count()
    }

    #[test]
    fn publishes_initial_device_list() {
        let h = harness(None);

        let events = h.drain();
        assert_eq!(events.len(), 1);
        let MonitorEvent::DeviceListChanged(devices) = &events[0] else {
            panic!("expected device list, got {:?}", events[0]);
        };
        assert_eq!(devices.len(), 2);
        assert!(devices[0].is_default);
        assert!(h.events.is_registered());
    }

    #[test]
    fn begin_capture_uses_pinned_device() {
        let h = harness(Some("mic-b"));

        h.monitor.begin_capture();

        assert!(h.wait_capturing("mic-b"));
        assert_eq!(h.capture.started_device().as_deref(), Some("mic-b"));
        assert!(!h.monitor.is_reconnecting());
    }

    #[test]
    fn mute_and_resume_scenario() {
        let h = harness(Some("mic-a"));
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));
        h.drain();

        for _ in 0..3 {
            h.capture.push_level(0.02, 480);
        }
        assert_eq!(h.next_mute_event(TIMEOUT), Some(MonitorEvent::Muted));
        assert!(h.monitor.indicator_active());
        assert_eq!(h.monitor.mute_state(), MuteState::Muted);
        assert!(wait_until(TIMEOUT, || {
            h.lighting.count(&LightingCall::SetColor(LightingColor::RED)) >= 1
        }));

        for level in [0.02, 0.05, 0.03] {
            h.capture.push_level(level, 480);
        }
        assert_eq!(h.next_mute_event(TIMEOUT), Some(MonitorEvent::Unmuted));
        assert!(!h.monitor.indicator_active());
        assert_eq!(h.lighting.count(&LightingCall::Restore), 1);
        assert_eq!(h.monitor.inner.indicator.live_workers(), 0);

        assert_eq!(h.next_mute_event(Duration::from_millis(50)), None);
        assert_eq!(h.monitor.diagnostics().mute_transitions, 2);
        assert_eq!(h.monitor.diagnostics().buffers_received, 6);
    }

    #[test]
    fn removal_while_capturing_enters_reconnect() {
        let h = harness(Some("mic-a"));
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));
        h.drain();

        h.source.remove("mic-a");
        h.events.fire_removed("mic-a");

        assert!(wait_until(TIMEOUT, || h.monitor.capture_state() == CaptureState::Reconnecting));
        assert!(!h.capture.is_running());
        assert!(h.monitor.is_reconnecting());

        // Stale callbacks from the stopped stream are discarded.
        for _ in 0..4 {
            h.capture.push_level(0.0, 480);
        }
        let events = h.drain();
        assert_eq!(device_list_count(&events), 1);
        assert!(events
            .iter()
            .all(|e| matches!(e, MonitorEvent::DeviceListChanged(_))));

        // Device comes back: the loop picks it up.
        h.source.add("mic-a", "Headset");
        assert!(h.wait_capturing("mic-a"));
        assert!(wait_until(TIMEOUT, || !h.monitor.is_reconnecting()));

        let diagnostics = h.monitor.diagnostics();
        assert_eq!(diagnostics.peak_concurrent_reconnect_loops, 1);
        assert!(diagnostics.reconnect_attempts >= 1);
        assert_eq!(h.capture.max_concurrent_streams(), 1);

        h.capture.push_level(0.1, 480);
        h.capture.push_level(0.1, 480);
        assert_eq!(h.next_mute_event(TIMEOUT), Some(MonitorEvent::Muted));
    }

    #[test]
    fn removal_of_other_device_keeps_capturing() {
        let h = harness(Some("mic-a"));
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));
        h.drain();

        h.source.remove("mic-b");
        h.events.fire_removed("mic-b");

        assert_eq!(device_list_count(&h.drain()), 1);
        assert!(!h.monitor.is_reconnecting());
        assert_eq!(h.capture.stop_count(), 0);
    }

    #[test]
    fn missing_pinned_device_falls_back_to_default() {
        let h = harness(Some("mic-gone"));

        h.monitor.begin_capture();

        assert!(h.wait_capturing("mic-a"));
        assert_eq!(h.monitor.selection(), DeviceSelection::SystemDefault);
        // The pinned choice stays persisted for the next run.
        assert_eq!(
            h.store.snapshot().selection(),
            DeviceSelection::Device("mic-gone".into())
        );
    }

    #[test]
    fn start_failure_triggers_reconnect() {
        let h = harness(None);
        h.capture.fail_next_start(true);

        h.monitor.begin_capture();

        assert!(h.wait_capturing("mic-a"));
        assert_eq!(h.capture.start_count(), 2);
        assert_eq!(h.monitor.diagnostics().reconnect_loops_started, 1);
    }

    #[test]
    fn stream_failure_triggers_reconnect() {
        let h = harness(None);
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));

        h.capture.fail_stream("device invalidated");

        assert!(wait_until(TIMEOUT, || h.capture.start_count() == 2));
        assert!(h.wait_capturing("mic-a"));
        assert_eq!(h.monitor.diagnostics().reconnect_loops_started, 1);
    }

    #[test]
    fn default_change_follows_system_default() {
        let h = harness(None);
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));

        h.source.set_default(Some("mic-b"));
        h.events.fire_default_changed(Some("mic-b"));

        assert!(h.wait_capturing("mic-b"));
        assert_eq!(h.capture.max_concurrent_streams(), 1);
    }

    #[test]
    fn default_change_ignored_for_pinned_selection() {
        let h = harness(Some("mic-a"));
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));
        h.drain();

        h.source.set_default(Some("mic-b"));
        h.events.fire_default_changed(Some("mic-b"));

        assert_eq!(device_list_count(&h.drain()), 1);
        assert!(!h.monitor.is_reconnecting());
        assert!(h.wait_capturing("mic-a"));
        assert_eq!(h.capture.stop_count(), 0);
    }

    #[test]
    fn default_change_to_current_device_is_ignored() {
        let h = harness(None);
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));

        h.events.fire_default_changed(Some("mic-a"));

        assert!(!h.monitor.is_reconnecting());
        assert_eq!(h.capture.stop_count(), 0);
    }

    #[test]
    fn unavailable_state_of_captured_device_reconnects() {
        let h = harness(Some("mic-b"));
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-b"));

        h.events.fire_state_changed("mic-a", DeviceState::Disabled);
        assert!(!h.monitor.is_reconnecting());

        h.source.remove("mic-b");
        h.events.fire_state_changed("mic-b", DeviceState::Unplugged);
        assert!(wait_until(TIMEOUT, || h.monitor.capture_state() == CaptureState::Reconnecting));
    }

    #[test]
    fn added_device_while_pinned_missing_falls_back() {
        let source = FakeDeviceSource::with_devices(&[("mic-a", "Headset")]);
        let h = harness_with(Some("mic-a"), source);
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));

        h.source.remove("mic-a");
        h.events.fire_removed("mic-a");
        assert!(wait_until(TIMEOUT, || h.monitor.capture_state() == CaptureState::Reconnecting));

        h.source.add("mic-b", "Webcam");
        h.source.set_default(Some("mic-b"));
        h.events.fire_added("mic-b");

        assert_eq!(h.monitor.selection(), DeviceSelection::SystemDefault);
        assert!(h.wait_capturing("mic-b"));
    }

    #[test]
    fn select_device_persists_and_switches() {
        let h = harness(None);
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));

        h.monitor.select_device(DeviceSelection::Device("mic-b".into()));

        assert!(h.wait_capturing("mic-b"));
        assert_eq!(
            h.store.snapshot().selection(),
            DeviceSelection::Device("mic-b".into())
        );
        assert_eq!(h.capture.max_concurrent_streams(), 1);
    }

    #[test]
    fn select_during_reconnect_settle_switches_device() {
        let source = FakeDeviceSource::with_devices(&[("mic-a", "Headset"), ("mic-b", "Webcam")]);
        let config = MonitorConfig {
            settle_delay: Duration::from_millis(200),
            ..fast_config()
        };
        let h = harness_with_config(None, source, config);
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));

        h.capture.fail_stream("device invalidated");
        assert!(wait_until(TIMEOUT, || h.monitor.capture_state() == CaptureState::Reconnecting));
        h.monitor.select_device(DeviceSelection::Device("mic-b".into()));

        assert!(h.wait_capturing("mic-b"));
        assert!(wait_until(TIMEOUT, || !h.monitor.is_reconnecting()));
        assert_eq!(h.monitor.current_device().map(|d| d.id), Some("mic-b".to_string()));
        assert_eq!(h.capture.started_device().as_deref(), Some("mic-b"));
        assert!(h.capture.is_running());
        assert_eq!(h.monitor.diagnostics().reconnect_loops_started, 1);
        assert_eq!(h.capture.max_concurrent_streams(), 1);
    }

    #[test]
    fn stream_lost_during_reconnect_start_is_reconnected() {
        let h = harness(None);
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));

        h.capture.die_during_next_start(true);
        h.capture.fail_stream("device invalidated");

        assert!(wait_until(TIMEOUT, || {
            h.capture.start_count() == 3 && !h.monitor.is_reconnecting()
        }));
        assert!(h.wait_capturing("mic-a"));
        assert!(h.capture.is_running());
        assert_eq!(h.monitor.diagnostics().reconnect_loops_started, 1);
    }

    #[test]
    fn enumeration_failure_skips_device_list() {
        let h = harness(None);
        h.drain();
        h.source.fail_enumeration(true);

        h.events.fire_added("mic-c");

        assert_eq!(device_list_count(&h.drain()), 0);
    }

    #[test]
    fn shutdown_releases_everything() {
        let h = harness(None);
        h.monitor.begin_capture();
        assert!(h.wait_capturing("mic-a"));
        h.capture.push_level(0.0, 480);
        assert_eq!(h.next_mute_event(TIMEOUT), Some(MonitorEvent::Muted));

        h.monitor.shutdown();
        h.monitor.shutdown();

        assert!(!h.events.is_registered());
        assert!(!h.capture.is_running());
        assert_eq!(h.monitor.capture_state(), CaptureState::Stopped);
        assert!(!h.monitor.indicator_active());
        assert_eq!(h.lighting.count(&LightingCall::Restore), 1);

        // Events after shutdown go nowhere.
        h.events.fire_removed("mic-a");
        assert!(!h.monitor.is_reconnecting());
    }

    #[test]
    fn rejects_invalid_config() {
        let backend = MonitorBackend {
            devices: FakeDeviceSource::with_devices(&[]),
            capture: Box::new(FakeCapture::new()),
            events: FakeEventSource::new(),
            lighting: FakeLighting::new(),
        };
        let settings = Arc::new(SettingsContext::load(Box::new(MemorySettingsStore::default())));
        let (delegate, _receiver) = ChannelDelegate::new();
        let config = MonitorConfig {
            mute_epsilon: -1.0,
            ..Default::default()
        };

        let result = DeviceMonitor::new(backend, settings, delegate, config);

        assert!(matches!(result, Err(MonitorError::ConfigurationFailed(_))));
    }

    #[test]
    fn registration_failure_is_reported() {
        let events = FakeEventSource::new();
        events.fail_register(true);
        let backend = MonitorBackend {
            devices: FakeDeviceSource::with_devices(&[("mic-a", "Headset")]),
            capture: Box::new(FakeCapture::new()),
            events: Arc::clone(&events) as Arc<dyn DeviceEventSource>,
            lighting: FakeLighting::new(),
        };
        let settings = Arc::new(SettingsContext::load(Box::new(MemorySettingsStore::default())));
        let (delegate, _receiver) = ChannelDelegate::new();

        let result = DeviceMonitor::new(backend, settings, delegate, fast_config());

        assert!(matches!(result, Err(MonitorError::RegistrationFailed(_))));
    }
}
