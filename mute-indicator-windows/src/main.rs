//! `mute-indicator`: lights Logitech devices red while the microphone is muted.
//!
//! Runs until stdin is closed or a `q` line is entered.

#[cfg(target_os = "windows")]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = app::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("mute-indicator only runs on Windows");
    std::process::exit(1);
}

#[cfg(target_os = "windows")]
mod app {
    use std::io::BufRead;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::RecvTimeoutError;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use mute_indicator_core::{
        ChannelDelegate, DeviceMonitor, JsonSettingsFile, LightingDevice, MonitorBackend, MonitorConfig,
        MonitorError, MonitorEvent, SettingsContext,
    };
    use mute_indicator_windows::{
        ComGuard, LogitechLighting, WasapiDeviceSource, WasapiMicCapture, WasapiNotificationSource,
    };

    const QUIT_POLL: Duration = Duration::from_millis(250);

    pub fn run() -> Result<(), MonitorError> {
        // Keeps this thread in the MTA for the lifetime of the device-event registration.
        let _com = ComGuard::enter()?;

        let settings = Arc::new(SettingsContext::load(Box::new(JsonSettingsFile::default())));
        log::info!("Selected mic: {}", settings.selection());

        let lighting = Arc::new(LogitechLighting::new());
        lighting.init()?;

        let backend = MonitorBackend {
            devices: Arc::new(WasapiDeviceSource::new()),
            capture: Box::new(WasapiMicCapture::new()),
            events: Arc::new(WasapiNotificationSource::new()),
            lighting: Arc::clone(&lighting) as Arc<dyn LightingDevice>,
        };
        let (delegate, events) = ChannelDelegate::new();
        let monitor = match DeviceMonitor::new(backend, settings, delegate, MonitorConfig::default()) {
            Ok(monitor) => monitor,
            Err(e) => {
                lighting.shutdown();
                return Err(e);
            }
        };
        monitor.begin_capture();

        let quit = watch_stdin();
        loop {
            match events.recv_timeout(QUIT_POLL) {
                Ok(MonitorEvent::DeviceListChanged(devices)) => {
                    let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
                    log::info!("Microphones: {}", names.join(", "));
                }
                Ok(MonitorEvent::Muted) => log::info!("Microphone muted"),
                Ok(MonitorEvent::Unmuted) => log::info!("Microphone unmuted"),
                Err(RecvTimeoutError::Timeout) => {
                    if quit.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        log::info!("Shutting down");
        monitor.shutdown();
        lighting.shutdown();
        Ok(())
    }

    /// Flag raised when stdin reaches EOF or a `q` line is read.
    fn watch_stdin() -> Arc<AtomicBool> {
        let quit = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&quit);
        let spawned = thread::Builder::new().name("stdin-watch".into()).spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("q") => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            flag.store(true, Ordering::SeqCst);
        });
        if let Err(e) = spawned {
            log::warn!("Failed to watch stdin, run until killed: {}", e);
        }
        quit
    }
}
