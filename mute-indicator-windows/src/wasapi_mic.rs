//! WASAPI microphone capture provider.
//!
//! Captures from a WASAPI capture endpoint in shared mode and delivers
//! 16-bit little-endian PCM via the `PcmBufferCallback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use windows::core::*;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use mute_indicator_core::models::device::AudioDevice;
use mute_indicator_core::models::error::MonitorError;
use mute_indicator_core::traits::capture_provider::{CaptureCallbacks, CaptureProvider, PcmBufferCallback};

use crate::com::ComGuard;
use crate::device_enumerator::create_enumerator;

/// Shared-mode buffer duration, in 100-nanosecond units (100 ms).
const BUFFER_DURATION: i64 = 1_000_000;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

const BITS_PER_SAMPLE: u16 = 16;

/// WASAPI microphone capture.
///
/// Each `start` opens the endpoint on a dedicated thread registered with
/// MMCSS and waits until the stream is running, so open failures are
/// reported synchronously. Errors after that go to `on_failure`.
#[derive(Default)]
pub struct WasapiMicCapture {
    running: Arc<AtomicBool>,
    capture_handle: Option<thread::JoinHandle<()>>,
}

impl WasapiMicCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureProvider for WasapiMicCapture {
    fn start(
        &mut self,
        device: &AudioDevice,
        callbacks: CaptureCallbacks,
    ) -> std::result::Result<(), MonitorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(MonitorError::CaptureAlreadyRunning);
        }
        // Reap a thread whose stream already died.
        if let Some(handle) = self.capture_handle.take() {
            let _ = handle.join();
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let device_id = device.id.clone();
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("wasapi-mic-capture".into())
            .spawn(move || capture_thread(running, device_id, callbacks, ready_tx))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                MonitorError::CaptureFailed(format!("failed to spawn mic thread: {}", e))
            })?;

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(MonitorError::CaptureFailed(
                "capture thread exited before opening the stream".into(),
            ))
        });
        if let Err(e) = opened {
            self.running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        self.capture_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> std::result::Result<(), MonitorError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.take() {
            if handle.thread().id() == thread::current().id() {
                return Ok(());
            }
            if handle.join().is_err() {
                return Err(MonitorError::CaptureFailed("mic capture thread panicked".into()));
            }
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Body of the capture thread: open, report readiness, pump until stopped.
fn capture_thread(
    running: Arc<AtomicBool>,
    device_id: String,
    callbacks: CaptureCallbacks,
    ready: Sender<std::result::Result<(), MonitorError>>,
) {
    let _com = match ComGuard::enter() {
        Ok(guard) => guard,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut stream = match MicStream::open(&device_id) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let result = stream.pump(&running, &callbacks.on_buffer);
    stream.close();

    if let Err(e) = result {
        // Only report failures the owner did not ask for.
        if running.swap(false, Ordering::SeqCst) {
            log::error!("Mic capture error: {}", e);
            (callbacks.on_failure)(e);
        }
    }
}

struct MicStream {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    block_align: usize,
    mmcss: Option<HANDLE>,
    /// All zeros; handed out for packets flagged silent.
    silence: Vec<u8>,
}

impl MicStream {
    /// Sequence:
    /// 1. Look up the endpoint by id
    /// 2. Activate IAudioClient
    /// 3. Initialize in shared mode, converting to 16-bit PCM at the mix rate
    /// 4. Get IAudioCaptureClient service
    /// 5. Register with MMCSS for real-time priority
    /// 6. Start
    fn open(device_id: &str) -> std::result::Result<Self, MonitorError> {
        let enumerator = create_enumerator()?;

        unsafe {
            let device = enumerator
                .GetDevice(&HSTRING::from(device_id))
                .map_err(|_| MonitorError::DeviceNotFound {
                    selection: device_id.to_string(),
                })?;

            let audio_client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| capture_error("Activate", e))?;

            let format = pcm16_format(&audio_client)?;

            audio_client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY,
                    BUFFER_DURATION,
                    0,
                    &format,
                    None,
                )
                .map_err(|e| capture_error("IAudioClient::Initialize", e))?;

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| capture_error("GetService", e))?;

            let mut task_index: u32 = 0;
            let mmcss = match AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("MMCSS registration failed: {}", e);
                    None
                }
            };

            audio_client
                .Start()
                .map_err(|e| capture_error("IAudioClient::Start", e))?;

            Ok(Self {
                audio_client,
                capture_client,
                block_align: format.nBlockAlign as usize,
                mmcss,
                silence: Vec::new(),
            })
        }
    }

    fn pump(
        &mut self,
        running: &AtomicBool,
        on_buffer: &PcmBufferCallback,
    ) -> std::result::Result<(), MonitorError> {
        while running.load(Ordering::SeqCst) {
            thread::sleep(POLL_INTERVAL);

            unsafe {
                let mut packet_length = self
                    .capture_client
                    .GetNextPacketSize()
                    .map_err(|e| capture_error("GetNextPacketSize", e))?;

                while packet_length > 0 {
                    let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                    let mut num_frames: u32 = 0;
                    let mut flags: u32 = 0;

                    self.capture_client
                        .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                        .map_err(|e| capture_error("GetBuffer", e))?;

                    if num_frames > 0 && !buffer_ptr.is_null() {
                        let len = num_frames as usize * self.block_align;
                        if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                            on_buffer(zeroed(&mut self.silence, len));
                        } else {
                            on_buffer(std::slice::from_raw_parts(buffer_ptr, len));
                        }
                    }

                    self.capture_client
                        .ReleaseBuffer(num_frames)
                        .map_err(|e| capture_error("ReleaseBuffer", e))?;

                    packet_length = self
                        .capture_client
                        .GetNextPacketSize()
                        .map_err(|e| capture_error("GetNextPacketSize", e))?;
                }
            }
        }
        Ok(())
    }

    fn close(self) {
        unsafe {
            let _ = self.audio_client.Stop();
            if let Some(handle) = self.mmcss {
                let _ = AvRevertMmThreadCharacteristics(handle);
            }
        }
    }
}

/// First `len` bytes of `silence`, growing it to the largest packet seen.
fn zeroed(silence: &mut Vec<u8>, len: usize) -> &[u8] {
    if silence.len() < len {
        silence.resize(len, 0);
    }
    &silence[..len]
}

/// 16-bit integer PCM at the device's mix rate and channel count.
unsafe fn pcm16_format(audio_client: &IAudioClient) -> std::result::Result<WAVEFORMATEX, MonitorError> {
    let mix_format_ptr = audio_client
        .GetMixFormat()
        .map_err(|e| capture_error("GetMixFormat", e))?;
    let mix_format = &*mix_format_ptr;
    let channels = mix_format.nChannels;
    let sample_rate = mix_format.nSamplesPerSec;
    CoTaskMemFree(Some(mix_format_ptr as *const _));

    let block_align = channels * (BITS_PER_SAMPLE / 8);
    Ok(WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM as u16,
        nChannels: channels,
        nSamplesPerSec: sample_rate,
        nAvgBytesPerSec: sample_rate * block_align as u32,
        nBlockAlign: block_align,
        wBitsPerSample: BITS_PER_SAMPLE,
        cbSize: 0,
    })
}

fn capture_error(context: &str, error: Error) -> MonitorError {
    MonitorError::CaptureFailed(format!("{} failed: {}", context, error))
}
