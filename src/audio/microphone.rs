// Microphone backend using cpal
//
// cpal streams are not Send on every platform, so each capture runs on its own
// thread that owns the stream until it is told to stop. Frames cross over to
// the async side through a bounded channel.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfig};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use crate::error::{RecorderError, RecorderResult};

/// Information about an available audio input device
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// Live capture owned by a dedicated thread
struct CaptureThread {
    stop_tx: std_mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Microphone capture backend (all platforms cpal supports)
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    device_name: Option<String>,
    capture: Option<CaptureThread>,
}

impl MicrophoneBackend {
    /// Use the default input device, or the named one if given
    pub fn new(config: AudioBackendConfig, device_name: Option<String>) -> Self {
        info!(
            "Microphone backend initialized ({}Hz preferred, device: {})",
            config.target_sample_rate,
            device_name.as_deref().unwrap_or("default")
        );

        Self {
            config,
            device_name,
            capture: None,
        }
    }

    /// List all available audio input devices
    pub fn list_devices() -> RecorderResult<Vec<InputDeviceInfo>> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = host
            .input_devices()
            .map_err(|e| classify_error(e.to_string()))?;

        Ok(devices
            .map(|device| {
                let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
                let is_default = default_name.as_deref() == Some(name.as_str());
                InputDeviceInfo { name, is_default }
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> RecorderResult<mpsc::Receiver<AudioFrame>> {
        if self.capture.is_some() {
            return Err(RecorderError::CaptureUnavailable(
                "Already capturing".to_string(),
            ));
        }

        let (frame_tx, frame_rx) = mpsc::channel(self.config.frame_queue_len);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let device_name = self.device_name.clone();
        let config = self.config.clone();

        let handle = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || match open_stream(device_name.as_deref(), &config, frame_tx) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Parks until stop() or until the backend is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                    debug!("Capture thread released the microphone");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| RecorderError::CaptureUnavailable(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.capture = Some(CaptureThread { stop_tx, handle });
                info!("Microphone capture started");
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(RecorderError::CaptureUnavailable(
                "Capture thread exited before the stream opened".to_string(),
            )),
        }
    }

    async fn stop(&mut self) -> RecorderResult<()> {
        let Some(capture) = self.capture.take() else {
            return Ok(());
        };

        info!("Stopping microphone capture");

        let _ = capture.stop_tx.send(());
        match tokio::task::spawn_blocking(move || capture.handle.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => warn!("Capture thread panicked"),
            Err(e) => warn!("Failed to join capture thread: {}", e),
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        if let Some(capture) = self.capture.take() {
            let _ = capture.stop_tx.send(());
        }
    }
}

fn open_stream(
    device_name: Option<&str>,
    config: &AudioBackendConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> RecorderResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = find_device(&host, device_name)?;

    let supported = pick_config(&device, config.target_sample_rate)?;
    let sample_format = supported.sample_format();
    let stream_config: StreamConfig = supported.into();
    let target_channels = config.target_channels.max(1);

    info!(
        "Opening input stream: {}Hz, {} channels ({} delivered), {:?}",
        stream_config.sample_rate.0, stream_config.channels, target_channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, target_channels, frame_tx)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, target_channels, frame_tx)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, target_channels, frame_tx)?,
        other => {
            return Err(RecorderError::CaptureUnavailable(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream.play().map_err(|e| classify_error(e.to_string()))?;

    Ok(stream)
}

fn find_device(host: &cpal::Host, device_name: Option<&str>) -> RecorderResult<Device> {
    let device = match device_name {
        Some(wanted) => host
            .input_devices()
            .map_err(|e| classify_error(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false)),
        None => host.default_input_device(),
    };

    device.ok_or_else(|| {
        RecorderError::CaptureUnavailable(match device_name {
            Some(name) => format!("Input device not found: {}", name),
            None => "No default input device found".to_string(),
        })
    })
}

/// Prefer a config that supports the target rate, else the device default
fn pick_config(device: &Device, target_sample_rate: u32) -> RecorderResult<SupportedStreamConfig> {
    if let Ok(configs) = device.supported_input_configs() {
        for range in configs {
            if range.min_sample_rate().0 <= target_sample_rate
                && range.max_sample_rate().0 >= target_sample_rate
            {
                return Ok(range.with_sample_rate(SampleRate(target_sample_rate)));
            }
        }
    }

    device
        .default_input_config()
        .map_err(|e| classify_error(e.to_string()))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    target_channels: u16,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> RecorderResult<cpal::Stream>
where
    T: SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels;
    let sample_rate = config.sample_rate.0;
    let started = Instant::now();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let frame = AudioFrame {
                    samples: remix(data, channels, target_channels),
                    sample_rate,
                    channels: target_channels,
                    timestamp_ms: started.elapsed().as_millis() as u64,
                };
                // Full queue means the controller is busy uploading; drop the frame
                let _ = frame_tx.try_send(frame);
            },
            |err| {
                error!("Microphone stream error: {}", err);
            },
            None,
        )
        .map_err(|e| classify_error(e.to_string()))
}

/// Convert interleaved device samples to `to` channels of i16
///
/// Mono output averages every input channel. Otherwise output channel `c`
/// copies input channel `c`, repeating the last input channel when the
/// device has fewer.
pub(crate) fn remix<T>(data: &[T], from: u16, to: u16) -> Vec<i16>
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    if to <= 1 {
        return downmix_to_mono(data, from);
    }

    let from = from.max(1) as usize;
    let mut out = Vec::with_capacity(data.len() / from * to as usize);
    for frame in data.chunks(from) {
        for c in 0..to as usize {
            let v: f32 = cpal::Sample::from_sample(frame[c.min(frame.len() - 1)]);
            out.push(to_i16(v));
        }
    }
    out
}

fn to_i16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Average interleaved channels into mono i16
pub(crate) fn downmix_to_mono<T>(data: &[T], channels: u16) -> Vec<i16>
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    let channels = channels.max(1) as usize;

    data.chunks(channels)
        .map(|frame| {
            let sum: f32 = frame
                .iter()
                .map(|&s| {
                    let v: f32 = cpal::Sample::from_sample(s);
                    v
                })
                .sum();
            to_i16(sum / frame.len() as f32)
        })
        .collect()
}

/// cpal has no dedicated permission error; backends report it in the message
fn classify_error(message: String) -> RecorderError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        RecorderError::PermissionDenied(message)
    } else {
        RecorderError::CaptureUnavailable(message)
    }
}
