//! Input device capture.
//!
//! A cpal stream is not `Send` on every host, so the stream lives on its own
//! thread for the whole session. Samples are downmixed to mono in the audio
//! callback and handed over through a lock-free ring buffer.

use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::{Receiver, Sender};

/// Roughly a third of a second of mono audio at 48 kHz.
const RING_CAPACITY: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("no input device available")]
    NoDevice,
    #[error("input device busy: {0}")]
    DeviceBusy(String),
    #[error("unsupported input: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

impl CaptureError {
    /// Text shown to the user, one per cause.
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::PermissionDenied(_) => {
                "Permission denied. Allow microphone/loopback access for the app in your system settings."
                    .to_string()
            }
            CaptureError::NoDevice => "No audio input device found.".to_string(),
            CaptureError::DeviceBusy(_) => "Audio device is busy or unavailable.".to_string(),
            CaptureError::Unsupported(_) => {
                "Audio capture is not supported in this environment.".to_string()
            }
            CaptureError::Other(message) if message.is_empty() => {
                "Failed to capture audio".to_string()
            }
            CaptureError::Other(message) => message.clone(),
        }
    }

    /// Sort a backend-specific description into a cause.
    fn classify(description: String) -> Self {
        let lower = description.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not permitted")
        {
            CaptureError::PermissionDenied(description)
        } else if lower.contains("busy") || lower.contains("in use") {
            CaptureError::DeviceBusy(description)
        } else if lower.contains("no such device") || lower.contains("not found") {
            CaptureError::NoDevice
        } else {
            CaptureError::Other(description)
        }
    }
}

impl From<cpal::DevicesError> for CaptureError {
    fn from(err: cpal::DevicesError) -> Self {
        CaptureError::classify(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        match err {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::NoDevice,
            cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                CaptureError::Unsupported(err.to_string())
            }
            other => CaptureError::classify(other.to_string()),
        }
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceBusy(err.to_string())
            }
            cpal::BuildStreamError::StreamConfigNotSupported => {
                CaptureError::Unsupported(err.to_string())
            }
            other => CaptureError::classify(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceBusy(err.to_string()),
            other => CaptureError::classify(other.to_string()),
        }
    }
}

/// Something that can open an exclusive capture session.
pub trait CaptureBackend: Send {
    fn open(&mut self) -> Result<Box<dyn CaptureSession>, CaptureError>;
}

/// A live capture. Dropping it releases the device before `drop` returns.
pub trait CaptureSession: Send {
    fn sample_rate(&self) -> u32;

    /// Hand every mono sample captured since the last call to `sink`.
    fn drain(&mut self, sink: &mut dyn FnMut(f32));
}

/// Captures from a cpal input device.
#[derive(Debug, Clone, Default)]
pub struct CpalCapture {
    device_name: Option<String>,
}

impl CpalCapture {
    /// Use the host's default input device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the first input device whose name matches.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }
}

impl CaptureBackend for CpalCapture {
    fn open(&mut self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32, CaptureError>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (producer, consumer) = rtrb::RingBuffer::<f32>::new(RING_CAPACITY);
        let device_name = self.device_name.clone();

        let thread = thread::Builder::new()
            .name("wayvibes-capture".to_string())
            .spawn(move || run_capture_thread(device_name, producer, ready_tx, stop_rx))
            .map_err(|err| CaptureError::Other(err.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => {
                tracing::info!(sample_rate, "audio capture started");
                Ok(Box::new(CpalSession {
                    sample_rate,
                    consumer,
                    stop: Some(stop_tx),
                    thread: Some(thread),
                }))
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::Other("capture thread exited".to_string()))
            }
        }
    }
}

fn run_capture_thread(
    device_name: Option<String>,
    producer: rtrb::Producer<f32>,
    ready: Sender<Result<u32, CaptureError>>,
    stop: Receiver<()>,
) {
    let (stream, sample_rate) = match start_stream(device_name.as_deref(), producer) {
        Ok(started) => started,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if ready.send(Ok(sample_rate)).is_err() {
        return;
    }
    // Returns once the session drops its sender.
    let _ = stop.recv();
    drop(stream);
    tracing::info!("audio capture stopped");
}

fn find_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    match name {
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
        Some(name) => host
            .input_devices()?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or(CaptureError::NoDevice),
    }
}

fn start_stream(
    device_name: Option<&str>,
    producer: rtrb::Producer<f32>,
) -> Result<(cpal::Stream, u32), CaptureError> {
    let host = cpal::default_host();
    let device = find_device(&host, device_name)?;
    let supported = device.default_input_config()?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let sample_rate = config.sample_rate.0;

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, producer)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, producer)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, producer)?,
        sample_format => {
            return Err(CaptureError::Unsupported(format!(
                "sample format '{sample_format}'"
            )));
        }
    };
    stream.play()?;

    Ok((stream, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: rtrb::Producer<f32>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let sum: f32 = frame.iter().map(|s| s.to_sample::<f32>()).sum();
                // A full ring means the reader fell behind; drop the frame.
                let _ = producer.push(sum / frame.len() as f32);
            }
        },
        |err| tracing::warn!("input stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

struct CpalSession {
    sample_rate: u32,
    consumer: rtrb::Consumer<f32>,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureSession for CpalSession {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn drain(&mut self, sink: &mut dyn FnMut(f32)) {
        while let Ok(sample) = self.consumer.pop() {
            sink(sample);
        }
    }
}

impl Drop for CpalSession {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("capture thread panicked");
            }
        }
    }
}
