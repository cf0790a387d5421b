//! Live input spectrum for the Wayvibes UI.
//!
//! [`AudioSpectrumController`] owns at most one capture session at a time and
//! turns the captured samples into a byte-per-bin spectrum on demand.
//! [`FrequencyPoller`] pulls that spectrum on a fixed cadence.

pub mod analyser;
pub mod capture;
pub mod poll;

pub use analyser::{Analyser, AnalyserSettings, FFT_SIZE};
pub use capture::{CaptureBackend, CaptureError, CaptureSession, CpalCapture};
pub use poll::FrequencyPoller;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumState {
    Disabled,
    /// The device is being opened off the caller's thread.
    Starting,
    Enabled,
}

type OpenResult = Result<Box<dyn CaptureSession>, CaptureError>;

struct ActiveSession {
    // Declared first so the device is released before anything else.
    capture: Box<dyn CaptureSession>,
    analyser: Analyser,
    data: Vec<u8>,
}

pub struct AudioSpectrumController {
    backend: Arc<Mutex<Box<dyn CaptureBackend>>>,
    settings: AnalyserSettings,
    state: SpectrumState,
    error: Option<String>,
    opening: Option<oneshot::Receiver<OpenResult>>,
    session: Option<ActiveSession>,
}

impl AudioSpectrumController {
    pub fn new(backend: impl CaptureBackend + 'static) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
            settings: AnalyserSettings::default(),
            state: SpectrumState::Disabled,
            error: None,
            opening: None,
            session: None,
        }
    }

    /// Capture from the default input device.
    pub fn with_cpal() -> Self {
        Self::new(CpalCapture::new())
    }

    /// State as of the last [`update`](Self::update) or
    /// [`frequency_data`](Self::frequency_data) call.
    pub fn state(&self) -> SpectrumState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == SpectrumState::Enabled
    }

    /// Why the last `start` failed, if it did.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Begin opening the capture device on `handle`'s blocking pool and
    /// return at once. The controller stays `Starting` until the open
    /// finishes. Does nothing unless currently disabled.
    pub fn start(&mut self, handle: &Handle) {
        if self.state != SpectrumState::Disabled {
            return;
        }
        self.error = None;
        self.state = SpectrumState::Starting;

        let (done, opening) = oneshot::channel();
        let backend = self.backend.clone();
        handle.spawn_blocking(move || {
            let opened = backend
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .open();
            // A stop while opening dropped the receiver; the session is
            // handed back here and released.
            let _ = done.send(opened);
        });
        self.opening = Some(opening);
        tracing::debug!("spectrum starting");
    }

    /// Pick up the result of a pending open, if it has arrived.
    pub fn update(&mut self) -> SpectrumState {
        let Some(opening) = self.opening.as_mut() else {
            return self.state;
        };
        let opened = match opening.try_recv() {
            Ok(opened) => opened,
            Err(TryRecvError::Empty) => return self.state,
            Err(TryRecvError::Closed) => {
                Err(CaptureError::Other("device open was abandoned".to_string()))
            }
        };
        self.opening = None;

        match opened {
            Ok(capture) => {
                let analyser = Analyser::new(capture.sample_rate(), self.settings);
                let data = vec![0; analyser.frequency_bin_count()];
                self.session = Some(ActiveSession {
                    capture,
                    analyser,
                    data,
                });
                self.state = SpectrumState::Enabled;
                tracing::debug!("spectrum enabled");
            }
            Err(err) => {
                tracing::warn!("audio capture failed: {err}");
                self.error = Some(err.user_message());
                self.state = SpectrumState::Disabled;
            }
        }
        self.state
    }

    /// Release the device and buffers. Safe to call in any state; an open
    /// still in flight is discarded when it completes.
    pub fn stop(&mut self) {
        self.state = SpectrumState::Disabled;
        self.opening = None;
        if self.session.take().is_some() {
            tracing::debug!("spectrum disabled");
        }
    }

    /// Current spectrum, one byte per bin, or `None` while not enabled.
    ///
    /// The returned slice is the controller's own buffer, overwritten on
    /// every call.
    pub fn frequency_data(&mut self) -> Option<&[u8]> {
        self.update();
        let session = self.session.as_mut()?;
        let analyser = &mut session.analyser;
        session.capture.drain(&mut |sample| analyser.push_sample(sample));
        analyser.byte_frequency_data(&mut session.data);
        Some(&session.data)
    }
}

impl Drop for AudioSpectrumController {
    fn drop(&mut self) {
        self.stop();
    }
}
