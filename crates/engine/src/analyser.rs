//! Byte-scaled frequency analysis of the most recent input samples.
//!
//! Mirrors a browser `AnalyserNode`: Hann-windowed FFT over the last
//! `fft_size` samples, magnitudes smoothed over time, converted to decibels
//! and mapped linearly from `[MIN_DECIBELS, MAX_DECIBELS]` onto `0..=255`.

use std::collections::VecDeque;

use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{FrequencyLimit, samples_fft_to_spectrum};

pub const FFT_SIZE: usize = 128;
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.7;
pub const MIN_DECIBELS: f32 = -100.0;
pub const MAX_DECIBELS: f32 = -30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserSettings {
    /// Must be a power of two.
    pub fft_size: usize,
    /// Weight of the previous frame, in `[0, 1)`.
    pub smoothing: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: FFT_SIZE,
            smoothing: SMOOTHING_TIME_CONSTANT,
        }
    }
}

pub struct Analyser {
    sample_rate: u32,
    settings: AnalyserSettings,
    time_domain: VecDeque<f32>,
    /// Hann coefficients, computed once per analyser.
    window: Vec<f32>,
    scratch: Vec<f32>,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn new(sample_rate: u32, settings: AnalyserSettings) -> Self {
        debug_assert!(settings.fft_size.is_power_of_two());
        Self {
            sample_rate,
            settings,
            time_domain: VecDeque::with_capacity(settings.fft_size),
            window: hann_window(&vec![1.0; settings.fft_size]),
            scratch: vec![0.0; settings.fft_size],
            smoothed: vec![0.0; settings.fft_size / 2],
        }
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.settings.fft_size / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn push_sample(&mut self, sample: f32) {
        if self.time_domain.len() == self.settings.fft_size {
            self.time_domain.pop_front();
        }
        // NaN would poison the FFT for a whole window.
        self.time_domain
            .push_back(if sample.is_finite() { sample } else { 0.0 });
    }

    /// Fill `out` with the current spectrum, one byte per bin.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        // Left-pad with silence until a full window has been captured.
        let padding = self.settings.fft_size - self.time_domain.len();
        let samples = std::iter::repeat_n(0.0, padding).chain(self.time_domain.iter().copied());
        let windowed = samples.zip(&self.window).map(|(sample, c)| sample * c);
        for (slot, value) in self.scratch.iter_mut().zip(windowed) {
            *slot = value;
        }

        let smoothing = self.settings.smoothing;
        let spectrum = samples_fft_to_spectrum(
            &self.scratch,
            self.sample_rate,
            FrequencyLimit::All,
            Some(&divide_by_N),
        );
        match spectrum {
            Ok(spectrum) => {
                let bins = spectrum.data().iter().map(|(_, value)| value.val());
                for (smoothed, magnitude) in self.smoothed.iter_mut().zip(bins) {
                    *smoothed = smoothing * *smoothed + (1.0 - smoothing) * magnitude;
                }
            }
            Err(err) => {
                tracing::trace!("fft failed: {err:?}");
                for smoothed in &mut self.smoothed {
                    *smoothed *= smoothing;
                }
            }
        }

        for (byte, magnitude) in out.iter_mut().zip(&self.smoothed) {
            *byte = magnitude_to_byte(*magnitude);
        }
    }
}

pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 || !magnitude.is_finite() {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}
