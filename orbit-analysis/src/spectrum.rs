//! FFT spectrum for a channel's analysis stage
//!
//! The analysis stage keeps the most recent window of mono samples; the
//! control side turns a snapshot of that window into smoothed log bands.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use thiserror::Error;

/// Number of frequency bands in the spectrum display
pub const SPECTRUM_BANDS: usize = 32;

/// Default analysis window (frames)
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Default smoothing between successive snapshots
pub const DEFAULT_SMOOTHING: f32 = 0.8;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("FFT size must be a power of two between 32 and 32768, got {0}")]
    InvalidFftSize(usize),
    #[error("Smoothing must be within [0, 1), got {0}")]
    InvalidSmoothing(f32),
}

/// Analyser configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserSettings {
    pub fft_size: usize,
    pub smoothing: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl AnalyserSettings {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(AnalysisError::InvalidFftSize(self.fft_size));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(AnalysisError::InvalidSmoothing(self.smoothing));
        }
        Ok(())
    }
}

/// Spectrum data for visualization
#[derive(Clone, Copy, Debug, Default)]
pub struct SpectrumData {
    /// Magnitude per band (0.0 - 1.0)
    pub bands: [f32; SPECTRUM_BANDS],
    /// Peak level (0.0 - 1.0)
    pub peak: f32,
}

/// FFT spectrum analyzer with snapshot-to-snapshot smoothing
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    fft_size: usize,
    fft: std::sync::Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    frequency_bands: [(f32, f32); SPECTRUM_BANDS],
    smoothing: f32,
    previous_magnitudes: [f32; SPECTRUM_BANDS],
    /// Pre-allocated FFT buffer
    fft_buffer: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer with the default window and smoothing
    pub fn new(sample_rate: u32) -> Self {
        Self::build(sample_rate, AnalyserSettings::default())
    }

    /// Create an analyzer with explicit settings
    pub fn with_settings(sample_rate: u32, settings: AnalyserSettings) -> Result<Self, AnalysisError> {
        settings.validate()?;
        Ok(Self::build(sample_rate, settings))
    }

    fn build(sample_rate: u32, settings: AnalyserSettings) -> Self {
        let fft_size = settings.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        // Logarithmically spaced bands (20Hz - 20kHz)
        let mut bands = [(0.0f32, 0.0f32); SPECTRUM_BANDS];
        let min_freq = 20.0f32;
        let max_freq = 20000.0f32.min(sample_rate as f32 / 2.0);
        let log_min = min_freq.ln();
        let log_max = max_freq.ln();

        for (i, band) in bands.iter_mut().enumerate() {
            let t0 = i as f32 / SPECTRUM_BANDS as f32;
            let t1 = (i + 1) as f32 / SPECTRUM_BANDS as f32;
            *band = (
                (log_min + t0 * (log_max - log_min)).exp(),
                (log_min + t1 * (log_max - log_min)).exp(),
            );
        }

        Self {
            sample_rate,
            fft_size,
            fft,
            window,
            frequency_bands: bands,
            smoothing: settings.smoothing,
            previous_magnitudes: [0.0; SPECTRUM_BANDS],
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Analysis window length in frames
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Analyze mono samples and return smoothed band magnitudes
    ///
    /// Only the last `fft_size` samples are used; shorter input is zero padded.
    pub fn analyze(&mut self, samples: &[f32]) -> [f32; SPECTRUM_BANDS] {
        let start = samples.len().saturating_sub(self.fft_size);
        let samples = &samples[start..];

        for (i, slot) in self.fft_buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let mut magnitudes = [0.0f32; SPECTRUM_BANDS];
        let bin_width = self.sample_rate as f32 / self.fft_size as f32;
        // Hann window halves the coherent gain
        let scale = 4.0 / self.fft_size as f32;

        for (i, &(low, high)) in self.frequency_bands.iter().enumerate() {
            let start_bin = (low / bin_width) as usize;
            let end_bin = ((high / bin_width) as usize).min(self.fft_size / 2);

            if start_bin < end_bin {
                let peak = self.fft_buffer[start_bin..end_bin]
                    .iter()
                    .map(|c| c.norm())
                    .fold(0.0f32, f32::max);
                magnitudes[i] = (peak * scale).clamp(0.0, 1.0);
            }
        }

        for (mag, prev) in magnitudes
            .iter_mut()
            .zip(self.previous_magnitudes.iter_mut())
        {
            *mag = *prev * self.smoothing + *mag * (1.0 - self.smoothing);
            *prev = *mag;
        }

        magnitudes
    }

    /// Get the peak level from samples (0.0 - 1.0)
    pub fn peak_level(samples: &[f32]) -> f32 {
        samples
            .iter()
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
            .min(1.0)
    }

    /// Process samples and return SpectrumData
    pub fn process(&mut self, samples: &[f32]) -> SpectrumData {
        let bands = self.analyze(samples);
        let peak = Self::peak_level(samples);
        SpectrumData { bands, peak }
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.previous_magnitudes = [0.0; SPECTRUM_BANDS];
    }
}
