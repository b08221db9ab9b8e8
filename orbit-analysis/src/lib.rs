//! Audio analysis for Orbit
//!
//! Spectrum snapshots for each channel's analysis stage and peak
//! overviews for waveform consumers.

mod spectrum;
mod waveform;

pub use spectrum::{
    AnalyserSettings, AnalysisError, SpectrumAnalyzer, SpectrumData, DEFAULT_FFT_SIZE,
    DEFAULT_SMOOTHING, SPECTRUM_BANDS,
};
pub use waveform::WaveformOverview;
