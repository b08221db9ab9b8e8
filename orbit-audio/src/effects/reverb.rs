//! Convolution reverb with a synthetic decaying-noise impulse
//!
//! The impulse is `duration` seconds of uniform noise shaped by
//! `(1 - t)^decay`, equal-power normalized. Convolution is uniformly
//! partitioned in the frequency domain (overlap-save), so the wet signal
//! trails the dry one by one partition.

use super::Effect;
use rand::Rng;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Frames per convolution partition
pub const PARTITION_FRAMES: usize = 1024;

/// Dry signal level
pub const DRY_LEVEL: f32 = 0.5;

/// Wet (reverberated) signal level
pub const WET_LEVEL: f32 = 0.5;

const FFT_LEN: usize = PARTITION_FRAMES * 2;

/// Per-channel convolution state
struct Convolver {
    /// Impulse spectrum per partition
    partitions: Vec<Vec<Complex<f32>>>,
    /// Input spectra ring, newest at `head`
    history: Vec<Vec<Complex<f32>>>,
    /// Previous + current input block
    window: Vec<f32>,
    /// Wet output of the last processed block
    wet: Vec<f32>,
}

/// Stereo convolution reverb
pub struct ConvolutionReverb {
    duration: f32,
    decay: f32,
    impulse_frames: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    convolvers: [Convolver; 2],
    head: usize,
    /// Frames gathered in the current block
    fill: usize,
    spectrum: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
}

impl ConvolutionReverb {
    /// Build the impulse and precompute its partition spectra
    pub fn new<R: Rng + ?Sized>(sample_rate: u32, duration: f32, decay: f32, rng: &mut R) -> Self {
        let impulse_frames = ((duration * sample_rate as f32) as usize).max(1);

        let mut impulse: [Vec<f32>; 2] = [Vec::new(), Vec::new()];
        for channel in impulse.iter_mut() {
            *channel = (0..impulse_frames)
                .map(|i| {
                    let envelope = (1.0 - i as f32 / impulse_frames as f32).powf(decay);
                    rng.gen_range(-1.0f32..=1.0) * envelope
                })
                .collect();
        }

        // Equal-power normalization
        let energy: f32 = impulse.iter().flatten().map(|s| s * s).sum::<f32>() / 2.0;
        let scale = if energy > 0.0 { 1.0 / energy.sqrt() } else { 0.0 };

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_LEN);
        let ifft = planner.plan_fft_inverse(FFT_LEN);

        let partition_count = impulse_frames.div_ceil(PARTITION_FRAMES);
        let convolvers = impulse.map(|channel| {
            let partitions = channel
                .chunks(PARTITION_FRAMES)
                .map(|part| {
                    let mut spectrum = vec![Complex::new(0.0, 0.0); FFT_LEN];
                    for (slot, &s) in spectrum.iter_mut().zip(part) {
                        *slot = Complex::new(s * scale, 0.0);
                    }
                    fft.process(&mut spectrum);
                    spectrum
                })
                .collect();
            Convolver {
                partitions,
                history: vec![vec![Complex::new(0.0, 0.0); FFT_LEN]; partition_count],
                window: vec![0.0; FFT_LEN],
                wet: vec![0.0; PARTITION_FRAMES],
            }
        });

        Self {
            duration,
            decay,
            impulse_frames,
            fft,
            ifft,
            convolvers,
            head: 0,
            fill: 0,
            spectrum: vec![Complex::new(0.0, 0.0); FFT_LEN],
            accum: vec![Complex::new(0.0, 0.0); FFT_LEN],
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Impulse length in frames
    pub fn impulse_frames(&self) -> usize {
        self.impulse_frames
    }

    fn process_block(&mut self) {
        let partition_count = self.convolvers[0].partitions.len();
        let norm = 1.0 / FFT_LEN as f32;

        for convolver in self.convolvers.iter_mut() {
            for (slot, &s) in self.spectrum.iter_mut().zip(&convolver.window) {
                *slot = Complex::new(s, 0.0);
            }
            self.fft.process(&mut self.spectrum);
            convolver.history[self.head].copy_from_slice(&self.spectrum);

            self.accum.fill(Complex::new(0.0, 0.0));
            for (p, partition) in convolver.partitions.iter().enumerate() {
                let input = &convolver.history[(self.head + partition_count - p) % partition_count];
                for ((acc, x), h) in self.accum.iter_mut().zip(input).zip(partition) {
                    *acc += x * h;
                }
            }
            self.ifft.process(&mut self.accum);

            for (out, value) in convolver.wet.iter_mut().zip(&self.accum[PARTITION_FRAMES..]) {
                *out = value.re * norm;
            }
            convolver.window.copy_within(PARTITION_FRAMES.., 0);
        }

        self.head = (self.head + 1) % partition_count;
    }
}

impl Effect for ConvolutionReverb {
    fn process(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(2) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let convolver = &mut self.convolvers[ch];
                let dry = *sample;
                convolver.window[PARTITION_FRAMES + self.fill] = dry;
                *sample = dry * DRY_LEVEL + convolver.wet[self.fill] * WET_LEVEL;
            }

            self.fill += 1;
            if self.fill == PARTITION_FRAMES {
                self.process_block();
                self.fill = 0;
            }
        }
    }

    fn reset(&mut self) {
        for convolver in self.convolvers.iter_mut() {
            for spectrum in convolver.history.iter_mut() {
                spectrum.fill(Complex::new(0.0, 0.0));
            }
            convolver.window.fill(0.0);
            convolver.wet.fill(0.0);
        }
        self.head = 0;
        self.fill = 0;
    }

    fn name(&self) -> &'static str {
        "Reverb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reverb(sample_rate: u32, duration: f32, decay: f32) -> ConvolutionReverb {
        let mut rng = StdRng::seed_from_u64(7);
        ConvolutionReverb::new(sample_rate, duration, decay, &mut rng)
    }

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    #[test]
    fn test_impulse_length_follows_duration() {
        assert_eq!(reverb(8000, 0.5, 0.5).impulse_frames(), 4000);
        assert_eq!(reverb(8000, 2.0, 0.5).impulse_frames(), 16000);
    }

    #[test]
    fn test_impulse_response_has_decaying_tail() {
        let mut fx = reverb(8000, 0.5, 0.5);
        let frames = 8000;
        let mut samples = vec![0.0; frames * 2];
        samples[0] = 1.0;
        samples[1] = 1.0;
        fx.process(&mut samples);

        assert!((samples[0] - DRY_LEVEL).abs() < 1e-6, "dry component");
        assert!(samples.iter().all(|s| s.is_finite()));

        let left: Vec<f32> = samples.chunks_exact(2).map(|f| f[0]).collect();
        // Wet starts one partition late and spans the impulse
        let early = energy(&left[PARTITION_FRAMES..PARTITION_FRAMES + 1000]);
        let late = energy(&left[PARTITION_FRAMES + 3000..PARTITION_FRAMES + 4000]);
        assert!(early > 0.0);
        assert!(early > late, "tail should decay: early {} late {}", early, late);
        // Nothing after the impulse has passed
        assert!(energy(&left[PARTITION_FRAMES + 4100..]) < 1e-6);
    }

    #[test]
    fn test_normalized_level() {
        let mut fx = reverb(8000, 1.0, 0.5);
        let mut samples = vec![0.0; 16000 * 2];
        samples[0] = 1.0;
        fx.process(&mut samples);
        let wet: Vec<f32> = samples.chunks_exact(2).skip(1).map(|f| f[0] / WET_LEVEL).collect();
        let total = energy(&wet);
        assert!(
            (0.5..2.0).contains(&total),
            "impulse energy should be near unity, got {}",
            total
        );
    }

    #[test]
    fn test_reset_silences_tail() {
        let mut fx = reverb(8000, 0.5, 0.5);
        let mut samples = vec![0.5; 2048 * 2];
        fx.process(&mut samples);
        fx.reset();
        let mut silence = vec![0.0; 8000 * 2];
        fx.process(&mut silence);
        assert!(silence.iter().all(|&s| s == 0.0));
    }
}
