//! Downsampled peak overviews for waveform displays

/// Peak overview of a recording, one value per display column
#[derive(Debug, Clone, Default)]
pub struct WaveformOverview {
    /// Peak amplitude per point (0.0 - 1.0)
    pub peaks: Vec<f32>,
    /// Duration of the source audio in seconds
    pub duration_secs: f64,
}

impl WaveformOverview {
    /// Build an overview from mono samples
    pub fn from_samples(samples: &[f32], sample_rate: u32, target_points: usize) -> Self {
        let duration_secs = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };

        if samples.is_empty() || target_points == 0 {
            return Self {
                peaks: vec![0.0; target_points],
                duration_secs,
            };
        }

        let chunk_size = samples.len().div_ceil(target_points).max(1);
        let peaks = samples
            .chunks(chunk_size)
            .map(|chunk| chunk.iter().map(|s| s.abs()).fold(0.0f32, f32::max).min(1.0))
            .collect();

        Self { peaks, duration_secs }
    }

    /// Render as a one-line bar graph of `width` cells
    pub fn sparkline(&self, width: usize) -> String {
        const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
        if self.peaks.is_empty() || width == 0 {
            return String::new();
        }
        let step = self.peaks.len() as f32 / width as f32;
        (0..width)
            .map(|i| {
                let start = (i as f32 * step) as usize;
                let end = (((i + 1) as f32 * step) as usize).clamp(start + 1, self.peaks.len());
                let peak = self.peaks[start.min(self.peaks.len() - 1)..end]
                    .iter()
                    .cloned()
                    .fold(0.0f32, f32::max);
                LEVELS[((peak * 7.0).round() as usize).min(7)]
            })
            .collect()
    }
}
