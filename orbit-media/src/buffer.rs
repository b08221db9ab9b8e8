//! Decoded audio held by a channel

/// Planar f32 audio at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    /// One Vec per channel, all the same length
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build from planar channel data
    ///
    /// Channels shorter than the longest one are padded with silence.
    pub fn from_planar(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(frames, 0.0);
        }
        Self { sample_rate, channels }
    }

    /// Build from interleaved samples
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let channels = (0..channel_count)
            .map(|ch| (0..frames).map(|f| samples[f * channel_count + ch]).collect())
            .collect();
        Self { sample_rate, channels }
    }

    /// Silent buffer of the given shape
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count.max(1)],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Stereo frame at `frame`; mono is duplicated, extra channels are ignored
    #[inline]
    pub fn stereo_frame(&self, frame: usize) -> (f32, f32) {
        let left = self.channels.first().and_then(|c| c.get(frame)).copied().unwrap_or(0.0);
        let right = self
            .channels
            .get(1)
            .and_then(|c| c.get(frame))
            .copied()
            .unwrap_or(left);
        (left, right)
    }

    /// Mono mixdown
    pub fn to_mono(&self) -> Vec<f32> {
        let count = self.channels.len().max(1) as f32;
        (0..self.len())
            .map(|f| self.channels.iter().map(|c| c[f]).sum::<f32>() / count)
            .collect()
    }

    /// Frame index nearest to `seconds`, clamped to the buffer
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        frame.min(self.len())
    }

    /// Copy of the frames in `[start, end)` seconds
    ///
    /// Returns `None` when the range is empty after clamping to the buffer.
    pub fn slice_seconds(&self, start: f64, end: f64) -> Option<AudioBuffer> {
        let start_frame = self.frame_at(start);
        let end_frame = self.frame_at(end);
        if start_frame >= end_frame {
            return None;
        }
        let channels = self
            .channels
            .iter()
            .map(|c| c[start_frame..end_frame].to_vec())
            .collect();
        Some(Self {
            sample_rate: self.sample_rate,
            channels,
        })
    }
}
