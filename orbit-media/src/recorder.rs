//! Chunked capture recorder
//!
//! Captured samples are cut into chunks at a fixed cadence (measured in
//! captured frames) so partial recordings can be previewed while the take
//! is still running. Stopping flushes whatever is left as a final, shorter
//! chunk.

use std::time::Duration;

/// Default chunk cadence
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_millis(500);

/// One encoded slice of a recording (interleaved f32 plus its format)
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedChunk {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl EncodedChunk {
    /// Length in frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Inactive,
    Recording,
}

/// Accumulates captured samples and cuts them into chunks
#[derive(Debug)]
pub struct ChunkRecorder {
    sample_rate: u32,
    channels: u16,
    /// Interleaved samples per chunk
    chunk_samples: usize,
    pending: Vec<f32>,
    ready: Vec<EncodedChunk>,
    state: RecorderState,
    frames_captured: u64,
}

impl ChunkRecorder {
    pub fn new(sample_rate: u32, channels: u16, interval: Duration) -> Self {
        let channels = channels.max(1);
        let chunk_frames = ((interval.as_secs_f64() * sample_rate as f64).round() as usize).max(1);
        let chunk_samples = chunk_frames * channels as usize;
        Self {
            sample_rate,
            channels,
            chunk_samples,
            pending: Vec::with_capacity(chunk_samples),
            ready: Vec::new(),
            state: RecorderState::Inactive,
            frames_captured: 0,
        }
    }

    pub fn start(&mut self) {
        self.pending.clear();
        self.ready.clear();
        self.frames_captured = 0;
        self.state = RecorderState::Recording;
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Frames accepted since `start`
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Feed interleaved samples; ignored unless recording
    ///
    /// NaN and infinite samples are stored as silence.
    pub fn push(&mut self, samples: &[f32]) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.frames_captured += (samples.len() / self.channels as usize) as u64;

        let mut rest = samples;
        while !rest.is_empty() {
            let room = self.chunk_samples - self.pending.len();
            let take = room.min(rest.len());
            // Non-finite samples would poison the whole take at decode
            self.pending
                .extend(rest[..take].iter().map(|&s| if s.is_finite() { s } else { 0.0 }));
            rest = &rest[take..];
            if self.pending.len() == self.chunk_samples {
                let samples = std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_samples));
                self.ready.push(self.chunk(samples));
            }
        }
    }

    /// Take the chunks completed since the last call
    pub fn take_ready(&mut self) -> Vec<EncodedChunk> {
        std::mem::take(&mut self.ready)
    }

    /// Stop and return the remaining chunks, including the partial tail
    pub fn stop(&mut self) -> Vec<EncodedChunk> {
        if self.state == RecorderState::Recording {
            // Drop a trailing partial frame
            let whole = self.pending.len() - self.pending.len() % self.channels as usize;
            self.pending.truncate(whole);
            if !self.pending.is_empty() {
                let samples = std::mem::take(&mut self.pending);
                self.ready.push(self.chunk(samples));
            }
        }
        self.state = RecorderState::Inactive;
        std::mem::take(&mut self.ready)
    }

    fn chunk(&self, samples: Vec<f32>) -> EncodedChunk {
        EncodedChunk {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        }
    }
}
