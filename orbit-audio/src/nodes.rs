//! Audio graph node kinds
//!
//! All nodes render stereo interleaved blocks.

use crate::capture::TrackReader;
use crate::effects::{Effect, EffectProcessor};
use orbit_media::AudioBuffer;
use std::sync::Arc;

/// Buffer source lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    Playing,
    Finished,
}

/// Plays an `AudioBuffer` once or in a loop
pub struct BufferSource {
    buffer: Arc<AudioBuffer>,
    /// Playhead in frames
    position: usize,
    looping: bool,
    state: SourceState,
}

impl BufferSource {
    pub fn new(buffer: Arc<AudioBuffer>) -> Self {
        Self {
            buffer,
            position: 0,
            looping: false,
            state: SourceState::Idle,
        }
    }

    /// Start from the beginning
    pub fn start(&mut self) {
        self.position = 0;
        self.state = SourceState::Playing;
    }

    pub fn stop(&mut self) {
        self.state = SourceState::Finished;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    /// Render one block; returns true when playback ran out during it
    fn render(&mut self, out: &mut [f32]) -> bool {
        let len = self.buffer.len();
        let mut ended = false;

        for frame in out.chunks_exact_mut(2) {
            if self.state == SourceState::Playing && self.position >= len {
                if self.looping && len > 0 {
                    self.position = 0;
                } else {
                    self.state = SourceState::Finished;
                    ended = true;
                }
            }

            if self.state != SourceState::Playing {
                frame[0] = 0.0;
                frame[1] = 0.0;
                continue;
            }

            let (left, right) = self.buffer.stereo_frame(self.position);
            frame[0] = left;
            frame[1] = right;
            self.position += 1;
        }

        ended
    }
}

/// Volume stage
pub struct GainStage {
    gain: f32,
}

impl GainStage {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }
}

/// Pass-through that remembers the last window of mono samples
pub struct AnalyserTap {
    ring: Vec<f32>,
    write: usize,
}

impl AnalyserTap {
    pub fn new(window: usize) -> Self {
        Self {
            ring: vec![0.0; window.max(1)],
            write: 0,
        }
    }

    fn capture(&mut self, samples: &[f32]) {
        for frame in samples.chunks_exact(2) {
            self.ring[self.write] = (frame[0] + frame[1]) * 0.5;
            self.write = (self.write + 1) % self.ring.len();
        }
    }

    /// Last window of mono samples, oldest first
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.ring.len());
        out.extend_from_slice(&self.ring[self.write..]);
        out.extend_from_slice(&self.ring[..self.write]);
        out
    }
}

/// Live input monitor: reads a capture track into the graph
pub struct CaptureTap {
    reader: TrackReader,
    channels: usize,
    scratch: Vec<f32>,
}

impl CaptureTap {
    pub fn new(reader: TrackReader, channels: u16) -> Self {
        Self {
            reader,
            channels: channels.max(1) as usize,
            scratch: vec![0.0; 8192],
        }
    }

    fn render(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        let wanted = frames * self.channels;

        // Drop backlog beyond a few blocks to stay close to real time
        while self.reader.available() > wanted * 4 {
            let excess = (self.reader.available() - wanted).min(self.scratch.len());
            if self.reader.read(&mut self.scratch[..excess]) == 0 {
                break;
            }
        }

        if self.scratch.len() < wanted {
            self.scratch.resize(wanted, 0.0);
        }
        let read = self.reader.read(&mut self.scratch[..wanted]);
        let read_frames = read / self.channels;

        for (i, frame) in out.chunks_exact_mut(2).enumerate() {
            if i < read_frames {
                let base = i * self.channels;
                let left = self.scratch[base];
                let right = if self.channels > 1 { self.scratch[base + 1] } else { left };
                frame[0] = left;
                frame[1] = right;
            } else {
                frame[0] = 0.0;
                frame[1] = 0.0;
            }
        }
    }
}

/// Sink that records everything routed into it
pub struct RecordTap {
    frames: Vec<f32>,
}

impl RecordTap {
    pub fn with_capacity(samples: usize) -> Self {
        Self {
            frames: Vec::with_capacity(samples),
        }
    }

    /// Recorded stereo interleaved samples
    pub fn into_samples(self) -> Vec<f32> {
        self.frames
    }
}

/// A node in the audio graph
pub enum Node {
    Source(BufferSource),
    Effect(EffectProcessor),
    Analyser(AnalyserTap),
    Gain(GainStage),
    Capture(CaptureTap),
    RecordTap(RecordTap),
    Destination,
}

impl Node {
    /// Render one block from the summed input; returns true if a source ended
    pub(crate) fn process(&mut self, input: &[f32], output: &mut [f32]) -> bool {
        match self {
            Node::Source(source) => return source.render(output),
            Node::Effect(fx) => {
                output.copy_from_slice(input);
                fx.process(output);
            }
            Node::Analyser(tap) => {
                output.copy_from_slice(input);
                tap.capture(input);
            }
            Node::Gain(stage) => {
                for (out, sample) in output.iter_mut().zip(input) {
                    *out = sample * stage.gain;
                }
            }
            Node::Capture(tap) => tap.render(output),
            Node::RecordTap(tap) => {
                tap.frames.extend_from_slice(input);
                output.fill(0.0);
            }
            Node::Destination => output.copy_from_slice(input),
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(frames: usize) -> Arc<AudioBuffer> {
        let samples = (0..frames).map(|i| (i + 1) as f32).collect();
        Arc::new(AudioBuffer::from_planar(100, vec![samples]))
    }

    #[test]
    fn test_source_plays_once_then_ends() {
        let mut source = BufferSource::new(buffer(3));
        let mut out = vec![9.0; 10];
        assert!(!source.render(&mut out), "idle source is silent and never ends");
        assert!(out.iter().all(|&s| s == 0.0));

        source.start();
        assert!(source.render(&mut out));
        assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(source.state(), SourceState::Finished);
        assert!(!source.render(&mut out), "ended is reported once");
    }

    #[test]
    fn test_source_loops() {
        let mut source = BufferSource::new(buffer(2));
        source.set_looping(true);
        source.start();
        let mut out = vec![0.0; 10];
        assert!(!source.render(&mut out));
        assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0, 1.0, 1.0]);
        assert_eq!(source.state(), SourceState::Playing);
    }

    #[test]
    fn test_gain_and_analyser() {
        let mut gain = Node::Gain(GainStage::new(0.5));
        let mut out = vec![0.0; 4];
        gain.process(&[1.0, -1.0, 0.5, 0.5], &mut out);
        assert_eq!(out, vec![0.5, -0.5, 0.25, 0.25]);

        let mut tap = AnalyserTap::new(4);
        tap.capture(&[1.0, 0.0, 0.2, 0.2, 0.4, 0.4]);
        assert_eq!(tap.snapshot(), vec![0.0, 0.5, 0.2, 0.4]);
    }

    #[test]
    fn test_record_tap_collects_input() {
        let mut node = Node::RecordTap(RecordTap::with_capacity(8));
        let mut out = vec![1.0; 4];
        node.process(&[0.1, 0.2, 0.3, 0.4], &mut out);
        assert_eq!(out, vec![0.0; 4]);
        match node {
            Node::RecordTap(tap) => assert_eq!(tap.into_samples(), vec![0.1, 0.2, 0.3, 0.4]),
            _ => unreachable!(),
        }
    }
}
