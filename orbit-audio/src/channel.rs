//! Channel state
//!
//! A channel owns its buffer, its live input while recording, its effect
//! chain and its analysis/gain stages. Only `ChannelManager` mutates it.

use crate::capture::{InputStream, TrackReader};
use crate::error::CleanupError;
use crate::graph::NodeId;
use crate::registry::EffectRegistry;
use orbit_analysis::SpectrumAnalyzer;
use orbit_media::{AudioBuffer, ChunkRecorder, EncodedChunk};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cleanup callback run by the next channel reset
pub type CleanupFn = Box<dyn FnOnce() -> Result<(), CleanupError>>;

/// Capture resources held while recording and until finalization
pub(crate) struct LiveInput {
    pub stream: InputStream,
    /// Monitor node feeding the analysis stage
    pub monitor: NodeId,
    /// Cloned track feeding the recorder
    pub record: TrackReader,
    pub recorder: ChunkRecorder,
    pub chunks: Vec<EncodedChunk>,
    pub started_at: Instant,
    /// Recorder stopped, waiting for the final decode
    pub finalizing: bool,
    scratch: Vec<f32>,
}

impl LiveInput {
    pub fn new(stream: InputStream, monitor: NodeId, record: TrackReader, recorder: ChunkRecorder) -> Self {
        Self {
            stream,
            monitor,
            record,
            recorder,
            chunks: Vec::new(),
            started_at: Instant::now(),
            finalizing: false,
            scratch: vec![0.0; 8192],
        }
    }

    /// Move captured samples from the recording track into the recorder
    pub fn drain_capture(&mut self) {
        loop {
            let read = self.record.read(&mut self.scratch);
            if read == 0 {
                break;
            }
            self.recorder.push(&self.scratch[..read]);
        }
    }
}

/// Analysis stage snapshot
#[derive(Debug, Clone)]
pub struct AnalyserFrame {
    /// Last analysis window of mono samples, oldest first
    pub time_domain: Vec<f32>,
    pub spectrum: orbit_analysis::SpectrumData,
}

pub struct Channel {
    id: usize,
    pub(crate) buffer: Option<Arc<AudioBuffer>>,
    pub(crate) is_playing: bool,
    pub(crate) is_recording: bool,
    pub(crate) is_looping: bool,
    pub(crate) source: Option<NodeId>,
    pub(crate) effects: EffectRegistry,
    pub(crate) analyser: NodeId,
    pub(crate) gain: NodeId,
    pub(crate) live: Option<LiveInput>,
    pub(crate) cleanups: Vec<CleanupFn>,
    pub(crate) spectrum: SpectrumAnalyzer,
}

impl Channel {
    pub(crate) fn new(id: usize, analyser: NodeId, gain: NodeId, spectrum: SpectrumAnalyzer) -> Self {
        Self {
            id,
            buffer: None,
            is_playing: false,
            is_recording: false,
            is_looping: false,
            source: None,
            effects: EffectRegistry::new(),
            analyser,
            gain,
            live: None,
            cleanups: Vec::new(),
            spectrum,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Buffer duration in seconds, 0 when empty
    pub fn duration(&self) -> f64 {
        self.buffer.as_ref().map_or(0.0, |b| b.duration())
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping
    }

    /// Recording stopped but not yet committed
    pub fn is_finalizing(&self) -> bool {
        self.live.as_ref().is_some_and(|live| live.finalizing)
    }

    /// Time since capture started
    pub fn recording_elapsed(&self) -> Option<Duration> {
        self.live.as_ref().map(|live| live.started_at.elapsed())
    }

    pub fn source_node(&self) -> Option<NodeId> {
        self.source
    }

    pub fn analyser_node(&self) -> NodeId {
        self.analyser
    }

    pub fn gain_node(&self) -> NodeId {
        self.gain
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }
}
