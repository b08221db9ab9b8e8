//! Global mix bus
//!
//! One record tap fed by the gain stage of every channel playing when the
//! recording starts, and one playback source wired straight to the output.
//! Independent of per-channel state.

use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::graph::NodeId;
use crate::manager::ChannelManager;
use crate::nodes::{BufferSource, Node, RecordTap};
use orbit_media::AudioBuffer;
use std::sync::Arc;
use tracing::{info, warn};

/// Seconds of stereo audio the tap reserves up front
const TAP_RESERVE_SECS: usize = 30;

#[derive(Default)]
pub struct GlobalMix {
    pub(crate) tap: Option<NodeId>,
    pub(crate) buffer: Option<Arc<AudioBuffer>>,
    pub(crate) source: Option<NodeId>,
}

impl ChannelManager {
    /// Tap every playing channel; returns how many were connected
    pub fn start_global_record(&mut self) -> Result<usize, EngineError> {
        if self.mix.tap.is_some() {
            return Err(EngineError::GlobalMixBusy);
        }

        let reserve = self.context.sample_rate() as usize * 2 * TAP_RESERVE_SECS;
        let gains: Vec<NodeId> = self
            .channels
            .iter()
            .filter(|c| c.is_playing())
            .map(|c| c.gain_node())
            .collect();

        let mut graph = self.context.lock();
        let tap = graph.add(Node::RecordTap(RecordTap::with_capacity(reserve)));
        for &gain in &gains {
            if let Err(err) = graph.connect(gain, tap) {
                graph.remove(tap);
                return Err(err.into());
            }
        }
        drop(graph);

        self.mix.tap = Some(tap);
        info!(channels = gains.len(), "global mix recording started");
        Ok(gains.len())
    }

    /// Remove the tap and commit what it captured
    ///
    /// Returns `None` when nothing was recording or nothing was captured.
    pub fn stop_global_record(&mut self) -> Result<Option<Arc<AudioBuffer>>, EngineError> {
        let Some(tap) = self.mix.tap.take() else {
            return Ok(None);
        };
        let samples = match self.context.lock().remove(tap) {
            Some(Node::RecordTap(tap)) => tap.into_samples(),
            _ => Vec::new(),
        };
        if samples.is_empty() {
            warn!("global mix captured no audio");
            return Ok(None);
        }

        self.release_global_source();
        let buffer = Arc::new(AudioBuffer::from_interleaved(self.context.sample_rate(), 2, &samples));
        self.mix.buffer = Some(buffer.clone());

        info!(duration = buffer.duration(), "global mix recorded");
        self.events.emit(EngineEvent::GlobalMixRecorded { buffer: buffer.clone() });
        Ok(Some(buffer))
    }

    /// Play the recorded mix from the start; false if there is none
    pub fn play_global_mix(&mut self) -> Result<bool, EngineError> {
        let Some(buffer) = self.mix.buffer.clone() else {
            return Ok(false);
        };
        self.release_global_source();

        let mut source = BufferSource::new(buffer);
        source.start();
        {
            let mut graph = self.context.lock();
            let node = graph.add(Node::Source(source));
            let destination = graph.destination();
            if let Err(err) = graph.connect(node, destination) {
                graph.remove(node);
                return Err(err.into());
            }
            self.mix.source = Some(node);
        }

        info!("global mix playback started");
        self.events.emit(EngineEvent::GlobalPlaybackStarted);
        Ok(true)
    }

    pub fn stop_global_mix(&mut self) {
        self.release_global_source();
    }

    pub(crate) fn release_global_source(&mut self) -> bool {
        let Some(source) = self.mix.source.take() else {
            return false;
        };
        self.context.lock().remove(source);
        info!("global mix playback stopped");
        self.events.emit(EngineEvent::GlobalPlaybackStopped);
        true
    }

    pub fn global_mix(&self) -> Option<&Arc<AudioBuffer>> {
        self.mix.buffer.as_ref()
    }

    pub fn is_global_recording(&self) -> bool {
        self.mix.tap.is_some()
    }

    pub fn is_global_playing(&self) -> bool {
        self.mix.source.is_some()
    }
}
