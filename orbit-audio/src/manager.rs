//! Channel manager
//!
//! Owns the channel pool, the audio context and the global mix, and is the
//! only place channel state changes. Every topology change goes through
//! `wire_chain`, which tears a channel's path down and relinks it as
//! `source -> effects... -> analyser -> gain -> destination`.
//!
//! The manager is driven from one control thread. `pump()` must be called
//! regularly: it handles render-side notices, feeds recorders and commits
//! finished recordings.

use crate::capture::{CaptureConstraints, InputBackend, TrackReader};
use crate::channel::{AnalyserFrame, Channel, LiveInput};
use crate::context::AudioContext;
use crate::effects::{EffectFactory, EffectParams, ParamUpdate};
use crate::error::{CleanupError, DeviceError, EngineError, GraphError};
use crate::events::{EngineEvent, EventBus};
use crate::global_mix::GlobalMix;
use crate::graph::{Graph, GraphNotice, NodeId};
use crate::nodes::{AnalyserTap, BufferSource, CaptureTap, GainStage, Node, SourceState};
use crate::registry::{EffectId, EffectInstance};
use crossbeam_channel::Receiver;
use orbit_analysis::{AnalyserSettings, SpectrumAnalyzer};
use orbit_media::{ChunkDecoder, ChunkRecorder, Config, DEFAULT_CHANNEL_COUNT, DEFAULT_CHUNK_INTERVAL};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Engine construction settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Size of the channel pool
    pub channel_count: usize,
    /// Recorder chunk cadence
    pub chunk_interval: Duration,
    pub analyser: AnalyserSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channel_count: DEFAULT_CHANNEL_COUNT,
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            analyser: AnalyserSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            channel_count: config.channel_count,
            chunk_interval: config.chunk_interval(),
            ..Self::default()
        }
    }
}

pub struct ChannelManager {
    pub(crate) context: AudioContext,
    pub(crate) channels: Vec<Channel>,
    factory: EffectFactory,
    decoder: ChunkDecoder,
    input: Box<dyn InputBackend>,
    pub(crate) events: EventBus,
    settings: EngineSettings,
    next_effect_id: u64,
    pub(crate) mix: GlobalMix,
}

fn add_stages(graph: &mut Graph, settings: &AnalyserSettings) -> (NodeId, NodeId) {
    let analyser = graph.add(Node::Analyser(AnalyserTap::new(settings.fft_size)));
    let gain = graph.add(Node::Gain(GainStage::new(1.0)));
    (analyser, gain)
}

/// Rebuild a channel's signal path from scratch
///
/// No source means nothing to wire; effect nodes stay detached until
/// playback starts.
fn wire_chain(graph: &mut Graph, channel: &Channel) -> Result<(), GraphError> {
    let Some(source) = channel.source else {
        return Ok(());
    };

    graph.disconnect(source);
    for node in channel.effects.nodes() {
        graph.disconnect(node);
    }

    let mut upstream = source;
    for node in channel.effects.nodes() {
        graph.connect(upstream, node)?;
        upstream = node;
    }
    graph.connect(upstream, channel.analyser)?;
    graph.connect(channel.analyser, channel.gain)?;
    graph.connect(channel.gain, graph.destination())?;

    debug!(channel = channel.id(), effects = channel.effects.len(), "signal chain rebuilt");
    Ok(())
}

impl ChannelManager {
    pub fn new(
        context: AudioContext,
        input: Box<dyn InputBackend>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        settings.analyser.validate()?;
        let sample_rate = context.sample_rate();

        let mut channels = Vec::with_capacity(settings.channel_count);
        {
            let mut graph = context.lock();
            for id in 0..settings.channel_count {
                let (analyser, gain) = add_stages(&mut graph, &settings.analyser);
                let spectrum = SpectrumAnalyzer::with_settings(sample_rate, settings.analyser)?;
                channels.push(Channel::new(id, analyser, gain, spectrum));
            }
        }

        info!(channels = settings.channel_count, sample_rate, "channel manager ready");
        Ok(Self {
            context,
            channels,
            factory: EffectFactory::new(sample_rate),
            decoder: ChunkDecoder::new(sample_rate),
            input,
            events: EventBus::default(),
            settings,
            next_effect_id: 1,
            mix: GlobalMix::default(),
        })
    }

    /// Receive lifecycle events from now on
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    /// Context clock in seconds
    pub fn current_time(&self) -> f64 {
        self.context.current_time()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, id: usize) -> Result<&Channel, EngineError> {
        self.channels.get(id).ok_or(EngineError::InvalidChannel(id))
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Names of the input devices the backend can open
    pub fn input_devices(&self) -> Vec<String> {
        self.input.device_names()
    }

    fn check(&self, id: usize) -> Result<(), EngineError> {
        if id < self.channels.len() {
            Ok(())
        } else {
            Err(EngineError::InvalidChannel(id))
        }
    }

    /// Return a channel to its freshly created state
    ///
    /// Never fails: unknown ids are ignored and failing cleanup callbacks
    /// are logged while the remaining ones still run.
    pub fn reset_channel(&mut self, id: usize) {
        if id >= self.channels.len() {
            warn!(channel = id, "reset of unknown channel ignored");
            return;
        }

        self.release_source(id);
        if self.channels[id].is_recording {
            self.halt_recording(id);
        }
        if self.channels[id].live.is_some() {
            self.finalize_recording(id);
        }

        let channel = &mut self.channels[id];
        let effects = channel.effects.drain();
        {
            let mut graph = self.context.lock();
            for effect in &effects {
                graph.remove(effect.node);
            }
            graph.remove(channel.analyser);
            graph.remove(channel.gain);
            let (analyser, gain) = add_stages(&mut graph, &self.settings.analyser);
            channel.analyser = analyser;
            channel.gain = gain;
        }

        channel.buffer = None;
        channel.is_playing = false;
        channel.is_recording = false;
        channel.is_looping = false;
        channel.spectrum.reset();

        for cleanup in std::mem::take(&mut channel.cleanups) {
            if let Err(err) = cleanup() {
                error!(channel = id, %err, "cleanup callback failed");
            }
        }
        debug!(channel = id, "channel reset");
    }

    /// Register a callback to run on the channel's next reset
    pub fn register_cleanup<F>(&mut self, id: usize, cleanup: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Result<(), CleanupError> + 'static,
    {
        self.check(id)?;
        self.channels[id].cleanups.push(Box::new(cleanup));
        Ok(())
    }

    /// Start capturing into a fresh take
    pub fn start_recording(&mut self, id: usize, device_id: Option<&str>) -> Result<(), EngineError> {
        self.check(id)?;
        self.reset_channel(id);

        let constraints = CaptureConstraints::voice(device_id);
        let mut stream = match self.input.open(&constraints) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(channel = id, %err, "input acquisition failed");
                self.reset_channel(id);
                return Err(err.into());
            }
        };
        let Some(primary) = stream.take_primary() else {
            self.reset_channel(id);
            return Err(DeviceError::Stream("input stream has no track".to_string()).into());
        };
        let (_, monitor_reader) = primary.split();
        let (_, record_reader) = stream.clone_track().split();

        let monitor = match self.attach_monitor(id, monitor_reader, stream.channels()) {
            Ok(node) => node,
            Err(err) => {
                stream.stop_all();
                self.reset_channel(id);
                return Err(err);
            }
        };

        let mut recorder = ChunkRecorder::new(stream.sample_rate(), stream.channels(), self.settings.chunk_interval);
        recorder.start();

        let controls = stream.track_controls();
        let channel = &mut self.channels[id];
        channel.cleanups.push(Box::new(move || {
            for control in &controls {
                control.set_enabled(false);
                control.stop();
            }
            Ok(())
        }));
        channel.live = Some(LiveInput::new(stream, monitor, record_reader, recorder));
        channel.is_recording = true;

        info!(channel = id, device = device_id.unwrap_or("default"), "recording started");
        self.events.emit(EngineEvent::RecordingStarted { channel_id: id });
        Ok(())
    }

    /// Route the monitor track into the analysis stage only
    fn attach_monitor(&self, id: usize, reader: TrackReader, channels: u16) -> Result<NodeId, EngineError> {
        let analyser = self.channels[id].analyser;
        let mut graph = self.context.lock();
        let node = graph.add(Node::Capture(CaptureTap::new(reader, channels)));
        if let Err(err) = graph.connect(node, analyser) {
            graph.remove(node);
            return Err(err.into());
        }
        Ok(node)
    }

    /// Stop capturing; the take is committed by the next `pump()`
    pub fn stop_recording(&mut self, id: usize) -> Result<(), EngineError> {
        self.check(id)?;
        if self.channels[id].is_recording {
            self.halt_recording(id);
        }
        Ok(())
    }

    fn halt_recording(&mut self, id: usize) {
        let channel = &mut self.channels[id];
        if let Some(live) = channel.live.as_mut() {
            live.drain_capture();
            let tail = live.recorder.stop();
            live.chunks.extend(tail);
            live.finalizing = true;
        }
        channel.is_recording = false;

        info!(channel = id, "recording stopped");
        self.events.emit(EngineEvent::RecordingStopped { channel_id: id });
    }

    /// Decode the take, commit it and release capture-only resources
    fn finalize_recording(&mut self, id: usize) {
        let channel = &mut self.channels[id];
        let Some(mut live) = channel.live.take() else {
            return;
        };

        if live.chunks.is_empty() {
            warn!(channel = id, "recording captured no audio");
        } else {
            match self.decoder.decode(&live.chunks) {
                Ok(buffer) => {
                    let buffer = Arc::new(buffer);
                    info!(channel = id, duration = buffer.duration(), "recording committed");
                    channel.buffer = Some(buffer.clone());
                    self.events.emit(EngineEvent::WaveformUpdate {
                        channel_id: id,
                        buffer,
                        is_final: true,
                    });
                }
                Err(err) => error!(channel = id, %err, "failed to decode recording"),
            }
        }

        live.stream.stop_all();
        self.context.lock().remove(live.monitor);
    }

    /// Feed the recorder and publish a preview when new chunks completed
    fn pump_capture(&mut self, id: usize) {
        let Some(live) = self.channels[id].live.as_mut() else {
            return;
        };
        if live.finalizing {
            return;
        }

        live.drain_capture();
        let ready = live.recorder.take_ready();
        if ready.is_empty() {
            return;
        }
        live.chunks.extend(ready);

        match self.decoder.decode(&live.chunks) {
            Ok(buffer) => self.events.emit(EngineEvent::WaveformUpdate {
                channel_id: id,
                buffer: Arc::new(buffer),
                is_final: false,
            }),
            Err(err) => warn!(channel = id, %err, "preview decode failed"),
        }
    }

    /// Control-thread step: notices, capture, finalization
    pub fn pump(&mut self) {
        let notices: Vec<GraphNotice> = self.context.notices().try_iter().collect();
        for notice in notices {
            self.handle_notice(notice);
        }

        for id in 0..self.channels.len() {
            self.pump_capture(id);
        }
        for id in 0..self.channels.len() {
            if self.channels[id].is_finalizing() {
                self.finalize_recording(id);
            }
        }
    }

    fn handle_notice(&mut self, notice: GraphNotice) {
        match notice {
            GraphNotice::SourceEnded(node) => {
                // Indices are recycled; only a finished source counts
                let finished = matches!(
                    self.context.lock().node(node),
                    Some(Node::Source(source)) if source.state() == SourceState::Finished
                );
                if !finished {
                    debug!(?node, "notice for a released source ignored");
                } else if let Some(id) = self.channels.iter().position(|c| c.source == Some(node)) {
                    debug!(channel = id, "playback reached the end");
                    self.release_source(id);
                } else if self.mix.source == Some(node) {
                    self.release_global_source();
                } else {
                    debug!(?node, "notice for a released source ignored");
                }
            }
        }
    }

    /// Stop and drop the channel's source; emits playbackStopped if one existed
    fn release_source(&mut self, id: usize) -> bool {
        let channel = &mut self.channels[id];
        channel.is_playing = false;
        let Some(source) = channel.source.take() else {
            return false;
        };
        self.context.lock().remove(source);

        info!(channel = id, "playback stopped");
        self.events.emit(EngineEvent::PlaybackStopped { channel_id: id });
        true
    }

    /// Play the channel's buffer from the start
    pub fn play_channel(&mut self, id: usize) -> Result<(), EngineError> {
        self.check(id)?;
        let Some(buffer) = self.channels[id].buffer.clone() else {
            debug!(channel = id, "nothing to play");
            return Ok(());
        };
        self.release_source(id);

        if buffer.is_empty() {
            warn!(channel = id, "refusing to play an empty buffer");
            self.reset_channel(id);
            return Err(EngineError::EmptyBuffer(id));
        }

        let channel = &mut self.channels[id];
        let mut source = BufferSource::new(buffer);
        source.set_looping(channel.is_looping);
        source.start();

        let wired = {
            let mut graph = self.context.lock();
            let node = graph.add(Node::Source(source));
            channel.source = Some(node);
            wire_chain(&mut graph, channel)
        };
        if let Err(err) = wired {
            error!(channel = id, %err, "failed to wire playback");
            self.reset_channel(id);
            return Err(err.into());
        }
        channel.is_playing = true;

        info!(channel = id, looping = channel.is_looping, "playback started");
        self.events.emit(EngineEvent::PlaybackStarted { channel_id: id });
        Ok(())
    }

    pub fn stop_channel(&mut self, id: usize) -> Result<(), EngineError> {
        self.check(id)?;
        self.release_source(id);
        Ok(())
    }

    pub fn restart_channel(&mut self, id: usize) -> Result<(), EngineError> {
        self.stop_channel(id)?;
        self.play_channel(id)
    }

    /// Update the loop flag, including on the running source
    pub fn set_looping(&mut self, id: usize, looping: bool) -> Result<(), EngineError> {
        self.check(id)?;
        let channel = &mut self.channels[id];
        channel.is_looping = looping;
        if let Some(source) = channel.source {
            if let Some(Node::Source(node)) = self.context.lock().node_mut(source) {
                node.set_looping(looping);
            }
        }
        Ok(())
    }

    /// Set the gain; values are clamped to [0, 1]
    pub fn set_volume(&mut self, id: usize, value: f32) -> Result<f32, EngineError> {
        self.check(id)?;
        if !value.is_finite() {
            return Err(EngineError::InvalidValue(value));
        }
        let value = value.clamp(0.0, 1.0);
        if let Some(Node::Gain(stage)) = self.context.lock().node_mut(self.channels[id].gain) {
            stage.set_gain(value);
        }
        Ok(value)
    }

    pub fn volume(&self, id: usize) -> Result<f32, EngineError> {
        let channel = self.channel(id)?;
        match self.context.lock().node(channel.gain) {
            Some(Node::Gain(stage)) => Ok(stage.gain()),
            _ => Err(GraphError::UnknownNode(channel.gain).into()),
        }
    }

    /// Replace the buffer with its `[start, end)` seconds
    pub fn trim_buffer(&mut self, id: usize, start: f64, end: f64) -> Result<(), EngineError> {
        let channel = self.channel(id)?;
        if channel.is_recording || channel.live.is_some() {
            return Err(EngineError::ChannelBusy(id));
        }
        let Some(buffer) = channel.buffer.clone() else {
            return Ok(());
        };
        if !start.is_finite() || !end.is_finite() || start < 0.0 || start >= end {
            return Err(EngineError::InvalidRange { start, end });
        }
        let trimmed = buffer
            .slice_seconds(start, end.min(buffer.duration()))
            .ok_or(EngineError::InvalidRange { start, end })?;

        self.release_source(id);
        let trimmed = Arc::new(trimmed);
        self.channels[id].buffer = Some(trimmed.clone());

        info!(channel = id, start, end, duration = trimmed.duration(), "buffer trimmed");
        self.events.emit(EngineEvent::WaveformUpdate {
            channel_id: id,
            buffer: trimmed,
            is_final: true,
        });
        Ok(())
    }

    /// Stop and fully reset a channel
    pub fn delete_channel(&mut self, id: usize) -> Result<(), EngineError> {
        self.stop_channel(id)?;
        self.reset_channel(id);
        Ok(())
    }

    /// Attach an effect at the end of the chain
    pub fn add_effect(&mut self, id: usize, params: EffectParams) -> Result<EffectId, EngineError> {
        self.check(id)?;
        let processor = self.factory.build(&params)?;
        let effect_id = EffectId(self.next_effect_id);
        self.next_effect_id += 1;

        let channel = &mut self.channels[id];
        let mut graph = self.context.lock();
        let node = graph.add(Node::Effect(processor));
        channel.effects.push(EffectInstance {
            id: effect_id,
            params,
            node,
        });

        if let Err(err) = wire_chain(&mut graph, channel) {
            channel.effects.remove(effect_id);
            graph.remove(node);
            if let Err(rewire) = wire_chain(&mut graph, channel) {
                warn!(channel = id, err = %rewire, "failed to restore chain after rollback");
            }
            return Err(err.into());
        }

        info!(channel = id, effect = %effect_id, %params, "effect added");
        Ok(effect_id)
    }

    /// Detach an effect; returns false if it wasn't on this channel
    pub fn remove_effect(&mut self, id: usize, effect: EffectId) -> Result<bool, EngineError> {
        self.check(id)?;
        let channel = &mut self.channels[id];
        let Some(instance) = channel.effects.remove(effect) else {
            return Ok(false);
        };

        let mut graph = self.context.lock();
        graph.remove(instance.node);
        wire_chain(&mut graph, channel)?;

        info!(channel = id, effect = %effect, "effect removed");
        Ok(true)
    }

    pub fn remove_all_effects(&mut self, id: usize) -> Result<(), EngineError> {
        self.check(id)?;
        let channel = &mut self.channels[id];
        let mut graph = self.context.lock();
        for instance in channel.effects.drain() {
            graph.remove(instance.node);
        }
        wire_chain(&mut graph, channel)?;
        Ok(())
    }

    /// Effects on a channel in signal-path order
    pub fn effects(&self, id: usize) -> Result<Vec<(EffectId, EffectParams)>, EngineError> {
        Ok(self
            .channel(id)?
            .effects
            .iter()
            .map(|e| (e.id, e.params))
            .collect())
    }

    /// Apply a partial parameter update
    ///
    /// Live-tunable parameters reach the running processor without touching
    /// the graph; anything else rebuilds the processor in place.
    pub fn update_effect_params(
        &mut self,
        id: usize,
        effect: EffectId,
        update: &ParamUpdate,
    ) -> Result<(), EngineError> {
        self.check(id)?;
        let channel = &mut self.channels[id];
        let instance = channel
            .effects
            .get(effect)
            .ok_or(EngineError::UnknownEffect(effect))?;
        let merged = instance.params.merged(update)?;

        if instance.params.needs_rebuild(update) {
            let processor = self.factory.build(&merged)?;
            let mut graph = self.context.lock();
            let node = graph.add(Node::Effect(processor));
            if let Some(old) = channel.effects.replace(effect, node, merged) {
                graph.remove(old);
            }
            wire_chain(&mut graph, channel)?;
            info!(channel = id, effect = %effect, params = %merged, "effect rebuilt");
        } else {
            let node = instance.node;
            if let Some(Node::Effect(processor)) = self.context.lock().node_mut(node) {
                merged.apply_live_update(processor);
            }
            channel.effects.set_params(effect, merged);
            debug!(channel = id, effect = %effect, params = %merged, "effect updated live");
        }
        Ok(())
    }

    /// Node ids from the channel's source to the destination
    pub fn signal_path(&self, id: usize) -> Result<Vec<NodeId>, EngineError> {
        let channel = self.channel(id)?;
        Ok(match channel.source {
            Some(source) => self.context.lock().path_from(source),
            None => Vec::new(),
        })
    }

    /// Snapshot of the channel's analysis stage
    pub fn analyser(&mut self, id: usize) -> Result<AnalyserFrame, EngineError> {
        self.check(id)?;
        let channel = &mut self.channels[id];
        let time_domain = match self.context.lock().node(channel.analyser) {
            Some(Node::Analyser(tap)) => tap.snapshot(),
            _ => Vec::new(),
        };
        let spectrum = channel.spectrum.process(&time_domain);
        Ok(AnalyserFrame { time_domain, spectrum })
    }
}
