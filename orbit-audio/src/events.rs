//! Lifecycle events delivered to subscribers

use crossbeam_channel::{unbounded, Receiver, Sender};
use orbit_media::AudioBuffer;
use std::sync::Arc;

/// Events emitted by the channel engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    RecordingStarted { channel_id: usize },
    RecordingStopped { channel_id: usize },
    PlaybackStarted { channel_id: usize },
    PlaybackStopped { channel_id: usize },
    /// New or replaced audio for a channel; `is_final` is false for
    /// previews decoded while recording
    WaveformUpdate {
        channel_id: usize,
        buffer: Arc<AudioBuffer>,
        is_final: bool,
    },
    GlobalMixRecorded { buffer: Arc<AudioBuffer> },
    GlobalPlaybackStarted,
    GlobalPlaybackStopped,
}

impl EngineEvent {
    pub fn channel_id(&self) -> Option<usize> {
        match self {
            EngineEvent::RecordingStarted { channel_id }
            | EngineEvent::RecordingStopped { channel_id }
            | EngineEvent::PlaybackStarted { channel_id }
            | EngineEvent::PlaybackStopped { channel_id }
            | EngineEvent::WaveformUpdate { channel_id, .. } => Some(*channel_id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::RecordingStarted { .. } => "recordingStarted",
            EngineEvent::RecordingStopped { .. } => "recordingStopped",
            EngineEvent::PlaybackStarted { .. } => "playbackStarted",
            EngineEvent::PlaybackStopped { .. } => "playbackStopped",
            EngineEvent::WaveformUpdate { .. } => "waveformUpdate",
            EngineEvent::GlobalMixRecorded { .. } => "globalMixRecorded",
            EngineEvent::GlobalPlaybackStarted => "globalPlaybackStarted",
            EngineEvent::GlobalPlaybackStopped => "globalPlaybackStopped",
        }
    }
}

/// Fan-out of events to any number of subscribers
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EngineEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are forgotten
    pub fn emit(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives() {
        let mut bus = EventBus::default();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(EngineEvent::PlaybackStarted { channel_id: 3 });
        assert_eq!(a.try_recv().unwrap().channel_id(), Some(3));
        assert_eq!(b.try_recv().unwrap().name(), "playbackStarted");
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut bus = EventBus::default();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        bus.emit(EngineEvent::GlobalPlaybackStarted);
        assert_eq!(bus.subscribers.len(), 1);
        assert!(kept.try_recv().unwrap().channel_id().is_none());
    }
}
