//! Platform synchronizer
//!
//! Starts a set of looping channels together, each after its own offset.
//! Offsets are scheduling delays on the context clock, not a shared
//! transport, so members can drift apart over long loops.

use crate::error::EngineError;
use crate::manager::ChannelManager;
use tracing::{debug, info, warn};

/// Offsets are limited to this many seconds either way
pub const MAX_OFFSET_SECS: f32 = 5.0;

/// Clamp to the allowed range and snap to 0.1 s steps
pub fn quantize_offset(secs: f32) -> f32 {
    (secs.clamp(-MAX_OFFSET_SECS, MAX_OFFSET_SECS) * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformMember {
    pub channel: usize,
    pub offset: f32,
}

#[derive(Debug, Clone, Copy)]
struct PendingStart {
    channel: usize,
    due: f64,
}

#[derive(Debug, Default)]
pub struct PlatformSync {
    members: Vec<PlatformMember>,
    playing: bool,
    pending: Vec<PendingStart>,
}

impl PlatformSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel with an offset; false if it already was a member
    ///
    /// Membership has no effect until the platform plays.
    pub fn add_member(&mut self, manager: &ChannelManager, channel: usize, offset: f32) -> Result<bool, EngineError> {
        manager.channel(channel)?;
        if !offset.is_finite() {
            return Err(EngineError::InvalidValue(offset));
        }
        if self.contains(channel) {
            return Ok(false);
        }
        self.members.push(PlatformMember {
            channel,
            offset: quantize_offset(offset),
        });
        debug!(channel, offset, "platform member added");
        Ok(true)
    }

    /// Drop a member; while playing this also stops the channel
    pub fn remove_member(&mut self, manager: &mut ChannelManager, channel: usize) -> Result<bool, EngineError> {
        let Some(index) = self.members.iter().position(|m| m.channel == channel) else {
            return Ok(false);
        };
        self.members.remove(index);
        self.pending.retain(|p| p.channel != channel);
        if self.playing {
            manager.stop_channel(channel)?;
        }
        debug!(channel, "platform member removed");
        Ok(true)
    }

    pub fn contains(&self, channel: usize) -> bool {
        self.members.iter().any(|m| m.channel == channel)
    }

    pub fn members(&self) -> &[PlatformMember] {
        &self.members
    }

    pub fn offset(&self, channel: usize) -> Option<f32> {
        self.members.iter().find(|m| m.channel == channel).map(|m| m.offset)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Starts still waiting for their offset
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Change a member's offset; a playing member is restarted with it
    pub fn set_offset(&mut self, manager: &mut ChannelManager, channel: usize, secs: f32) -> Result<f32, EngineError> {
        if !secs.is_finite() {
            return Err(EngineError::InvalidValue(secs));
        }
        let offset = quantize_offset(secs);
        let member = self
            .members
            .iter_mut()
            .find(|m| m.channel == channel)
            .ok_or(EngineError::NotInPlatform(channel))?;
        member.offset = offset;

        if self.playing {
            self.pending.retain(|p| p.channel != channel);
            manager.stop_channel(channel)?;
            self.schedule(manager, channel, offset);
        }
        Ok(offset)
    }

    /// Loop every member, each after its offset
    pub fn play(&mut self, manager: &mut ChannelManager) {
        self.pending.clear();
        let members = self.members.clone();
        for member in members {
            if let Err(err) = manager.set_looping(member.channel, true) {
                warn!(channel = member.channel, %err, "platform member unavailable");
                continue;
            }
            self.schedule(manager, member.channel, member.offset);
        }
        self.playing = true;
        info!(members = self.members.len(), pending = self.pending.len(), "platform playing");
    }

    fn schedule(&mut self, manager: &mut ChannelManager, channel: usize, offset: f32) {
        // Playback can't start in the past
        let delay = offset.max(0.0) as f64;
        if delay == 0.0 {
            start_member(manager, channel);
        } else {
            self.pending.push(PendingStart {
                channel,
                due: manager.current_time() + delay,
            });
        }
    }

    /// Start members whose offset has elapsed; returns how many started
    pub fn tick(&mut self, manager: &mut ChannelManager) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let now = manager.current_time();
        let (due, waiting): (Vec<PendingStart>, Vec<PendingStart>) =
            self.pending.iter().partition(|p| p.due <= now);
        self.pending = waiting;
        for start in &due {
            start_member(manager, start.channel);
        }
        due.len()
    }

    /// Cancel pending starts and stop every member
    pub fn stop(&mut self, manager: &mut ChannelManager) {
        self.pending.clear();
        for member in &self.members {
            if let Err(err) = manager.stop_channel(member.channel) {
                warn!(channel = member.channel, %err, "failed to stop platform member");
            }
        }
        self.playing = false;
        info!("platform stopped");
    }
}

fn start_member(manager: &mut ChannelManager, channel: usize) {
    if let Err(err) = manager.play_channel(channel) {
        warn!(channel, %err, "platform member failed to start");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EngineEvent;
    use crate::test_support::{drain, engine, record};

    fn started(events: &[EngineEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::PlaybackStarted { channel_id } => Some(*channel_id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_quantize_offset() {
        assert_eq!(quantize_offset(0.44), 0.4);
        assert_eq!(quantize_offset(0.46), 0.5);
        assert_eq!(quantize_offset(9.0), 5.0);
        assert_eq!(quantize_offset(-7.3), -5.0);
    }

    #[test]
    fn test_offsets_delay_starts() {
        let (mut manager, input, events) = engine();
        record(&mut manager, &input, 1, 0.3);
        record(&mut manager, &input, 3, 0.3);
        let mut platform = PlatformSync::new();
        platform.add_member(&manager, 1, 0.0).unwrap();
        platform.add_member(&manager, 3, 0.5).unwrap();
        drain(&events);

        platform.play(&mut manager);
        assert!(platform.is_playing());
        assert!(manager.channel(1).unwrap().is_playing());
        assert!(!manager.channel(3).unwrap().is_playing());
        assert!(manager.channel(1).unwrap().is_looping());
        assert!(manager.channel(3).unwrap().is_looping());

        manager.context().advance(0.4);
        assert_eq!(platform.tick(&mut manager), 0);
        assert!(!manager.channel(3).unwrap().is_playing());

        manager.context().advance(0.1);
        assert_eq!(platform.tick(&mut manager), 1);
        assert!(manager.channel(3).unwrap().is_playing());
        assert_eq!(started(&drain(&events)), vec![1, 3]);

        platform.stop(&mut manager);
        assert!(!platform.is_playing());
        assert!(!manager.channel(1).unwrap().is_playing());
        assert!(!manager.channel(3).unwrap().is_playing());
    }

    #[test]
    fn test_stop_cancels_pending_starts() {
        let (mut manager, input, events) = engine();
        record(&mut manager, &input, 0, 0.3);
        let mut platform = PlatformSync::new();
        platform.add_member(&manager, 0, 1.0).unwrap();

        platform.play(&mut manager);
        assert_eq!(platform.pending_count(), 1);
        platform.stop(&mut manager);
        drain(&events);

        manager.context().advance(1.5);
        assert_eq!(platform.tick(&mut manager), 0);
        assert!(!manager.channel(0).unwrap().is_playing());
        assert!(drain(&events).is_empty());
    }

    #[test]
    fn test_negative_offset_starts_immediately() {
        let (mut manager, input, _) = engine();
        record(&mut manager, &input, 2, 0.3);
        let mut platform = PlatformSync::new();
        platform.add_member(&manager, 2, -1.5).unwrap();
        assert_eq!(platform.offset(2), Some(-1.5));

        platform.play(&mut manager);
        assert!(manager.channel(2).unwrap().is_playing());
        assert_eq!(platform.pending_count(), 0);
    }

    #[test]
    fn test_membership() {
        let (mut manager, _, _) = engine();
        let mut platform = PlatformSync::new();
        assert!(platform.add_member(&manager, 0, 0.0).unwrap());
        assert!(!platform.add_member(&manager, 0, 1.0).unwrap());
        assert!(matches!(
            platform.add_member(&manager, 7, 0.0),
            Err(EngineError::InvalidChannel(7))
        ));
        assert_eq!(platform.offset(0), Some(0.0));
        assert!(platform.remove_member(&mut manager, 0).unwrap());
        assert!(!platform.remove_member(&mut manager, 0).unwrap());
        assert!(platform.members().is_empty());
    }

    #[test]
    fn test_remove_while_playing_stops_member() {
        let (mut manager, input, _) = engine();
        record(&mut manager, &input, 0, 0.3);
        record(&mut manager, &input, 1, 0.3);
        let mut platform = PlatformSync::new();
        platform.add_member(&manager, 0, 0.0).unwrap();
        platform.add_member(&manager, 1, 2.0).unwrap();
        platform.play(&mut manager);

        platform.remove_member(&mut manager, 0).unwrap();
        platform.remove_member(&mut manager, 1).unwrap();
        assert!(!manager.channel(0).unwrap().is_playing());
        assert_eq!(platform.pending_count(), 0);
    }

    #[test]
    fn test_offset_change_restarts_playing_member() {
        let (mut manager, input, events) = engine();
        record(&mut manager, &input, 0, 0.3);
        let mut platform = PlatformSync::new();
        platform.add_member(&manager, 0, 0.0).unwrap();
        assert!(matches!(
            platform.set_offset(&mut manager, 4, 1.0),
            Err(EngineError::NotInPlatform(4))
        ));

        platform.play(&mut manager);
        assert_eq!(platform.set_offset(&mut manager, 0, 0.24).unwrap(), 0.2);
        assert!(!manager.channel(0).unwrap().is_playing());
        assert_eq!(platform.pending_count(), 1);

        manager.context().advance(0.25);
        assert_eq!(platform.tick(&mut manager), 1);
        assert!(manager.channel(0).unwrap().is_playing());
        assert_eq!(started(&drain(&events)), vec![0, 0]);
    }

    #[test]
    fn test_offset_change_while_stopped_is_stored() {
        let (mut manager, _, events) = engine();
        let mut platform = PlatformSync::new();
        platform.add_member(&manager, 0, 0.0).unwrap();
        drain(&events);
        assert_eq!(platform.set_offset(&mut manager, 0, 12.0).unwrap(), 5.0);
        assert_eq!(platform.offset(0), Some(5.0));
        assert!(drain(&events).is_empty());
    }
}
