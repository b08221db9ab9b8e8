//! Audio engine for Orbit - looping channels, effect chains, platform sync
//!
//! - ChannelManager: channel pool, recording, playback and routing
//! - Effects: echo, pitch shift and convolution reverb behind one factory
//! - Graph: the node graph rendered by the output callback
//! - PlatformSync: offset-aligned looped playback of several channels
//! - Capture: input backends and live tracks

mod capture;
mod channel;
mod context;
mod cpal_input;
mod effects;
mod error;
mod events;
mod global_mix;
mod graph;
mod manager;
mod nodes;
mod platform;
mod registry;

#[cfg(test)]
mod test_support;

pub use capture::{CaptureConstraints, CaptureFeed, CaptureTrack, InputBackend, InputStream, TrackControl, TrackReader};
pub use channel::{AnalyserFrame, Channel, CleanupFn};
pub use context::{AudioContext, Renderer};
pub use cpal_input::CpalInputBackend;
pub use effects::{
    ConvolutionReverb, Echo, EchoParams, Effect, EffectError, EffectFactory, EffectKind, EffectParams, EffectProcessor,
    ParamUpdate, PitchParams, PitchShift, ReverbParams,
};
pub use error::{CleanupError, DeviceError, EngineError, GraphError};
pub use events::{EngineEvent, EventBus};
pub use global_mix::GlobalMix;
pub use graph::{Graph, GraphNotice, NodeId};
pub use manager::{ChannelManager, EngineSettings};
pub use nodes::{AnalyserTap, BufferSource, CaptureTap, GainStage, Node, RecordTap, SourceState};
pub use platform::{quantize_offset, PlatformMember, PlatformSync, MAX_OFFSET_SECS};
pub use registry::{EffectId, EffectInstance, EffectRegistry};
