//! Error types for the channel engine

use crate::effects::EffectError;
use crate::registry::EffectId;
use orbit_analysis::AnalysisError;
use orbit_media::DecodeError;
use petgraph::stable_graph::NodeIndex;
use thiserror::Error;

/// Input device acquisition failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("No input device available")]
    NoDevice,
    #[error("Input device not found: {0}")]
    NotFound(String),
    #[error("Input device rejected the request: {0}")]
    Rejected(String),
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("Stream error: {0}")]
    Stream(String),
}

/// A cleanup callback failed; logged, never propagated by a reset
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cleanup failed: {0}")]
pub struct CleanupError(pub String);

/// Audio graph wiring failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Connecting {from:?} -> {to:?} would create a cycle")]
    Cycle { from: NodeIndex, to: NodeIndex },
    #[error("Unknown node {0:?}")]
    UnknownNode(NodeIndex),
}

/// Errors surfaced by ChannelManager operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Channel {0} does not exist")]
    InvalidChannel(usize),
    #[error("Channel {0} is recording")]
    ChannelBusy(usize),
    #[error("Invalid trim range {start}..{end}")]
    InvalidRange { start: f64, end: f64 },
    #[error("Invalid value: {0}")]
    InvalidValue(f32),
    #[error("Channel {0} has an empty buffer")]
    EmptyBuffer(usize),
    #[error("Effect {0} not found")]
    UnknownEffect(EffectId),
    #[error("Channel {0} is not on the platform")]
    NotInPlatform(usize),
    #[error("Global mix is already recording")]
    GlobalMixBusy,
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Effect construction error: {0}")]
    Effect(#[from] EffectError),
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Analyser error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Cleanup(#[from] CleanupError),
}
