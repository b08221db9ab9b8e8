//! Command definitions for Orbit

pub use orbit_audio::{EffectId, EffectKind, EffectParams, ParamUpdate};

/// Commands that can be dispatched from the command line
///
/// Channel numbers are engine indices (0-based).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Channels
    Record { channel: usize, device: Option<String> },
    StopRecording(usize),
    Play(usize),
    Stop(usize),
    Restart(usize),
    SetLooping(usize, bool),
    SetVolume(usize, f32),
    Trim { channel: usize, start: f64, end: f64 },
    Delete(usize),

    // Effects
    AddEffect(usize, EffectParams),
    UpdateEffect(usize, EffectId, ParamUpdate),
    RemoveEffect(usize, EffectId),
    ListEffects(usize),

    // Platform
    PlatformAdd(usize, f32),
    PlatformRemove(usize),
    PlatformOffset(usize, f32),
    PlatformPlay,
    PlatformStop,

    // Global mix
    MixRecord,
    MixStop,
    MixPlay,
    MixHalt,

    // App
    Devices,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
rec <ch> [device]            record into a channel
stop-rec <ch>                stop recording
play <ch> | stop <ch> | restart <ch>
loop <ch> on|off             toggle looping
vol <ch> <0..1>              set volume
trim <ch> <start> <end>      keep [start, end) seconds
fx <ch> echo [delay] [feedback]
fx <ch> pitch [ratio]
fx <ch> reverb [duration] [decay]
fx-set <ch> <id> key=value   update effect parameters
fx-rm <ch> <id>              remove an effect
fx-ls <ch>                   list effects
delete <ch>                  stop and clear a channel
platform add <ch> [offset] | platform remove <ch>
platform offset <ch> <secs> | platform play | platform stop
mix rec | mix stop | mix play | mix halt
devices | status | help | quit";
