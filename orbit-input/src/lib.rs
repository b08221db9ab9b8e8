//! Line command input for Orbit

mod commands;
mod parser;

pub use commands::{Command, EffectId, EffectKind, EffectParams, ParamUpdate, HELP};
pub use parser::{parse_command, ParseError};
