//! Line command parser

use crate::commands::{Command, EffectId, EffectKind, EffectParams, ParamUpdate};
use orbit_audio::{EchoParams, PitchParams, ReverbParams};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Channels are numbered from 1, got {0}")]
    InvalidChannel(String),
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),
    #[error("Bad parameter: {0}")]
    BadParameter(String),
    #[error("Unexpected argument: {0}")]
    Unexpected(String),
}

struct Args<'a> {
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next(&mut self) -> Option<&'a str> {
        self.words.next()
    }

    fn word(&mut self, name: &'static str) -> Result<&'a str, ParseError> {
        self.next().ok_or(ParseError::MissingArgument(name))
    }

    fn number<T: FromStr>(&mut self, name: &'static str) -> Result<T, ParseError> {
        let word = self.word(name)?;
        word.parse().map_err(|_| ParseError::InvalidNumber(word.to_string()))
    }

    fn optional_number<T: FromStr>(&mut self) -> Result<Option<T>, ParseError> {
        match self.next() {
            Some(word) => word
                .parse()
                .map(Some)
                .map_err(|_| ParseError::InvalidNumber(word.to_string())),
            None => Ok(None),
        }
    }

    /// 1-based channel on the line, 0-based in the engine
    fn channel(&mut self) -> Result<usize, ParseError> {
        let word = self.word("channel")?;
        match word.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(ParseError::InvalidChannel(word.to_string())),
        }
    }

    fn effect_id(&mut self) -> Result<EffectId, ParseError> {
        let word = self.word("effect id")?;
        word.trim_start_matches('#')
            .parse()
            .map(EffectId)
            .map_err(|_| ParseError::InvalidNumber(word.to_string()))
    }

    fn finish(mut self, command: Command) -> Result<Command, ParseError> {
        match self.next() {
            Some(extra) => Err(ParseError::Unexpected(extra.to_string())),
            None => Ok(command),
        }
    }
}

/// Parse one command line
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let mut args = Args {
        words: line.split_whitespace(),
    };
    let Some(verb) = args.next() else {
        return Err(ParseError::Empty);
    };

    let command = match verb {
        "rec" | "record" => {
            let channel = args.channel()?;
            // Device names may contain spaces
            let rest: Vec<&str> = args.words.by_ref().collect();
            let device = if rest.is_empty() { None } else { Some(rest.join(" ")) };
            Command::Record { channel, device }
        }
        "stop-rec" => Command::StopRecording(args.channel()?),
        "play" => Command::Play(args.channel()?),
        "stop" => Command::Stop(args.channel()?),
        "restart" => Command::Restart(args.channel()?),
        "loop" => {
            let channel = args.channel()?;
            let looping = match args.word("on|off")? {
                "on" => true,
                "off" => false,
                other => return Err(ParseError::BadParameter(other.to_string())),
            };
            Command::SetLooping(channel, looping)
        }
        "vol" | "volume" => {
            let channel = args.channel()?;
            Command::SetVolume(channel, args.number("volume")?)
        }
        "trim" => {
            let channel = args.channel()?;
            let start = args.number("start")?;
            let end = args.number("end")?;
            Command::Trim { channel, start, end }
        }
        "delete" => Command::Delete(args.channel()?),
        "fx" => {
            let channel = args.channel()?;
            let params = parse_effect(&mut args)?;
            Command::AddEffect(channel, params)
        }
        "fx-set" => {
            let channel = args.channel()?;
            let id = args.effect_id()?;
            let mut update = ParamUpdate::default();
            for pair in args.words.by_ref() {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| ParseError::BadParameter(pair.to_string()))?;
                let value: f32 = value
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(value.to_string()))?;
                if !update.set(key, value) {
                    return Err(ParseError::BadParameter(key.to_string()));
                }
            }
            if update.is_empty() {
                return Err(ParseError::MissingArgument("key=value"));
            }
            Command::UpdateEffect(channel, id, update)
        }
        "fx-rm" => {
            let channel = args.channel()?;
            Command::RemoveEffect(channel, args.effect_id()?)
        }
        "fx-ls" => Command::ListEffects(args.channel()?),
        "platform" => match args.word("platform action")? {
            "add" => {
                let channel = args.channel()?;
                Command::PlatformAdd(channel, args.optional_number()?.unwrap_or(0.0))
            }
            "remove" => Command::PlatformRemove(args.channel()?),
            "offset" => {
                let channel = args.channel()?;
                Command::PlatformOffset(channel, args.number("offset")?)
            }
            "play" => Command::PlatformPlay,
            "stop" => Command::PlatformStop,
            other => return Err(ParseError::Unknown(format!("platform {}", other))),
        },
        "mix" => match args.word("mix action")? {
            "rec" => Command::MixRecord,
            "stop" => Command::MixStop,
            "play" => Command::MixPlay,
            "halt" => Command::MixHalt,
            other => return Err(ParseError::Unknown(format!("mix {}", other))),
        },
        "devices" => Command::Devices,
        "status" | "ls" => Command::Status,
        "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    args.finish(command)
}

fn parse_effect(args: &mut Args<'_>) -> Result<EffectParams, ParseError> {
    let name = args.word("effect")?;
    let kind = EffectKind::from_name(name).ok_or_else(|| ParseError::UnknownEffect(name.to_string()))?;
    let params = match EffectParams::default_for(kind) {
        EffectParams::Echo(p) => EffectParams::Echo(EchoParams {
            delay_time: args.optional_number()?.unwrap_or(p.delay_time),
            feedback: args.optional_number()?.unwrap_or(p.feedback),
        }),
        EffectParams::Pitch(p) => EffectParams::Pitch(PitchParams {
            pitch_ratio: args.optional_number()?.unwrap_or(p.pitch_ratio),
        }),
        EffectParams::Reverb(p) => EffectParams::Reverb(ReverbParams {
            duration: args.optional_number()?.unwrap_or(p.duration),
            decay: args.optional_number()?.unwrap_or(p.decay),
        }),
    };
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_one_based() {
        assert_eq!(parse_command("play 1"), Ok(Command::Play(0)));
        assert_eq!(parse_command("  stop   5 "), Ok(Command::Stop(4)));
        assert_eq!(parse_command("play 0"), Err(ParseError::InvalidChannel("0".to_string())));
        assert_eq!(parse_command("play x"), Err(ParseError::InvalidChannel("x".to_string())));
        assert_eq!(parse_command("play"), Err(ParseError::MissingArgument("channel")));
    }

    #[test]
    fn test_record_with_device_name() {
        assert_eq!(
            parse_command("rec 2"),
            Ok(Command::Record { channel: 1, device: None })
        );
        assert_eq!(
            parse_command("rec 2 USB Audio CODEC"),
            Ok(Command::Record {
                channel: 1,
                device: Some("USB Audio CODEC".to_string())
            })
        );
    }

    #[test]
    fn test_channel_settings() {
        assert_eq!(parse_command("loop 3 on"), Ok(Command::SetLooping(2, true)));
        assert_eq!(parse_command("loop 3 off"), Ok(Command::SetLooping(2, false)));
        assert!(matches!(parse_command("loop 3 maybe"), Err(ParseError::BadParameter(_))));
        assert_eq!(parse_command("vol 1 0.25"), Ok(Command::SetVolume(0, 0.25)));
        assert_eq!(
            parse_command("trim 1 0.5 2"),
            Ok(Command::Trim { channel: 0, start: 0.5, end: 2.0 })
        );
        assert!(matches!(parse_command("trim 1 a 2"), Err(ParseError::InvalidNumber(_))));
    }

    #[test]
    fn test_effect_defaults_and_overrides() {
        assert_eq!(
            parse_command("fx 1 echo"),
            Ok(Command::AddEffect(0, EffectParams::default_for(EffectKind::Echo)))
        );
        assert_eq!(
            parse_command("fx 1 echo 0.25"),
            Ok(Command::AddEffect(
                0,
                EffectParams::Echo(EchoParams { delay_time: 0.25, feedback: 0.5 })
            ))
        );
        assert_eq!(
            parse_command("fx 2 reverb 1.5 0.8"),
            Ok(Command::AddEffect(
                1,
                EffectParams::Reverb(ReverbParams { duration: 1.5, decay: 0.8 })
            ))
        );
        assert_eq!(
            parse_command("fx 1 flanger"),
            Err(ParseError::UnknownEffect("flanger".to_string()))
        );
        assert!(matches!(parse_command("fx 1 pitch 1.5 2"), Err(ParseError::Unexpected(_))));
    }

    #[test]
    fn test_effect_updates() {
        let Ok(Command::UpdateEffect(channel, id, update)) = parse_command("fx-set 1 #3 delay=0.2 feedback=0.7") else {
            panic!("expected an update");
        };
        assert_eq!(channel, 0);
        assert_eq!(id, EffectId(3));
        assert_eq!(update.delay_time, Some(0.2));
        assert_eq!(update.feedback, Some(0.7));

        assert_eq!(parse_command("fx-rm 2 4"), Ok(Command::RemoveEffect(1, EffectId(4))));
        assert!(matches!(parse_command("fx-set 1 3 wobble=1"), Err(ParseError::BadParameter(_))));
        assert!(matches!(parse_command("fx-set 1 3 delay"), Err(ParseError::BadParameter(_))));
        assert_eq!(parse_command("fx-set 1 3"), Err(ParseError::MissingArgument("key=value")));
    }

    #[test]
    fn test_platform_and_mix() {
        assert_eq!(parse_command("platform add 2"), Ok(Command::PlatformAdd(1, 0.0)));
        assert_eq!(parse_command("platform add 2 -0.5"), Ok(Command::PlatformAdd(1, -0.5)));
        assert_eq!(parse_command("platform offset 4 1.5"), Ok(Command::PlatformOffset(3, 1.5)));
        assert_eq!(parse_command("platform play"), Ok(Command::PlatformPlay));
        assert!(matches!(parse_command("platform dance"), Err(ParseError::Unknown(_))));
        assert_eq!(parse_command("mix rec"), Ok(Command::MixRecord));
        assert_eq!(parse_command("mix halt"), Ok(Command::MixHalt));
    }

    #[test]
    fn test_app_commands() {
        assert_eq!(parse_command("q"), Ok(Command::Quit));
        assert_eq!(parse_command("devices"), Ok(Command::Devices));
        assert_eq!(parse_command(""), Err(ParseError::Empty));
        assert_eq!(parse_command("dance"), Err(ParseError::Unknown("dance".to_string())));
    }
}
