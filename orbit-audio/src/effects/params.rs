//! Effect parameters and partial updates
//!
//! `EffectParams` is the authoritative description of an effect; the
//! processor in the graph is derived from it. Each variant knows which of
//! its fields can be pushed into a running processor and which require a
//! rebuild.

use super::EffectProcessor;
use std::fmt;
use thiserror::Error;

/// Effect type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Echo,
    Pitch,
    Reverb,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] = [EffectKind::Echo, EffectKind::Pitch, EffectKind::Reverb];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Echo => "echo",
            EffectKind::Pitch => "pitch",
            EffectKind::Reverb => "reverb",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Effect construction / update failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("{effect} {param} out of range: {value}")]
    OutOfRange {
        effect: EffectKind,
        param: &'static str,
        value: f32,
    },
    #[error("{effect} has no parameter {param}")]
    UnsupportedParameter {
        effect: EffectKind,
        param: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoParams {
    /// Seconds, (0, 1]
    pub delay_time: f32,
    /// [0, 0.9]
    pub feedback: f32,
}

impl Default for EchoParams {
    fn default() -> Self {
        Self {
            delay_time: 0.5,
            feedback: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchParams {
    /// [0.5, 2.0]
    pub pitch_ratio: f32,
}

impl Default for PitchParams {
    fn default() -> Self {
        Self { pitch_ratio: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Impulse length in seconds, (0, 5]
    pub duration: f32,
    /// Envelope exponent, (0, 0.9]
    pub decay: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            duration: 2.0,
            decay: 0.5,
        }
    }
}

/// Parameters of one effect instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectParams {
    Echo(EchoParams),
    Pitch(PitchParams),
    Reverb(ReverbParams),
}

/// Partial parameter update; `None` keeps the current value
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParamUpdate {
    pub delay_time: Option<f32>,
    pub feedback: Option<f32>,
    pub pitch_ratio: Option<f32>,
    pub duration: Option<f32>,
    pub decay: Option<f32>,
}

impl ParamUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set a field by name; accepts snake_case and camelCase keys
    pub fn set(&mut self, key: &str, value: f32) -> bool {
        let slot = match key {
            "delay_time" | "delayTime" | "delay" => &mut self.delay_time,
            "feedback" => &mut self.feedback,
            "pitch_ratio" | "pitchRatio" | "ratio" => &mut self.pitch_ratio,
            "duration" => &mut self.duration,
            "decay" => &mut self.decay,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Names of the fields present in this update
    fn present(&self) -> impl Iterator<Item = &'static str> + '_ {
        [
            ("delay_time", self.delay_time),
            ("feedback", self.feedback),
            ("pitch_ratio", self.pitch_ratio),
            ("duration", self.duration),
            ("decay", self.decay),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|_| name))
    }
}

fn check(effect: EffectKind, param: &'static str, value: f32, ok: bool) -> Result<(), EffectError> {
    if value.is_finite() && ok {
        Ok(())
    } else {
        Err(EffectError::OutOfRange { effect, param, value })
    }
}

impl EffectParams {
    pub fn default_for(kind: EffectKind) -> Self {
        match kind {
            EffectKind::Echo => EffectParams::Echo(EchoParams::default()),
            EffectKind::Pitch => EffectParams::Pitch(PitchParams::default()),
            EffectKind::Reverb => EffectParams::Reverb(ReverbParams::default()),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            EffectParams::Echo(_) => EffectKind::Echo,
            EffectParams::Pitch(_) => EffectKind::Pitch,
            EffectParams::Reverb(_) => EffectKind::Reverb,
        }
    }

    /// Check every field against its domain
    pub fn validate(&self) -> Result<(), EffectError> {
        let kind = self.kind();
        match *self {
            EffectParams::Echo(p) => {
                check(kind, "delay_time", p.delay_time, p.delay_time > 0.0 && p.delay_time <= 1.0)?;
                check(kind, "feedback", p.feedback, (0.0..=0.9).contains(&p.feedback))
            }
            EffectParams::Pitch(p) => {
                check(kind, "pitch_ratio", p.pitch_ratio, (0.5..=2.0).contains(&p.pitch_ratio))
            }
            EffectParams::Reverb(p) => {
                check(kind, "duration", p.duration, p.duration > 0.0 && p.duration <= 5.0)?;
                check(kind, "decay", p.decay, p.decay > 0.0 && p.decay <= 0.9)
            }
        }
    }

    fn supports(&self, param: &str) -> bool {
        match self {
            EffectParams::Echo(_) => matches!(param, "delay_time" | "feedback"),
            EffectParams::Pitch(_) => param == "pitch_ratio",
            EffectParams::Reverb(_) => matches!(param, "duration" | "decay"),
        }
    }

    /// Apply a partial update, keeping unspecified fields
    pub fn merged(&self, update: &ParamUpdate) -> Result<EffectParams, EffectError> {
        if let Some(param) = update.present().find(|p| !self.supports(p)) {
            return Err(EffectError::UnsupportedParameter {
                effect: self.kind(),
                param,
            });
        }

        let merged = match *self {
            EffectParams::Echo(p) => EffectParams::Echo(EchoParams {
                delay_time: update.delay_time.unwrap_or(p.delay_time),
                feedback: update.feedback.unwrap_or(p.feedback),
            }),
            EffectParams::Pitch(p) => EffectParams::Pitch(PitchParams {
                pitch_ratio: update.pitch_ratio.unwrap_or(p.pitch_ratio),
            }),
            EffectParams::Reverb(p) => EffectParams::Reverb(ReverbParams {
                duration: update.duration.unwrap_or(p.duration),
                decay: update.decay.unwrap_or(p.decay),
            }),
        };
        merged.validate()?;
        Ok(merged)
    }

    /// Whether `update` touches a parameter that only a new processor can take
    pub fn needs_rebuild(&self, update: &ParamUpdate) -> bool {
        match self {
            EffectParams::Echo(_) => false,
            EffectParams::Pitch(_) => update.pitch_ratio.is_some(),
            EffectParams::Reverb(_) => update.duration.is_some() || update.decay.is_some(),
        }
    }

    /// Push live-tunable values into a running processor
    pub fn apply_live_update(&self, processor: &mut EffectProcessor) {
        if let (EffectParams::Echo(p), EffectProcessor::Echo(echo)) = (self, processor) {
            echo.set_delay_time(p.delay_time);
            echo.set_feedback(p.feedback);
        }
    }
}

impl fmt::Display for EffectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectParams::Echo(p) => write!(f, "echo delay={:.2}s feedback={:.2}", p.delay_time, p.feedback),
            EffectParams::Pitch(p) => write!(f, "pitch ratio={:.2}", p.pitch_ratio),
            EffectParams::Reverb(p) => write!(f, "reverb duration={:.1}s decay={:.2}", p.duration, p.decay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        for kind in EffectKind::ALL {
            let params = EffectParams::default_for(kind);
            assert_eq!(params.kind(), kind);
            assert!(params.validate().is_ok(), "{} defaults invalid", kind);
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EffectKind::from_name("Reverb"), Some(EffectKind::Reverb));
        assert_eq!(EffectKind::from_name("chorus"), None);
        assert_eq!(EffectKind::Pitch.to_string(), "pitch");
    }

    #[test]
    fn test_validate_ranges() {
        let bad = [
            EffectParams::Echo(EchoParams { delay_time: 0.0, feedback: 0.5 }),
            EffectParams::Echo(EchoParams { delay_time: 0.5, feedback: 0.95 }),
            EffectParams::Pitch(PitchParams { pitch_ratio: 2.5 }),
            EffectParams::Pitch(PitchParams { pitch_ratio: f32::NAN }),
            EffectParams::Reverb(ReverbParams { duration: 6.0, decay: 0.5 }),
            EffectParams::Reverb(ReverbParams { duration: 1.0, decay: 0.0 }),
        ];
        for params in bad {
            assert!(params.validate().is_err(), "{:?} should be rejected", params);
        }
        let edge = EffectParams::Echo(EchoParams { delay_time: 1.0, feedback: 0.9 });
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let reverb = EffectParams::Reverb(ReverbParams { duration: 3.0, decay: 0.4 });
        let update = ParamUpdate { duration: Some(4.0), ..Default::default() };
        assert_eq!(
            reverb.merged(&update).unwrap(),
            EffectParams::Reverb(ReverbParams { duration: 4.0, decay: 0.4 })
        );
    }

    #[test]
    fn test_merge_rejects_foreign_and_invalid_fields() {
        let echo = EffectParams::default_for(EffectKind::Echo);
        let foreign = ParamUpdate { pitch_ratio: Some(1.5), ..Default::default() };
        assert_eq!(
            echo.merged(&foreign),
            Err(EffectError::UnsupportedParameter { effect: EffectKind::Echo, param: "pitch_ratio" })
        );
        let invalid = ParamUpdate { feedback: Some(3.0), ..Default::default() };
        assert!(matches!(echo.merged(&invalid), Err(EffectError::OutOfRange { param: "feedback", .. })));
    }

    #[test]
    fn test_needs_rebuild() {
        let ratio = ParamUpdate { pitch_ratio: Some(1.2), ..Default::default() };
        let decay = ParamUpdate { decay: Some(0.3), ..Default::default() };
        let delay = ParamUpdate { delay_time: Some(0.3), feedback: Some(0.1), ..Default::default() };

        assert!(EffectParams::default_for(EffectKind::Pitch).needs_rebuild(&ratio));
        assert!(EffectParams::default_for(EffectKind::Reverb).needs_rebuild(&decay));
        assert!(!EffectParams::default_for(EffectKind::Echo).needs_rebuild(&delay));
        assert!(!EffectParams::default_for(EffectKind::Reverb).needs_rebuild(&ParamUpdate::default()));
    }

    #[test]
    fn test_update_keys() {
        let mut update = ParamUpdate::default();
        assert!(update.is_empty());
        assert!(update.set("delayTime", 0.2));
        assert!(update.set("pitch_ratio", 1.1));
        assert!(!update.set("wet", 0.3));
        assert_eq!(update.delay_time, Some(0.2));
        assert_eq!(update.pitch_ratio, Some(1.1));
    }
}
