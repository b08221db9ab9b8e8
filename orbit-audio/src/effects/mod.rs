//! Channel effects: echo, pitch shift and convolution reverb

mod echo;
mod params;
mod pitch;
mod reverb;

pub use echo::Echo;
pub use params::{EchoParams, EffectError, EffectKind, EffectParams, ParamUpdate, PitchParams, ReverbParams};
pub use pitch::PitchShift;
pub use reverb::ConvolutionReverb;

use rand::Rng;

/// Trait for audio effects
pub trait Effect: Send {
    /// Process audio samples in place (stereo interleaved)
    fn process(&mut self, samples: &mut [f32]);

    /// Reset effect state
    fn reset(&mut self);

    /// Get effect name
    fn name(&self) -> &'static str;
}

/// A configured effect processor living in the audio graph
pub enum EffectProcessor {
    Echo(Echo),
    Pitch(PitchShift),
    Reverb(ConvolutionReverb),
}

impl EffectProcessor {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectProcessor::Echo(_) => EffectKind::Echo,
            EffectProcessor::Pitch(_) => EffectKind::Pitch,
            EffectProcessor::Reverb(_) => EffectKind::Reverb,
        }
    }
}

impl Effect for EffectProcessor {
    fn process(&mut self, samples: &mut [f32]) {
        match self {
            EffectProcessor::Echo(fx) => fx.process(samples),
            EffectProcessor::Pitch(fx) => fx.process(samples),
            EffectProcessor::Reverb(fx) => fx.process(samples),
        }
    }

    fn reset(&mut self) {
        match self {
            EffectProcessor::Echo(fx) => fx.reset(),
            EffectProcessor::Pitch(fx) => fx.reset(),
            EffectProcessor::Reverb(fx) => fx.reset(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            EffectProcessor::Echo(fx) => fx.name(),
            EffectProcessor::Pitch(fx) => fx.name(),
            EffectProcessor::Reverb(fx) => fx.name(),
        }
    }
}

/// Builds processors from parameters; holds no state besides the rate
#[derive(Debug, Clone, Copy)]
pub struct EffectFactory {
    sample_rate: u32,
}

impl EffectFactory {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn build(&self, params: &EffectParams) -> Result<EffectProcessor, EffectError> {
        self.build_with_rng(params, &mut rand::thread_rng())
    }

    /// Build with an explicit noise source for the reverb impulse
    pub fn build_with_rng<R: Rng + ?Sized>(
        &self,
        params: &EffectParams,
        rng: &mut R,
    ) -> Result<EffectProcessor, EffectError> {
        params.validate()?;
        Ok(match *params {
            EffectParams::Echo(p) => EffectProcessor::Echo(Echo::new(self.sample_rate, p.delay_time, p.feedback)),
            EffectParams::Pitch(p) => EffectProcessor::Pitch(PitchShift::new(p.pitch_ratio)),
            EffectParams::Reverb(p) => {
                EffectProcessor::Reverb(ConvolutionReverb::new(self.sample_rate, p.duration, p.decay, rng))
            }
        })
    }
}
