//! Block-based resampling pitch shifter
//!
//! Input is gathered into fixed blocks. Each output block is read from the
//! most recent input block with a fractional cursor that advances by the
//! pitch ratio and wraps around the block, so output lags input by one
//! block. Artifacts at the wrap point are expected.

use super::Effect;

/// Frames per processing block
pub const BLOCK_FRAMES: usize = 4096;

/// Stereo pitch shifter
pub struct PitchShift {
    ratio: f32,
    /// Input block being filled (stereo interleaved)
    input: Vec<f32>,
    /// Last rendered output block (stereo interleaved)
    output: Vec<f32>,
    /// Read position in `output`, in samples
    output_pos: usize,
    /// Fractional read cursor in frames, carried across blocks
    cursor: f32,
}

impl PitchShift {
    pub fn new(ratio: f32) -> Self {
        Self {
            ratio,
            input: Vec::with_capacity(BLOCK_FRAMES * 2),
            output: vec![0.0; BLOCK_FRAMES * 2],
            output_pos: BLOCK_FRAMES * 2,
            cursor: 0.0,
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    fn render_block(&mut self) {
        for i in 0..BLOCK_FRAMES {
            let position = self.cursor as usize;
            let frac = self.cursor - position as f32;

            for ch in 0..2 {
                let before = self.input[position * 2 + ch];
                let after = if position + 1 < BLOCK_FRAMES {
                    self.input[(position + 1) * 2 + ch]
                } else {
                    0.0
                };
                self.output[i * 2 + ch] = before + (after - before) * frac;
            }

            self.cursor += self.ratio;
            if self.cursor >= BLOCK_FRAMES as f32 {
                self.cursor %= BLOCK_FRAMES as f32;
            }
        }
        self.output_pos = 0;
    }
}

impl Effect for PitchShift {
    fn process(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(2) {
            self.input.push(frame[0]);
            self.input.push(frame[1]);

            if self.output_pos < self.output.len() {
                frame[0] = self.output[self.output_pos];
                frame[1] = self.output[self.output_pos + 1];
                self.output_pos += 2;
            } else {
                frame[0] = 0.0;
                frame[1] = 0.0;
            }

            if self.input.len() == BLOCK_FRAMES * 2 {
                self.render_block();
                self.input.clear();
            }
        }
    }

    fn reset(&mut self) {
        self.input.clear();
        self.output.fill(0.0);
        self.output_pos = self.output.len();
        self.cursor = 0.0;
    }

    fn name(&self) -> &'static str {
        "Pitch"
    }
}
