//! Chunk decoder
//!
//! Turns the chunks of a recording into one `AudioBuffer` at the engine
//! sample rate. Partial chunk lists decode too, which is what drives the
//! live waveform preview.

use crate::buffer::AudioBuffer;
use crate::recorder::EncodedChunk;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while decoding recorded chunks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("No audio data to decode")]
    Empty,
    #[error("Invalid format: {sample_rate} Hz, {channels} channels")]
    InvalidFormat { sample_rate: u32, channels: u16 },
    #[error("Chunk {index} changes format mid-recording")]
    FormatMismatch { index: usize },
    #[error("Chunk {index} has a partial frame")]
    Misaligned { index: usize },
    #[error("Chunk {index} contains non-finite samples")]
    Corrupt { index: usize },
    #[error("Resample error: {0}")]
    Resample(String),
}

/// Decodes recorder chunks into buffers at a fixed output rate
#[derive(Debug, Clone, Copy)]
pub struct ChunkDecoder {
    target_sample_rate: u32,
}

impl ChunkDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decode a contiguous run of chunks
    pub fn decode(&self, chunks: &[EncodedChunk]) -> Result<AudioBuffer, DecodeError> {
        let first = chunks.first().ok_or(DecodeError::Empty)?;
        let (sample_rate, channels) = (first.sample_rate, first.channels);
        if sample_rate == 0 || channels == 0 {
            return Err(DecodeError::InvalidFormat { sample_rate, channels });
        }

        let mut interleaved = Vec::with_capacity(chunks.iter().map(|c| c.samples.len()).sum());
        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.sample_rate != sample_rate || chunk.channels != channels {
                return Err(DecodeError::FormatMismatch { index });
            }
            if chunk.samples.len() % channels as usize != 0 {
                return Err(DecodeError::Misaligned { index });
            }
            if chunk.samples.iter().any(|s| !s.is_finite()) {
                return Err(DecodeError::Corrupt { index });
            }
            interleaved.extend_from_slice(&chunk.samples);
        }

        if interleaved.is_empty() {
            return Err(DecodeError::Empty);
        }

        let buffer = AudioBuffer::from_interleaved(sample_rate, channels as usize, &interleaved);
        if sample_rate == self.target_sample_rate {
            return Ok(buffer);
        }

        debug!(
            from = sample_rate,
            to = self.target_sample_rate,
            frames = buffer.len(),
            "resampling recording"
        );
        self.resample(&buffer)
    }

    /// Resample planar audio to the target rate
    fn resample(&self, buffer: &AudioBuffer) -> Result<AudioBuffer, DecodeError> {
        use rubato::{FftFixedInOut, Resampler};

        let source_rate = buffer.sample_rate();
        let channel_count = buffer.number_of_channels();
        let frames = buffer.len();

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            self.target_sample_rate as usize,
            1024,
            channel_count,
        )
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

        let planar: Vec<&[f32]> = (0..channel_count)
            .filter_map(|ch| buffer.channel(ch))
            .collect();

        let chunk_size = resampler.input_frames_next();
        let mut output: Vec<Vec<f32>> = vec![Vec::new(); channel_count];

        let mut pos = 0;
        while pos + chunk_size <= frames {
            let input_refs: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..pos + chunk_size]).collect();
            let resampled = resampler
                .process(&input_refs, None)
                .map_err(|e| DecodeError::Resample(e.to_string()))?;
            for (ch, data) in resampled.into_iter().enumerate() {
                output[ch].extend(data);
            }
            pos += chunk_size;
        }

        // Zero-pad the tail and keep only its proportional share of output
        if pos < frames {
            let remaining = frames - pos;
            let padded: Vec<Vec<f32>> = planar
                .iter()
                .map(|ch| {
                    let mut v = ch[pos..].to_vec();
                    v.resize(chunk_size, 0.0);
                    v
                })
                .collect();
            let input_refs: Vec<&[f32]> = padded.iter().map(Vec::as_slice).collect();
            let resampled = resampler
                .process(&input_refs, None)
                .map_err(|e| DecodeError::Resample(e.to_string()))?;
            let tail_frames = remaining * self.target_sample_rate as usize / source_rate as usize;
            for (ch, data) in resampled.into_iter().enumerate() {
                output[ch].extend(&data[..tail_frames.min(data.len())]);
            }
        }

        Ok(AudioBuffer::from_planar(self.target_sample_rate, output))
    }
}
