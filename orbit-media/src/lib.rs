//! Media handling for Orbit - buffers, chunked recording, decoding, config

mod buffer;
mod config;
mod decoder;
mod recorder;

pub use buffer::AudioBuffer;
pub use config::{Config, DEFAULT_CHANNEL_COUNT, DEFAULT_CHUNK_INTERVAL_MS, MAX_CHANNEL_COUNT};
pub use decoder::{ChunkDecoder, DecodeError};
pub use recorder::{ChunkRecorder, EncodedChunk, RecorderState, DEFAULT_CHUNK_INTERVAL};
