//! Synthesizer audio path: per-chunk decoding, resampling and encoding on a
//! dedicated worker thread.

pub mod decode;
pub mod pipeline;
pub mod transcode;

pub use decode::{ChunkDecoder, PcmAudio, WavChunkDecoder};
pub use pipeline::{AudioChunk, AudioDecodePipeline, DecodeStation};
pub use transcode::{AudioEncoding, Transcoder, linear_to_mulaw};
