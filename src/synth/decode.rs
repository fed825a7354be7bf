//! Per-chunk audio decoding.

use crate::error::{BridgeError, Result};
use hound::SampleFormat;
use std::io::Cursor;

/// Decoded PCM audio, interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmAudio {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n as usize,
        }
    }
}

/// Trait for a codec decode routine.
///
/// Each call decodes one self-contained chunk. No state may carry over from
/// one chunk to the next.
pub trait ChunkDecoder: Send + 'static {
    fn decode(&mut self, chunk: &[u8]) -> Result<PcmAudio>;

    /// Codec name for logging.
    fn name(&self) -> &'static str;
}

/// Decodes chunks that are each a complete WAV file.
///
/// Accepts 8 to 32-bit integer and 32-bit float samples with any channel
/// count; samples are converted to 16-bit.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavChunkDecoder;

impl WavChunkDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ChunkDecoder for WavChunkDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<PcmAudio> {
        let mut reader = hound::WavReader::new(Cursor::new(chunk)).map_err(|e| {
            BridgeError::Decode {
                message: format!("Failed to parse WAV chunk: {}", e),
            }
        })?;

        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(BridgeError::Decode {
                message: "WAV chunk declares zero channels".to_string(),
            });
        }

        let read_error = |e: hound::Error| BridgeError::Decode {
            message: format!("Failed to read WAV samples: {}", e),
        };

        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, bits) if bits <= 16 => {
                // hound widens 8-bit input to i16 without rescaling.
                let shift = 16 - bits;
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v << shift))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(read_error)?
            }
            (SampleFormat::Int, bits) if bits <= 32 => {
                let shift = bits - 16;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as i16))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(read_error)?
            }
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(float_to_i16))
                .collect::<std::result::Result<_, _>>()
                .map_err(read_error)?,
            (format, bits) => {
                return Err(BridgeError::Decode {
                    message: format!("Unsupported WAV sample format: {:?} {}-bit", format, bits),
                });
            }
        };

        Ok(PcmAudio::new(samples, spec.sample_rate, spec.channels))
    }

    fn name(&self) -> &'static str {
        "wav"
    }
}

fn float_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
