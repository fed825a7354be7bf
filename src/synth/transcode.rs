//! Resampling and output encoding for decoded audio.

use crate::error::{BridgeError, Result};
use crate::synth::decode::PcmAudio;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output byte encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    /// 16-bit signed little-endian PCM.
    #[default]
    Linear16,
    /// 8-bit G.711 mu-law.
    Mulaw,
}

impl AudioEncoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            AudioEncoding::Linear16 => 2,
            AudioEncoding::Mulaw => 1,
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioEncoding::Linear16 => f.write_str("linear16"),
            AudioEncoding::Mulaw => f.write_str("mulaw"),
        }
    }
}

/// Converts decoded audio to mono at the output rate and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    sample_rate: u32,
    encoding: AudioEncoding,
}

impl Transcoder {
    pub fn new(sample_rate: u32, encoding: AudioEncoding) -> Self {
        Self {
            sample_rate,
            encoding,
        }
    }

    /// Downmixes, resamples and encodes one chunk of audio.
    pub fn transcode(&self, audio: &PcmAudio) -> Result<Bytes> {
        if audio.sample_rate == 0 || self.sample_rate == 0 {
            return Err(BridgeError::Transcode {
                message: format!(
                    "cannot resample from {} Hz to {} Hz",
                    audio.sample_rate, self.sample_rate
                ),
            });
        }
        if audio.channels == 0 {
            return Err(BridgeError::Transcode {
                message: "audio has zero channels".to_string(),
            });
        }

        let mono = downmix(&audio.samples, audio.channels);
        let resampled = resample(&mono, audio.sample_rate, self.sample_rate);
        Ok(encode(&resampled, self.encoding))
    }
}

/// Averages interleaved channels into one.
fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = position.floor() as usize;
            let fraction = position - index as f64;

            match (samples.get(index), samples.get(index + 1)) {
                (Some(&left), Some(&right)) => {
                    let left = left as f64;
                    (left + (right as f64 - left) * fraction) as i16
                }
                (Some(&last), None) => last,
                _ => samples.last().copied().unwrap_or_default(),
            }
        })
        .collect()
}

fn encode(samples: &[i16], encoding: AudioEncoding) -> Bytes {
    let mut out = BytesMut::with_capacity(samples.len() * encoding.bytes_per_sample());
    match encoding {
        AudioEncoding::Linear16 => {
            for &sample in samples {
                out.put_i16_le(sample);
            }
        }
        AudioEncoding::Mulaw => {
            for &sample in samples {
                out.put_u8(linear_to_mulaw(sample));
            }
        }
    }
    out.freeze()
}

const MULAW_BIAS: i32 = 0x84;
const MULAW_CLIP: i32 = 32635;

/// G.711 mu-law compression of one sample.
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut value = sample as i32;
    let sign = if value < 0 {
        value = -value;
        0x80
    } else {
        0x00
    };

    value = value.min(MULAW_CLIP) + MULAW_BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && value & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (value >> (exponent + 3)) & 0x0F;

    !(sign | (exponent << 4) as u8 | mantissa as u8)
}
