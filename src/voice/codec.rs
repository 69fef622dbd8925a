//! RIFF/WAVE codec
//!
//! Encoding goes through `hound` and always produces 16-bit PCM. Decoding is
//! deliberately forgiving about the header layout: the format fields are read
//! from their canonical offsets and the `data` chunk is found by scanning for
//! its tag, so payloads carrying extra chunks (`LIST`, `fact`, ...) before the
//! samples still decode.

use std::io::Cursor;
use std::time::Duration;

use crate::{Error, Result};

/// Size of the canonical PCM header
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS_OFFSET: usize = 22;
const SAMPLE_RATE_OFFSET: usize = 24;
const BIT_DEPTH_OFFSET: usize = 34;

/// Decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
    samples: Vec<f32>,
}

impl AudioBuffer {
    /// Build a buffer from interleaved samples
    ///
    /// A trailing partial frame is dropped so that the sample count is always
    /// a multiple of the channel count.
    ///
    /// # Errors
    ///
    /// Returns error if `channels` is zero
    pub fn new(sample_rate: u32, channels: u16, bit_depth: u16, mut samples: Vec<f32>) -> Result<Self> {
        if channels == 0 {
            return Err(Error::Audio("channel count must be non-zero".to_string()));
        }
        let whole = samples.len() - samples.len() % usize::from(channels);
        samples.truncate(whole);

        Ok(Self {
            sample_rate,
            channels,
            bit_depth,
            samples,
        })
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels
    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Bit depth of the source payload
    #[must_use]
    pub const fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    /// Interleaved samples normalized to [-1, 1]
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer, returning its samples
    #[must_use]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of frames (samples per channel)
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Playback duration
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        let secs = self.frames() as f64 / f64::from(self.sample_rate);
        Duration::from_secs_f64(secs)
    }

    /// Down-mix to a single channel by averaging each frame
    #[must_use]
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }
        let channels = f32::from(self.channels);
        self.samples
            .chunks_exact(usize::from(self.channels))
            .map(|frame| frame.iter().sum::<f32>() / channels)
            .collect()
    }
}

/// Encode interleaved samples as a 16-bit PCM WAV
///
/// Samples are clamped to [-1, 1]. Values of the form `k / 32768` survive a
/// decode unchanged.
///
/// # Errors
///
/// Returns error if `channels` is zero, the samples do not fill whole frames,
/// or the writer fails
pub fn encode(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Vec<u8>> {
    if channels == 0 {
        return Err(Error::Audio("channel count must be non-zero".to_string()));
    }
    if samples.len() % usize::from(channels) != 0 {
        return Err(Error::Audio(format!(
            "{} samples do not fill {channels}-channel frames",
            samples.len()
        )));
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(to_i16(sample))
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Convert mono f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    encode(samples, 1, sample_rate)
}

/// Decode a WAV payload into normalized samples
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for bit depths other than 8 and 16,
/// and [`Error::Audio`] when the header is truncated or lacks RIFF/WAVE magic
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(Error::Audio(format!(
            "malformed WAV: {} bytes is shorter than the header",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(Error::Audio("malformed WAV: missing RIFF/WAVE magic".to_string()));
    }

    let channels = read_u16(bytes, CHANNELS_OFFSET);
    let sample_rate = read_u32(bytes, SAMPLE_RATE_OFFSET);
    let bit_depth = read_u16(bytes, BIT_DEPTH_OFFSET);

    if channels == 0 {
        return Err(Error::Audio("malformed WAV: zero channels".to_string()));
    }
    if bit_depth != 8 && bit_depth != 16 {
        return Err(Error::UnsupportedFormat(bit_depth));
    }

    let payload = data_payload(bytes);
    let samples: Vec<f32> = if bit_depth == 16 {
        payload
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
            .collect()
    } else {
        payload
            .iter()
            .map(|&b| (f32::from(b) - 128.0) / 128.0)
            .collect()
    };

    tracing::trace!(
        channels,
        sample_rate,
        bit_depth,
        samples = samples.len(),
        "decoded WAV"
    );

    AudioBuffer::new(sample_rate, channels, bit_depth, samples)
}

/// Locate the sample bytes
///
/// Falls back to the canonical 44-byte offset when no `data` tag is present.
fn data_payload(bytes: &[u8]) -> &[u8] {
    let Some(tag) = bytes
        .windows(4)
        .skip(12)
        .position(|w| w == b"data")
        .map(|p| p + 12)
    else {
        tracing::debug!("no data chunk tag found, assuming canonical header");
        return &bytes[WAV_HEADER_LEN..];
    };

    let start = tag + 8;
    if start > bytes.len() {
        return &[];
    }

    let declared = bytes
        .get(tag + 4..tag + 8)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize);

    match declared {
        Some(len) if len > 0 && start + len <= bytes.len() => &bytes[start..start + len],
        _ => &bytes[start..],
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32768.0)
        .round()
        .clamp(-32768.0, 32767.0) as i16
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
