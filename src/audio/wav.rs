//! Canonical WAV serialization
//!
//! `encode` is pure and deterministic: the same buffer always yields
//! byte-identical output. Output is a canonical RIFF/WAVE file with a 44-byte
//! header (PCM format tag 1, 16 bits per sample, block-align = channels × 2)
//! followed by interleaved little-endian samples.
//!
//! Float-to-int conversion clamps to [-1, 1], scales negatives by 32768 and
//! non-negatives by 32767, and truncates toward zero. `decode` inverts that
//! quantizer by reconstructing the midpoint of each truncation cell, which
//! makes `encode(decode(encode(b)))` byte-identical to `encode(b)`.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::audio::buffer::DecodedAudio;
use crate::error::{Result, WaveclipError};

/// Bits per sample in the canonical output
pub const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

/// Convert one float sample to a 16-bit integer sample
///
/// Clamp to [-1, 1], scale negatives by 32768 and non-negatives by 32767,
/// truncate toward zero.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0) as f64;
    let scaled = if clamped < 0.0 {
        clamped * 32768.0
    } else {
        clamped * 32767.0
    };
    // `as` truncates toward zero and saturates at the i16 bounds
    scaled as i16
}

/// Inverse of `sample_to_i16`: midpoint of the truncation cell
///
/// A truncating quantizer maps [i, i+1) to i for non-negative values and
/// (i-1, i] to i for negative values; reconstructing the cell midpoint keeps
/// re-quantization exact.
#[inline]
pub fn sample_from_i16(value: i16) -> f32 {
    if value < 0 {
        ((value as f64 - 0.5) / 32768.0) as f32
    } else {
        ((value as f64 + 0.5) / 32767.0) as f32
    }
}

/// Convert a buffer to interleaved 16-bit samples, frame by frame
///
/// Shared by the WAV encoder and the lossy encoder worker.
pub fn to_i16_interleaved(buffer: &DecodedAudio) -> Vec<i16> {
    let frames = buffer.frames();
    let channels = buffer.channels();
    let mut out = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for ch in 0..channels {
            out.push(sample_to_i16(buffer.channel(ch)[frame]));
        }
    }
    out
}

/// Serialize a buffer as a canonical 16-bit PCM WAV byte stream
///
/// Pure and deterministic; any channel count and sample rate the buffer
/// carries is preserved verbatim in the header.
///
/// # Panics
/// Panics if the PCM payload exceeds the RIFF u32 chunk-size limit (about
/// 4 GiB, roughly 13 hours of stereo at 44.1 kHz). Editing-session clips
/// stay orders of magnitude below that; writing to the in-memory cursor
/// cannot fail for any smaller buffer.
pub fn encode(buffer: &DecodedAudio) -> Vec<u8> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        // In-memory writes only fail at the RIFF u32 size limit (see Panics)
        let mut writer =
            WavWriter::new(&mut cursor, spec).expect("in-memory WAV writer creation");
        for sample in to_i16_interleaved(buffer) {
            writer
                .write_sample(sample)
                .expect("PCM payload exceeds the RIFF size limit");
        }
        writer.finalize().expect("in-memory WAV finalize");
    }
    cursor.into_inner()
}

/// Decode a WAV byte stream into a `DecodedAudio`
///
/// Strict: any malformed chunk or truncated sample data is an error. Handles
/// the integer depths hound supports plus 32-bit float.
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| WaveclipError::DecodeFailure {
        reason: format!("not a readable WAV stream: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

    DecodedAudio::from_interleaved(&interleaved, channels, spec.sample_rate)
}

/// Read all samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| WaveclipError::DecodeFailure {
                reason: format!("failed to read float samples: {}", e),
                source: Some(Box::new(e)),
            }),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| WaveclipError::DecodeFailure {
                    reason: format!("failed to read 8-bit samples: {}", e),
                    source: Some(Box::new(e)),
                }),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(sample_from_i16))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| WaveclipError::DecodeFailure {
                    reason: format!("failed to read 16-bit samples: {}", e),
                    source: Some(Box::new(e)),
                }),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| WaveclipError::DecodeFailure {
                    reason: format!("failed to read 24-bit samples: {}", e),
                    source: Some(Box::new(e)),
                }),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| WaveclipError::DecodeFailure {
                    reason: format!("failed to read 32-bit int samples: {}", e),
                    source: Some(Box::new(e)),
                }),
            other => Err(WaveclipError::DecodeFailure {
                reason: format!("{}-bit integer WAV is not supported", other),
                source: None,
            }),
        },
    }
}
