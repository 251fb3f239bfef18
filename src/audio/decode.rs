//! Audio asset decoding and validation
//!
//! `validate` is the entry point of every editing session: it proves an
//! asset is playable and has a finite positive duration, or repairs it by
//! round-tripping the decodable PCM through the canonical WAV encoder.
//!
//! Two decode passes exist:
//! - strict: hound for RIFF/WAVE assets, symphonia for everything else; any
//!   malformed packet or truncated payload is a failure.
//! - lenient (the repair decoder): keeps every frame that decodes and stops
//!   at the first unreadable byte instead of failing.
//!
//! The repair runs exactly once per asset. A repaired asset that still fails
//! strict validation is surfaced as `DecodeFailure`; the caller should
//! request a new recording rather than retry.

use std::io::Cursor;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::buffer::DecodedAudio;
use crate::audio::wav;
use crate::error::{Result, WaveclipError};

/// An opaque audio byte buffer plus its declared MIME type
///
/// Owned by the session for the duration of one editing session; replaced,
/// never mutated, when repaired.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl AudioAsset {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Whether the asset is a RIFF/WAVE container (by magic or by MIME)
    pub fn is_wav(&self) -> bool {
        let magic = self.bytes.len() >= 12
            && &self.bytes[0..4] == b"RIFF"
            && &self.bytes[8..12] == b"WAVE";
        magic || self.mime.contains("wav")
    }
}

/// Outcome of a successful validation
#[derive(Debug)]
pub enum Validation {
    /// The asset decoded cleanly as-is
    Decoded(DecodedAudio),
    /// The asset was malformed; `asset` is the repaired WAV replacement
    Repaired {
        asset: AudioAsset,
        audio: DecodedAudio,
    },
}

impl Validation {
    /// The decoded audio, regardless of whether a repair happened
    pub fn audio(&self) -> &DecodedAudio {
        match self {
            Validation::Decoded(audio) => audio,
            Validation::Repaired { audio, .. } => audio,
        }
    }

    /// Consume the validation, keeping only the decoded audio
    pub fn into_audio(self) -> DecodedAudio {
        match self {
            Validation::Decoded(audio) => audio,
            Validation::Repaired { audio, .. } => audio,
        }
    }

    pub fn was_repaired(&self) -> bool {
        matches!(self, Validation::Repaired { .. })
    }
}

/// Validate an asset, repairing it at most once
///
/// # Errors
/// * `EmptyAsset` for a zero-length byte buffer
/// * `DecodeFailure` when strict decode and one repair attempt both fail
pub fn validate(asset: &AudioAsset) -> Result<Validation> {
    if asset.bytes.is_empty() {
        return Err(WaveclipError::EmptyAsset);
    }

    let first_error = match strict_decode(asset) {
        Ok(audio) => {
            debug!(
                "asset validated: {:.3}s, {} ch, {} Hz",
                audio.duration_secs(),
                audio.channels(),
                audio.sample_rate()
            );
            return Ok(Validation::Decoded(audio));
        }
        Err(e) => e,
    };

    warn!("strict decode failed ({}), attempting repair", first_error);

    // Repair: salvage whatever PCM decodes, re-encode canonically, and
    // re-validate the replacement exactly once.
    let salvaged = lenient_decode(asset).map_err(|e| WaveclipError::DecodeFailure {
        reason: format!(
            "asset unplayable even after repair attempt ({}; repair decode: {})",
            first_error, e
        ),
        source: None,
    })?;

    let repaired = AudioAsset::new(wav::encode(&salvaged), "audio/wav");
    let audio = strict_decode(&repaired).map_err(|e| WaveclipError::DecodeFailure {
        reason: format!("repaired asset failed re-validation: {}", e),
        source: None,
    })?;

    debug!(
        "asset repaired: {:.3}s recovered as canonical WAV",
        audio.duration_secs()
    );
    Ok(Validation::Repaired {
        asset: repaired,
        audio,
    })
}

/// Strict decode: full decode with the duration invariant enforced
fn strict_decode(asset: &AudioAsset) -> Result<DecodedAudio> {
    let audio = if asset.is_wav() {
        wav::decode(&asset.bytes)?
    } else {
        let mut context = DecodeContext::open(asset)?;
        context.decode_all(DecodeMode::Strict)?
        // context dropped here: the decode resources are released on every
        // exit path, including the error returns above
    };
    require_valid_duration(audio)
}

/// Lenient decode: keep every decodable frame, stop at the first bad byte
///
/// An asset classified as WAV by MIME alone may carry no RIFF header at all
/// (a mislabeled upload); when the WAV salvage cannot even read a header,
/// the general decoder gets a try before the repair is declared hopeless.
fn lenient_decode(asset: &AudioAsset) -> Result<DecodedAudio> {
    let audio = if asset.is_wav() {
        match lenient_wav_decode(&asset.bytes) {
            Ok(audio) => audio,
            Err(e) => {
                debug!("WAV salvage failed ({}), trying the general decoder", e);
                let mut context = DecodeContext::open(asset)?;
                context.decode_all(DecodeMode::Lenient)?
            }
        }
    } else {
        let mut context = DecodeContext::open(asset)?;
        context.decode_all(DecodeMode::Lenient)?
    };
    require_valid_duration(audio)
}

fn require_valid_duration(audio: DecodedAudio) -> Result<DecodedAudio> {
    if !audio.has_valid_duration() {
        return Err(WaveclipError::DecodeFailure {
            reason: "decode yielded zero or non-finite duration".to_string(),
            source: None,
        });
    }
    Ok(audio)
}

/// Salvage a malformed WAV: collect samples until the first read error,
/// dropping any trailing partial frame
fn lenient_wav_decode(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| WaveclipError::DecodeFailure {
            reason: format!("WAV header unreadable: {}", e),
            source: Some(Box::new(e)),
        })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(WaveclipError::DecodeFailure {
            reason: "WAV header declares zero channels".to_string(),
            source: None,
        });
    }

    let mut interleaved: Vec<f32> = Vec::new();
    match spec.sample_format {
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                match sample {
                    Ok(v) => interleaved.push(v),
                    Err(_) => break,
                }
            }
        }
        hound::SampleFormat::Int => {
            let shift = 1i64 << (spec.bits_per_sample.saturating_sub(1) as u32);
            for sample in reader.samples::<i32>() {
                match sample {
                    Ok(v) => interleaved.push(v as f32 / shift as f32),
                    Err(_) => break,
                }
            }
        }
    }

    // Drop a trailing partial frame so channels stay equal-length
    let whole = interleaved.len() - interleaved.len() % channels;
    interleaved.truncate(whole);

    DecodedAudio::from_interleaved(&interleaved, channels, spec.sample_rate)
}

/// How a `DecodeContext` reacts to malformed packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeMode {
    /// Any decode error fails the whole pass
    Strict,
    /// Decode errors are skipped; the stream ends at the first hard error
    Lenient,
}

/// Scoped decode resources for one validation pass
///
/// Owns the demuxer and codec for exactly one asset. Exclusively owned for
/// the duration of one validation call; dropping it releases everything, so
/// no two validations ever share a live decode context.
struct DecodeContext {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
}

impl DecodeContext {
    /// Probe the asset bytes and set up a decoder for the first audio track
    fn open(asset: &AudioAsset) -> Result<Self> {
        let stream = MediaSourceStream::new(
            Box::new(Cursor::new(asset.bytes.clone())),
            Default::default(),
        );

        let mut hint = Hint::new();
        if let Some(ext) = extension_for_mime(&asset.mime) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| WaveclipError::DecodeFailure {
                reason: format!("unrecognized container format: {}", e),
                source: Some(Box::new(e)),
            })?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| WaveclipError::DecodeFailure {
                reason: "no audio track found".to_string(),
                source: None,
            })?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| WaveclipError::DecodeFailure {
                reason: format!("no decoder for codec: {}", e),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            format,
            decoder,
            track_id,
        })
    }

    /// Decode the whole track into a planar buffer
    fn decode_all(&mut self, mode: DecodeMode) -> Result<DecodedAudio> {
        let mut interleaved: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut channels = 0usize;
        let mut sample_rate = 0u32;

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                // End of stream is signaled through an UnexpectedEof
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => match mode {
                    DecodeMode::Strict => {
                        return Err(WaveclipError::DecodeFailure {
                            reason: format!("packet read failed: {}", e),
                            source: Some(Box::new(e)),
                        });
                    }
                    DecodeMode::Lenient => break,
                },
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => match mode {
                    DecodeMode::Strict => {
                        return Err(WaveclipError::DecodeFailure {
                            reason: format!("packet decode failed: {}", e),
                            source: Some(Box::new(e)),
                        });
                    }
                    DecodeMode::Lenient => continue,
                },
            };

            if sample_buf.is_none() {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                sample_rate = spec.rate;
                sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            let buf = sample_buf.as_mut().expect("sample buffer initialized");
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }

        if channels == 0 || interleaved.is_empty() {
            return Err(WaveclipError::DecodeFailure {
                reason: "stream contained no decodable frames".to_string(),
                source: None,
            });
        }

        let whole = interleaved.len() - interleaved.len() % channels;
        interleaved.truncate(whole);
        DecodedAudio::from_interleaved(&interleaved, channels, sample_rate)
    }
}

/// Map a declared MIME type to a file-extension hint for the probe
fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/aac" | "audio/aacp" => Some("aac"),
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Some("m4a"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        _ => None,
    }
}
