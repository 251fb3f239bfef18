//! Lossy encoder worker
//!
//! MP3 (LAME) and AAC (FDK, ADTS transport) encoding on a dedicated worker
//! thread, fed over channels so the session thread never blocks inside a
//! native encoder. The worker input is always a canonical WAV byte stream;
//! the worker decodes it itself, which keeps the channel payload a plain
//! `Vec<u8>` on both sides.
//!
//! Every request produces exactly one response. Encoder failures travel back
//! as messages, never as panics, so a missing or unhappy native encoder
//! degrades into a recoverable error the session can fall back from.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm};

use crate::audio::buffer::DecodedAudio;
use crate::audio::wav;
use crate::error::{Result, WaveclipError};

/// Default bitrate when a request does not specify one
pub const DEFAULT_BITRATE_KBPS: u32 = 192;

/// Output container formats the worker can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossyFormat {
    Mp3,
    Aac,
}

impl LossyFormat {
    /// MIME type of the encoded output
    pub fn mime(&self) -> &'static str {
        match self {
            LossyFormat::Mp3 => "audio/mpeg",
            LossyFormat::Aac => "audio/aac",
        }
    }

    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            LossyFormat::Mp3 => "mp3",
            LossyFormat::Aac => "aac",
        }
    }
}

/// One unit of work for the encoder thread
#[derive(Debug)]
pub struct EncodeRequest {
    /// Canonical WAV bytes to transcode
    pub wav_bytes: Vec<u8>,
    pub format: LossyFormat,
    pub bitrate_kbps: u32,
}

/// The single reply the worker sends per request
#[derive(Debug)]
pub enum EncodeResponse {
    Done(Vec<u8>),
    Error(String),
}

/// Handle to the encoder thread
///
/// Requests are serialized: `encode` blocks until the worker replies, so at
/// most one encode runs at a time. Dropping the handle closes the request
/// channel and joins the thread.
pub struct EncoderWorker {
    request_tx: Option<Sender<EncodeRequest>>,
    response_rx: Receiver<EncodeResponse>,
    handle: Option<JoinHandle<()>>,
}

impl EncoderWorker {
    /// Spawn the worker thread
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<EncodeRequest>();
        let (response_tx, response_rx) = mpsc::channel::<EncodeResponse>();

        let handle = thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                let response = match handle_request(&request) {
                    Ok(bytes) => EncodeResponse::Done(bytes),
                    Err(message) => {
                        warn!("lossy encode failed: {}", message);
                        EncodeResponse::Error(message)
                    }
                };
                if response_tx.send(response).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx: Some(request_tx),
            response_rx,
            handle: Some(handle),
        }
    }

    /// Run one encode and block for its reply
    ///
    /// # Errors
    /// `EncoderUnavailable` with the worker's message on any encode failure,
    /// including a dead worker thread.
    pub fn encode(&self, request: EncodeRequest) -> Result<Vec<u8>> {
        let tx = self
            .request_tx
            .as_ref()
            .ok_or_else(|| WaveclipError::EncoderUnavailable {
                reason: "encoder worker is shut down".to_string(),
            })?;
        tx.send(request)
            .map_err(|_| WaveclipError::EncoderUnavailable {
                reason: "encoder worker thread is gone".to_string(),
            })?;
        match self.response_rx.recv() {
            Ok(EncodeResponse::Done(bytes)) => Ok(bytes),
            Ok(EncodeResponse::Error(reason)) => {
                Err(WaveclipError::EncoderUnavailable { reason })
            }
            Err(_) => Err(WaveclipError::EncoderUnavailable {
                reason: "encoder worker stopped before replying".to_string(),
            }),
        }
    }
}

impl Drop for EncoderWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Decode the request's WAV payload and dispatch to the right encoder
fn handle_request(request: &EncodeRequest) -> std::result::Result<Vec<u8>, String> {
    let audio = wav::decode(&request.wav_bytes)
        .map_err(|e| format!("worker could not decode WAV input: {}", e))?;
    debug!(
        "encoding {:?}: {} frame(s), {} channel(s), {} kbps",
        request.format,
        audio.frames(),
        audio.channels(),
        request.bitrate_kbps
    );
    match request.format {
        LossyFormat::Mp3 => encode_mp3(&audio, request.bitrate_kbps),
        LossyFormat::Aac => encode_aac(&audio, request.bitrate_kbps),
    }
}

/// Map a requested kbps figure onto LAME's fixed bitrate ladder
fn mp3_bitrate(bitrate_kbps: u32) -> Bitrate {
    match bitrate_kbps {
        0..=96 => Bitrate::Kbps96,
        97..=112 => Bitrate::Kbps112,
        113..=128 => Bitrate::Kbps128,
        129..=160 => Bitrate::Kbps160,
        161..=192 => Bitrate::Kbps192,
        193..=224 => Bitrate::Kbps224,
        225..=256 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

/// Encode a buffer as MP3 via LAME
///
/// Mono and stereo only; LAME has no layout for more channels.
fn encode_mp3(audio: &DecodedAudio, bitrate_kbps: u32) -> std::result::Result<Vec<u8>, String> {
    if audio.channels() > 2 {
        return Err(format!(
            "MP3 supports mono and stereo, source has {} channels",
            audio.channels()
        ));
    }

    let mut builder = Builder::new().ok_or("failed to allocate LAME encoder")?;
    builder
        .set_sample_rate(audio.sample_rate())
        .map_err(|e| format!("LAME rejected sample rate {}: {:?}", audio.sample_rate(), e))?;
    builder
        .set_num_channels(audio.channels() as u8)
        .map_err(|e| format!("LAME rejected channel count: {:?}", e))?;
    builder
        .set_brate(mp3_bitrate(bitrate_kbps))
        .map_err(|e| format!("LAME rejected bitrate: {:?}", e))?;
    builder
        .set_quality(mp3lame_encoder::Quality::Good)
        .map_err(|e| format!("LAME rejected quality setting: {:?}", e))?;
    let mut encoder = builder
        .build()
        .map_err(|e| format!("LAME initialization failed: {:?}", e))?;

    let pcm = wav::to_i16_interleaved(audio);
    // LAME writes into the Vec's spare capacity; the worst case for n input
    // samples is 1.25 x n + 7200 bytes and must be reserved up front
    let mut out = Vec::new();
    out.reserve(mp3lame_encoder::max_required_buffer_size(pcm.len()));
    if audio.channels() == 1 {
        encoder
            .encode_to_vec(MonoPcm(&pcm), &mut out)
            .map_err(|e| format!("MP3 encode failed: {:?}", e))?;
    } else {
        encoder
            .encode_to_vec(InterleavedPcm(&pcm), &mut out)
            .map_err(|e| format!("MP3 encode failed: {:?}", e))?;
    }
    // The flush needs its own 7200-byte spare window
    out.reserve(7200);
    encoder
        .flush_to_vec::<FlushNoGap>(&mut out)
        .map_err(|e| format!("MP3 flush failed: {:?}", e))?;
    Ok(out)
}

/// Encode a buffer as AAC-LC in an ADTS stream via FDK
fn encode_aac(audio: &DecodedAudio, bitrate_kbps: u32) -> std::result::Result<Vec<u8>, String> {
    use fdk_aac::enc::{BitRate, ChannelMode, Encoder, EncoderParams, Transport};

    let channels = match audio.channels() {
        1 => ChannelMode::Mono,
        2 => ChannelMode::Stereo,
        n => {
            return Err(format!(
                "AAC export supports mono and stereo, source has {} channels",
                n
            ))
        }
    };

    let encoder = Encoder::new(EncoderParams {
        bit_rate: BitRate::Cbr(bitrate_kbps * 1000),
        sample_rate: audio.sample_rate(),
        transport: Transport::Adts,
        channels,
    })
    .map_err(|e| format!("FDK AAC initialization failed: {:?}", e))?;

    let pcm = wav::to_i16_interleaved(audio);
    let mut out = Vec::new();
    let mut chunk = vec![0u8; 8192];

    let mut consumed = 0;
    while consumed < pcm.len() {
        let info = encoder
            .encode(&pcm[consumed..], &mut chunk)
            .map_err(|e| format!("AAC encode failed: {:?}", e))?;
        if info.input_consumed == 0 && info.output_size == 0 {
            return Err("AAC encoder made no progress".to_string());
        }
        consumed += info.input_consumed;
        out.extend_from_slice(&chunk[..info.output_size]);
    }

    // Drain buffered frames
    loop {
        let info = encoder
            .encode(&[], &mut chunk)
            .map_err(|e| format!("AAC flush failed: {:?}", e))?;
        if info.output_size == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..info.output_size]);
    }
    Ok(out)
}
