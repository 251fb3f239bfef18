//! CLI command implementations

use std::fs;

use log::info;
use serde::Serialize;

use crate::audio::decode::{self, AudioAsset};
use crate::compose::Span;
use crate::error::{Result, WaveclipError};
use crate::session::{EditorSession, ExportFormat, ExportRequest};
use crate::viewport::NullRenderer;

/// Clip properties reported by `inspect`
#[derive(Serialize)]
struct ClipSummary<'a> {
    file: &'a str,
    duration_secs: f64,
    channels: usize,
    sample_rate: u32,
    frames: usize,
    repaired: bool,
}

/// Validate a clip and print its properties
pub fn inspect(input: &str, json: bool) -> Result<()> {
    let asset = load_asset(input)?;
    let validation = decode::validate(&asset)?;
    let audio = validation.audio();
    let summary = ClipSummary {
        file: input,
        duration_secs: audio.duration_secs(),
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        frames: audio.frames(),
        repaired: validation.was_repaired(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("file:        {}", summary.file);
        println!("duration:    {:.3} s", summary.duration_secs);
        println!("channels:    {}", summary.channels);
        println!("sample rate: {} Hz", summary.sample_rate);
        println!("frames:      {}", summary.frames);
        println!("repaired:    {}", summary.repaired);
    }
    Ok(())
}

/// Cut a single span out of a clip and write it as WAV
pub fn trim(input: &str, output: &str, start: f64, end: f64) -> Result<()> {
    let mut session = load_session(input)?;
    let mut request = ExportRequest::new(ExportFormat::Wav);
    request.regions = Some(vec![Span::new(start, end)]);

    let out = session.export(request)?;
    fs::write(output, &out.bytes)?;
    info!("wrote {} byte(s) to {}", out.bytes.len(), output);
    Ok(())
}

/// Splice spans and export in the requested format
pub fn export(
    input: &str,
    output: &str,
    format: &str,
    regions: &[String],
    bitrate: Option<u32>,
    no_fallback: bool,
) -> Result<()> {
    let requested = format.parse::<ExportFormat>()?;
    let mut session = load_session(input)?;
    let duration = session.duration().unwrap_or(0.0);

    let spans = if regions.is_empty() {
        vec![Span::new(0.0, duration)]
    } else {
        regions
            .iter()
            .map(|r| parse_span(r))
            .collect::<Result<Vec<Span>>>()?
    };

    let mut request = ExportRequest::new(requested);
    request.regions = Some(spans);
    request.bitrate_kbps = bitrate;
    request.allow_fallback = !no_fallback;

    let out = session.export(request)?;
    fs::write(output, &out.bytes)?;
    info!(
        "wrote {} byte(s) to {} ({})",
        out.bytes.len(),
        output,
        out.mime
    );
    if fell_back_to_wav(requested, out.mime) {
        println!("note: lossy encode unavailable, exported WAV instead");
    }
    Ok(())
}

/// Whether an export that asked for a lossy format came back as WAV
fn fell_back_to_wav(requested: ExportFormat, actual_mime: &str) -> bool {
    requested != ExportFormat::Wav && actual_mime == ExportFormat::Wav.mime()
}

fn load_session(input: &str) -> Result<EditorSession<NullRenderer>> {
    let mut session = EditorSession::new(NullRenderer);
    session.load(load_asset(input)?)?;
    Ok(session)
}

fn load_asset(input: &str) -> Result<AudioAsset> {
    let bytes = fs::read(input)?;
    Ok(AudioAsset::new(bytes, mime_for_path(input)))
}

/// Parse a `start:end` second pair
fn parse_span(text: &str) -> Result<Span> {
    let parse = || -> Option<Span> {
        let (start, end) = text.split_once(':')?;
        Some(Span::new(
            start.trim().parse::<f64>().ok()?,
            end.trim().parse::<f64>().ok()?,
        ))
    };
    parse().ok_or_else(|| WaveclipError::InvalidState {
        state: format!("region '{}' is not a start:end pair", text),
    })
}

/// Guess a MIME type from the file extension
fn mime_for_path(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or("");
    match extension.to_ascii_lowercase().as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}
