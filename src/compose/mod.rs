//! Segment compositor
//!
//! Slices one or more time spans out of a decoded buffer and splices them
//! into a single contiguous buffer, in the order given. Splices are hard
//! cuts: no crossfades, no gap insertion, no resampling.
//!
//! Seconds map to frame indices by `floor(seconds × sample_rate)`, applied
//! independently to each span boundary. Output length is therefore the sum
//! of per-span frame counts, never a rounding of the summed durations.

use log::debug;

use crate::audio::buffer::DecodedAudio;
use crate::error::{Result, WaveclipError};

/// A half-open time span in seconds, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: f64,
    pub end: f64,
}

impl Span {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

impl From<crate::regions::Region> for Span {
    fn from(region: crate::regions::Region) -> Self {
        Self {
            start: region.start,
            end: region.end,
        }
    }
}

/// Convert a time in seconds to a frame index, clamped to the buffer
fn frame_index(seconds: f64, sample_rate: u32, frames: usize) -> usize {
    let index = (seconds.max(0.0) * sample_rate as f64).floor() as usize;
    index.min(frames)
}

/// Extract a single span from a buffer
///
/// # Errors
/// `EmptySelection` if the span covers zero frames after clamping.
pub fn trim(source: &DecodedAudio, span: Span) -> Result<DecodedAudio> {
    let rate = source.sample_rate();
    let start = frame_index(span.start, rate, source.frames());
    let end = frame_index(span.end, rate, source.frames());
    if end <= start {
        return Err(WaveclipError::EmptySelection);
    }

    let channels = (0..source.channels())
        .map(|ch| source.channel(ch)[start..end].to_vec())
        .collect();
    DecodedAudio::from_channels(channels, rate)
}

/// Splice the given spans into one contiguous buffer, in order
///
/// Spans that clamp to zero frames are skipped. Overlapping spans duplicate
/// audio; that is intentional.
///
/// # Errors
/// `EmptySelection` if no span contributes any frames.
pub fn concatenate(source: &DecodedAudio, spans: &[Span]) -> Result<DecodedAudio> {
    // Single span is exactly a trim
    if spans.len() == 1 {
        return trim(source, spans[0]);
    }

    let rate = source.sample_rate();
    let frames = source.frames();
    let cuts: Vec<(usize, usize)> = spans
        .iter()
        .map(|s| (frame_index(s.start, rate, frames), frame_index(s.end, rate, frames)))
        .filter(|(start, end)| end > start)
        .collect();

    let total: usize = cuts.iter().map(|(start, end)| end - start).sum();
    if total == 0 {
        return Err(WaveclipError::EmptySelection);
    }
    debug!(
        "compositing {} span(s) into {} frame(s) at {} Hz",
        cuts.len(),
        total,
        rate
    );

    let mut channels = vec![Vec::with_capacity(total); source.channels()];
    for (start, end) in cuts {
        for (ch, out) in channels.iter_mut().enumerate() {
            out.extend_from_slice(&source.channel(ch)[start..end]);
        }
    }
    DecodedAudio::from_channels(channels, rate)
}
