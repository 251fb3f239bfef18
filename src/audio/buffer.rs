//! Decoded audio buffer
//!
//! Planar 32-bit float storage, one `Vec<f32>` per channel. Every decoded
//! asset in waveclip passes through this type: the compositor slices it, the
//! WAV encoder serializes it, the viewport derives durations from it.

use crate::error::{Result, WaveclipError};

/// Decoded PCM audio: per-channel sample arrays of equal length
///
/// Invariants (enforced by the constructors):
/// - at least one channel
/// - all channels have the same length
/// - sample rate is positive
///
/// Samples are nominally in [-1.0, 1.0]; out-of-range values are tolerated
/// here and clamped at encode time.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Sample data: outer Vec is channels, inner Vec is frames
    samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl DecodedAudio {
    /// Create a silent buffer with the given geometry
    pub fn silent(frames: usize, channels: usize, sample_rate: u32) -> Result<Self> {
        Self::from_channels(vec![vec![0.0_f32; frames]; channels], sample_rate)
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// # Errors
    /// `DecodeFailure` if there are no channels, the channel lengths differ,
    /// or the sample rate is zero.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(WaveclipError::DecodeFailure {
                reason: "decoded audio has no channels".to_string(),
                source: None,
            });
        }
        if sample_rate == 0 {
            return Err(WaveclipError::DecodeFailure {
                reason: "decoded audio has zero sample rate".to_string(),
                source: None,
            });
        }
        let frames = samples[0].len();
        if samples.iter().any(|ch| ch.len() != frames) {
            return Err(WaveclipError::DecodeFailure {
                reason: "decoded channels have unequal lengths".to_string(),
                source: None,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    ///
    /// # Errors
    /// `DecodeFailure` if the data length is not divisible by the channel
    /// count.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(WaveclipError::DecodeFailure {
                reason: "decoded audio has no channels".to_string(),
                source: None,
            });
        }
        if interleaved.len() % channels != 0 {
            return Err(WaveclipError::DecodeFailure {
                reason: format!(
                    "interleaved length {} is not divisible by channel count {}",
                    interleaved.len(),
                    channels
                ),
                source: None,
            });
        }

        let frames = interleaved.len() / channels;
        let mut samples = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }
        Self::from_channels(samples, sample_rate)
    }

    /// Convert the buffer to interleaved frame order (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut interleaved = Vec::with_capacity(frames * self.channels());
        for frame in 0..frames {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Number of channels (always ≥ 1)
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of frames per channel
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples[0].len()
    }

    /// Check whether the buffer holds zero frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds (frames / rate)
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Immutable access to one channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds.
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Mutable access to one channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds.
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Check if all samples are finite (no NaN or infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Check the validity invariant: finite, strictly positive duration
    ///
    /// A decode that yields zero frames or a non-finite duration is treated
    /// as a decode failure, not a valid result.
    pub fn has_valid_duration(&self) -> bool {
        let duration = self.duration_secs();
        duration.is_finite() && duration > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_silent_geometry() {
        let buffer = DecodedAudio::silent(48000, 2, 48000).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 48000);
        assert_relative_eq!(buffer.duration_secs(), 1.0);
    }

    #[test]
    fn test_from_channels_rejects_bad_geometry() {
        assert!(DecodedAudio::from_channels(vec![], 48000).is_err());
        assert!(DecodedAudio::from_channels(vec![vec![0.0; 10]], 0).is_err());
        assert!(
            DecodedAudio::from_channels(vec![vec![0.0; 10], vec![0.0; 9]], 48000).is_err()
        );
    }

    #[test]
    fn test_interleave_roundtrip_stereo() {
        let original = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let buffer = DecodedAudio::from_interleaved(&original, 2, 44100).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0), &[0.1, 0.3, 0.5]);
        assert_eq!(buffer.channel(1), &[0.2, 0.4, 0.6]);
        assert_eq!(buffer.to_interleaved(), original);
    }

    #[test]
    fn test_from_interleaved_rejects_ragged_input() {
        let result = DecodedAudio::from_interleaved(&[0.1, 0.2, 0.3], 2, 44100);
        assert!(result.is_err());
    }

    #[test]
    fn test_multichannel_supported() {
        // 5.1-style layouts must survive; nothing in the pipeline assumes stereo
        let buffer = DecodedAudio::silent(100, 6, 48000).unwrap();
        assert_eq!(buffer.channels(), 6);
        assert_eq!(buffer.to_interleaved().len(), 600);
    }

    #[test]
    fn test_is_finite() {
        let good = DecodedAudio::silent(100, 1, 48000).unwrap();
        assert!(good.is_finite());

        let mut bad = DecodedAudio::silent(100, 1, 48000).unwrap();
        bad.channel_mut(0)[50] = f32::NAN;
        assert!(!bad.is_finite());
    }

    #[test]
    fn test_duration_invariant() {
        let empty = DecodedAudio::from_channels(vec![Vec::new()], 48000).unwrap();
        assert!(!empty.has_valid_duration());

        let one_frame = DecodedAudio::silent(1, 1, 48000).unwrap();
        assert!(one_frame.has_valid_duration());
    }
}
