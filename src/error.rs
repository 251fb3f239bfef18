//! Error handling for waveclip
//!
//! All errors carry a stable code and recovery suggestions so callers can
//! present actionable messages instead of raw decoder output.

use thiserror::Error;

/// Result type alias for waveclip operations
pub type Result<T> = std::result::Result<T, WaveclipError>;

/// Main error type for waveclip operations
#[derive(Error, Debug)]
pub enum WaveclipError {
    // Decode / validation errors
    #[error("Audio could not be decoded: {reason}")]
    DecodeFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Audio asset is empty")]
    EmptyAsset,

    // Selection / region errors
    #[error("Export selection contains no audio")]
    EmptySelection,

    #[error("Nothing selected for export")]
    NothingSelected,

    #[error("Cannot delete the last remaining region")]
    LastRegionProtected,

    // Export errors
    #[error("Lossy encoder unavailable: {reason}")]
    EncoderUnavailable { reason: String },

    #[error("An export is already in flight")]
    ExportInFlight,

    #[error("Operation not allowed in state {state}")]
    InvalidState { state: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WaveclipError {
    /// Get the stable error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            WaveclipError::DecodeFailure { .. } => "DECODE_FAILURE",
            WaveclipError::EmptyAsset => "EMPTY_ASSET",
            WaveclipError::EmptySelection => "EMPTY_SELECTION",
            WaveclipError::NothingSelected => "NOTHING_SELECTED",
            WaveclipError::LastRegionProtected => "LAST_REGION_PROTECTED",
            WaveclipError::EncoderUnavailable { .. } => "ENCODER_UNAVAILABLE",
            WaveclipError::ExportInFlight => "EXPORT_IN_FLIGHT",
            WaveclipError::InvalidState { .. } => "INVALID_STATE",
            WaveclipError::Io(_) => "IO_ERROR",
            WaveclipError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable within the same session
    ///
    /// Decode failures are terminal for the asset: the caller must supply a
    /// new recording. Everything selection- or encoder-related keeps the
    /// session alive.
    pub fn is_recoverable(&self) -> bool {
        match self {
            WaveclipError::EmptySelection => true,
            WaveclipError::NothingSelected => true,
            WaveclipError::LastRegionProtected => true,
            WaveclipError::EncoderUnavailable { .. } => true,
            WaveclipError::ExportInFlight => true,
            WaveclipError::InvalidState { .. } => true,
            _ => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            WaveclipError::DecodeFailure { .. } => vec![
                "Record or upload the clip again",
                "Check if the file plays in another application",
                "The repair pass already ran once - retrying will not help",
            ],
            WaveclipError::EmptyAsset => vec![
                "The uploaded byte buffer was empty",
                "Re-record or re-select the source file",
            ],
            WaveclipError::EmptySelection => vec![
                "Widen at least one region so it covers audible audio",
                "Zero-length regions contribute no samples",
            ],
            WaveclipError::NothingSelected => vec![
                "Create a region on the waveform before exporting",
                "Or pass an explicit start/end range",
            ],
            WaveclipError::LastRegionProtected => vec![
                "At least one region must remain",
                "Move or resize the region instead of deleting it",
            ],
            WaveclipError::EncoderUnavailable { .. } => vec![
                "Export as WAV instead",
                "MP3 and AAC support mono and stereo sources only",
            ],
            WaveclipError::ExportInFlight => vec![
                "Wait for the current export to finish",
                "Exports are serialized per session",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = WaveclipError::DecodeFailure {
            reason: "bad header".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "DECODE_FAILURE");
        assert_eq!(
            WaveclipError::LastRegionProtected.error_code(),
            "LAST_REGION_PROTECTED"
        );
    }

    #[test]
    fn test_recoverability_split() {
        assert!(WaveclipError::EmptySelection.is_recoverable());
        assert!(WaveclipError::LastRegionProtected.is_recoverable());
        assert!(WaveclipError::EncoderUnavailable {
            reason: "no lame".to_string()
        }
        .is_recoverable());

        let decode = WaveclipError::DecodeFailure {
            reason: "unplayable".to_string(),
            source: None,
        };
        assert!(!decode.is_recoverable());
    }

    #[test]
    fn test_recovery_suggestions_present() {
        let err = WaveclipError::NothingSelected;
        assert!(!err.recovery_suggestions().is_empty());
    }
}
