//! Waveclip - Audio Clip Region Editing and Export
//!
//! Waveclip takes one recorded or uploaded audio clip, validates (and if
//! necessary repairs) it, lets the caller mark time regions on it, and
//! exports the selected regions as a single spliced WAV, MP3, or AAC blob.
//!
//! # Architecture
//!
//! Editing data flows one way: viewport adapter → region store → compositor.
//! Export is strictly sequential: region store → compositor → WAV encoder →
//! optional lossy encoder worker → output bytes.
//!
//! The [`session::EditorSession`] controller owns the whole lifecycle
//! (`Idle → Validating → Ready ⇄ Editing → Exporting → Done`); everything
//! below it is a plain synchronous component except the lossy encoder, which
//! runs on its own worker thread.

pub mod audio;
pub mod cli;
pub mod compose;
pub mod encoder;
pub mod error;
pub mod regions;
pub mod session;
pub mod viewport;

pub use error::{Result, WaveclipError};
pub use session::{EditorSession, ExportFormat, ExportOutput, ExportRequest, SessionState};
