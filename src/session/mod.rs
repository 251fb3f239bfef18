//! Editor session controller
//!
//! Top-level orchestrator owning the lifecycle of one clip:
//! `Idle → Validating → Ready ⇄ Editing → Exporting → Done`, with `Failed`
//! reachable from `Validating` only. Export errors return the session to
//! `Ready`; validation failure is terminal for the asset and the caller must
//! load a new one.
//!
//! Export dataflow is strictly sequential: compositor, then WAV encoder,
//! then (for lossy formats) the encoder worker. Exports are serialized; a
//! second request while one is in flight is rejected, not queued.

use std::str::FromStr;

use log::{info, warn};

use crate::audio::buffer::DecodedAudio;
use crate::audio::decode::{self, AudioAsset};
use crate::audio::wav;
use crate::compose::{self, Span};
use crate::encoder::{EncodeRequest, EncoderWorker, LossyFormat, DEFAULT_BITRATE_KBPS};
use crate::error::{Result, WaveclipError};
use crate::regions::{Region, RegionId, RegionStore};
use crate::viewport::{ViewportAdapter, WaveformRenderer};

/// Lifecycle states of an editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Validating,
    Ready,
    Editing,
    Exporting,
    Done,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::Validating => "Validating",
            SessionState::Ready => "Ready",
            SessionState::Editing => "Editing",
            SessionState::Exporting => "Exporting",
            SessionState::Done => "Done",
            SessionState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Output container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Wav,
    Mp3,
    Aac,
}

impl ExportFormat {
    /// The lossy worker format, if this is not plain WAV
    pub fn lossy(&self) -> Option<LossyFormat> {
        match self {
            ExportFormat::Wav => None,
            ExportFormat::Mp3 => Some(LossyFormat::Mp3),
            ExportFormat::Aac => Some(LossyFormat::Aac),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "audio/wav",
            ExportFormat::Mp3 => "audio/mpeg",
            ExportFormat::Aac => "audio/aac",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = WaveclipError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::Mp3),
            "aac" => Ok(ExportFormat::Aac),
            other => Err(WaveclipError::InvalidState {
                state: format!("unknown export format '{}'", other),
            }),
        }
    }
}

/// Parameters for one export
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Explicit spans to export; `None` means "all regions, time-sorted"
    pub regions: Option<Vec<Span>>,
    pub format: ExportFormat,
    pub bitrate_kbps: Option<u32>,
    /// Degrade a failed lossy encode into a WAV export instead of an error
    pub allow_fallback: bool,
}

impl ExportRequest {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            regions: None,
            format,
            bitrate_kbps: None,
            allow_fallback: true,
        }
    }
}

/// The final export artifact: bytes plus their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

/// Orchestrates one clip's validate/edit/export lifecycle
pub struct EditorSession<R: WaveformRenderer> {
    state: SessionState,
    /// Renderer parked here until a clip is loaded
    renderer: Option<R>,
    viewport: Option<ViewportAdapter<R>>,
    audio: Option<DecodedAudio>,
    /// Whether the current asset went through the repair path
    repaired: bool,
    /// Pre-region legacy selection, used only when no regions exist
    raw_selection: Option<Span>,
    export_in_flight: bool,
}

impl<R: WaveformRenderer> EditorSession<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            state: SessionState::Idle,
            renderer: Some(renderer),
            viewport: None,
            audio: None,
            repaired: false,
            raw_selection: None,
            export_in_flight: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the loaded asset needed the decode repair pass
    pub fn was_repaired(&self) -> bool {
        self.repaired
    }

    /// Clip duration in seconds, if a clip is loaded
    pub fn duration(&self) -> Option<f64> {
        self.audio.as_ref().map(|a| a.duration_secs())
    }

    /// The viewport adapter, if a clip is loaded
    pub fn viewport(&self) -> Option<&ViewportAdapter<R>> {
        self.viewport.as_ref()
    }

    /// Mutable viewport access for playback control (seek, play, tick)
    pub fn viewport_mut(&mut self) -> Option<&mut ViewportAdapter<R>> {
        self.viewport.as_mut()
    }

    /// Regions of the loaded clip, in creation order
    pub fn regions(&self) -> &[Region] {
        self.viewport
            .as_ref()
            .map(|vp| vp.store().regions())
            .unwrap_or(&[])
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load and validate a new asset, replacing any previous clip
    ///
    /// On success the session is `Ready` with the initial auto-region in
    /// place. On failure the session is `Failed` and a new asset is the
    /// only way forward.
    ///
    /// # Errors
    /// `ExportInFlight` if called during an export; otherwise any
    /// validation error from the decode/repair pipeline.
    pub fn load(&mut self, asset: AudioAsset) -> Result<()> {
        if self.export_in_flight {
            return Err(WaveclipError::ExportInFlight);
        }

        // Reclaim the renderer from a previous clip's adapter
        if let Some(viewport) = self.viewport.take() {
            self.renderer = Some(viewport.into_renderer());
        }
        self.audio = None;
        self.raw_selection = None;
        self.state = SessionState::Validating;

        let validation = match decode::validate(&asset) {
            Ok(v) => v,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };
        self.repaired = validation.was_repaired();
        let audio = validation.into_audio();
        info!(
            "clip loaded: {:.3}s, {} channel(s) at {} Hz{}",
            audio.duration_secs(),
            audio.channels(),
            audio.sample_rate(),
            if self.repaired { " (repaired)" } else { "" }
        );

        let store = RegionStore::new(audio.duration_secs());
        let renderer = self
            .renderer
            .take()
            .ok_or_else(|| WaveclipError::InvalidState {
                state: self.state.to_string(),
            })?;
        let mut viewport = ViewportAdapter::new(store, renderer);
        viewport.ensure_initial_region();

        self.audio = Some(audio);
        self.viewport = Some(viewport);
        self.state = SessionState::Ready;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Create a region; see `RegionStore::create_region` for clamping rules
    pub fn create_region(&mut self, start: f64, end: f64) -> Result<Region> {
        self.edit(|vp| Ok(vp.create_region(start, end)))
    }

    /// Move/resize a region
    pub fn update_region(&mut self, id: RegionId, start: f64, end: f64) -> Result<Option<Region>> {
        self.edit(|vp| Ok(vp.update_region(id, start, end)))
    }

    /// Delete a region, subject to last-region protection
    pub fn delete_region(&mut self, id: RegionId) -> Result<()> {
        self.edit(|vp| vp.delete_region(id))
    }

    /// Forward a renderer gesture to the viewport adapter
    pub fn on_renderer_event(&mut self, event: crate::viewport::RendererEvent) -> Result<()> {
        self.edit(|vp| vp.on_event(event))
    }

    /// Set the legacy raw start/end selection
    ///
    /// Only consulted for export scope when no regions exist.
    pub fn set_raw_selection(&mut self, start: f64, end: f64) -> Result<()> {
        self.require_editable()?;
        self.raw_selection = Some(Span::new(start, end));
        Ok(())
    }

    /// Run one region mutation through the `Editing` state
    fn edit<T>(
        &mut self,
        mutate: impl FnOnce(&mut ViewportAdapter<R>) -> Result<T>,
    ) -> Result<T> {
        self.require_editable()?;
        let viewport = self
            .viewport
            .as_mut()
            .ok_or_else(|| WaveclipError::InvalidState {
                state: SessionState::Idle.to_string(),
            })?;
        self.state = SessionState::Editing;
        let result = mutate(viewport);
        self.state = SessionState::Ready;
        result
    }

    /// Mutations are allowed in Ready, Editing, and Done (which re-enters
    /// the edit loop)
    fn require_editable(&self) -> Result<()> {
        match self.state {
            SessionState::Ready | SessionState::Editing | SessionState::Done => Ok(()),
            other => Err(WaveclipError::InvalidState {
                state: other.to_string(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Run one export to completion
    ///
    /// Scope resolution order: explicit spans in the request, else all
    /// regions time-sorted, else the raw legacy selection, else
    /// `NothingSelected`.
    ///
    /// # Errors
    /// `ExportInFlight` if an export is already running; `InvalidState`
    /// outside Ready/Done; otherwise the failing stage's error, after the
    /// session has returned to `Ready`.
    pub fn export(&mut self, request: ExportRequest) -> Result<ExportOutput> {
        if self.export_in_flight {
            return Err(WaveclipError::ExportInFlight);
        }
        match self.state {
            SessionState::Ready | SessionState::Done => {}
            other => {
                return Err(WaveclipError::InvalidState {
                    state: other.to_string(),
                })
            }
        }

        self.export_in_flight = true;
        self.state = SessionState::Exporting;
        let result = self.run_export(&request);
        self.export_in_flight = false;
        match result {
            Ok(output) => {
                info!("export done: {} byte(s) as {}", output.bytes.len(), output.mime);
                self.state = SessionState::Done;
                Ok(output)
            }
            Err(e) => {
                // Export errors keep the session alive
                self.state = SessionState::Ready;
                Err(e)
            }
        }
    }

    fn run_export(&self, request: &ExportRequest) -> Result<ExportOutput> {
        let audio = self.audio.as_ref().ok_or_else(|| WaveclipError::InvalidState {
            state: self.state.to_string(),
        })?;
        let spans = self.resolve_scope(request)?;

        let composed = compose::concatenate(audio, &spans)?;
        let wav_bytes = wav::encode(&composed);

        let Some(lossy) = request.format.lossy() else {
            return Ok(ExportOutput {
                bytes: wav_bytes,
                mime: ExportFormat::Wav.mime(),
            });
        };

        // One-shot worker lifetime: spawned per export, joined on drop
        let worker = EncoderWorker::spawn();
        let encode = worker.encode(EncodeRequest {
            wav_bytes: wav_bytes.clone(),
            format: lossy,
            bitrate_kbps: request.bitrate_kbps.unwrap_or(DEFAULT_BITRATE_KBPS),
        });
        match encode {
            Ok(bytes) => Ok(ExportOutput {
                bytes,
                mime: lossy.mime(),
            }),
            Err(e) if request.allow_fallback => {
                warn!("lossy encode failed, falling back to WAV: {}", e);
                Ok(ExportOutput {
                    bytes: wav_bytes,
                    mime: ExportFormat::Wav.mime(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Decide what time spans the export covers
    fn resolve_scope(&self, request: &ExportRequest) -> Result<Vec<Span>> {
        if let Some(spans) = &request.regions {
            if spans.is_empty() {
                return Err(WaveclipError::EmptySelection);
            }
            return Ok(spans.clone());
        }
        if let Some(viewport) = &self.viewport {
            let store = viewport.store();
            if !store.is_empty() {
                return Ok(store.regions_by_start().into_iter().map(Span::from).collect());
            }
        }
        if let Some(raw) = self.raw_selection {
            return Ok(vec![raw]);
        }
        Err(WaveclipError::NothingSelected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::NullRenderer;

    fn tone_asset(duration_secs: f32) -> AudioAsset {
        let sample_rate = 8000;
        let frames = (duration_secs * sample_rate as f32) as usize;
        let samples: Vec<f32> = (0..frames)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let buffer = DecodedAudio::from_channels(vec![samples], sample_rate).unwrap();
        AudioAsset::new(wav::encode(&buffer), "audio/wav")
    }

    fn ready_session(duration_secs: f32) -> EditorSession<NullRenderer> {
        let mut session = EditorSession::new(NullRenderer);
        session.load(tone_asset(duration_secs)).unwrap();
        session
    }

    #[test]
    fn test_load_reaches_ready_with_auto_region() {
        let session = ready_session(10.0);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(!session.was_repaired());
        assert_eq!(session.regions().len(), 1);
        let region = session.regions()[0];
        assert_eq!(region.start, 0.0);
        assert_eq!(region.end, 5.0);
    }

    #[test]
    fn test_load_failure_is_terminal_for_asset() {
        let mut session = EditorSession::new(NullRenderer);
        let result = session.load(AudioAsset::new(b"garbage".to_vec(), "audio/wav"));
        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Failed);

        // A new asset is the way out of Failed
        session.load(tone_asset(2.0)).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_edit_requires_loaded_clip() {
        let mut session: EditorSession<NullRenderer> = EditorSession::new(NullRenderer);
        let result = session.create_region(0.0, 1.0);
        assert!(matches!(result, Err(WaveclipError::InvalidState { .. })));
    }

    #[test]
    fn test_export_all_regions_time_sorted() {
        let mut session = ready_session(10.0);
        let auto = session.regions()[0].id;
        session.update_region(auto, 6.0, 8.0).unwrap();
        session.create_region(1.0, 2.0).unwrap();

        let output = session.export(ExportRequest::new(ExportFormat::Wav)).unwrap();
        assert_eq!(output.mime, "audio/wav");
        assert_eq!(session.state(), SessionState::Done);

        // 1s + 2s at 8 kHz, with the later-created region spliced first
        let decoded = wav::decode(&output.bytes).unwrap();
        assert_eq!(decoded.frames(), 8000 + 16000);
    }

    #[test]
    fn test_export_explicit_spans_override_regions() {
        let mut session = ready_session(10.0);
        let mut request = ExportRequest::new(ExportFormat::Wav);
        request.regions = Some(vec![Span::new(0.0, 1.0)]);
        let output = session.export(request).unwrap();
        let decoded = wav::decode(&output.bytes).unwrap();
        assert_eq!(decoded.frames(), 8000);
    }

    #[test]
    fn test_export_explicit_empty_spans() {
        let mut session = ready_session(10.0);
        let mut request = ExportRequest::new(ExportFormat::Wav);
        request.regions = Some(vec![]);
        let result = session.export(request);
        assert!(matches!(result, Err(WaveclipError::EmptySelection)));
        // Export errors keep the session alive
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_export_degenerate_spans_keep_session_alive() {
        let mut session = ready_session(10.0);
        let mut request = ExportRequest::new(ExportFormat::Wav);
        request.regions = Some(vec![Span::new(3.0, 3.0)]);
        let result = session.export(request);
        assert!(matches!(result, Err(WaveclipError::EmptySelection)));
        assert_eq!(session.state(), SessionState::Ready);

        // The same session can export again with a fixed selection
        let output = session.export(ExportRequest::new(ExportFormat::Wav)).unwrap();
        assert!(!output.bytes.is_empty());
    }

    #[test]
    fn test_done_reenters_edit_loop() {
        let mut session = ready_session(10.0);
        session.export(ExportRequest::new(ExportFormat::Wav)).unwrap();
        assert_eq!(session.state(), SessionState::Done);

        session.create_region(1.0, 2.0).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_export_rejected_while_in_flight() {
        let mut session = ready_session(10.0);
        session.export_in_flight = true;
        let result = session.export(ExportRequest::new(ExportFormat::Wav));
        assert!(matches!(result, Err(WaveclipError::ExportInFlight)));
        let result = session.load(tone_asset(1.0));
        assert!(matches!(result, Err(WaveclipError::ExportInFlight)));
    }

    #[test]
    fn test_export_from_idle_is_invalid() {
        let mut session: EditorSession<NullRenderer> = EditorSession::new(NullRenderer);
        let result = session.export(ExportRequest::new(ExportFormat::Wav));
        assert!(matches!(result, Err(WaveclipError::InvalidState { .. })));
    }

    #[test]
    fn test_lossy_export_produces_tagged_bytes() {
        let mut session = ready_session(3.0);
        // 8 kHz is within LAME's supported rates
        let output = session.export(ExportRequest::new(ExportFormat::Mp3)).unwrap();
        assert_eq!(output.mime, "audio/mpeg");
        assert!(!output.bytes.is_empty());
    }

    #[test]
    fn test_lossy_failure_falls_back_to_wav() {
        // 6-channel source: both lossy encoders refuse it
        let sample_rate = 8000;
        let buffer = DecodedAudio::silent(sample_rate as usize, 6, sample_rate).unwrap();
        let asset = AudioAsset::new(wav::encode(&buffer), "audio/wav");
        let mut session = EditorSession::new(NullRenderer);
        session.load(asset).unwrap();

        let output = session.export(ExportRequest::new(ExportFormat::Aac)).unwrap();
        assert_eq!(output.mime, "audio/wav");

        // With fallback disallowed the error surfaces instead
        let mut strict = ExportRequest::new(ExportFormat::Aac);
        strict.allow_fallback = false;
        let result = session.export(strict);
        assert!(matches!(
            result,
            Err(WaveclipError::EncoderUnavailable { .. })
        ));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_raw_selection_used_only_without_regions() {
        let mut session = ready_session(10.0);
        session.set_raw_selection(0.0, 1.0).unwrap();

        // Regions exist, so the raw selection is ignored
        let output = session.export(ExportRequest::new(ExportFormat::Wav)).unwrap();
        let decoded = wav::decode(&output.bytes).unwrap();
        assert_eq!(decoded.frames(), 5 * 8000);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("wav".parse::<ExportFormat>().unwrap(), ExportFormat::Wav);
        assert_eq!("MP3".parse::<ExportFormat>().unwrap(), ExportFormat::Mp3);
        assert_eq!("aac".parse::<ExportFormat>().unwrap(), ExportFormat::Aac);
        assert!("ogg".parse::<ExportFormat>().is_err());
    }
}
