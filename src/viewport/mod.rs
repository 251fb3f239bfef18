//! Waveform viewport adapter
//!
//! Bridges the region store to an external waveform renderer. Store
//! mutations flow out as `RenderCommand`s; user gestures flow back in as
//! `RendererEvent`s and are applied to the store. Commands and events are
//! processed on the caller's single thread in order, so an event can never
//! be applied against store state older than the last command issued.
//!
//! The adapter also owns the playback position and the play/pause-of-region
//! semantics: region playback stops at the active region's end.

use log::debug;

use crate::error::{Result, WaveclipError};
use crate::regions::{Region, RegionId, RegionStore};

/// Fill color handed to the renderer for region overlays
pub const DEFAULT_REGION_COLOR: &str = "rgba(120, 180, 255, 0.25)";

/// Commands the adapter issues to the external renderer
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    DrawRegion {
        id: RegionId,
        start: f64,
        end: f64,
        color: &'static str,
    },
    RemoveRegion {
        id: RegionId,
    },
    SetZoom {
        px_per_second: f64,
    },
    Seek {
        time: f64,
    },
}

/// Gesture events arriving from the external renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RendererEvent {
    /// User dragged out a new region; the id is the renderer's provisional
    /// handle, replaced by a store-assigned id
    RegionCreated {
        id: RegionId,
        start: f64,
        end: f64,
    },
    RegionUpdated {
        id: RegionId,
        start: f64,
        end: f64,
    },
    RegionRemoved {
        id: RegionId,
    },
    RegionClicked {
        id: RegionId,
    },
}

/// Sink for render commands; implemented by the rendering integration
pub trait WaveformRenderer {
    fn apply(&mut self, command: RenderCommand);
}

/// Renderer that discards all commands, for headless use
#[derive(Debug, Default)]
pub struct NullRenderer;

impl WaveformRenderer for NullRenderer {
    fn apply(&mut self, _command: RenderCommand) {}
}

/// The store-to-renderer bridge for one editing session
pub struct ViewportAdapter<R: WaveformRenderer> {
    store: RegionStore,
    renderer: R,
    /// Playback position in seconds
    position: f64,
    playing: bool,
}

impl<R: WaveformRenderer> ViewportAdapter<R> {
    pub fn new(store: RegionStore, renderer: R) -> Self {
        Self {
            store,
            renderer,
            position: 0.0,
            playing: false,
        }
    }

    /// Read access to the region store
    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    /// Tear the adapter down and reclaim the renderer, dropping the store
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Current playback position in seconds
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    // ------------------------------------------------------------------
    // Store mutations initiated by the application (store -> renderer)
    // ------------------------------------------------------------------

    /// Create the initial auto-region on first load and draw it
    pub fn ensure_initial_region(&mut self) -> Option<Region> {
        let region = self.store.ensure_initial_region()?;
        self.draw(region);
        Some(region)
    }

    /// Create a region and draw it
    pub fn create_region(&mut self, start: f64, end: f64) -> Region {
        let region = self.store.create_region(start, end);
        self.draw(region);
        region
    }

    /// Move/resize a region and redraw it; no-op if the id is unknown
    pub fn update_region(&mut self, id: RegionId, start: f64, end: f64) -> Option<Region> {
        let region = self.store.update_region(id, start, end)?;
        self.draw(region);
        Some(region)
    }

    /// Delete a region and remove it from the renderer
    ///
    /// # Errors
    /// `LastRegionProtected` if this is the sole remaining region; the
    /// renderer keeps its overlay in that case.
    pub fn delete_region(&mut self, id: RegionId) -> Result<()> {
        self.store.delete_region(id)?;
        self.renderer.apply(RenderCommand::RemoveRegion { id });
        Ok(())
    }

    /// Change the renderer zoom level
    pub fn set_zoom(&mut self, px_per_second: f64) {
        self.renderer
            .apply(RenderCommand::SetZoom { px_per_second });
    }

    // ------------------------------------------------------------------
    // Renderer gestures (renderer -> store)
    // ------------------------------------------------------------------

    /// Apply one renderer-originated event against the current store state
    ///
    /// # Errors
    /// `LastRegionProtected` when a remove gesture targets the sole region;
    /// the overlay is re-drawn so renderer and store stay in sync.
    pub fn on_event(&mut self, event: RendererEvent) -> Result<()> {
        match event {
            RendererEvent::RegionCreated { id, start, end } => {
                // The store assigns the canonical id; the renderer's
                // provisional overlay is replaced by the canonical one
                let region = self.store.create_region(start, end);
                debug!("gesture create: provisional {} -> {}", id, region.id);
                self.renderer.apply(RenderCommand::RemoveRegion { id });
                self.draw(region);
                Ok(())
            }
            RendererEvent::RegionUpdated { id, start, end } => {
                if let Some(region) = self.store.update_region(id, start, end) {
                    // Snap the overlay back when clamping changed the bounds
                    if region.start != start || region.end != end {
                        self.draw(region);
                    }
                }
                Ok(())
            }
            RendererEvent::RegionRemoved { id } => match self.store.delete_region(id) {
                Ok(()) => {
                    // Confirm the removal so the renderer and store converge
                    // even when the event came from a stale overlay
                    self.renderer.apply(RenderCommand::RemoveRegion { id });
                    Ok(())
                }
                Err(WaveclipError::LastRegionProtected) => {
                    if let Some(region) = self.store.get(id) {
                        self.draw(region);
                    }
                    Err(WaveclipError::LastRegionProtected)
                }
                Err(other) => Err(other),
            },
            RendererEvent::RegionClicked { id } => {
                if self.store.set_active(id) {
                    // Clicking arms the region and parks the cursor at its start
                    let start = self.store.get(id).map(|r| r.start).unwrap_or(0.0);
                    self.seek(start);
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Move the playback cursor, clamped into the clip
    pub fn seek(&mut self, time: f64) {
        self.position = time.clamp(0.0, self.store.duration());
        self.renderer.apply(RenderCommand::Seek {
            time: self.position,
        });
    }

    /// Start region-scoped playback from the region's start
    ///
    /// Returns false if the id is unknown.
    pub fn play_region(&mut self, id: RegionId) -> bool {
        if !self.store.set_active(id) {
            return false;
        }
        let start = self.store.get(id).map(|r| r.start).unwrap_or(0.0);
        self.seek(start);
        self.playing = true;
        true
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advance the playback clock by `dt` seconds
    ///
    /// Region playback stops exactly at the active region's end; free
    /// playback stops at the end of the clip.
    pub fn tick(&mut self, dt: f64) {
        if !self.playing {
            return;
        }
        self.position += dt;

        let limit = self
            .store
            .active()
            .map(|r| r.end)
            .unwrap_or_else(|| self.store.duration());
        if self.position >= limit {
            self.position = limit;
            self.playing = false;
        }
        self.renderer.apply(RenderCommand::Seek {
            time: self.position,
        });
    }

    fn draw(&mut self, region: Region) {
        self.renderer.apply(RenderCommand::DrawRegion {
            id: region.id,
            start: region.start,
            end: region.end,
            color: DEFAULT_REGION_COLOR,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Renderer that records every command it receives
    #[derive(Debug, Default)]
    struct RecordingRenderer {
        commands: Vec<RenderCommand>,
    }

    impl WaveformRenderer for RecordingRenderer {
        fn apply(&mut self, command: RenderCommand) {
            self.commands.push(command);
        }
    }

    fn adapter() -> ViewportAdapter<RecordingRenderer> {
        ViewportAdapter::new(RegionStore::new(10.0), RecordingRenderer::default())
    }

    #[test]
    fn test_create_issues_draw_command() {
        let mut vp = adapter();
        let region = vp.create_region(1.0, 3.0);
        assert_eq!(
            vp.renderer.commands,
            vec![RenderCommand::DrawRegion {
                id: region.id,
                start: 1.0,
                end: 3.0,
                color: DEFAULT_REGION_COLOR,
            }]
        );
    }

    #[test]
    fn test_gesture_create_replaces_provisional_overlay() {
        let mut vp = adapter();
        let provisional = Uuid::new_v4();
        vp.on_event(RendererEvent::RegionCreated {
            id: provisional,
            start: 2.0,
            end: 4.0,
        })
        .unwrap();

        let canonical = vp.store().regions()[0].id;
        assert_ne!(canonical, provisional);
        assert_eq!(
            vp.renderer.commands,
            vec![
                RenderCommand::RemoveRegion { id: provisional },
                RenderCommand::DrawRegion {
                    id: canonical,
                    start: 2.0,
                    end: 4.0,
                    color: DEFAULT_REGION_COLOR,
                },
            ]
        );
    }

    #[test]
    fn test_gesture_update_snaps_back_on_clamp() {
        let mut vp = adapter();
        let region = vp.create_region(1.0, 3.0);
        vp.renderer.commands.clear();

        // In-bounds drag: store follows the renderer, no redraw needed
        vp.on_event(RendererEvent::RegionUpdated {
            id: region.id,
            start: 2.0,
            end: 4.0,
        })
        .unwrap();
        assert!(vp.renderer.commands.is_empty());

        // Out-of-bounds drag: the overlay is snapped to the clamped bounds
        vp.on_event(RendererEvent::RegionUpdated {
            id: region.id,
            start: 2.0,
            end: 99.0,
        })
        .unwrap();
        assert_eq!(
            vp.renderer.commands,
            vec![RenderCommand::DrawRegion {
                id: region.id,
                start: 2.0,
                end: 10.0,
                color: DEFAULT_REGION_COLOR,
            }]
        );
    }

    #[test]
    fn test_gesture_remove_last_region_redraws() {
        let mut vp = adapter();
        let region = vp.create_region(1.0, 3.0);
        vp.renderer.commands.clear();

        let result = vp.on_event(RendererEvent::RegionRemoved { id: region.id });
        assert!(matches!(result, Err(WaveclipError::LastRegionProtected)));
        assert_eq!(vp.store().len(), 1);
        // The overlay the renderer dropped is restored
        assert_eq!(
            vp.renderer.commands,
            vec![RenderCommand::DrawRegion {
                id: region.id,
                start: 1.0,
                end: 3.0,
                color: DEFAULT_REGION_COLOR,
            }]
        );
    }

    #[test]
    fn test_gesture_remove_non_last_region() {
        let mut vp = adapter();
        let a = vp.create_region(1.0, 3.0);
        let _b = vp.create_region(5.0, 7.0);
        vp.renderer.commands.clear();

        vp.on_event(RendererEvent::RegionRemoved { id: a.id }).unwrap();
        assert_eq!(vp.store().len(), 1);
        assert_eq!(
            vp.renderer.commands,
            vec![RenderCommand::RemoveRegion { id: a.id }]
        );
    }

    #[test]
    fn test_click_activates_and_seeks() {
        let mut vp = adapter();
        let region = vp.create_region(2.0, 4.0);
        vp.on_event(RendererEvent::RegionClicked { id: region.id })
            .unwrap();
        assert_eq!(vp.store().active().unwrap().id, region.id);
        assert_eq!(vp.position(), 2.0);
    }

    #[test]
    fn test_region_playback_stops_at_region_end() {
        let mut vp = adapter();
        let region = vp.create_region(2.0, 4.0);
        assert!(vp.play_region(region.id));
        assert_eq!(vp.position(), 2.0);
        assert!(vp.is_playing());

        vp.tick(1.0);
        assert_eq!(vp.position(), 3.0);
        assert!(vp.is_playing());

        // Overshooting the region end pins the cursor to the end and stops
        vp.tick(5.0);
        assert_eq!(vp.position(), 4.0);
        assert!(!vp.is_playing());
    }

    #[test]
    fn test_pause_and_resume_tick() {
        let mut vp = adapter();
        let region = vp.create_region(0.0, 8.0);
        vp.play_region(region.id);
        vp.tick(1.0);
        vp.pause();
        vp.tick(1.0);
        assert_eq!(vp.position(), 1.0);
    }

    #[test]
    fn test_play_unknown_region() {
        let mut vp = adapter();
        vp.create_region(0.0, 8.0);
        assert!(!vp.play_region(Uuid::new_v4()));
        assert!(!vp.is_playing());
    }

    #[test]
    fn test_free_seek_clamps() {
        let mut vp = adapter();
        vp.seek(99.0);
        assert_eq!(vp.position(), 10.0);
        vp.seek(-1.0);
        assert_eq!(vp.position(), 0.0);
    }

    #[test]
    fn test_set_zoom_passthrough() {
        let mut vp = adapter();
        vp.set_zoom(80.0);
        assert_eq!(
            vp.renderer.commands,
            vec![RenderCommand::SetZoom {
                px_per_second: 80.0
            }]
        );
    }
}
