//! Region store
//!
//! The authoritative in-memory list of marked time regions, plus the current
//! selection and the active (playback-eligible) region. All mutation rules
//! live here; the viewport adapter and the session call in, never the other
//! way around.
//!
//! Mutations are synchronous and atomic from the caller's point of view:
//! there is no internal concurrency, so two mutations can never interleave.

use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WaveclipError};

/// Span of the auto-created region on first load (clamped to the duration)
pub const AUTO_REGION_SPAN_SECS: f64 = 5.0;

/// Minimum span a degenerate create/update request is expanded to
pub const MIN_REGION_SPAN_SECS: f64 = 1.0;

/// Stable identifier for a region
pub type RegionId = Uuid;

/// A user-marked time span on the waveform
///
/// `start < end` always holds, and both are clamped into `[0, duration]`.
/// Regions are independent and may overlap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds, always > start
    pub end: f64,
}

impl Region {
    /// Span length in seconds
    pub fn span_secs(&self) -> f64 {
        self.end - self.start
    }

    /// Whether a playback position falls inside this region
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// Authoritative region list for one editing session
#[derive(Debug, Clone)]
pub struct RegionStore {
    /// Regions in creation order
    regions: Vec<Region>,
    /// Total clip duration in seconds; the clamp ceiling
    duration: f64,
    /// Most recently created or edited region
    selection: Option<RegionId>,
    /// Region currently eligible for region-scoped playback
    active: Option<RegionId>,
}

impl RegionStore {
    /// Create an empty store for a clip of the given duration
    pub fn new(duration: f64) -> Self {
        Self {
            regions: Vec::new(),
            duration,
            selection: None,
            active: None,
        }
    }

    /// Clip duration the store clamps against
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Create the initial auto-region iff the store is empty
    ///
    /// Covers the shorter of `AUTO_REGION_SPAN_SECS` and the full duration.
    pub fn ensure_initial_region(&mut self) -> Option<Region> {
        if !self.regions.is_empty() {
            return None;
        }
        let end = AUTO_REGION_SPAN_SECS.min(self.duration);
        Some(self.create_region(0.0, end))
    }

    /// Create a region, clamped into `[0, duration]`
    ///
    /// A degenerate request (`end <= start` after clamping) is expanded to
    /// the minimum default span or the remaining duration, whichever is
    /// smaller. The new region becomes the selection.
    pub fn create_region(&mut self, start: f64, end: f64) -> Region {
        let (start, end) = self.clamp_span(start, end);
        let region = Region {
            id: Uuid::new_v4(),
            start,
            end,
        };
        debug!(
            "region created: {} [{:.3}s, {:.3}s]",
            region.id, region.start, region.end
        );
        self.regions.push(region);
        self.selection = Some(region.id);
        region
    }

    /// Move/resize a region; no-op if the id is unknown
    ///
    /// The edited region becomes the selection.
    pub fn update_region(&mut self, id: RegionId, start: f64, end: f64) -> Option<Region> {
        let (start, end) = self.clamp_span(start, end);
        let region = self.regions.iter_mut().find(|r| r.id == id)?;
        region.start = start;
        region.end = end;
        let updated = *region;
        debug!("region updated: {} [{:.3}s, {:.3}s]", id, start, end);
        self.selection = Some(id);
        Some(updated)
    }

    /// Delete a region
    ///
    /// # Errors
    /// `LastRegionProtected` (no-op) if this is the only remaining region.
    /// The store itself enforces the ≥ 1 rule so an empty-export state is
    /// unreachable. If the deleted region was the selection, the selection
    /// moves to the chronologically previous region by start time, or to the
    /// only remaining region, or to none. An unknown id is a silent no-op.
    pub fn delete_region(&mut self, id: RegionId) -> Result<()> {
        let Some(index) = self.regions.iter().position(|r| r.id == id) else {
            return Ok(());
        };
        if self.regions.len() == 1 {
            debug!("delete refused: {} is the last region", id);
            return Err(WaveclipError::LastRegionProtected);
        }

        let removed = self.regions.remove(index);
        debug!("region removed: {}", removed.id);

        if self.active == Some(id) {
            self.active = None;
        }
        if self.selection == Some(id) {
            self.selection = self.fallback_selection(removed.start);
        }
        Ok(())
    }

    /// Selection fallback after deleting the selected region: previous by
    /// start time, else the sole survivor, else none
    fn fallback_selection(&self, deleted_start: f64) -> Option<RegionId> {
        let previous = self
            .regions
            .iter()
            .filter(|r| r.start <= deleted_start)
            .max_by(|a, b| a.start.total_cmp(&b.start));
        match previous {
            Some(region) => Some(region.id),
            None if self.regions.len() == 1 => Some(self.regions[0].id),
            None => None,
        }
    }

    /// Mark a region as active (playback-eligible); at most one at a time
    ///
    /// Returns false (and clears nothing) if the id is unknown.
    pub fn set_active(&mut self, id: RegionId) -> bool {
        if self.get(id).is_some() {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Clear the active region
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// The active region, if any
    pub fn active(&self) -> Option<Region> {
        self.active.and_then(|id| self.get(id))
    }

    /// The current selection (most recently created or edited region)
    pub fn selection(&self) -> Option<Region> {
        self.selection.and_then(|id| self.get(id))
    }

    /// Look up a region by id
    pub fn get(&self, id: RegionId) -> Option<Region> {
        self.regions.iter().find(|r| r.id == id).copied()
    }

    /// Regions in creation order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Regions ordered by start time (export scope ordering)
    pub fn regions_by_start(&self) -> Vec<Region> {
        let mut sorted = self.regions.clone();
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));
        sorted
    }

    /// Number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Clamp a requested span into `[0, duration]`, expanding degenerate
    /// spans to `min(MIN_REGION_SPAN_SECS, remaining duration)`
    fn clamp_span(&self, start: f64, end: f64) -> (f64, f64) {
        let start = start.clamp(0.0, self.duration);
        let end = end.clamp(0.0, self.duration);
        if end > start {
            return (start, end);
        }
        // Degenerate: expand forward, or backward when at the clip tail
        let span = MIN_REGION_SPAN_SECS.min(self.duration);
        if start + span <= self.duration {
            (start, start + span)
        } else {
            (self.duration - span, self.duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RegionStore {
        RegionStore::new(10.0)
    }

    #[test]
    fn test_create_clamps_into_duration() {
        let mut s = store();
        let region = s.create_region(-5.0, 1000.0);
        assert_eq!(region.start, 0.0);
        assert_eq!(region.end, 10.0);
    }

    #[test]
    fn test_create_becomes_selection() {
        let mut s = store();
        let a = s.create_region(0.0, 2.0);
        assert_eq!(s.selection().unwrap().id, a.id);
        let b = s.create_region(3.0, 4.0);
        assert_eq!(s.selection().unwrap().id, b.id);
    }

    #[test]
    fn test_degenerate_create_expands() {
        let mut s = store();
        let region = s.create_region(3.0, 3.0);
        assert_eq!(region.start, 3.0);
        assert_eq!(region.end, 3.0 + MIN_REGION_SPAN_SECS);

        // At the tail, the span grows backward instead of past the duration
        let tail = s.create_region(10.0, 10.0);
        assert_eq!(tail.end, 10.0);
        assert_eq!(tail.start, 10.0 - MIN_REGION_SPAN_SECS);
    }

    #[test]
    fn test_degenerate_create_on_short_clip() {
        let mut s = RegionStore::new(0.4);
        let region = s.create_region(0.2, 0.2);
        // Clip shorter than the minimum span: the whole clip is the region
        assert_eq!(region.start, 0.0);
        assert!((region.end - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut s = store();
        s.create_region(0.0, 2.0);
        assert!(s.update_region(Uuid::new_v4(), 1.0, 2.0).is_none());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_update_selects_and_clamps() {
        let mut s = store();
        let a = s.create_region(0.0, 2.0);
        let _b = s.create_region(3.0, 4.0);
        let updated = s.update_region(a.id, 1.0, 99.0).unwrap();
        assert_eq!(updated.start, 1.0);
        assert_eq!(updated.end, 10.0);
        assert_eq!(s.selection().unwrap().id, a.id);
    }

    #[test]
    fn test_last_region_protected() {
        let mut s = store();
        let only = s.create_region(0.0, 2.0);
        let result = s.delete_region(only.id);
        assert!(matches!(result, Err(WaveclipError::LastRegionProtected)));
        assert_eq!(s.len(), 1);
        assert_eq!(s.regions()[0].id, only.id);
    }

    #[test]
    fn test_delete_moves_selection_to_previous_by_start() {
        let mut s = store();
        let a = s.create_region(0.0, 1.0);
        let b = s.create_region(4.0, 5.0);
        let _c = s.create_region(2.0, 3.0);

        // b is not the selection (c was edited last); select then delete it
        s.update_region(b.id, 4.0, 5.0);
        assert_eq!(s.selection().unwrap().id, b.id);

        s.delete_region(b.id).unwrap();
        // Previous by start time before 4.0 is c at 2.0
        let selected = s.selection().unwrap();
        assert_eq!(selected.start, 2.0);

        // Unknown id delete is a silent no-op
        s.delete_region(a.id).unwrap();
        s.delete_region(a.id).unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_delete_clears_active() {
        let mut s = store();
        let a = s.create_region(0.0, 1.0);
        let _b = s.create_region(2.0, 3.0);
        assert!(s.set_active(a.id));
        s.delete_region(a.id).unwrap();
        assert!(s.active().is_none());
    }

    #[test]
    fn test_active_at_most_one() {
        let mut s = store();
        let a = s.create_region(0.0, 1.0);
        let b = s.create_region(2.0, 3.0);
        s.set_active(a.id);
        s.set_active(b.id);
        assert_eq!(s.active().unwrap().id, b.id);
        s.clear_active();
        assert!(s.active().is_none());
        assert!(!s.set_active(Uuid::new_v4()));
    }

    #[test]
    fn test_initial_region_min_of_five_and_duration() {
        let mut long = RegionStore::new(30.0);
        let region = long.ensure_initial_region().unwrap();
        assert_eq!(region.start, 0.0);
        assert_eq!(region.end, AUTO_REGION_SPAN_SECS);

        let mut short = RegionStore::new(2.5);
        let region = short.ensure_initial_region().unwrap();
        assert_eq!(region.end, 2.5);

        // Not re-created when regions already exist
        assert!(long.ensure_initial_region().is_none());
    }

    #[test]
    fn test_listing_orders() {
        let mut s = store();
        let a = s.create_region(5.0, 6.0);
        let b = s.create_region(1.0, 2.0);

        // Creation order
        let created: Vec<RegionId> = s.regions().iter().map(|r| r.id).collect();
        assert_eq!(created, vec![a.id, b.id]);

        // Time order
        let by_start: Vec<RegionId> = s.regions_by_start().iter().map(|r| r.id).collect();
        assert_eq!(by_start, vec![b.id, a.id]);
    }

    #[test]
    fn test_overlap_allowed() {
        let mut s = store();
        s.create_region(0.0, 5.0);
        s.create_region(3.0, 8.0);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_region_serde_roundtrip() {
        let region = Region {
            id: Uuid::new_v4(),
            start: 1.5,
            end: 3.25,
        };
        let json = serde_json::to_string(&region).unwrap();
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
    }
}
