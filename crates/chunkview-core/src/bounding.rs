#![forbid(unsafe_code)]

//! The index range that should stay resident.
//!
//! This is the only place that decides how much buffer surrounds the
//! visible window. Wider `bounding_area_before`/`after` means fewer
//! just-in-time loads at the cost of fetching rows nobody looks at.

use std::ops::RangeInclusive;

use crate::config::ViewportConfig;
use crate::viewport::ViewportState;

/// Inclusive absolute range kept resident around the viewport.
///
/// Derived on every navigation or resize; never stored across events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingArea {
    /// First index to keep.
    pub start_index: usize,
    /// Last index to keep.
    pub end_index: usize,
}

impl BoundingArea {
    /// Compute the area for `state`.
    ///
    /// Returns `None` for an empty dataset.
    #[must_use]
    pub fn calculate(
        state: &ViewportState,
        config: &ViewportConfig,
        total_items: usize,
    ) -> Option<Self> {
        if total_items == 0 {
            return None;
        }
        let start_index = state
            .viewport_start_index
            .saturating_sub(config.bounding_area_before);
        let end_index = (state.viewport_start_index + config.height - 1)
            .saturating_add(config.bounding_area_after)
            .min(total_items - 1);
        Some(Self {
            start_index: start_index.min(end_index),
            end_index,
        })
    }

    /// Whether `[start, end]` shares at least one index with the area.
    #[must_use]
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        start <= self.end_index && end >= self.start_index
    }

    /// Whether `index` lies inside the area.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }

    /// Number of indices covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// Always false; an area covers at least one index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The area as a standard range.
    #[must_use]
    pub fn range(&self) -> RangeInclusive<usize> {
        self.start_index..=self.end_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::{clamp_to_total, jump_to};

    fn config() -> ViewportConfig {
        ViewportConfig::new(10, 25).with_bounding_area(15, 30)
    }

    #[test]
    fn empty_dataset_has_no_area() {
        let state = ViewportState::default();
        assert_eq!(BoundingArea::calculate(&state, &config(), 0), None);
    }

    #[test]
    fn area_at_top_clips_before_buffer() {
        let state = clamp_to_total(&ViewportState::default(), &config(), 1_000);
        let area = BoundingArea::calculate(&state, &config(), 1_000).unwrap();
        assert_eq!(area.start_index, 0);
        assert_eq!(area.end_index, 39);
    }

    #[test]
    fn area_in_middle_extends_both_ways() {
        let state = jump_to(&ViewportState::default(), &config(), 1_000, 500);
        assert_eq!(state.viewport_start_index, 495);
        let area = BoundingArea::calculate(&state, &config(), 1_000).unwrap();
        assert_eq!(area.range(), 480..=534);
        assert_eq!(area.len(), 55);
    }

    #[test]
    fn area_at_end_clips_after_buffer() {
        let state = jump_to(&ViewportState::default(), &config(), 100, 99);
        let area = BoundingArea::calculate(&state, &config(), 100).unwrap();
        assert_eq!(area.end_index, 99);
        assert_eq!(area.start_index, 75);
    }

    #[test]
    fn area_smaller_than_viewport_dataset() {
        let state = clamp_to_total(&ViewportState::default(), &config(), 3);
        let area = BoundingArea::calculate(&state, &config(), 3).unwrap();
        assert_eq!(area.range(), 0..=2);
    }

    #[test]
    fn intersects_is_inclusive_on_both_edges() {
        let area = BoundingArea {
            start_index: 10,
            end_index: 20,
        };
        assert!(area.intersects(0, 10));
        assert!(area.intersects(20, 30));
        assert!(area.intersects(12, 15));
        assert!(!area.intersects(0, 9));
        assert!(!area.intersects(21, 40));
        assert!(area.contains(20));
        assert!(!area.contains(21));
    }
}
