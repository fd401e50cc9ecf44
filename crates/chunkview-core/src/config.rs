#![forbid(unsafe_code)]

//! Viewport configuration with auto-correction.
//!
//! A [`ViewportConfig`] is never rejected. Out-of-range values are pulled to
//! the nearest valid value by [`ViewportConfig::sanitize`], which reports
//! what it touched as [`Corrections`] so callers can log it.
//!
//! # Invariants (after sanitizing)
//!
//! 1. `height >= 1` and `chunk_size >= 1`.
//! 2. `top_threshold < height` and `bottom_threshold < height`.
//! 3. `top_threshold < bottom_threshold` whenever `height >= 2`.
//!    With `height == 1` the only representable pair is `(0, 0)`.

use bitflags::bitflags;

bitflags! {
    /// Fields that [`ViewportConfig::sanitize`] had to adjust.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Corrections: u8 {
        /// Height was zero.
        const HEIGHT = 0b0000_0001;
        /// Chunk size was zero.
        const CHUNK_SIZE = 0b0000_0010;
        /// Top threshold was out of range or collided with the bottom one.
        const TOP_THRESHOLD = 0b0000_0100;
        /// Bottom threshold was out of range or not above the top one.
        const BOTTOM_THRESHOLD = 0b0000_1000;
    }
}

/// Static parameters of one viewport.
///
/// Replaceable wholesale at runtime through
/// [`ViewportEngine::set_config`](crate::engine::ViewportEngine::set_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewportConfig {
    /// Number of visible rows.
    pub height: usize,
    /// Items per fetch unit.
    pub chunk_size: usize,
    /// Viewport-relative row at which upward movement scrolls the window.
    pub top_threshold: usize,
    /// Viewport-relative row at which downward movement scrolls the window.
    pub bottom_threshold: usize,
    /// Cursor position before the first total arrives.
    pub initial_index: usize,
    /// Extra items kept resident above the viewport.
    pub bounding_area_before: usize,
    /// Extra items kept resident below the viewport.
    pub bounding_area_after: usize,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            height: 10,
            chunk_size: 20,
            top_threshold: 2,
            bottom_threshold: 7,
            initial_index: 0,
            bounding_area_before: 20,
            bounding_area_after: 20,
        }
    }
}

impl ViewportConfig {
    /// Create a config with the given height and chunk size.
    ///
    /// Thresholds default to two rows in from each edge; the bounding area
    /// defaults to one chunk on either side.
    #[must_use]
    pub fn new(height: usize, chunk_size: usize) -> Self {
        let mut config = Self {
            height,
            chunk_size,
            top_threshold: 2,
            bottom_threshold: height.saturating_sub(3),
            initial_index: 0,
            bounding_area_before: chunk_size,
            bounding_area_after: chunk_size,
        };
        config.sanitize();
        config
    }

    /// Set both thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, top: usize, bottom: usize) -> Self {
        self.top_threshold = top;
        self.bottom_threshold = bottom;
        self
    }

    /// Set the starting cursor index.
    #[must_use]
    pub fn with_initial_index(mut self, index: usize) -> Self {
        self.initial_index = index;
        self
    }

    /// Set the resident buffer around the viewport.
    #[must_use]
    pub fn with_bounding_area(mut self, before: usize, after: usize) -> Self {
        self.bounding_area_before = before;
        self.bounding_area_after = after;
        self
    }

    /// Set the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the viewport height.
    #[must_use]
    pub fn with_height(mut self, height: usize) -> Self {
        self.height = height;
        self
    }

    /// Return a sanitized copy.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }

    /// Pull every field to its nearest valid value in place.
    pub fn sanitize(&mut self) -> Corrections {
        let mut fixed = Corrections::empty();

        if self.height == 0 {
            self.height = 1;
            fixed |= Corrections::HEIGHT;
        }
        if self.chunk_size == 0 {
            self.chunk_size = 1;
            fixed |= Corrections::CHUNK_SIZE;
        }

        let last_row = self.height - 1;
        if self.top_threshold > last_row {
            self.top_threshold = last_row;
            fixed |= Corrections::TOP_THRESHOLD;
        }
        if self.bottom_threshold > last_row {
            self.bottom_threshold = last_row;
            fixed |= Corrections::BOTTOM_THRESHOLD;
        }

        if self.height == 1 {
            // (0, 0) is forced by the range clamp above.
            return fixed;
        }

        if self.bottom_threshold <= self.top_threshold {
            if self.top_threshold < last_row {
                self.bottom_threshold = self.top_threshold + 1;
                fixed |= Corrections::BOTTOM_THRESHOLD;
            } else {
                self.top_threshold = last_row - 1;
                self.bottom_threshold = last_row;
                fixed |= Corrections::TOP_THRESHOLD | Corrections::BOTTOM_THRESHOLD;
            }
        }

        fixed
    }

    /// Check the invariants without modifying anything.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let mut copy = *self;
        copy.sanitize().is_empty()
    }
}
