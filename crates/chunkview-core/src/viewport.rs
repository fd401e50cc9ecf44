#![forbid(unsafe_code)]

//! Cursor and viewport arithmetic.
//!
//! Every operation here is a pure function of
//! `(ViewportState, ViewportConfig, total_items) -> ViewportState`.
//! Nothing allocates and nothing does I/O.
//!
//! # Invariants
//!
//! For every state returned while `total_items > 0`:
//!
//! 1. `cursor_index < total_items`
//! 2. `cursor_viewport_index < height`
//! 3. `viewport_start_index + cursor_viewport_index == cursor_index`
//! 4. `viewport_start_index <= total_items.saturating_sub(height)`
//!
//! With `total_items == 0` every navigation returns the input unchanged.
//!
//! # Thresholds
//!
//! Moving down while the cursor sits on or below `bottom_threshold` scrolls
//! the window by one row and leaves the cursor on the same viewport row, as
//! long as rows exist below the window. Once the last window is showing, the
//! cursor walks down to the final row. Upward movement mirrors this with
//! `top_threshold`.

use crate::config::ViewportConfig;

/// Position of the cursor and the visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ViewportState {
    /// Absolute index of the first visible row.
    pub viewport_start_index: usize,
    /// Absolute index under the cursor.
    pub cursor_index: usize,
    /// `cursor_index - viewport_start_index`.
    pub cursor_viewport_index: usize,
    /// Cursor is at/above the top threshold and rows exist above the window.
    pub is_at_top_threshold: bool,
    /// Cursor is at/below the bottom threshold and rows exist below the window.
    pub is_at_bottom_threshold: bool,
    /// Cursor is on index 0.
    pub at_dataset_start: bool,
    /// Cursor is on the last index.
    pub at_dataset_end: bool,
}

/// A navigation intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Navigation {
    /// One row up.
    CursorUp,
    /// One row down.
    CursorDown,
    /// One viewport up.
    PageUp,
    /// One viewport down.
    PageDown,
    /// First item.
    JumpToStart,
    /// Last item.
    JumpToEnd,
    /// Absolute index; ignored when out of range.
    JumpTo(usize),
}

impl Navigation {
    /// Compute the state this intent leads to.
    #[must_use]
    pub fn apply(
        self,
        state: &ViewportState,
        config: &ViewportConfig,
        total_items: usize,
    ) -> ViewportState {
        match self {
            Navigation::CursorUp => cursor_up(state, config, total_items),
            Navigation::CursorDown => cursor_down(state, config, total_items),
            Navigation::PageUp => page_up(state, config, total_items),
            Navigation::PageDown => page_down(state, config, total_items),
            Navigation::JumpToStart => jump_to_start(state, config, total_items),
            Navigation::JumpToEnd => jump_to_end(state, config, total_items),
            Navigation::JumpTo(index) => jump_to(state, config, total_items, index),
        }
    }

    /// Whether this is relative movement that the loading gate may block.
    #[must_use]
    pub fn is_scroll(self) -> bool {
        matches!(
            self,
            Navigation::CursorUp | Navigation::CursorDown | Navigation::PageUp | Navigation::PageDown
        )
    }
}

impl ViewportState {
    /// State before any total is known.
    ///
    /// The cursor sits on `initial_index`; the window is placed the way
    /// [`jump_to`] would place it without an upper bound.
    #[must_use]
    pub fn initial(config: &ViewportConfig) -> Self {
        let cursor = config.initial_index;
        let start = cursor.saturating_sub(config.height / 2);
        Self {
            viewport_start_index: start,
            cursor_index: cursor,
            cursor_viewport_index: cursor - start,
            ..Self::default()
        }
    }

    /// Absolute index one past the last visible row, clipped to the dataset.
    #[must_use]
    pub fn viewport_end(&self, config: &ViewportConfig, total_items: usize) -> usize {
        (self.viewport_start_index + config.height).min(total_items)
    }

    /// Whether `index` is inside the visible window.
    #[must_use]
    pub fn is_visible(&self, index: usize, config: &ViewportConfig, total_items: usize) -> bool {
        index >= self.viewport_start_index && index < self.viewport_end(config, total_items)
    }
}

/// Largest valid `viewport_start_index` for a dataset of `total_items`.
#[inline]
fn max_start(config: &ViewportConfig, total_items: usize) -> usize {
    total_items.saturating_sub(config.height)
}

/// Build a state from a start and cursor and recompute the flags.
fn place(
    start: usize,
    cursor: usize,
    config: &ViewportConfig,
    total_items: usize,
) -> ViewportState {
    update_bounds(
        &ViewportState {
            viewport_start_index: start,
            cursor_index: cursor,
            cursor_viewport_index: cursor - start,
            ..ViewportState::default()
        },
        config,
        total_items,
    )
}

/// Recompute threshold and boundary flags without moving anything.
#[must_use]
pub fn update_bounds(
    state: &ViewportState,
    config: &ViewportConfig,
    total_items: usize,
) -> ViewportState {
    let mut next = *state;
    if total_items == 0 {
        next.is_at_top_threshold = false;
        next.is_at_bottom_threshold = false;
        next.at_dataset_start = true;
        next.at_dataset_end = true;
        return next;
    }
    next.is_at_top_threshold =
        state.cursor_viewport_index <= config.top_threshold && state.viewport_start_index > 0;
    next.is_at_bottom_threshold = state.cursor_viewport_index >= config.bottom_threshold
        && state.viewport_start_index + config.height < total_items;
    next.at_dataset_start = state.cursor_index == 0;
    next.at_dataset_end = state.cursor_index + 1 >= total_items;
    next
}

/// Bring an arbitrary state back inside the invariants for `total_items`.
///
/// Used after the total changes or the height is replaced.
#[must_use]
pub fn clamp_to_total(
    state: &ViewportState,
    config: &ViewportConfig,
    total_items: usize,
) -> ViewportState {
    if total_items == 0 {
        return update_bounds(&ViewportState::default(), config, 0);
    }
    let cursor = state.cursor_index.min(total_items - 1);
    let mut start = state.viewport_start_index.min(max_start(config, total_items));
    if cursor < start {
        start = cursor;
    } else if cursor >= start + config.height {
        start = cursor + 1 - config.height;
    }
    place(start, cursor, config, total_items)
}

/// Move the cursor one row up.
#[must_use]
pub fn cursor_up(state: &ViewportState, config: &ViewportConfig, total_items: usize) -> ViewportState {
    if total_items == 0 || state.cursor_index == 0 {
        return *state;
    }
    let cursor = state.cursor_index - 1;
    let start = if state.cursor_viewport_index > config.top_threshold {
        state.viewport_start_index
    } else if state.viewport_start_index > 0 {
        state.viewport_start_index - 1
    } else {
        // At the first window the cursor walks up to row 0.
        0
    };
    place(start, cursor, config, total_items)
}

/// Move the cursor one row down.
#[must_use]
pub fn cursor_down(
    state: &ViewportState,
    config: &ViewportConfig,
    total_items: usize,
) -> ViewportState {
    if total_items == 0 || state.cursor_index + 1 >= total_items {
        return *state;
    }
    let cursor = state.cursor_index + 1;
    let rows_below = state.viewport_start_index + config.height < total_items;
    let start = if state.cursor_viewport_index >= config.bottom_threshold && rows_below {
        state.viewport_start_index + 1
    } else {
        state.viewport_start_index
    };
    place(start, cursor, config, total_items)
}

/// Move cursor and window up by one viewport.
#[must_use]
pub fn page_up(state: &ViewportState, config: &ViewportConfig, total_items: usize) -> ViewportState {
    if total_items == 0 || state.cursor_index == 0 {
        return *state;
    }
    let start = state.viewport_start_index.saturating_sub(config.height);
    let cursor = state.cursor_index.saturating_sub(config.height).max(start);
    place(start, cursor, config, total_items)
}

/// Move cursor and window down by one viewport.
#[must_use]
pub fn page_down(
    state: &ViewportState,
    config: &ViewportConfig,
    total_items: usize,
) -> ViewportState {
    if total_items == 0 || state.cursor_index + 1 >= total_items {
        return *state;
    }
    let start = (state.viewport_start_index + config.height).min(max_start(config, total_items));
    let cursor = (state.cursor_index + config.height).min(total_items - 1);
    place(start, cursor, config, total_items)
}

/// Put the cursor on index 0 with the window at the top.
#[must_use]
pub fn jump_to_start(
    state: &ViewportState,
    config: &ViewportConfig,
    total_items: usize,
) -> ViewportState {
    if total_items == 0 {
        return *state;
    }
    place(0, 0, config, total_items)
}

/// Put the cursor on the last index with the last row at the bottom.
#[must_use]
pub fn jump_to_end(
    state: &ViewportState,
    config: &ViewportConfig,
    total_items: usize,
) -> ViewportState {
    if total_items == 0 {
        return *state;
    }
    place(max_start(config, total_items), total_items - 1, config, total_items)
}

/// Put the cursor on `index`.
///
/// Out-of-range indices leave the state untouched. A target already in the
/// window only moves the cursor; anything else is centred, clamped to the
/// first and last valid windows.
#[must_use]
pub fn jump_to(
    state: &ViewportState,
    config: &ViewportConfig,
    total_items: usize,
    index: usize,
) -> ViewportState {
    if index >= total_items {
        return *state;
    }
    if state.is_visible(index, config, total_items)
        && state.viewport_start_index <= max_start(config, total_items)
    {
        return place(state.viewport_start_index, index, config, total_items);
    }
    let start = index
        .saturating_sub(config.height / 2)
        .min(max_start(config, total_items));
    place(start, index, config, total_items)
}
