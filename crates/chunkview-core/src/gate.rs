#![forbid(unsafe_code)]

//! In-flight chunk tracking and the scroll gate.
//!
//! The loading set is the correlation table for outstanding requests: each
//! start index maps to the one request currently out for it. An entry is
//! only removed when the answer (or error) for that exact request comes
//! back, so a start index is never requested twice at the same time, even
//! across query or chunk-size changes.
//!
//! `can_scroll` is false only while a *critical* chunk is pending, that is a
//! loading request whose range intersects the current viewport. Background
//! prefetch of buffer chunks never blocks interaction.

use std::collections::BTreeMap;

use crate::request::ChunkRequest;

/// Loading set plus derived scroll flags.
#[derive(Debug, Clone)]
pub struct LoadingGate {
    loading: BTreeMap<usize, ChunkRequest>,
    can_scroll: bool,
    critical: usize,
}

impl Default for LoadingGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingGate {
    /// Create an open gate with nothing loading.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loading: BTreeMap::new(),
            can_scroll: true,
            critical: 0,
        }
    }

    /// Record `request` as outstanding.
    ///
    /// Returns false, and records nothing, if its start already has a
    /// request out.
    pub fn begin(&mut self, request: ChunkRequest) -> bool {
        if self.loading.contains_key(&request.start) {
            return false;
        }
        self.loading.insert(request.start, request);
        true
    }

    /// Clear the entry for `request` if it is the one outstanding.
    ///
    /// Returns false when the start has no entry or a different request
    /// owns it.
    pub fn finish(&mut self, request: &ChunkRequest) -> bool {
        if self.loading.get(&request.start) != Some(request) {
            return false;
        }
        self.loading.remove(&request.start);
        true
    }

    /// Whether `start` has a request out.
    #[must_use]
    pub fn is_loading(&self, start: usize) -> bool {
        self.loading.contains_key(&start)
    }

    /// The request outstanding for `start`.
    #[must_use]
    pub fn request(&self, start: usize) -> Option<&ChunkRequest> {
        self.loading.get(&start)
    }

    /// Loading starts, ascending.
    pub fn starts(&self) -> impl Iterator<Item = usize> + '_ {
        self.loading.keys().copied()
    }

    /// Outstanding requests, ascending by start.
    pub fn requests(&self) -> impl Iterator<Item = &ChunkRequest> + '_ {
        self.loading.values()
    }

    /// True iff the loading set is non-empty.
    #[must_use]
    pub fn has_loading_chunks(&self) -> bool {
        !self.loading.is_empty()
    }

    /// False while a critical chunk is pending.
    #[must_use]
    pub fn can_scroll(&self) -> bool {
        self.can_scroll
    }

    /// Number of loading requests that intersect the viewport.
    #[must_use]
    pub fn critical_count(&self) -> usize {
        self.critical
    }

    /// Recompute `can_scroll` for the visible rows `[viewport_start, viewport_end)`.
    ///
    /// Each request covers its own `count`, so requests issued under an
    /// older chunk size are measured correctly. Call after every load start
    /// and completion.
    pub fn recompute(&mut self, viewport_start: usize, viewport_end: usize) {
        self.critical = if viewport_end <= viewport_start {
            0
        } else {
            let last_visible = viewport_end - 1;
            self.loading
                .values()
                .filter(|request| request.start <= last_visible && request.end_index() >= viewport_start)
                .count()
        };
        self.can_scroll = self.critical == 0;
    }
}
