#![forbid(unsafe_code)]

//! The orchestrator: one owned engine per viewport.
//!
//! [`ViewportEngine`] owns the viewport state, the chunk cache, and the
//! loading gate. Nothing else can reach them, so the single-writer
//! discipline of the surrounding event loop holds structurally. Every entry
//! point is a step `(state, message) -> (state, effects)`:
//!
//! ```text
//!   Navigation ──► viewport arithmetic ──► bounding area ──► chunk diff
//!                                                             │
//!                         ┌───────────────────────────────────┤
//!                         ▼                                   ▼
//!                 LoadChunk effects                  evictions (ChunkUnloaded)
//!                         │
//!     data source ◄───────┘        ChunkLoaded / ChunkFailed ──► cache + gate
//! ```
//!
//! # Loading phases
//!
//! | Phase | Meaning |
//! |-------|---------|
//! | `Idle` | Loading set empty |
//! | `Loading { critical: false }` | Only buffer chunks pending; scrolling allowed |
//! | `Loading { critical: true }` | A chunk intersecting the viewport is pending |
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Chunk load error | Removed from loading set, `DataLoadError` emitted, retried on a later pass |
//! | Total fetch error | `DataLoadError` emitted, state untouched |
//! | Stale result (query or chunk size changed) | Dropped; its loading entry is released and the chunk re-requested under the current query |
//! | Result for an evicted chunk | Accepted; evicted on the next pass if still out of range |

use tracing::{debug, debug_span, trace, warn};

use crate::bounding::BoundingArea;
use crate::chunk::{Chunk, ChunkCache, chunk_start_for, chunks_needed, missing, to_evict};
use crate::config::ViewportConfig;
use crate::error::{DataSourceError, DataSourceResult};
use crate::event::{Effect, EngineEvent};
use crate::gate::LoadingGate;
use crate::request::{ChunkRequest, ChunkResponse, QueryParams, SelectionOutcome};
use crate::viewport::{Navigation, ViewportState, clamp_to_total};

/// Messages the engine reacts to.
#[derive(Debug, Clone)]
pub enum EngineMsg<T> {
    /// A navigation intent.
    Navigate(Navigation),
    /// Answer to a `FetchTotal` effect.
    TotalLoaded {
        query: QueryParams,
        result: DataSourceResult<usize>,
    },
    /// Answer to a `LoadChunk` effect.
    ChunkLoaded(ChunkResponse<T>),
    /// A `LoadChunk` effect failed.
    ChunkFailed {
        request: ChunkRequest,
        error: DataSourceError,
    },
    /// A selection call finished.
    SelectionChanged(SelectionOutcome),
    /// Replace the configuration.
    SetConfig(ViewportConfig),
    /// Replace sort/filter parameters.
    SetQuery(QueryParams),
    /// Re-fetch the total and reload resident chunks.
    Refresh,
}

/// Coarse loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadPhase {
    /// Nothing in flight.
    Idle,
    /// Requests in flight; `critical` when one covers a visible row.
    Loading { critical: bool },
}

/// Result of [`ViewportEngine::item_at`].
#[derive(Debug)]
pub enum ItemAt<'a, T> {
    /// The item is resident.
    Resident(&'a T),
    /// The owning chunk was not resident; an immediate load was dispatched.
    /// The caller must execute these effects.
    Requested(Vec<Effect>),
    /// The owning chunk is already loading.
    Pending,
    /// The owning chunk is resident but the source returned fewer items.
    Missing,
    /// `index >= total_items`.
    OutOfRange,
}

/// One row of the visible window.
#[derive(Debug, PartialEq)]
pub struct VisibleRow<'a, T> {
    /// Absolute index.
    pub index: usize,
    /// The item, or `None` while its chunk is not resident.
    pub item: Option<&'a T>,
    /// Whether the cursor is on this row.
    pub is_cursor: bool,
}

/// Chunked viewport engine, generic over the row type.
///
/// The engine never inspects items; it only counts them.
#[derive(Debug, Clone)]
pub struct ViewportEngine<T> {
    config: ViewportConfig,
    state: ViewportState,
    total_items: usize,
    total_known: bool,
    query: QueryParams,
    chunks: ChunkCache<T>,
    gate: LoadingGate,
}

impl<T> ViewportEngine<T> {
    /// Create an engine. The configuration is sanitized first.
    #[must_use]
    pub fn new(config: ViewportConfig) -> Self {
        let config = sanitize_logged(config);
        Self {
            state: ViewportState::initial(&config),
            config,
            total_items: 0,
            total_known: false,
            query: QueryParams::default(),
            chunks: ChunkCache::new(),
            gate: LoadingGate::new(),
        }
    }

    /// Start with non-default sort/filter parameters.
    #[must_use]
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Effects to run once at startup.
    #[must_use]
    pub fn init(&self) -> Vec<Effect> {
        vec![Effect::FetchTotal(self.query.clone())]
    }

    /// Dispatch a message to the matching handler.
    pub fn update(&mut self, msg: EngineMsg<T>) -> Vec<Effect> {
        match msg {
            EngineMsg::Navigate(nav) => self.navigate(nav),
            EngineMsg::TotalLoaded { query, result } => self.on_total_loaded(query, result),
            EngineMsg::ChunkLoaded(response) => self.on_chunk_loaded(response),
            EngineMsg::ChunkFailed { request, error } => self.on_chunk_failed(request, error),
            EngineMsg::SelectionChanged(outcome) => self.on_selection_changed(outcome),
            EngineMsg::SetConfig(config) => self.set_config(config),
            EngineMsg::SetQuery(query) => self.set_query(query),
            EngineMsg::Refresh => self.refresh(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Current viewport state.
    #[must_use]
    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    /// Current (sanitized) configuration.
    #[must_use]
    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    /// Items in the dataset as last reported.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.total_items
    }

    /// Whether any total has been received yet.
    #[must_use]
    pub fn total_known(&self) -> bool {
        self.total_known
    }

    /// Current sort/filter parameters.
    #[must_use]
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// False while a chunk intersecting the viewport is pending.
    #[must_use]
    pub fn can_scroll(&self) -> bool {
        self.gate.can_scroll()
    }

    /// True while any chunk is pending.
    #[must_use]
    pub fn has_loading_chunks(&self) -> bool {
        self.gate.has_loading_chunks()
    }

    /// Coarse loading state.
    #[must_use]
    pub fn phase(&self) -> LoadPhase {
        if self.gate.has_loading_chunks() {
            LoadPhase::Loading {
                critical: !self.gate.can_scroll(),
            }
        } else {
            LoadPhase::Idle
        }
    }

    /// The range that should currently be resident.
    #[must_use]
    pub fn bounding_area(&self) -> Option<BoundingArea> {
        BoundingArea::calculate(&self.state, &self.config, self.total_items)
    }

    /// Resident chunk starts, ascending.
    #[must_use]
    pub fn resident_chunks(&self) -> Vec<usize> {
        self.chunks.starts().collect()
    }

    /// Loading chunk starts, ascending.
    #[must_use]
    pub fn loading_chunks(&self) -> Vec<usize> {
        self.gate.starts().collect()
    }

    /// The request outstanding for `start`, which may belong to an older
    /// query or chunk size.
    #[must_use]
    pub fn loading_request(&self, start: usize) -> Option<&ChunkRequest> {
        self.gate.request(start)
    }

    /// Read-only view of the cache.
    #[must_use]
    pub fn chunks(&self) -> &ChunkCache<T> {
        &self.chunks
    }

    /// Resident chunk starting at `start`.
    #[must_use]
    pub fn chunk(&self, start: usize) -> Option<&Chunk<T>> {
        self.chunks.get(start)
    }

    /// Resident item at `index`, without triggering a load.
    #[must_use]
    pub fn peek(&self, index: usize) -> Option<&T> {
        if index >= self.total_items {
            return None;
        }
        self.chunks.item(index, self.config.chunk_size)
    }

    /// Rows of the visible window, in order.
    #[must_use]
    pub fn visible_items(&self) -> Vec<VisibleRow<'_, T>> {
        let (start, end) = self.visible_range();
        (start..end)
            .map(|index| VisibleRow {
                index,
                item: self.chunks.item(index, self.config.chunk_size),
                is_cursor: index == self.state.cursor_index,
            })
            .collect()
    }

    /// Item at `index`, dispatching an immediate load if its chunk is absent.
    ///
    /// This is the fallback for rendering passes that run ahead of the
    /// regular prefetch, e.g. right after a far jump.
    pub fn item_at(&mut self, index: usize) -> ItemAt<'_, T> {
        if index >= self.total_items {
            return ItemAt::OutOfRange;
        }
        let start = chunk_start_for(index, self.config.chunk_size);
        if !self.chunks.contains(start) {
            if self.gate.is_loading(start) {
                return ItemAt::Pending;
            }
            debug!(index, chunk_start = start, "immediate load for unresident item");
            let mut effects = Vec::new();
            self.dispatch_load(start, &mut effects);
            self.refresh_gate();
            return ItemAt::Requested(effects);
        }
        match self.chunks.item(index, self.config.chunk_size) {
            Some(item) => ItemAt::Resident(item),
            None => ItemAt::Missing,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────

    /// Apply a navigation intent and manage chunks for the new position.
    ///
    /// Relative moves are rejected while a critical chunk is pending if they
    /// would land the cursor on, or expose, a row that is not resident.
    pub fn navigate(&mut self, nav: Navigation) -> Vec<Effect> {
        if self.total_items == 0 {
            return Vec::new();
        }
        let proposed = nav.apply(&self.state, &self.config, self.total_items);
        if proposed == self.state {
            return Vec::new();
        }
        if nav.is_scroll() && !self.gate.can_scroll() && self.crosses_loaded_boundary(&proposed) {
            trace!(
                ?nav,
                cursor = self.state.cursor_index,
                critical = self.gate.critical_count(),
                "navigation blocked by pending chunk"
            );
            return Vec::new();
        }
        self.state = proposed;
        self.manage_chunks()
    }

    fn crosses_loaded_boundary(&self, proposed: &ViewportState) -> bool {
        let chunk_size = self.config.chunk_size;
        if !self.chunks.has_item(proposed.cursor_index, chunk_size) {
            return true;
        }
        let end = proposed.viewport_end(&self.config, self.total_items);
        (proposed.viewport_start_index..end)
            .filter(|&index| !self.state.is_visible(index, &self.config, self.total_items))
            .any(|index| !self.chunks.has_item(index, chunk_size))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Data source results
    // ─────────────────────────────────────────────────────────────────────

    /// Handle the answer to a `FetchTotal`.
    pub fn on_total_loaded(
        &mut self,
        query: QueryParams,
        result: DataSourceResult<usize>,
    ) -> Vec<Effect> {
        if query != self.query {
            debug!("discarding total for superseded query");
            return Vec::new();
        }
        match result {
            Ok(total) => self.set_total_items(total),
            Err(error) => {
                warn!(%error, "total count fetch failed");
                vec![Effect::Emit(EngineEvent::DataLoadError {
                    chunk_start: None,
                    error,
                })]
            }
        }
    }

    /// Adopt a new authoritative total.
    ///
    /// The cursor is clamped into range and tail chunks that no longer reach
    /// the end are dropped so they reload in full. Requests already out past
    /// the new end stay in the loading set until they are answered.
    pub fn set_total_items(&mut self, total: usize) -> Vec<Effect> {
        let previous = self.total_items;
        self.total_items = total;
        self.total_known = true;
        self.state = clamp_to_total(&self.state, &self.config, total);
        if previous != total {
            debug!(previous, total, "total items updated");
        }

        let chunk_size = self.config.chunk_size;
        let short_tails: Vec<usize> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.len() < chunk_size && chunk.start_index() + chunk.len() < total)
            .map(Chunk::start_index)
            .collect();
        let mut effects = Vec::new();
        for start in short_tails {
            self.unload(start, &mut effects);
        }
        effects.extend(self.manage_chunks());
        effects
    }

    /// Store a completed chunk.
    ///
    /// Replaces any chunk at the same start. Results whose query or chunk
    /// size no longer match are dropped; if they still held the loading
    /// entry for their start, a pass runs so the chunk is requested again.
    pub fn on_chunk_loaded(&mut self, response: ChunkResponse<T>) -> Vec<Effect> {
        let ChunkResponse {
            start_index,
            items,
            request,
        } = response;
        if start_index != request.start {
            debug!(chunk_start = request.start, start_index, "discarding misaddressed chunk");
            return Vec::new();
        }
        let owned = self.gate.finish(&request);
        if self.is_stale(&request) {
            debug!(chunk_start = request.start, owned, "discarding stale chunk");
            return self.after_stale(owned);
        }
        let chunk_start = request.start;
        let item_count = items.len();
        self.chunks.insert(Chunk::new(request.clone(), items));
        self.refresh_gate();
        debug!(chunk_start, item_count, "chunk resident");
        vec![Effect::Emit(EngineEvent::ChunkLoadCompleted {
            chunk_start,
            item_count,
            request,
        })]
    }

    /// Record a failed chunk load so a later pass can retry it.
    pub fn on_chunk_failed(&mut self, request: ChunkRequest, error: DataSourceError) -> Vec<Effect> {
        let owned = self.gate.finish(&request);
        if self.is_stale(&request) {
            debug!(chunk_start = request.start, owned, %error, "ignoring failure of stale request");
            return self.after_stale(owned);
        }
        self.refresh_gate();
        warn!(chunk_start = request.start, %error, "chunk load failed");
        vec![Effect::Emit(EngineEvent::DataLoadError {
            chunk_start: Some(request.start),
            error,
        })]
    }

    /// React to a selection change by reloading resident chunks.
    pub fn on_selection_changed(&mut self, outcome: SelectionOutcome) -> Vec<Effect> {
        if outcome.success {
            debug!(operation = ?outcome.operation, "selection changed; refreshing chunks");
            return self.reload_resident();
        }
        let error = outcome.error.unwrap_or_else(|| {
            DataSourceError::Backend(format!("{:?} failed", outcome.operation))
        });
        warn!(operation = ?outcome.operation, %error, "selection failed");
        vec![Effect::Emit(EngineEvent::DataLoadError {
            chunk_start: None,
            error,
        })]
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reconfiguration
    // ─────────────────────────────────────────────────────────────────────

    /// Replace the configuration.
    ///
    /// Height and threshold changes re-fit the viewport; a chunk-size change
    /// drops every chunk. Requests in flight stay tracked until answered and
    /// their results are then discarded as stale. A chunk-management pass
    /// follows in every case.
    pub fn set_config(&mut self, config: ViewportConfig) -> Vec<Effect> {
        let config = sanitize_logged(config);
        if config == self.config {
            return Vec::new();
        }
        let previous = std::mem::replace(&mut self.config, config);
        let mut effects = Vec::new();
        if previous.chunk_size != config.chunk_size {
            debug!(
                from = previous.chunk_size,
                to = config.chunk_size,
                "chunk size changed; dropping cache"
            );
            self.unload_all(&mut effects);
        }
        self.state = if self.total_known {
            clamp_to_total(&self.state, &self.config, self.total_items)
        } else {
            ViewportState::initial(&self.config)
        };
        effects.extend(self.manage_chunks());
        effects
    }

    /// Replace sort/filter parameters.
    ///
    /// Resident chunks belong to the old query and are dropped, then a fresh
    /// total is requested. Requests in flight keep their loading entries:
    /// if the query later returns to theirs, their answers are used as-is.
    pub fn set_query(&mut self, query: QueryParams) -> Vec<Effect> {
        if query == self.query {
            return Vec::new();
        }
        debug!(?query, "query changed");
        self.query = query;
        let mut effects = Vec::new();
        self.unload_all(&mut effects);
        effects.push(Effect::FetchTotal(self.query.clone()));
        effects
    }

    /// Re-fetch the total and reload every resident chunk in place.
    pub fn refresh(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::FetchTotal(self.query.clone())];
        effects.extend(self.reload_resident());
        effects
    }

    // ─────────────────────────────────────────────────────────────────────
    // Chunk management
    // ─────────────────────────────────────────────────────────────────────

    /// Load what the bounding area needs and evict what it no longer covers.
    fn manage_chunks(&mut self) -> Vec<Effect> {
        let _span = debug_span!(
            "chunk_management",
            viewport_start = self.state.viewport_start_index,
            cursor = self.state.cursor_index,
            total = self.total_items
        )
        .entered();

        let chunk_size = self.config.chunk_size;
        let area = self.bounding_area();
        let mut effects = Vec::new();

        if let Some(area) = area.as_ref() {
            let needed = chunks_needed(area, chunk_size, self.total_items);
            let mut to_load = missing(&needed, &self.chunks, |start| self.gate.is_loading(start));
            let (visible_start, visible_end) = self.visible_range();
            // Critical chunks first; sort is stable so index order holds within each group.
            to_load.sort_by_key(|&start| !(start < visible_end && start + chunk_size > visible_start));
            for start in to_load {
                self.dispatch_load(start, &mut effects);
            }
        }

        for start in to_evict(&self.chunks, area.as_ref()) {
            self.unload(start, &mut effects);
        }

        self.refresh_gate();
        effects
    }

    fn reload_resident(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        let starts: Vec<usize> = self.chunks.starts().collect();
        for start in starts {
            self.dispatch_load(start, &mut effects);
        }
        self.refresh_gate();
        effects
    }

    fn dispatch_load(&mut self, start: usize, effects: &mut Vec<Effect>) {
        let request = ChunkRequest {
            start,
            count: self.config.chunk_size,
            query: self.query.clone(),
        };
        if !self.gate.begin(request.clone()) {
            return;
        }
        debug!(chunk_start = start, count = request.count, "dispatching chunk load");
        effects.push(Effect::LoadChunk(request.clone()));
        effects.push(Effect::Emit(EngineEvent::ChunkLoadStarted {
            chunk_start: start,
            request,
        }));
    }

    fn unload(&mut self, start: usize, effects: &mut Vec<Effect>) {
        if self.chunks.remove(start).is_some() {
            debug!(chunk_start = start, "chunk evicted");
            effects.push(Effect::Emit(EngineEvent::ChunkUnloaded { chunk_start: start }));
        }
    }

    fn unload_all(&mut self, effects: &mut Vec<Effect>) {
        for start in self.chunks.clear() {
            effects.push(Effect::Emit(EngineEvent::ChunkUnloaded { chunk_start: start }));
        }
    }

    fn refresh_gate(&mut self) {
        let (start, end) = self.visible_range();
        self.gate.recompute(start, end);
    }

    /// A stale answer that released its start's loading entry leaves a hole
    /// the current query still needs filled.
    fn after_stale(&mut self, released: bool) -> Vec<Effect> {
        if released {
            self.manage_chunks()
        } else {
            Vec::new()
        }
    }

    fn visible_range(&self) -> (usize, usize) {
        if self.total_items == 0 {
            return (0, 0);
        }
        let start = self.state.viewport_start_index;
        (start, self.state.viewport_end(&self.config, self.total_items))
    }

    fn is_stale(&self, request: &ChunkRequest) -> bool {
        let chunk_size = self.config.chunk_size;
        request.query != self.query
            || request.count != chunk_size
            || request.start % chunk_size != 0
    }
}

fn sanitize_logged(mut config: ViewportConfig) -> ViewportConfig {
    let fixed = config.sanitize();
    if !fixed.is_empty() {
        warn!(corrections = ?fixed, ?config, "viewport config auto-corrected");
    }
    config
}
