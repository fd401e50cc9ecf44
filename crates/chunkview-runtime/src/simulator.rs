#![forbid(unsafe_code)]

//! Deterministic engine simulator for testing.
//!
//! `EngineSimulator` runs a [`ViewportEngine`] against a [`DataSource`]
//! without threads. Effects are recorded and queued; the test decides when
//! and in which order each request is answered, which makes races such as
//! "result arrives after the query changed" reproducible.
//!
//! # Example
//!
//! ```ignore
//! use chunkview_runtime::{EngineSimulator, VecDataSource};
//!
//! let mut sim = EngineSimulator::new(config, VecDataSource::new(0..10_000));
//! sim.init();
//! sim.complete_all();
//! sim.navigate(Navigation::JumpTo(5_000));
//! assert!(!sim.engine().can_scroll());
//! sim.complete(4_975);
//! assert!(sim.engine().can_scroll());
//! ```

use std::collections::VecDeque;

use chunkview_core::{
    ChunkRequest, ChunkResponse, DataSourceError, Effect, EngineEvent, EngineMsg, ItemAt,
    Navigation, QueryParams, SelectionCommand, ViewportConfig, ViewportEngine,
};

use crate::source::DataSource;

/// Deterministic driver for [`ViewportEngine`] testing.
pub struct EngineSimulator<T, S> {
    engine: ViewportEngine<T>,
    source: S,
    /// Queries whose total has been requested and not yet answered.
    pending_totals: VecDeque<QueryParams>,
    /// Chunk requests in dispatch order.
    pending_chunks: VecDeque<ChunkRequest>,
    /// Every effect the engine produced, in order.
    effect_log: Vec<Effect>,
    /// Events not yet taken by the test.
    events: Vec<EngineEvent>,
}

impl<T, S: DataSource<T>> EngineSimulator<T, S> {
    /// Create a simulator. Nothing is requested until [`init`](Self::init).
    pub fn new(config: ViewportConfig, source: S) -> Self {
        Self::with_engine(ViewportEngine::new(config), source)
    }

    /// Wrap an already-configured engine.
    pub fn with_engine(engine: ViewportEngine<T>, source: S) -> Self {
        Self {
            engine,
            source,
            pending_totals: VecDeque::new(),
            pending_chunks: VecDeque::new(),
            effect_log: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Queue the startup effects.
    pub fn init(&mut self) {
        let effects = self.engine.init();
        self.absorb(effects);
    }

    /// Deliver a message straight to the engine.
    pub fn send(&mut self, msg: EngineMsg<T>) {
        let effects = self.engine.update(msg);
        self.absorb(effects);
    }

    /// Navigate.
    pub fn navigate(&mut self, nav: Navigation) {
        self.send(EngineMsg::Navigate(nav));
    }

    /// Navigate `times` times in a row.
    pub fn navigate_n(&mut self, nav: Navigation, times: usize) {
        for _ in 0..times {
            self.navigate(nav);
        }
    }

    /// Replace sort/filter parameters.
    pub fn set_query(&mut self, query: QueryParams) {
        self.send(EngineMsg::SetQuery(query));
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: ViewportConfig) {
        self.send(EngineMsg::SetConfig(config));
    }

    /// Refresh total and resident chunks.
    pub fn refresh(&mut self) {
        self.send(EngineMsg::Refresh);
    }

    /// Run a selection command synchronously and report the outcome.
    pub fn select(&mut self, command: &SelectionCommand) {
        let outcome = self.source.select(self.engine.query(), command);
        self.send(EngineMsg::SelectionChanged(outcome));
    }

    /// Answer the oldest pending total. Returns false if none was pending.
    pub fn resolve_total(&mut self) -> bool {
        let Some(query) = self.pending_totals.pop_front() else {
            return false;
        };
        let result = self.source.total(&query);
        self.send(EngineMsg::TotalLoaded { query, result });
        true
    }

    /// Answer the pending request for chunk `start` from the source.
    ///
    /// Returns false if no such request is pending.
    pub fn complete(&mut self, start: usize) -> bool {
        let Some(request) = self.take_pending(start) else {
            return false;
        };
        self.answer(request);
        true
    }

    /// Answer the oldest pending chunk request.
    pub fn complete_next(&mut self) -> bool {
        match self.pending_chunks.pop_front() {
            Some(request) => {
                self.answer(request);
                true
            }
            None => false,
        }
    }

    /// Answer totals and chunks until nothing is pending.
    ///
    /// Returns the number of answers delivered.
    pub fn complete_all(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            if self.resolve_total() || self.complete_next() {
                delivered += 1;
            } else {
                return delivered;
            }
        }
    }

    /// Fail the pending request for chunk `start` with `error`.
    pub fn fail(&mut self, start: usize, error: DataSourceError) -> bool {
        let Some(request) = self.take_pending(start) else {
            return false;
        };
        self.send(EngineMsg::ChunkFailed { request, error });
        true
    }

    /// Forget the pending request for `start` without answering it.
    pub fn drop_pending(&mut self, start: usize) -> Option<ChunkRequest> {
        self.take_pending(start)
    }

    /// Item at `index`, requesting its chunk when absent.
    pub fn item_at(&mut self, index: usize) -> Option<&T> {
        if self.engine.peek(index).is_none() {
            if let ItemAt::Requested(effects) = self.engine.item_at(index) {
                self.absorb(effects);
            }
            return None;
        }
        self.engine.peek(index)
    }

    /// The engine.
    pub fn engine(&self) -> &ViewportEngine<T> {
        &self.engine
    }

    /// The data source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Starts of pending chunk requests, in dispatch order.
    pub fn pending_chunks(&self) -> Vec<usize> {
        self.pending_chunks.iter().map(|request| request.start).collect()
    }

    /// Number of unanswered total requests.
    pub fn pending_totals(&self) -> usize {
        self.pending_totals.len()
    }

    /// Every effect produced so far.
    pub fn effect_log(&self) -> &[Effect] {
        &self.effect_log
    }

    /// Number of `LoadChunk` effects produced so far.
    pub fn loads_issued(&self) -> usize {
        self.effect_log
            .iter()
            .filter(|effect| matches!(effect, Effect::LoadChunk(_)))
            .count()
    }

    /// Events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Clear the effect log and pending events.
    pub fn clear_log(&mut self) {
        self.effect_log.clear();
        self.events.clear();
    }

    fn take_pending(&mut self, start: usize) -> Option<ChunkRequest> {
        let position = self
            .pending_chunks
            .iter()
            .position(|request| request.start == start)?;
        self.pending_chunks.remove(position)
    }

    fn answer(&mut self, request: ChunkRequest) {
        let msg = match self.source.load_chunk(&request) {
            Ok(items) => EngineMsg::ChunkLoaded(ChunkResponse::new(request, items)),
            Err(error) => EngineMsg::ChunkFailed { request, error },
        };
        self.send(msg);
    }

    fn absorb(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match &effect {
                Effect::FetchTotal(query) => self.pending_totals.push_back(query.clone()),
                Effect::LoadChunk(request) => self.pending_chunks.push_back(request.clone()),
                Effect::Emit(event) => self.events.push(event.clone()),
            }
            self.effect_log.push(effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec_source::{Row, VecDataSource};
    use chunkview_core::LoadPhase;

    fn sim(total: u32) -> EngineSimulator<Row<u32>, VecDataSource<u32>> {
        let config = ViewportConfig::new(10, 25).with_thresholds(3, 7);
        EngineSimulator::new(config, VecDataSource::new(0..total))
    }

    #[test]
    fn init_then_complete_all_fills_viewport() {
        let mut sim = sim(10_000);
        sim.init();
        assert_eq!(sim.pending_totals(), 1);
        assert!(sim.complete_all() >= 3);
        assert_eq!(sim.engine().total_items(), 10_000);
        assert_eq!(sim.engine().phase(), LoadPhase::Idle);
        let rows = sim.engine().visible_items();
        assert_eq!(rows[9].item.map(|row| row.data), Some(9));
    }

    #[test]
    fn completion_order_is_chosen_by_test() {
        let mut sim = sim(10_000);
        sim.init();
        sim.resolve_total();
        assert_eq!(sim.pending_chunks(), vec![0, 25]);
        assert!(sim.complete(25));
        assert!(!sim.engine().can_scroll());
        assert!(sim.complete(0));
        assert!(sim.engine().can_scroll());
        assert!(!sim.complete(0));
    }

    #[test]
    fn item_at_requests_missing_chunk() {
        let mut sim = sim(10_000);
        sim.init();
        sim.complete_all();
        assert!(sim.item_at(5_000).is_none());
        assert_eq!(sim.pending_chunks(), vec![5_000]);
        sim.complete_next();
        assert_eq!(sim.item_at(5_000).map(|row| row.index), Some(5_000));
    }

    #[test]
    fn events_are_collected() {
        let mut sim = sim(100);
        sim.init();
        sim.complete_all();
        let events = sim.take_events();
        let started = events
            .iter()
            .filter(|event| matches!(event, EngineEvent::ChunkLoadStarted { .. }))
            .count();
        let completed = events
            .iter()
            .filter(|event| matches!(event, EngineEvent::ChunkLoadCompleted { .. }))
            .count();
        assert_eq!(started, completed);
        assert_eq!(started, sim.loads_issued());
        assert!(sim.take_events().is_empty());
    }
}
