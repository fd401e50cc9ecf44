#![forbid(unsafe_code)]

//! Effects the engine asks its owner to perform, and the observability
//! events it reports.
//!
//! The engine never performs I/O. Every method that changes state returns a
//! `Vec<Effect>`; the owner executes `FetchTotal`/`LoadChunk` against its data
//! source and feeds the results back as
//! [`EngineMsg`](crate::engine::EngineMsg)s. `Emit` carries events meant for
//! outside observers; none of them are needed for correctness.

use crate::error::DataSourceError;
use crate::request::{ChunkRequest, QueryParams};

/// Observable engine activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A chunk request was dispatched.
    ChunkLoadStarted {
        chunk_start: usize,
        request: ChunkRequest,
    },
    /// A chunk arrived and is now resident.
    ChunkLoadCompleted {
        chunk_start: usize,
        item_count: usize,
        request: ChunkRequest,
    },
    /// A resident chunk was dropped.
    ChunkUnloaded { chunk_start: usize },
    /// A data source call failed. `chunk_start` is set for chunk loads.
    DataLoadError {
        chunk_start: Option<usize>,
        error: DataSourceError,
    },
}

impl EngineEvent {
    /// Short stable name, for logs and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::ChunkLoadStarted { .. } => "chunk_load_started",
            EngineEvent::ChunkLoadCompleted { .. } => "chunk_load_completed",
            EngineEvent::ChunkUnloaded { .. } => "chunk_unloaded",
            EngineEvent::DataLoadError { .. } => "data_load_error",
        }
    }
}

/// Work the owner must carry out on the engine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the data source for the total under `QueryParams`.
    FetchTotal(QueryParams),
    /// Ask the data source for one chunk.
    LoadChunk(ChunkRequest),
    /// Hand an event to observers.
    Emit(EngineEvent),
}

impl Effect {
    /// The chunk request, if this is a load.
    #[must_use]
    pub fn as_load(&self) -> Option<&ChunkRequest> {
        match self {
            Effect::LoadChunk(request) => Some(request),
            _ => None,
        }
    }

    /// The event, if this is an emit.
    #[must_use]
    pub fn as_event(&self) -> Option<&EngineEvent> {
        match self {
            Effect::Emit(event) => Some(event),
            _ => None,
        }
    }
}

/// Chunk starts of every `LoadChunk` in `effects`, in order.
#[must_use]
pub fn load_starts(effects: &[Effect]) -> Vec<usize> {
    effects
        .iter()
        .filter_map(Effect::as_load)
        .map(|request| request.start)
        .collect()
}

/// Chunk starts of every `ChunkUnloaded` in `effects`, in order.
#[must_use]
pub fn unloaded_starts(effects: &[Effect]) -> Vec<usize> {
    effects
        .iter()
        .filter_map(|effect| match effect.as_event() {
            Some(EngineEvent::ChunkUnloaded { chunk_start }) => Some(*chunk_start),
            _ => None,
        })
        .collect()
}
