#![forbid(unsafe_code)]

//! Chunkview Core
//!
//! A headless engine for scrolling through datasets far larger than memory.
//! Only a window of rows is visible; only the chunks around that window are
//! resident. Everything else is fetched on demand and evicted by distance.
//!
//! # Key Components
//!
//! - [`ViewportEngine`] - Orchestrator owning state, cache, and loading gate
//! - [`ViewportConfig`] - Geometry, thresholds, and buffer sizes
//! - [`ViewportState`] / [`Navigation`] - Pure cursor and window arithmetic
//! - [`BoundingArea`] - The range that must stay resident
//! - [`ChunkCache`] - Resident chunks keyed by aligned start index
//! - [`LoadingGate`] - In-flight requests and the `can_scroll` flag
//! - [`Effect`] / [`EngineEvent`] - Work for the owner and events for observers
//!
//! # How it fits
//! The engine performs no I/O. Each handler returns a list of [`Effect`]s;
//! the owner runs `FetchTotal`/`LoadChunk` against a data source and feeds
//! the answers back through [`ViewportEngine::update`]. `chunkview-runtime`
//! provides a threaded driver and a deterministic simulator that do exactly
//! that.

pub mod bounding;
pub mod chunk;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod gate;
pub mod request;
pub mod viewport;

pub use bounding::BoundingArea;
pub use chunk::{Chunk, ChunkCache, chunk_start_for};
pub use config::{Corrections, ViewportConfig};
pub use engine::{EngineMsg, ItemAt, LoadPhase, ViewportEngine, VisibleRow};
pub use error::{DataSourceError, DataSourceResult};
pub use event::{Effect, EngineEvent};
pub use gate::LoadingGate;
pub use request::{
    ChunkRequest, ChunkResponse, QueryParams, SelectionCommand, SelectionOp, SelectionOutcome,
    SortDirection,
};
pub use viewport::{Navigation, ViewportState};
