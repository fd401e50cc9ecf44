#![forbid(unsafe_code)]

//! Chunkview public facade crate.
//!
//! Re-exports the engine types from `chunkview-core` and, with the default
//! `runtime` feature, the data source trait and drivers from
//! `chunkview-runtime`. Most users only need the [`prelude`].
//!
//! # Example
//!
//! ```ignore
//! use chunkview::prelude::*;
//!
//! let config = ViewportConfig::new(20, 100);
//! let source = VecDataSource::new(0..1_000_000u64);
//! let mut driver = Driver::new(config, source, DriverConfig::default())?;
//! driver.wait_idle(std::time::Duration::from_secs(1))?;
//! driver.navigate(Navigation::PageDown)?;
//! for row in driver.engine().visible_items() {
//!     println!("{} {:?}", row.index, row.item.map(|item| item.data));
//! }
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use chunkview_core::{
    BoundingArea, Chunk, ChunkCache, ChunkRequest, ChunkResponse, Corrections, DataSourceError,
    DataSourceResult, Effect, EngineEvent, EngineMsg, ItemAt, LoadPhase, LoadingGate,
    Navigation, QueryParams, SelectionCommand, SelectionOp, SelectionOutcome, SortDirection,
    ViewportConfig, ViewportEngine, ViewportState, VisibleRow, chunk_start_for,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use chunkview_runtime::{
    DataSource, Driver, DriverConfig, DriverError, EngineSimulator, Row, VecDataSource,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for chunkview apps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A data source call failed.
    Source(DataSourceError),
    /// The threaded driver stopped or timed out.
    #[cfg(feature = "runtime")]
    Driver(DriverError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Driver(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Driver(err) => Some(err),
        }
    }
}

impl From<DataSourceError> for Error {
    fn from(err: DataSourceError) -> Self {
        Self::Source(err)
    }
}

#[cfg(feature = "runtime")]
impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

/// Standard result type for chunkview APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Effect, EngineEvent, EngineMsg, Error, ItemAt, Navigation, QueryParams, Result,
        SelectionCommand, SortDirection, ViewportConfig, ViewportEngine, VisibleRow,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{DataSource, Driver, DriverConfig, EngineSimulator, Row, VecDataSource};

    pub use crate::core;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use chunkview_core as core;
#[cfg(feature = "runtime")]
pub use chunkview_runtime as runtime;
