#![forbid(unsafe_code)]

//! Chunkview Runtime
//!
//! Everything around [`chunkview_core::ViewportEngine`] that touches the
//! outside world.
//!
//! # Key Components
//!
//! - [`DataSource`] - Blocking backend trait: totals, chunks, selection
//! - [`Driver`] - Worker-pool event loop applying completions serially
//! - [`EngineSimulator`] - Deterministic, test-ordered completions
//! - [`VecDataSource`] - In-memory source with filter/sort hooks and a selection store
//!
//! # Feature Gates
//!
//! - `tracing-json`: [`logging::init_json_logging`] installs a JSON
//!   `tracing-subscriber` formatter filtered by `RUST_LOG`.

pub mod driver;
#[cfg(feature = "tracing-json")]
pub mod logging;
pub mod simulator;
pub mod source;
pub mod vec_source;

pub use driver::{Driver, DriverConfig, DriverError, DriverResult};
pub use simulator::EngineSimulator;
pub use source::DataSource;
pub use vec_source::{Row, VecDataSource};
