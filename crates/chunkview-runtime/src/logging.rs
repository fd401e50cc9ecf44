#![forbid(unsafe_code)]

//! JSON log output for production deployments.
//!
//! Only compiled with the `tracing-json` feature. The filter comes from
//! `RUST_LOG` and falls back to `info`, which keeps the engine's per-chunk
//! debug lines out of production logs.

use std::fmt;

use tracing_subscriber::EnvFilter;

/// Fallback directive when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Errors from logger installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// A global tracing subscriber is already installed.
    SubscriberAlreadySet,
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberAlreadySet => write!(f, "a global tracing subscriber is already set"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Filter from `RUST_LOG`, or [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global JSON formatter with span context on every line.
pub fn init_json_logging() -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(true)
        .with_span_list(false)
        .try_init()
        .map_err(|_| LoggingError::SubscriberAlreadySet)
}
