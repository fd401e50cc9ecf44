#![forbid(unsafe_code)]

//! Errors reported by data sources.
//!
//! The engine itself never fails: configuration is auto-corrected and
//! out-of-range navigation is a no-op. The only errors it carries are the
//! ones a [data source](crate::request) hands back, and it forwards them as
//! [`EngineEvent::DataLoadError`](crate::event::EngineEvent::DataLoadError).

use std::fmt;

/// A failed total-count, chunk, or selection call.
///
/// `Clone` so it can travel inside events and outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// The backend cannot be reached right now.
    Unavailable(String),
    /// The request was rejected as malformed.
    InvalidRequest(String),
    /// Any other backend failure.
    Backend(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::Unavailable(msg) => write!(f, "data source unavailable: {msg}"),
            DataSourceError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            DataSourceError::Backend(msg) => write!(f, "data source error: {msg}"),
        }
    }
}

impl std::error::Error for DataSourceError {}

/// Result type for data source calls.
pub type DataSourceResult<T> = Result<T, DataSourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let err = DataSourceError::Unavailable("db offline".into());
        assert_eq!(err.to_string(), "data source unavailable: db offline");
        let err = DataSourceError::Backend("boom".into());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn is_std_error() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}
        assert_error(&DataSourceError::InvalidRequest("count=0".into()));
    }
}
