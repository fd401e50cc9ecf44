#![forbid(unsafe_code)]

//! The data source boundary.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Driver / EngineSimulator                   │
//! │   - turns engine effects into DataSource calls                │
//! │   - feeds results back as EngineMsg                           │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       DataSource<T>                           │
//! │   - VecDataSource: in-memory (testing, demos)                 │
//! │   - your backend: database, RPC, file index                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Calls are blocking. The threaded [`Driver`](crate::Driver) runs them on
//! worker threads, so implementations must be `Send + Sync`.
//!
//! # Failure Modes
//!
//! | Failure | Engine behavior |
//! |---------|-----------------|
//! | `total` errors | `DataLoadError` event, state untouched |
//! | `load_chunk` errors | `DataLoadError` event, chunk retried on a later pass |
//! | Selection fails | `DataLoadError` event, no refresh |
//! | Fewer items than requested | Stored as-is; missing rows render as absent |

use std::sync::Arc;

use chunkview_core::{
    ChunkRequest, DataSourceError, DataSourceResult, QueryParams, SelectionCommand, SelectionOp,
    SelectionOutcome,
};

/// Backend that knows the dataset.
///
/// Only `total` and `load_chunk` are required. Selection operations default
/// to a failed outcome for read-only sources.
pub trait DataSource<T>: Send + Sync + 'static {
    /// Human-readable name for logging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Number of items matching `query`.
    fn total(&self, query: &QueryParams) -> DataSourceResult<usize>;

    /// Up to `request.count` items starting at `request.start` under
    /// `request.query`. Returning fewer is allowed at the end of the data.
    fn load_chunk(&self, request: &ChunkRequest) -> DataSourceResult<Vec<T>>;

    /// Set the selection flag of the item at `index` under `query`.
    fn set_selected(&self, query: &QueryParams, index: usize, selected: bool) -> SelectionOutcome {
        let _ = (query, index, selected);
        unsupported(SelectionOp::SetSelected)
    }

    /// Set the selection flag of the item with `id`.
    fn set_selected_by_id(&self, id: &str, selected: bool) -> SelectionOutcome {
        let _ = (id, selected);
        unsupported(SelectionOp::SetSelectedById)
    }

    /// Select every item matching `query`.
    fn select_all(&self, query: &QueryParams) -> SelectionOutcome {
        let _ = query;
        unsupported(SelectionOp::SelectAll)
    }

    /// Deselect everything.
    fn clear_selection(&self) -> SelectionOutcome {
        unsupported(SelectionOp::ClearSelection)
    }

    /// Select the inclusive run between two IDs in `query` order.
    fn select_range(&self, query: &QueryParams, start_id: &str, end_id: &str) -> SelectionOutcome {
        let _ = (query, start_id, end_id);
        unsupported(SelectionOp::SelectRange)
    }

    /// Route a [`SelectionCommand`] to the matching operation.
    fn select(&self, query: &QueryParams, command: &SelectionCommand) -> SelectionOutcome {
        match command {
            SelectionCommand::SetSelected { index, selected } => {
                self.set_selected(query, *index, *selected)
            }
            SelectionCommand::SetSelectedById { id, selected } => {
                self.set_selected_by_id(id, *selected)
            }
            SelectionCommand::SelectAll => self.select_all(query),
            SelectionCommand::ClearSelection => self.clear_selection(),
            SelectionCommand::SelectRange { start_id, end_id } => {
                self.select_range(query, start_id, end_id)
            }
        }
    }
}

fn unsupported(operation: SelectionOp) -> SelectionOutcome {
    SelectionOutcome::failed(
        operation,
        DataSourceError::InvalidRequest("selection not supported by this source".into()),
    )
}

impl<T, S> DataSource<T> for Arc<S>
where
    S: DataSource<T> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn total(&self, query: &QueryParams) -> DataSourceResult<usize> {
        (**self).total(query)
    }

    fn load_chunk(&self, request: &ChunkRequest) -> DataSourceResult<Vec<T>> {
        (**self).load_chunk(request)
    }

    fn set_selected(&self, query: &QueryParams, index: usize, selected: bool) -> SelectionOutcome {
        (**self).set_selected(query, index, selected)
    }

    fn set_selected_by_id(&self, id: &str, selected: bool) -> SelectionOutcome {
        (**self).set_selected_by_id(id, selected)
    }

    fn select_all(&self, query: &QueryParams) -> SelectionOutcome {
        (**self).select_all(query)
    }

    fn clear_selection(&self) -> SelectionOutcome {
        (**self).clear_selection()
    }

    fn select_range(&self, query: &QueryParams, start_id: &str, end_id: &str) -> SelectionOutcome {
        (**self).select_range(query, start_id, end_id)
    }
}
