#![forbid(unsafe_code)]

//! Request and response messages exchanged with a data source.
//!
//! Every chunk fetch is one [`ChunkRequest`] / [`ChunkResponse`] pair keyed by
//! the chunk's start index. The engine keeps no futures or callbacks: the
//! loading set is the correlation table, and the [`QueryParams`] carried in
//! each request is how late results from an older sort/filter are recognized.

use std::collections::BTreeMap;

use crate::error::DataSourceError;

/// Direction for one sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Sort and filter parameters passed through to the data source.
///
/// Opaque to the engine; only compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryParams {
    /// Fields to sort by, most significant first.
    pub sort_fields: Vec<String>,
    /// One direction per entry in `sort_fields`.
    pub sort_directions: Vec<SortDirection>,
    /// Field name to filter value.
    pub filters: BTreeMap<String, String>,
}

impl QueryParams {
    /// Parameters with no sort and no filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sort key.
    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_fields.push(field.into());
        self.sort_directions.push(direction);
        self
    }

    /// Add or replace a filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }
}

/// One contiguous fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkRequest {
    /// First absolute index, aligned to the chunk size.
    pub start: usize,
    /// Number of items asked for (the chunk size at dispatch time).
    pub count: usize,
    /// Sort/filter in force when the request was made.
    pub query: QueryParams,
}

impl ChunkRequest {
    /// Last index the request could cover, inclusive.
    #[must_use]
    pub fn end_index(&self) -> usize {
        self.start + self.count.max(1) - 1
    }
}

/// A successful chunk fetch.
///
/// `items` may be shorter than `request.count` at the end of the dataset;
/// sources never pad.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResponse<T> {
    /// Echo of `request.start`.
    pub start_index: usize,
    /// Resolved records in index order.
    pub items: Vec<T>,
    /// The request this answers.
    pub request: ChunkRequest,
}

impl<T> ChunkResponse<T> {
    /// Build a response for `request`.
    #[must_use]
    pub fn new(request: ChunkRequest, items: Vec<T>) -> Self {
        Self {
            start_index: request.start,
            items,
            request,
        }
    }
}

/// Selection operations a data source understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionOp {
    /// Toggle by absolute index.
    SetSelected,
    /// Toggle by item ID.
    SetSelectedById,
    /// Select everything matching the current query.
    SelectAll,
    /// Deselect everything.
    ClearSelection,
    /// Select an ID range, inclusive.
    SelectRange,
}

/// A selection request routed to the data source by whoever owns the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommand {
    /// Set the flag on the item at `index`.
    SetSelected { index: usize, selected: bool },
    /// Set the flag on the item with `id`.
    SetSelectedById { id: String, selected: bool },
    /// Select everything.
    SelectAll,
    /// Deselect everything.
    ClearSelection,
    /// Select every item from `start_id` to `end_id`.
    SelectRange { start_id: String, end_id: String },
}

impl SelectionCommand {
    /// The operation tag reported back in the outcome.
    #[must_use]
    pub fn op(&self) -> SelectionOp {
        match self {
            SelectionCommand::SetSelected { .. } => SelectionOp::SetSelected,
            SelectionCommand::SetSelectedById { .. } => SelectionOp::SetSelectedById,
            SelectionCommand::SelectAll => SelectionOp::SelectAll,
            SelectionCommand::ClearSelection => SelectionOp::ClearSelection,
            SelectionCommand::SelectRange { .. } => SelectionOp::SelectRange,
        }
    }
}

/// Result of a selection call.
///
/// The engine does not interpret selection semantics; a successful outcome
/// only makes it refresh resident chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
    /// Whether the source applied the change.
    pub success: bool,
    /// Affected index, when the operation had one.
    pub index: Option<usize>,
    /// Affected ID, when the operation had one.
    pub id: Option<String>,
    /// New flag value, when the operation had one.
    pub selected: Option<bool>,
    /// Which operation this answers.
    pub operation: SelectionOp,
    /// Failure reason when `success` is false.
    pub error: Option<DataSourceError>,
}

impl SelectionOutcome {
    /// Successful outcome with no per-item detail.
    #[must_use]
    pub fn ok(operation: SelectionOp) -> Self {
        Self {
            success: true,
            index: None,
            id: None,
            selected: None,
            operation,
            error: None,
        }
    }

    /// Failed outcome.
    #[must_use]
    pub fn failed(operation: SelectionOp, error: DataSourceError) -> Self {
        Self {
            success: false,
            index: None,
            id: None,
            selected: None,
            operation,
            error: Some(error),
        }
    }

    /// Attach the affected index.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Attach the affected ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach the new flag value.
    #[must_use]
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = Some(selected);
        self
    }
}
