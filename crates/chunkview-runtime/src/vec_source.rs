#![forbid(unsafe_code)]

//! In-memory data source with a selection store.
//!
//! `VecDataSource` keeps records in insertion order and derives a view per
//! [`QueryParams`] by applying an optional filter hook and an optional sort
//! hook. The last view is cached until the records change or a different
//! query arrives.
//!
//! Selection is stored by ID so it survives re-sorting and filtering.
//! Failure injection (`fail_next_chunks`, `fail_next_totals`) and an
//! artificial latency make it usable as a stand-in backend in tests.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chunkview_core::{
    ChunkRequest, DataSourceError, DataSourceResult, QueryParams, SelectionOp, SelectionOutcome,
    SortDirection,
};

use crate::source::DataSource;

/// One row as served to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<T> {
    /// Stable identifier.
    pub id: String,
    /// Absolute index under the query that produced this row.
    pub index: usize,
    /// The payload.
    pub data: T,
    /// Selection flag at load time.
    pub selected: bool,
}

/// Filter hook: `true` keeps the record.
pub type FilterFn<T> = dyn Fn(&T, &BTreeMap<String, String>) -> bool + Send + Sync;

/// Sort hook: compare two records on the named field.
pub type SortFn<T> = dyn Fn(&T, &T, &str) -> Ordering + Send + Sync;

#[derive(Debug)]
struct Record<T> {
    id: String,
    data: T,
}

#[derive(Debug)]
struct Store<T> {
    records: Vec<Record<T>>,
    selected: BTreeSet<String>,
}

/// Vector-backed [`DataSource`] serving [`Row`]s.
pub struct VecDataSource<T> {
    store: RwLock<Store<T>>,
    view_cache: Mutex<Option<(QueryParams, Arc<Vec<usize>>)>>,
    filter: Option<Box<FilterFn<T>>>,
    sort: Option<Box<SortFn<T>>>,
    latency: Option<Duration>,
    chunk_failures: AtomicUsize,
    total_failures: AtomicUsize,
    chunk_loads: AtomicUsize,
}

impl<T> std::fmt::Debug for VecDataSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VecDataSource")
            .field("filter", &self.filter.is_some())
            .field("sort", &self.sort.is_some())
            .field("latency", &self.latency)
            .field("chunk_loads", &self.chunk_loads.load(AtomicOrdering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn poisoned() -> DataSourceError {
    DataSourceError::Backend("lock poisoned".into())
}

impl<T> VecDataSource<T> {
    /// Records with IDs equal to their insertion position.
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self::from_records(
            items
                .into_iter()
                .enumerate()
                .map(|(position, data)| (position.to_string(), data)),
        )
    }

    /// Records with explicit IDs.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = (String, T)>) -> Self {
        Self {
            store: RwLock::new(Store {
                records: records
                    .into_iter()
                    .map(|(id, data)| Record { id, data })
                    .collect(),
                selected: BTreeSet::new(),
            }),
            view_cache: Mutex::new(None),
            filter: None,
            sort: None,
            latency: None,
            chunk_failures: AtomicUsize::new(0),
            total_failures: AtomicUsize::new(0),
            chunk_loads: AtomicUsize::new(0),
        }
    }

    /// Install a filter hook, applied when `QueryParams::filters` is non-empty.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T, &BTreeMap<String, String>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Install a sort hook, applied per entry of `QueryParams::sort_fields`.
    #[must_use]
    pub fn with_sort<F>(mut self, sort: F) -> Self
    where
        F: Fn(&T, &T, &str) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Box::new(sort));
        self
    }

    /// Sleep this long in every `load_chunk`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` chunk loads fail.
    pub fn fail_next_chunks(&self, count: usize) {
        self.chunk_failures.store(count, AtomicOrdering::SeqCst);
    }

    /// Make the next `count` total fetches fail.
    pub fn fail_next_totals(&self, count: usize) {
        self.total_failures.store(count, AtomicOrdering::SeqCst);
    }

    /// Chunk loads served so far, failures included.
    #[must_use]
    pub fn chunk_loads(&self) -> usize {
        self.chunk_loads.load(AtomicOrdering::SeqCst)
    }

    /// Append a record.
    pub fn push(&self, id: impl Into<String>, data: T) -> DataSourceResult<()> {
        let mut store = self.store.write().map_err(|_| poisoned())?;
        store.records.push(Record {
            id: id.into(),
            data,
        });
        self.invalidate();
        Ok(())
    }

    /// Remove the record with `id`. Returns whether it existed.
    pub fn remove(&self, id: &str) -> DataSourceResult<bool> {
        let mut store = self.store.write().map_err(|_| poisoned())?;
        let before = store.records.len();
        store.records.retain(|record| record.id != id);
        store.selected.remove(id);
        let removed = store.records.len() != before;
        if removed {
            self.invalidate();
        }
        Ok(removed)
    }

    /// Number of records ignoring any filter.
    pub fn len(&self) -> DataSourceResult<usize> {
        let store = self.store.read().map_err(|_| poisoned())?;
        Ok(store.records.len())
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> DataSourceResult<bool> {
        Ok(self.len()? == 0)
    }

    /// IDs currently selected, ascending.
    pub fn selected_ids(&self) -> DataSourceResult<Vec<String>> {
        let store = self.store.read().map_err(|_| poisoned())?;
        Ok(store.selected.iter().cloned().collect())
    }

    fn invalidate(&self) {
        if let Ok(mut cache) = self.view_cache.lock() {
            *cache = None;
        }
    }

    /// Record positions in `query` order.
    fn view(&self, store: &Store<T>, query: &QueryParams) -> DataSourceResult<Arc<Vec<usize>>> {
        let mut cache = self.view_cache.lock().map_err(|_| poisoned())?;
        if let Some((cached_query, view)) = cache.as_ref()
            && cached_query == query
        {
            return Ok(Arc::clone(view));
        }

        let mut positions: Vec<usize> = match (&self.filter, query.filters.is_empty()) {
            (Some(filter), false) => (0..store.records.len())
                .filter(|&position| filter(&store.records[position].data, &query.filters))
                .collect(),
            _ => (0..store.records.len()).collect(),
        };

        if let Some(sort) = &self.sort
            && !query.sort_fields.is_empty()
        {
            positions.sort_by(|&a, &b| {
                let (a, b) = (&store.records[a].data, &store.records[b].data);
                for (i, field) in query.sort_fields.iter().enumerate() {
                    let ordering = match query.sort_directions.get(i).copied().unwrap_or_default() {
                        SortDirection::Ascending => sort(a, b, field),
                        SortDirection::Descending => sort(b, a, field),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let view = Arc::new(positions);
        *cache = Some((query.clone(), Arc::clone(&view)));
        Ok(view)
    }

    fn position_of(view: &[usize], store: &Store<T>, id: &str) -> Option<usize> {
        view.iter()
            .position(|&record| store.records[record].id == id)
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl<T> DataSource<Row<T>> for VecDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "VecDataSource"
    }

    fn total(&self, query: &QueryParams) -> DataSourceResult<usize> {
        if take_failure(&self.total_failures) {
            return Err(DataSourceError::Unavailable("injected total failure".into()));
        }
        let store = self.store.read().map_err(|_| poisoned())?;
        Ok(self.view(&store, query)?.len())
    }

    fn load_chunk(&self, request: &ChunkRequest) -> DataSourceResult<Vec<Row<T>>> {
        self.chunk_loads.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if take_failure(&self.chunk_failures) {
            return Err(DataSourceError::Unavailable(format!(
                "injected failure for chunk {}",
                request.start
            )));
        }
        if request.count == 0 {
            return Err(DataSourceError::InvalidRequest("zero-length chunk".into()));
        }

        let store = self.store.read().map_err(|_| poisoned())?;
        let view = self.view(&store, &request.query)?;
        let end = request.start.saturating_add(request.count).min(view.len());
        let start = request.start.min(end);
        Ok(view[start..end]
            .iter()
            .enumerate()
            .map(|(offset, &position)| {
                let record = &store.records[position];
                Row {
                    id: record.id.clone(),
                    index: start + offset,
                    data: record.data.clone(),
                    selected: store.selected.contains(&record.id),
                }
            })
            .collect())
    }

    fn set_selected(&self, query: &QueryParams, index: usize, selected: bool) -> SelectionOutcome {
        let op = SelectionOp::SetSelected;
        let Ok(mut store) = self.store.write() else {
            return SelectionOutcome::failed(op, poisoned());
        };
        let view = match self.view(&store, query) {
            Ok(view) => view,
            Err(error) => return SelectionOutcome::failed(op, error),
        };
        let Some(&position) = view.get(index) else {
            return SelectionOutcome::failed(
                op,
                DataSourceError::InvalidRequest(format!("index {index} out of range")),
            );
        };
        let id = store.records[position].id.clone();
        if selected {
            store.selected.insert(id.clone());
        } else {
            store.selected.remove(&id);
        }
        SelectionOutcome::ok(op)
            .with_index(index)
            .with_id(id)
            .with_selected(selected)
    }

    fn set_selected_by_id(&self, id: &str, selected: bool) -> SelectionOutcome {
        let op = SelectionOp::SetSelectedById;
        let Ok(mut store) = self.store.write() else {
            return SelectionOutcome::failed(op, poisoned());
        };
        if !store.records.iter().any(|record| record.id == id) {
            return SelectionOutcome::failed(
                op,
                DataSourceError::InvalidRequest(format!("unknown id {id:?}")),
            );
        }
        if selected {
            store.selected.insert(id.to_string());
        } else {
            store.selected.remove(id);
        }
        SelectionOutcome::ok(op).with_id(id).with_selected(selected)
    }

    fn select_all(&self, query: &QueryParams) -> SelectionOutcome {
        let op = SelectionOp::SelectAll;
        let Ok(mut store) = self.store.write() else {
            return SelectionOutcome::failed(op, poisoned());
        };
        let view = match self.view(&store, query) {
            Ok(view) => view,
            Err(error) => return SelectionOutcome::failed(op, error),
        };
        let ids: Vec<String> = view
            .iter()
            .map(|&position| store.records[position].id.clone())
            .collect();
        store.selected.extend(ids);
        SelectionOutcome::ok(op).with_selected(true)
    }

    fn clear_selection(&self) -> SelectionOutcome {
        let op = SelectionOp::ClearSelection;
        let Ok(mut store) = self.store.write() else {
            return SelectionOutcome::failed(op, poisoned());
        };
        store.selected.clear();
        SelectionOutcome::ok(op).with_selected(false)
    }

    fn select_range(&self, query: &QueryParams, start_id: &str, end_id: &str) -> SelectionOutcome {
        let op = SelectionOp::SelectRange;
        let Ok(mut store) = self.store.write() else {
            return SelectionOutcome::failed(op, poisoned());
        };
        let view = match self.view(&store, query) {
            Ok(view) => view,
            Err(error) => return SelectionOutcome::failed(op, error),
        };
        let (Some(a), Some(b)) = (
            Self::position_of(&view, &store, start_id),
            Self::position_of(&view, &store, end_id),
        ) else {
            return SelectionOutcome::failed(
                op,
                DataSourceError::InvalidRequest(format!(
                    "range {start_id:?}..{end_id:?} not in current view"
                )),
            );
        };
        let (from, to) = if a <= b { (a, b) } else { (b, a) };
        let ids: Vec<String> = view[from..=to]
            .iter()
            .map(|&position| store.records[position].id.clone())
            .collect();
        store.selected.extend(ids);
        SelectionOutcome::ok(op)
            .with_index(from)
            .with_id(start_id)
            .with_selected(true)
    }
}
