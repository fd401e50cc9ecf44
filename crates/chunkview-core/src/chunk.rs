#![forbid(unsafe_code)]

//! Chunk cache and the load/evict diff.
//!
//! A chunk is a chunk-size-aligned run of items fetched and evicted as one
//! unit. [`ChunkCache`] maps chunk start indices to resident chunks; the free
//! functions compute which chunks a [`BoundingArea`] needs, which of those
//! are missing, and which resident chunks have left it.
//!
//! # Eviction policy
//!
//! Distance only, not recency. A chunk is evicted when its range no longer
//! intersects the bounding area; partial overlap keeps it. Two far-apart
//! jump targets will therefore evict and reload each other every time.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::bounding::BoundingArea;
use crate::request::ChunkRequest;

/// Start of the chunk that owns `index`.
#[inline]
#[must_use]
pub fn chunk_start_for(index: usize, chunk_size: usize) -> usize {
    let chunk_size = chunk_size.max(1);
    index / chunk_size * chunk_size
}

/// A resident run of items.
#[derive(Debug, Clone)]
pub struct Chunk<T> {
    start_index: usize,
    items: Vec<T>,
    loaded_at: Instant,
    originating_request: ChunkRequest,
}

impl<T> Chunk<T> {
    /// Wrap freshly loaded items.
    #[must_use]
    pub fn new(request: ChunkRequest, items: Vec<T>) -> Self {
        Self {
            start_index: request.start,
            items,
            loaded_at: Instant::now(),
            originating_request: request,
        }
    }

    /// First absolute index.
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Last absolute index held, inclusive.
    ///
    /// An empty chunk reports its start.
    #[must_use]
    pub fn end_index(&self) -> usize {
        self.start_index + self.items.len().saturating_sub(1)
    }

    /// Items in index order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of items held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the source returned nothing for this chunk.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// When the load completed. Diagnostics only.
    #[must_use]
    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    /// The request that produced this chunk.
    #[must_use]
    pub fn originating_request(&self) -> &ChunkRequest {
        &self.originating_request
    }

    /// Item at absolute `index`, if this chunk holds it.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        index
            .checked_sub(self.start_index)
            .and_then(|local| self.items.get(local))
    }
}

/// Resident chunks keyed by start index.
#[derive(Debug, Clone)]
pub struct ChunkCache<T> {
    chunks: BTreeMap<usize, Chunk<T>>,
}

impl<T> Default for ChunkCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChunkCache<T> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: BTreeMap::new(),
        }
    }

    /// Store a chunk, replacing any chunk at the same start.
    pub fn insert(&mut self, chunk: Chunk<T>) -> Option<Chunk<T>> {
        self.chunks.insert(chunk.start_index, chunk)
    }

    /// Drop the chunk at `start`.
    pub fn remove(&mut self, start: usize) -> Option<Chunk<T>> {
        self.chunks.remove(&start)
    }

    /// Drop everything, returning the starts that were resident.
    pub fn clear(&mut self) -> Vec<usize> {
        let starts = self.starts().collect();
        self.chunks.clear();
        starts
    }

    /// Whether a chunk starts at `start`.
    #[must_use]
    pub fn contains(&self, start: usize) -> bool {
        self.chunks.contains_key(&start)
    }

    /// Chunk starting at `start`.
    #[must_use]
    pub fn get(&self, start: usize) -> Option<&Chunk<T>> {
        self.chunks.get(&start)
    }

    /// Item at absolute `index` given the current chunk size.
    #[must_use]
    pub fn item(&self, index: usize, chunk_size: usize) -> Option<&T> {
        self.chunks
            .get(&chunk_start_for(index, chunk_size))
            .and_then(|chunk| chunk.get(index))
    }

    /// Whether the item at `index` is resident.
    #[must_use]
    pub fn has_item(&self, index: usize, chunk_size: usize) -> bool {
        self.item(index, chunk_size).is_some()
    }

    /// Resident starts in ascending order.
    pub fn starts(&self) -> impl Iterator<Item = usize> + '_ {
        self.chunks.keys().copied()
    }

    /// Resident chunks in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk<T>> {
        self.chunks.values()
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether nothing is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total items held across all chunks.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.chunks.values().map(Chunk::len).sum()
    }
}

/// Chunk starts covering `area`, clipped to `[0, total_items)`.
#[must_use]
pub fn chunks_needed(area: &BoundingArea, chunk_size: usize, total_items: usize) -> Vec<usize> {
    if total_items == 0 {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    let end = area.end_index.min(total_items - 1);
    let first = chunk_start_for(area.start_index, chunk_size);
    (first..=end).step_by(chunk_size).collect()
}

/// The part of `needed` that is neither resident nor already loading.
///
/// A start index is in at most one outstanding request at a time.
#[must_use]
pub fn missing<T>(
    needed: &[usize],
    resident: &ChunkCache<T>,
    is_loading: impl Fn(usize) -> bool,
) -> Vec<usize> {
    needed
        .iter()
        .copied()
        .filter(|&start| !resident.contains(start) && !is_loading(start))
        .collect()
}

/// Resident starts whose range does not touch `area` at all.
#[must_use]
pub fn to_evict<T>(resident: &ChunkCache<T>, area: Option<&BoundingArea>) -> Vec<usize> {
    match area {
        None => resident.starts().collect(),
        Some(area) => resident
            .iter()
            .filter(|chunk| !area.intersects(chunk.start_index(), chunk.end_index()))
            .map(Chunk::start_index)
            .collect(),
    }
}
