//! Per-vertex shape cache stored in attached vertex data
//!
//! Each cached entry is one attached key, `prefix + id + separator + shape`,
//! holding the number (or total weight) of the vertex's edges whose exact
//! shape the entry covers. Every edge is counted under exactly one entry.
//!
//! Outside batch mode each change loads the vertex's entries, applies the
//! delta, compacts if a new entry was created, and writes back what changed.
//! In batch mode loaded vertices stay in memory until [`ShapeCache::end_batch`]
//! flushes them all; the stored result is the same as applying each change
//! on its own. Within a unit-of-work the buffer keeps the prior state of each
//! vertex it touches, so a failed unit-of-work leaves the buffer as it found
//! it, just as the host undoes its attached writes.

mod vertex;

pub use vertex::CachingVertex;

use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use crate::compact::Compactor;
use crate::config::RelcountConfig;
use crate::count::{describe_edge, edge_weight};
use crate::error::{RelcountError, Result};
use crate::graph::{AttachedStore, EdgeRecord, GraphStore, VertexId};
use crate::shape::Shape;
use crate::strategy::Strategies;

/// How shapes map to attached keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
    separator: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
        }
    }

    pub fn from_config(config: &RelcountConfig) -> Self {
        Self::new(config.key_prefix(), config.separator.clone())
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Prefix shared by every entry key, and by nothing else
    pub fn entry_prefix(&self) -> String {
        format!("{}{}", self.prefix, self.separator)
    }

    pub fn encode(&self, shape: &Shape) -> String {
        shape.to_key(&self.prefix, &self.separator)
    }

    pub fn decode(&self, key: &str) -> Result<Shape> {
        Shape::from_key(key, &self.prefix, &self.separator)
    }
}

#[derive(Debug)]
enum BatchState {
    Idle,
    Batching(HashMap<VertexId, CachingVertex>),
}

/// Buffered state of each vertex before the running unit-of-work first
/// touched it; `None` when it was not buffered
type UnitJournal = HashMap<VertexId, Option<CachingVertex>>;

fn remember(unit: &mut Option<UnitJournal>, buffered: &HashMap<VertexId, CachingVertex>, vertex: VertexId) {
    if let Some(journal) = unit {
        journal.entry(vertex).or_insert_with(|| buffered.get(&vertex).cloned());
    }
}

/// Cached shape counts of every vertex, for one module instance
#[derive(Debug)]
pub struct ShapeCache {
    layout: KeyLayout,
    marker_key: String,
    compactor: Compactor,
    batch: BatchState,
    unit: Option<UnitJournal>,
}

impl ShapeCache {
    pub fn new(config: &RelcountConfig) -> Result<Self> {
        Self::with_compactor(config, Compactor::new(config.compaction_threshold))
    }

    pub fn with_compactor(config: &RelcountConfig, compactor: Compactor) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            layout: KeyLayout::from_config(config),
            marker_key: config.marker_key(),
            compactor,
            batch: BatchState::Idle,
            unit: None,
        })
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    pub fn compactor(&self) -> &Compactor {
        &self.compactor
    }

    pub fn is_batching(&self) -> bool {
        matches!(self.batch, BatchState::Batching(_))
    }

    /// Start holding changed vertices in memory
    pub fn start_batch(&mut self) -> Result<()> {
        if self.is_batching() {
            return Err(RelcountError::BatchState("batch already started".into()));
        }
        self.batch = BatchState::Batching(HashMap::new());
        tracing::debug!("Started batch");
        Ok(())
    }

    /// Write every vertex held since [`start_batch`](Self::start_batch).
    ///
    /// Returns the number of vertices written.
    pub fn end_batch<S: AttachedStore + ?Sized>(&mut self, store: &mut S) -> Result<usize> {
        let buffered = match std::mem::replace(&mut self.batch, BatchState::Idle) {
            BatchState::Batching(buffered) => buffered,
            BatchState::Idle => return Err(RelcountError::BatchState("no batch in progress".into())),
        };

        let mut written = 0;
        for (_, mut cached) in buffered {
            if cached.is_dirty() {
                cached.flush(store, &self.layout)?;
                written += 1;
            }
        }

        tracing::info!("Batch finished, {} vertices written", written);
        Ok(written)
    }

    /// Start recording buffered vertices before they change
    pub fn begin_unit(&mut self) {
        self.unit = Some(UnitJournal::new());
    }

    /// Keep the buffered changes of the unit-of-work
    pub fn commit_unit(&mut self) {
        self.unit = None;
    }

    /// Put every buffered vertex back as it was at [`begin_unit`](Self::begin_unit)
    pub fn abort_unit(&mut self) {
        let Some(journal) = self.unit.take() else {
            return;
        };
        if let BatchState::Batching(buffered) = &mut self.batch {
            let restored = journal.len();
            for (vertex, previous) in journal {
                match previous {
                    Some(cached) => {
                        buffered.insert(vertex, cached);
                    }
                    None => {
                        buffered.remove(&vertex);
                    }
                }
            }
            tracing::debug!("Restored {} buffered vertices after failed unit-of-work", restored);
        }
    }

    /// Drop whatever a batch holds for a deleted vertex
    pub fn forget_vertex(&mut self, vertex: VertexId) {
        if let BatchState::Batching(buffered) = &mut self.batch {
            remember(&mut self.unit, buffered, vertex);
            buffered.remove(&vertex);
        }
    }

    /// Run `f` on the vertex's entries; write them back unless batching
    fn with_vertex<S, F, T>(&mut self, store: &mut S, vertex: VertexId, f: F) -> Result<T>
    where
        S: AttachedStore + ?Sized,
        F: FnOnce(&mut CachingVertex, &Compactor) -> Result<T>,
    {
        match &mut self.batch {
            BatchState::Batching(buffered) => {
                remember(&mut self.unit, buffered, vertex);
                let cached = match buffered.entry(vertex) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => e.insert(CachingVertex::load(&*store, vertex, &self.layout)?),
                };
                f(cached, &self.compactor)
            }
            BatchState::Idle => {
                let mut cached = CachingVertex::load(&*store, vertex, &self.layout)?;
                let result = f(&mut cached, &self.compactor);
                cached.flush(store, &self.layout)?;
                result
            }
        }
    }

    /// Current entries of the vertex, including ones held by a running batch
    fn view<S: AttachedStore + ?Sized>(&self, store: &S, vertex: VertexId) -> Result<Cow<'_, CachingVertex>> {
        if let BatchState::Batching(buffered) = &self.batch {
            if let Some(cached) = buffered.get(&vertex) {
                return Ok(Cow::Borrowed(cached));
            }
        }
        Ok(Cow::Owned(CachingVertex::load(store, vertex, &self.layout)?))
    }

    /// Add `delta` edges of exact shape `shape` to the vertex's counts.
    ///
    /// A positive delta lands in the entry covering `shape`, or creates one and
    /// compacts. A negative delta is taken from the covering entry; when there
    /// is none, or it holds less, [`RelcountError::Desynchronized`] is returned
    /// and no count is left negative.
    pub fn apply_delta<S: AttachedStore + ?Sized>(
        &mut self,
        store: &mut S,
        vertex: VertexId,
        shape: &Shape,
        delta: i64,
    ) -> Result<()> {
        shape.validate(self.layout.separator())?;
        if delta == 0 {
            return Ok(());
        }
        let magnitude = delta
            .checked_abs()
            .ok_or_else(|| RelcountError::Overflow(format!("delta {} on vertex {}", delta, vertex)))?;

        self.with_vertex(store, vertex, |cached, compactor| {
            if delta > 0 {
                if cached.increment(shape, magnitude)? {
                    compactor.compact(cached);
                }
                Ok(())
            } else {
                cached.decrement(shape, magnitude)
            }
        })
    }

    /// Count a new edge from `point_of_view`
    pub fn handle_created<S: AttachedStore + ?Sized>(
        &mut self,
        store: &mut S,
        edge: &EdgeRecord,
        point_of_view: VertexId,
        strategies: &Strategies,
    ) -> Result<()> {
        let shape = describe_edge(edge, point_of_view, strategies.extraction.as_ref());
        let weight = edge_weight(edge, point_of_view, strategies);
        self.apply_delta(store, point_of_view, &shape, weight)
    }

    /// Uncount a deleted edge from `point_of_view`
    pub fn handle_deleted<S: AttachedStore + ?Sized>(
        &mut self,
        store: &mut S,
        edge: &EdgeRecord,
        point_of_view: VertexId,
        strategies: &Strategies,
    ) -> Result<()> {
        let shape = describe_edge(edge, point_of_view, strategies.extraction.as_ref());
        let weight = edge_weight(edge, point_of_view, strategies);
        self.apply_delta(store, point_of_view, &shape, -weight)
    }

    /// Sum of every entry that could hold edges matching `query`.
    ///
    /// Exact while no entry broader than the query exists; after compaction a
    /// narrow query also counts the other edges of the merged entry.
    pub fn get_count<S: AttachedStore + ?Sized>(&self, store: &S, vertex: VertexId, query: &Shape) -> Result<i64> {
        let cached = self.view(store, vertex)?;
        Ok(cached
            .counts()
            .iter()
            .filter(|(shape, _)| query.overlaps(shape))
            .map(|(_, count)| *count)
            .sum())
    }

    /// Like [`get_count`](Self::get_count), but fails with
    /// [`RelcountError::Ambiguous`] instead of over-counting
    pub fn count_strict<S: AttachedStore + ?Sized>(&self, store: &S, vertex: VertexId, query: &Shape) -> Result<i64> {
        let cached = self.view(store, vertex)?;
        let mut total = 0;
        for (shape, count) in cached.counts() {
            if query.matches(shape) {
                total += count;
            } else if query.overlaps(shape) {
                return Err(RelcountError::Ambiguous(format!(
                    "cached {} on vertex {} is broader than query {}",
                    shape, vertex, query
                )));
            }
        }
        Ok(total)
    }

    /// Every cached entry of the vertex
    pub fn entries<S: AttachedStore + ?Sized>(&self, store: &S, vertex: VertexId) -> Result<BTreeMap<Shape, i64>> {
        Ok(self.view(store, vertex)?.counts().clone())
    }

    /// Compact the vertex now; `false` when some group stays above the threshold
    pub fn compact_vertex<S: AttachedStore + ?Sized>(&mut self, store: &mut S, vertex: VertexId) -> Result<bool> {
        self.with_vertex(store, vertex, |cached, compactor| Ok(compactor.compact(cached)))
    }

    /// Drop the vertex's entries and count its current edges again
    pub fn rebuild<G: GraphStore + ?Sized>(
        &mut self,
        graph: &mut G,
        vertex: VertexId,
        strategies: &Strategies,
    ) -> Result<()> {
        let mut counted = Vec::new();
        for edge in graph.incident_edges(vertex) {
            if !strategies.inclusion.include(&edge, vertex) {
                continue;
            }
            let shape = describe_edge(&edge, vertex, strategies.extraction.as_ref());
            shape.validate(self.layout.separator())?;
            counted.push((shape, edge_weight(&edge, vertex, strategies)));
        }

        self.with_vertex(graph, vertex, |cached, compactor| {
            cached.clear();
            for (shape, weight) in &counted {
                if *weight > 0 && cached.increment(shape, *weight)? {
                    compactor.compact(cached);
                }
            }
            tracing::debug!("Rebuilt vertex {}: {} edges, {} entries", vertex, counted.len(), cached.len());
            Ok(())
        })
    }

    /// Whether the vertex's counts have been complete since it was created or
    /// initialized
    pub fn is_complete<S: AttachedStore + ?Sized>(&self, store: &S, vertex: VertexId) -> Result<bool> {
        Ok(store.get_attached(vertex, &self.marker_key)?.is_some())
    }

    pub fn mark_complete<S: AttachedStore + ?Sized>(&self, store: &mut S, vertex: VertexId) -> Result<()> {
        store.set_attached(vertex, &self.marker_key, 1)
    }
}
