//! One vertex's cached counts, loaded from and flushed to attached data

use std::collections::{BTreeMap, BTreeSet};

use super::KeyLayout;
use crate::error::{RelcountError, Result};
use crate::graph::{AttachedStore, VertexId};
use crate::shape::generality::is_more_general_or_equal;
use crate::shape::{Direction, Shape};

/// Cached counts of a vertex plus the writes not yet flushed
#[derive(Debug, Clone)]
pub struct CachingVertex {
    vertex: VertexId,
    counts: BTreeMap<Shape, i64>,
    updated: BTreeSet<Shape>,
    removed: BTreeSet<Shape>,
}

impl CachingVertex {
    /// Empty cache for a vertex with nothing stored yet
    pub fn empty(vertex: VertexId) -> Self {
        Self {
            vertex,
            counts: BTreeMap::new(),
            updated: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// Read every stored entry of the layout from the vertex.
    ///
    /// Keys that do not parse are skipped with a warning; they may belong to
    /// another generation of the cache.
    pub fn load<S: AttachedStore + ?Sized>(store: &S, vertex: VertexId, layout: &KeyLayout) -> Result<Self> {
        let mut result = Self::empty(vertex);

        for key in store.attached_keys(vertex, &layout.entry_prefix())? {
            let shape = match layout.decode(&key) {
                Ok(shape) => shape,
                Err(e) => {
                    tracing::warn!("Skipping cached count {} on vertex {}: {}", key, vertex, e);
                    continue;
                }
            };
            if let Some(count) = store.get_attached(vertex, &key)? {
                result.counts.insert(shape, count);
            }
        }

        Ok(result)
    }

    pub fn id(&self) -> VertexId {
        self.vertex
    }

    pub fn counts(&self) -> &BTreeMap<Shape, i64> {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Distinct (type, direction) pairs with at least one entry
    pub fn groups(&self) -> BTreeSet<(String, Direction)> {
        self.counts
            .keys()
            .map(|s| (s.edge_type().to_string(), s.direction()))
            .collect()
    }

    /// Entries of one (type, direction) pair
    pub fn group(&self, edge_type: &str, direction: Direction) -> BTreeMap<Shape, i64> {
        self.counts
            .iter()
            .filter(|(s, _)| s.edge_type() == edge_type && s.direction() == direction)
            .map(|(s, c)| (s.clone(), *c))
            .collect()
    }

    /// The stored entry an edge of this exact shape is counted under
    pub fn covering(&self, shape: &Shape) -> Option<&Shape> {
        self.counts.keys().find(|cached| is_more_general_or_equal(cached, shape))
    }

    /// Add `delta` to the covering entry, or create one.
    ///
    /// Returns `true` when a new entry was created. The vertex's total must
    /// stay within `i64`, so merged entries and summed queries cannot overflow
    /// either; otherwise nothing changes and [`RelcountError::Overflow`] is
    /// returned.
    pub fn increment(&mut self, shape: &Shape, delta: i64) -> Result<bool> {
        if self.counts.values().try_fold(delta, |acc, c| acc.checked_add(*c)).is_none() {
            return Err(RelcountError::Overflow(format!(
                "adding {} to {} on vertex {}",
                delta, shape, self.vertex
            )));
        }

        if let Some(cached) = self.covering(shape).cloned() {
            let value = self.counts.get(&cached).copied().unwrap_or(0) + delta;
            self.put(cached, value);
            return Ok(false);
        }

        self.put(shape.clone(), delta);
        Ok(true)
    }

    /// Subtract `delta` from the covering entry, removing it at zero.
    ///
    /// A missing entry or a count that would go negative means the cache is
    /// out of sync with the graph; the entry is left absent rather than negative.
    pub fn decrement(&mut self, shape: &Shape, delta: i64) -> Result<()> {
        let cached = self.covering(shape).cloned().ok_or_else(|| RelcountError::Desynchronized {
            vertex: self.vertex,
            shape: shape.to_string(),
        })?;

        let value = self.counts.get(&cached).copied().unwrap_or(0) - delta;
        if value > 0 {
            self.put(cached, value);
            return Ok(());
        }

        self.delete(&cached);
        if value < 0 {
            return Err(RelcountError::Desynchronized {
                vertex: self.vertex,
                shape: cached.to_string(),
            });
        }
        Ok(())
    }

    /// Set an entry's count
    pub fn put(&mut self, shape: Shape, count: i64) {
        self.removed.remove(&shape);
        self.updated.insert(shape.clone());
        self.counts.insert(shape, count);
    }

    /// Remove an entry
    pub fn delete(&mut self, shape: &Shape) {
        if self.counts.remove(shape).is_some() {
            self.updated.remove(shape);
            self.removed.insert(shape.clone());
        }
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        let shapes: Vec<Shape> = self.counts.keys().cloned().collect();
        for shape in &shapes {
            self.delete(shape);
        }
    }

    /// Whether there are writes not yet flushed
    pub fn is_dirty(&self) -> bool {
        !self.updated.is_empty() || !self.removed.is_empty()
    }

    /// Write pending changes to the vertex's attached data
    pub fn flush<S: AttachedStore + ?Sized>(&mut self, store: &mut S, layout: &KeyLayout) -> Result<()> {
        for shape in &self.updated {
            if let Some(count) = self.counts.get(shape) {
                store.set_attached(self.vertex, &layout.encode(shape), *count)?;
            }
        }

        for shape in &self.removed {
            store.remove_attached(self.vertex, &layout.encode(shape))?;
        }

        self.updated.clear();
        self.removed.clear();
        Ok(())
    }
}
