use super::Counter;
use crate::cache::ShapeCache;
use crate::error::{RelcountError, Result};
use crate::graph::{AttachedStore, GraphStore, VertexId};
use crate::shape::Shape;

/// Counts from the vertex's cached entries
#[derive(Debug, Clone, Copy)]
pub struct CachedCounter<'a> {
    cache: &'a ShapeCache,
}

impl<'a> CachedCounter<'a> {
    pub fn new(cache: &'a ShapeCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &'a ShapeCache {
        self.cache
    }

    /// Sum of every entry that may hold matching edges; over-counts after compaction
    pub fn count_lenient<S: AttachedStore + ?Sized>(&self, store: &S, vertex: VertexId, query: &Shape) -> Result<i64> {
        self.cache.get_count(store, vertex, query)
    }

    /// Exact count, or [`RelcountError::Ambiguous`] when an entry is broader than the query
    pub fn count_strict<S: AttachedStore + ?Sized>(&self, store: &S, vertex: VertexId, query: &Shape) -> Result<i64> {
        self.cache.count_strict(store, vertex, query)
    }
}

impl<G: GraphStore + ?Sized> Counter<G> for CachedCounter<'_> {
    fn count(&self, graph: &G, vertex: VertexId, query: &Shape) -> Result<i64> {
        if !graph.vertex_exists(vertex) {
            return Err(RelcountError::VertexNotFound(vertex));
        }
        self.count_lenient(graph, vertex, query)
    }
}
