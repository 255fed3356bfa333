use super::{CachedCounter, Counter, NaiveCounter};
use crate::error::{RelcountError, Result};
use crate::graph::{GraphStore, VertexId};
use crate::shape::Shape;

/// Uses the cache where it can answer and walks the edges otherwise.
///
/// Vertices without a completeness marker are always counted naively. In
/// precise mode a query narrower than some cached entry is counted naively
/// too, instead of over-counting.
#[derive(Debug, Clone, Copy)]
pub struct FallingBackCounter<'a> {
    cached: CachedCounter<'a>,
    naive: NaiveCounter<'a>,
    precise: bool,
}

impl<'a> FallingBackCounter<'a> {
    pub fn new(cached: CachedCounter<'a>, naive: NaiveCounter<'a>) -> Self {
        Self {
            cached,
            naive,
            precise: false,
        }
    }

    pub fn precise(mut self) -> Self {
        self.precise = true;
        self
    }
}

impl<G: GraphStore + ?Sized> Counter<G> for FallingBackCounter<'_> {
    fn count(&self, graph: &G, vertex: VertexId, query: &Shape) -> Result<i64> {
        if !graph.vertex_exists(vertex) {
            return Err(RelcountError::VertexNotFound(vertex));
        }

        if !self.cached.cache().is_complete(graph, vertex)? {
            tracing::warn!("Vertex {} has no complete cache, counting edges of {}", vertex, query);
            return Ok(self.naive.count_edges(graph, vertex, query));
        }

        if !self.precise {
            return self.cached.count_lenient(graph, vertex, query);
        }

        match self.cached.count_strict(graph, vertex, query) {
            Err(RelcountError::Ambiguous(reason)) => {
                tracing::warn!("Unable to count with cache ({}), counting edges", reason);
                Ok(self.naive.count_edges(graph, vertex, query))
            }
            other => other,
        }
    }
}
