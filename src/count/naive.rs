use super::{describe_edge, edge_weight, Counter};
use crate::error::{RelcountError, Result};
use crate::graph::{GraphStore, VertexId};
use crate::shape::Shape;
use crate::strategy::Strategies;

/// Counts by inspecting every incident edge
#[derive(Debug, Clone, Copy)]
pub struct NaiveCounter<'a> {
    strategies: &'a Strategies,
}

impl<'a> NaiveCounter<'a> {
    pub fn new(strategies: &'a Strategies) -> Self {
        Self { strategies }
    }

    /// Total weight of the included edges whose shape `query` matches
    pub fn count_edges<G: GraphStore + ?Sized>(&self, graph: &G, vertex: VertexId, query: &Shape) -> i64 {
        graph
            .incident_edges(vertex)
            .iter()
            .filter(|edge| self.strategies.inclusion.include(edge, vertex))
            .filter(|edge| query.matches(&describe_edge(edge, vertex, self.strategies.extraction.as_ref())))
            .map(|edge| edge_weight(edge, vertex, self.strategies))
            .sum()
    }
}

impl<G: GraphStore + ?Sized> Counter<G> for NaiveCounter<'_> {
    fn count(&self, graph: &G, vertex: VertexId, query: &Shape) -> Result<i64> {
        if !graph.vertex_exists(vertex) {
            return Err(RelcountError::VertexNotFound(vertex));
        }
        Ok(self.count_edges(graph, vertex, query))
    }
}
