//! Counting a vertex's edges by shape
//!
//! - [`NaiveCounter`] walks the vertex's edges; always exact, cost grows with degree
//! - [`CachedCounter`] reads the vertex's cached entries; cost grows with the
//!   number of entries, which compaction keeps bounded
//! - [`FallingBackCounter`] prefers the cache and walks the edges when the
//!   cache is incomplete or, in precise mode, too coarse for the query

mod cached;
mod fallback;
mod naive;

pub use cached::CachedCounter;
pub use fallback::FallingBackCounter;
pub use naive::NaiveCounter;

use crate::error::Result;
use crate::graph::{EdgeRecord, GraphStore, VertexId};
use crate::shape::Shape;
use crate::strategy::{PropertyExtraction, Strategies};

/// Counts the edges of a vertex matching a query shape
pub trait Counter<G: GraphStore + ?Sized> {
    fn count(&self, graph: &G, vertex: VertexId, query: &Shape) -> Result<i64>;
}

/// Exact literal shape of an edge seen from `point_of_view`
pub fn describe_edge(edge: &EdgeRecord, point_of_view: VertexId, extraction: &dyn PropertyExtraction) -> Shape {
    Shape::of_edge(
        edge.edge_type.clone(),
        edge.direction_from(point_of_view),
        extraction.extract(edge, point_of_view),
    )
}

/// Weight of an edge; non-positive weights count as nothing
pub fn edge_weight(edge: &EdgeRecord, point_of_view: VertexId, strategies: &Strategies) -> i64 {
    strategies.weighing.weight(edge, point_of_view).max(0)
}
