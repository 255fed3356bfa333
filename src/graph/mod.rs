//! Host graph boundary: edges, attached vertex data and edge events

pub mod delta;
pub mod id_gen;
pub mod memory;

pub use delta::{Delta, Transaction};
pub use id_gen::{compute_edge_id, compute_vertex_id};
pub use memory::MemoryGraph;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::shape::Direction;

pub type VertexId = u128;
pub type EdgeId = u128;

/// Edge record as stored by the host graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,

    /// Source vertex ID
    pub src: VertexId,

    /// Target vertex ID
    pub dst: VertexId,

    /// Edge type (e.g., "FOLLOWS", "LIKES")
    pub edge_type: String,

    /// Edge properties
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl EdgeRecord {
    pub fn new(id: EdgeId, src: VertexId, dst: VertexId, edge_type: impl Into<String>) -> Self {
        Self {
            id,
            src,
            dst,
            edge_type: edge_type.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Direction of this edge seen from `point_of_view`; self-loops are BOTH
    pub fn direction_from(&self, point_of_view: VertexId) -> Direction {
        if self.src == self.dst {
            Direction::Both
        } else if self.src == point_of_view {
            Direction::Outgoing
        } else {
            Direction::Incoming
        }
    }

    /// The other endpoint, or the vertex itself for a self-loop
    pub fn other_end(&self, point_of_view: VertexId) -> VertexId {
        if self.src == point_of_view {
            self.dst
        } else {
            self.src
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.src == self.dst
    }
}

/// Integer data attached to vertices, persisted together with them
pub trait AttachedStore {
    /// All attached keys of the vertex starting with `prefix`
    fn attached_keys(&self, vertex: VertexId, prefix: &str) -> Result<Vec<String>>;

    fn get_attached(&self, vertex: VertexId, key: &str) -> Result<Option<i64>>;

    fn set_attached(&mut self, vertex: VertexId, key: &str, value: i64) -> Result<()>;

    fn remove_attached(&mut self, vertex: VertexId, key: &str) -> Result<()>;

    /// Drop everything attached to the vertex
    fn clear_vertex(&mut self, vertex: VertexId) -> Result<()> {
        for key in self.attached_keys(vertex, "")? {
            self.remove_attached(vertex, &key)?;
        }
        Ok(())
    }
}

/// Read access to the host graph's vertices and edges
pub trait GraphStore: AttachedStore {
    fn vertex_exists(&self, vertex: VertexId) -> bool;

    /// All live vertices
    fn vertices(&self) -> Vec<VertexId>;

    fn get_edge(&self, edge: EdgeId) -> Option<EdgeRecord>;

    /// Every edge touching the vertex, self-loops reported once
    fn incident_edges(&self, vertex: VertexId) -> Vec<EdgeRecord>;
}

/// Callbacks fired inside a unit-of-work before it finalizes.
///
/// For an edge between two distinct vertices the edge callbacks fire once per
/// endpoint; for a self-loop they fire once. An error aborts the unit-of-work:
/// the host undoes its own changes and then calls
/// [`unit_aborted`](Self::unit_aborted), so state the handler keeps outside
/// the graph can be undone too.
pub trait EdgeEventHandler<G: ?Sized> {
    fn edge_created(&mut self, graph: &mut G, edge: &EdgeRecord, point_of_view: VertexId) -> Result<()>;

    fn edge_deleted(&mut self, graph: &mut G, edge: &EdgeRecord, point_of_view: VertexId) -> Result<()>;

    fn vertex_created(&mut self, _graph: &mut G, _vertex: VertexId) -> Result<()> {
        Ok(())
    }

    /// Fired after the vertex, its edges and its attached data are gone
    fn vertex_deleted(&mut self, _graph: &mut G, _vertex: VertexId) -> Result<()> {
        Ok(())
    }

    /// Before the first change of a unit-of-work
    fn unit_started(&mut self) {}

    fn unit_committed(&mut self) {}

    /// After the host rolled back a failed unit-of-work
    fn unit_aborted(&mut self) {}
}

/// Handler that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl<G: ?Sized> EdgeEventHandler<G> for NoEvents {
    fn edge_created(&mut self, _graph: &mut G, _edge: &EdgeRecord, _point_of_view: VertexId) -> Result<()> {
        Ok(())
    }

    fn edge_deleted(&mut self, _graph: &mut G, _edge: &EdgeRecord, _point_of_view: VertexId) -> Result<()> {
        Ok(())
    }
}
