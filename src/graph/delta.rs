//! Unit-of-work change log

use super::{EdgeId, EdgeRecord, VertexId};

/// Operation in a unit-of-work
#[derive(Debug, Clone)]
pub enum Delta {
    CreateVertex { id: VertexId },
    DeleteVertex { id: VertexId },
    CreateEdge(EdgeRecord),
    DeleteEdge { id: EdgeId },
}

/// Changes buffered until [`MemoryGraph::commit`](super::MemoryGraph::commit)
#[derive(Debug, Default)]
pub struct Transaction {
    operations: Vec<Delta>,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    pub fn create_vertex(&mut self, id: VertexId) -> &mut Self {
        self.operations.push(Delta::CreateVertex { id });
        self
    }

    pub fn delete_vertex(&mut self, id: VertexId) -> &mut Self {
        self.operations.push(Delta::DeleteVertex { id });
        self
    }

    pub fn create_edge(&mut self, edge: EdgeRecord) -> &mut Self {
        self.operations.push(Delta::CreateEdge(edge));
        self
    }

    pub fn delete_edge(&mut self, id: EdgeId) -> &mut Self {
        self.operations.push(Delta::DeleteEdge { id });
        self
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Delta> + '_ {
        self.operations.drain(..)
    }
}
