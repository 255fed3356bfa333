//! In-memory host graph with units-of-work
//!
//! Vertices and edges live in memory, attached vertex data in any
//! [`AttachedStore`] backend. A [`Transaction`] is applied by
//! [`MemoryGraph::commit`], which fires edge events for each change while the
//! unit-of-work is still open. If a handler fails, every structural change and
//! every attached write made during the commit is undone, and the handler is
//! told so through [`EdgeEventHandler::unit_aborted`].

use std::collections::{BTreeSet, HashMap};

use super::delta::{Delta, Transaction};
use super::{AttachedStore, EdgeEventHandler, EdgeId, EdgeRecord, GraphStore, VertexId};
use crate::error::{RelcountError, Result};
use crate::storage::MemoryAttachedStore;

/// Undo record of one attached write
#[derive(Debug)]
struct AttachedUndo {
    vertex: VertexId,
    key: String,
    previous: Option<i64>,
}

/// Undo record of one structural change
#[derive(Debug)]
enum StructuralUndo {
    RemoveVertex(VertexId),
    RestoreVertex(VertexId),
    RemoveEdge(EdgeId),
    RestoreEdge(EdgeRecord),
}

/// Main in-memory graph
pub struct MemoryGraph<A: AttachedStore = MemoryAttachedStore> {
    vertices: BTreeSet<VertexId>,
    edges: HashMap<EdgeId, EdgeRecord>,

    // Adjacency list (src -> edge ids)
    adjacency: HashMap<VertexId, Vec<EdgeId>>,

    // Reverse adjacency list (dst -> edge ids)
    reverse_adjacency: HashMap<VertexId, Vec<EdgeId>>,

    attached: A,

    // Prior values of attached keys written during the running commit
    journal: Option<Vec<AttachedUndo>>,
}

impl MemoryGraph<MemoryAttachedStore> {
    /// Create a new empty graph with in-memory attached data
    pub fn new() -> Self {
        Self::with_attached(MemoryAttachedStore::new())
    }
}

impl Default for MemoryGraph<MemoryAttachedStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: AttachedStore> MemoryGraph<A> {
    /// Create a new empty graph over an existing attached data backend
    pub fn with_attached(attached: A) -> Self {
        Self {
            vertices: BTreeSet::new(),
            edges: HashMap::new(),
            adjacency: HashMap::new(),
            reverse_adjacency: HashMap::new(),
            attached,
            journal: None,
        }
    }

    pub fn attached(&self) -> &A {
        &self.attached
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Start a new unit-of-work
    pub fn begin(&self) -> Transaction {
        Transaction::new()
    }

    /// Apply a unit-of-work, firing events on `handler`.
    ///
    /// Either every change is applied and the handler accepted every event,
    /// or nothing changed and the first error is returned.
    pub fn commit<H>(&mut self, mut tx: Transaction, handler: &mut H) -> Result<()>
    where
        H: EdgeEventHandler<Self> + ?Sized,
    {
        let operations: Vec<Delta> = tx.drain().collect();
        let mut undo = Vec::new();
        self.journal = Some(Vec::new());
        handler.unit_started();

        let mut result = Ok(());
        for delta in &operations {
            result = self.apply_delta(delta, handler, &mut undo);
            if result.is_err() {
                break;
            }
        }

        let journal = self.journal.take().unwrap_or_default();

        match result {
            Ok(()) => {
                handler.unit_committed();
                tracing::debug!("Committed unit-of-work with {} operations", operations.len());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Rolling back unit-of-work: {}", e);
                let rolled_back = self.rollback(undo, journal);
                handler.unit_aborted();
                rolled_back?;
                Err(e)
            }
        }
    }

    /// Apply delta to current state and fire its events
    fn apply_delta<H>(&mut self, delta: &Delta, handler: &mut H, undo: &mut Vec<StructuralUndo>) -> Result<()>
    where
        H: EdgeEventHandler<Self> + ?Sized,
    {
        match delta {
            Delta::CreateVertex { id } => {
                if self.vertices.insert(*id) {
                    undo.push(StructuralUndo::RemoveVertex(*id));
                    handler.vertex_created(self, *id)?;
                }
            }
            Delta::DeleteVertex { id } => {
                if !self.vertices.contains(id) {
                    return Err(RelcountError::VertexNotFound(*id));
                }

                for edge in self.incident_edges(*id) {
                    self.remove_edge(edge.id);
                    undo.push(StructuralUndo::RestoreEdge(edge.clone()));
                    if !edge.is_self_loop() {
                        handler.edge_deleted(self, &edge, edge.other_end(*id))?;
                    }
                }

                self.vertices.remove(id);
                undo.push(StructuralUndo::RestoreVertex(*id));
                self.clear_vertex(*id)?;
                handler.vertex_deleted(self, *id)?;
            }
            Delta::CreateEdge(edge) => {
                for endpoint in [edge.src, edge.dst] {
                    if !self.vertices.contains(&endpoint) {
                        return Err(RelcountError::VertexNotFound(endpoint));
                    }
                }
                if self.edges.contains_key(&edge.id) {
                    return Err(RelcountError::Storage(format!("Edge {} already exists", edge.id)));
                }

                self.insert_edge(edge.clone());
                undo.push(StructuralUndo::RemoveEdge(edge.id));

                handler.edge_created(self, edge, edge.src)?;
                if !edge.is_self_loop() {
                    handler.edge_created(self, edge, edge.dst)?;
                }
            }
            Delta::DeleteEdge { id } => {
                let edge = self.remove_edge(*id).ok_or(RelcountError::EdgeNotFound(*id))?;
                undo.push(StructuralUndo::RestoreEdge(edge.clone()));

                handler.edge_deleted(self, &edge, edge.src)?;
                if !edge.is_self_loop() {
                    handler.edge_deleted(self, &edge, edge.dst)?;
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self, undo: Vec<StructuralUndo>, journal: Vec<AttachedUndo>) -> Result<()> {
        for entry in journal.into_iter().rev() {
            match entry.previous {
                Some(value) => self.attached.set_attached(entry.vertex, &entry.key, value)?,
                None => self.attached.remove_attached(entry.vertex, &entry.key)?,
            }
        }

        for change in undo.into_iter().rev() {
            match change {
                StructuralUndo::RemoveVertex(id) => {
                    self.vertices.remove(&id);
                }
                StructuralUndo::RestoreVertex(id) => {
                    self.vertices.insert(id);
                }
                StructuralUndo::RemoveEdge(id) => {
                    self.remove_edge(id);
                }
                StructuralUndo::RestoreEdge(edge) => self.insert_edge(edge),
            }
        }
        Ok(())
    }

    fn insert_edge(&mut self, edge: EdgeRecord) {
        self.adjacency.entry(edge.src).or_default().push(edge.id);
        self.reverse_adjacency.entry(edge.dst).or_default().push(edge.id);
        self.edges.insert(edge.id, edge);
    }

    fn remove_edge(&mut self, id: EdgeId) -> Option<EdgeRecord> {
        let edge = self.edges.remove(&id)?;
        if let Some(ids) = self.adjacency.get_mut(&edge.src) {
            ids.retain(|e| *e != id);
        }
        if let Some(ids) = self.reverse_adjacency.get_mut(&edge.dst) {
            ids.retain(|e| *e != id);
        }
        Some(edge)
    }

    fn record(&mut self, vertex: VertexId, key: &str) -> Result<()> {
        if self.journal.is_some() {
            let previous = self.attached.get_attached(vertex, key)?;
            if let Some(journal) = self.journal.as_mut() {
                journal.push(AttachedUndo {
                    vertex,
                    key: key.to_string(),
                    previous,
                });
            }
        }
        Ok(())
    }
}

impl<A: AttachedStore> AttachedStore for MemoryGraph<A> {
    fn attached_keys(&self, vertex: VertexId, prefix: &str) -> Result<Vec<String>> {
        self.attached.attached_keys(vertex, prefix)
    }

    fn get_attached(&self, vertex: VertexId, key: &str) -> Result<Option<i64>> {
        self.attached.get_attached(vertex, key)
    }

    fn set_attached(&mut self, vertex: VertexId, key: &str, value: i64) -> Result<()> {
        self.record(vertex, key)?;
        self.attached.set_attached(vertex, key, value)
    }

    fn remove_attached(&mut self, vertex: VertexId, key: &str) -> Result<()> {
        self.record(vertex, key)?;
        self.attached.remove_attached(vertex, key)
    }
}

impl<A: AttachedStore> GraphStore for MemoryGraph<A> {
    fn vertex_exists(&self, vertex: VertexId) -> bool {
        self.vertices.contains(&vertex)
    }

    fn vertices(&self) -> Vec<VertexId> {
        self.vertices.iter().copied().collect()
    }

    fn get_edge(&self, edge: EdgeId) -> Option<EdgeRecord> {
        self.edges.get(&edge).cloned()
    }

    fn incident_edges(&self, vertex: VertexId) -> Vec<EdgeRecord> {
        let mut result = Vec::new();

        if let Some(ids) = self.adjacency.get(&vertex) {
            result.extend(ids.iter().filter_map(|id| self.edges.get(id)).cloned());
        }

        // Self-loops are already in the forward list
        if let Some(ids) = self.reverse_adjacency.get(&vertex) {
            result.extend(
                ids.iter()
                    .filter_map(|id| self.edges.get(id))
                    .filter(|edge| !edge.is_self_loop())
                    .cloned(),
            );
        }

        result
    }
}
