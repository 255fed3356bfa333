//! Attached key/value backends for vertex data

pub mod sled_store;

pub use sled_store::SledAttachedStore;

use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::graph::{AttachedStore, VertexId};

/// Attached data kept in memory, one sorted map per vertex
#[derive(Debug, Default, Clone)]
pub struct MemoryAttachedStore {
    vertices: HashMap<VertexId, BTreeMap<String, i64>>,
}

impl MemoryAttachedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of attached keys over all vertices
    pub fn len(&self) -> usize {
        self.vertices.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttachedStore for MemoryAttachedStore {
    fn attached_keys(&self, vertex: VertexId, prefix: &str) -> Result<Vec<String>> {
        let keys = self
            .vertices
            .get(&vertex)
            .map(|entries| {
                entries
                    .range(prefix.to_string()..)
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(keys)
    }

    fn get_attached(&self, vertex: VertexId, key: &str) -> Result<Option<i64>> {
        Ok(self.vertices.get(&vertex).and_then(|entries| entries.get(key).copied()))
    }

    fn set_attached(&mut self, vertex: VertexId, key: &str, value: i64) -> Result<()> {
        self.vertices
            .entry(vertex)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove_attached(&mut self, vertex: VertexId, key: &str) -> Result<()> {
        if let Some(entries) = self.vertices.get_mut(&vertex) {
            entries.remove(key);
            if entries.is_empty() {
                self.vertices.remove(&vertex);
            }
        }
        Ok(())
    }

    fn clear_vertex(&mut self, vertex: VertexId) -> Result<()> {
        self.vertices.remove(&vertex);
        Ok(())
    }
}
