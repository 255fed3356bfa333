//! Persistent attached data via sled KV store

use std::path::Path;

use sled::Db;

use crate::error::{RelcountError, Result};
use crate::graph::{AttachedStore, VertexId};

/// Attached data in a sled database.
///
/// Key = vertex id (big-endian) ++ attached key, value = count (little-endian i64).
pub struct SledAttachedStore {
    db: Db,
}

impl SledAttachedStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path).map_err(|e| {
            RelcountError::Storage(format!("Failed to open sled: {}", e))
        })?;

        Ok(Self { db })
    }

    /// Wait until every write so far is durable
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| RelcountError::Storage(format!("Failed to flush: {}", e)))?;
        Ok(())
    }

    fn storage_key(vertex: VertexId, key: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + key.len());
        out.extend_from_slice(&vertex.to_be_bytes());
        out.extend_from_slice(key.as_bytes());
        out
    }

    fn decode_value(bytes: &[u8]) -> Result<i64> {
        let value: [u8; 8] = bytes
            .try_into()
            .map_err(|_| RelcountError::Storage("Invalid attached value".into()))?;
        Ok(i64::from_le_bytes(value))
    }
}

impl AttachedStore for SledAttachedStore {
    fn attached_keys(&self, vertex: VertexId, prefix: &str) -> Result<Vec<String>> {
        let mut result = Vec::new();

        for item in self.db.scan_prefix(Self::storage_key(vertex, prefix)) {
            let (key, _) = item.map_err(|e| {
                RelcountError::Storage(format!("Failed to scan attached keys: {}", e))
            })?;
            let name = std::str::from_utf8(&key[16..])
                .map_err(|_| RelcountError::Storage("Attached key is not UTF-8".into()))?;
            result.push(name.to_string());
        }

        Ok(result)
    }

    fn get_attached(&self, vertex: VertexId, key: &str) -> Result<Option<i64>> {
        let value = self.db.get(Self::storage_key(vertex, key)).map_err(|e| {
            RelcountError::Storage(format!("Failed to get attached value: {}", e))
        })?;

        value.map(|bytes| Self::decode_value(&bytes)).transpose()
    }

    fn set_attached(&mut self, vertex: VertexId, key: &str, value: i64) -> Result<()> {
        self.db
            .insert(Self::storage_key(vertex, key), value.to_le_bytes().to_vec())
            .map_err(|e| RelcountError::Storage(format!("Failed to set attached value: {}", e)))?;
        Ok(())
    }

    fn remove_attached(&mut self, vertex: VertexId, key: &str) -> Result<()> {
        self.db
            .remove(Self::storage_key(vertex, key))
            .map_err(|e| RelcountError::Storage(format!("Failed to remove attached value: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let mut store = SledAttachedStore::open(dir.path().join("attached")).unwrap();

        store.set_attached(7, "_RC_relcount#FOLLOWS#OUTGOING", 3).unwrap();
        assert_eq!(store.get_attached(7, "_RC_relcount#FOLLOWS#OUTGOING").unwrap(), Some(3));
        assert_eq!(store.get_attached(8, "_RC_relcount#FOLLOWS#OUTGOING").unwrap(), None);

        store.remove_attached(7, "_RC_relcount#FOLLOWS#OUTGOING").unwrap();
        assert_eq!(store.get_attached(7, "_RC_relcount#FOLLOWS#OUTGOING").unwrap(), None);
    }

    #[test]
    fn test_keys_scoped_to_vertex_and_prefix() {
        let dir = TempDir::new().unwrap();
        let mut store = SledAttachedStore::open(dir.path().join("attached")).unwrap();

        store.set_attached(1, "_RC_a#X", 1).unwrap();
        store.set_attached(1, "_RC_b#X", 1).unwrap();
        store.set_attached(2, "_RC_a#Y", 1).unwrap();

        assert_eq!(store.attached_keys(1, "_RC_a#").unwrap(), vec!["_RC_a#X".to_string()]);
        assert_eq!(store.attached_keys(1, "").unwrap().len(), 2);

        store.clear_vertex(1).unwrap();
        assert!(store.attached_keys(1, "").unwrap().is_empty());
        assert_eq!(store.attached_keys(2, "").unwrap().len(), 1);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attached");

        {
            let mut store = SledAttachedStore::open(&path).unwrap();
            store.set_attached(1, "count", 42).unwrap();
            store.flush().unwrap();
        }

        let store = SledAttachedStore::open(&path).unwrap();
        assert_eq!(store.get_attached(1, "count").unwrap(), Some(42));
    }
}
