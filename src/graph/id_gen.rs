//! Deterministic ID generation via BLAKE3

use blake3::Hasher;

use super::{EdgeId, VertexId};

fn hash_to_u128(hasher: Hasher) -> u128 {
    let hash = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash.as_bytes()[0..16]);
    u128::from_le_bytes(bytes)
}

/// Compute deterministic vertex ID
///
/// ID = BLAKE3(label|name) -> u128 (first 16 bytes)
///
/// # Examples
/// ```
/// use relcount::graph::compute_vertex_id;
///
/// let id = compute_vertex_id("USER", "alice");
/// assert_ne!(id, 0);
/// ```
pub fn compute_vertex_id(label: &str, name: &str) -> VertexId {
    let mut hasher = Hasher::new();
    hasher.update(label.as_bytes());
    hasher.update(b"|");
    hasher.update(name.as_bytes());
    hash_to_u128(hasher)
}

/// Compute deterministic edge ID
///
/// ID = BLAKE3(src|type|dst|discriminator); the discriminator tells apart
/// parallel edges of the same type between the same vertices.
pub fn compute_edge_id(src: VertexId, edge_type: &str, dst: VertexId, discriminator: u64) -> EdgeId {
    let mut hasher = Hasher::new();
    hasher.update(&src.to_le_bytes());
    hasher.update(b"|");
    hasher.update(edge_type.as_bytes());
    hasher.update(b"|");
    hasher.update(&dst.to_le_bytes());
    hasher.update(b"|");
    hasher.update(&discriminator.to_le_bytes());
    hash_to_u128(hasher)
}
