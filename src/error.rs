//! Error types for the relationship count cache

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelcountError>;

#[derive(Error, Debug)]
pub enum RelcountError {
    #[error("Vertex not found: {0}")]
    VertexNotFound(u128),

    #[error("Edge not found: {0}")]
    EdgeNotFound(u128),

    #[error("Invalid shape key format: {0}")]
    InvalidFormat(String),

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// The cache no longer reflects the edges of the vertex; a rebuild repairs it.
    #[error("Cache out of sync on vertex {vertex}: {shape}")]
    Desynchronized { vertex: u128, shape: String },

    #[error("Invalid batch transition: {0}")]
    BatchState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Count out of range: {0}")]
    Overflow(String),

    #[error("Unable to count precisely: {0}")]
    Ambiguous(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
