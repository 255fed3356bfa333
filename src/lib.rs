//! relcount - per-vertex relationship shape counts
//!
//! # Architecture
//!
//! - **Shapes**: edge type + direction + property pattern, with a generality order
//! - **Attached storage**: one integer key per cached shape on each vertex
//! - **Compaction**: entries merged into more general shapes above a threshold
//! - **Counters**: naive (walk edges), cached, and falling back between the two
//! - **Events**: counts updated inside the graph's unit-of-work
//!
//! # Usage example
//!
//! ```
//! use relcount::{Direction, EdgeRecord, MemoryGraph, RelcountConfig, RelcountModule, Shape};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = MemoryGraph::new();
//! let mut module = RelcountModule::new(RelcountConfig::new())?;
//!
//! let mut tx = graph.begin();
//! tx.create_vertex(1).create_vertex(2);
//! tx.create_edge(EdgeRecord::new(10, 1, 2, "FOLLOWS").with_property("strength", 3));
//! graph.commit(tx, &mut module)?;
//!
//! let query = Shape::wildcard("FOLLOWS", Direction::Outgoing).with("strength", "3");
//! assert_eq!(module.count(&graph, 1, &query)?, 1);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod compact;
pub mod config;
pub mod count;
pub mod error;
pub mod graph;
pub mod module;
pub mod shape;
pub mod storage;
pub mod strategy;

pub use cache::{CachingVertex, KeyLayout, ShapeCache};
pub use compact::{AverageCardinality, Compactor, GeneralizationStrategy, MaxAbsorption};
pub use config::RelcountConfig;
pub use count::{CachedCounter, Counter, FallingBackCounter, NaiveCounter};
pub use error::{RelcountError, Result};
pub use graph::{AttachedStore, EdgeEventHandler, EdgeRecord, GraphStore, MemoryGraph, VertexId};
pub use module::{AuditMismatch, AuditReport, RelcountModule};
pub use shape::{Direction, PropertyValue, Shape, ANY_VALUE};
pub use storage::{sled_store::SledAttachedStore, MemoryAttachedStore};
pub use strategy::Strategies;
