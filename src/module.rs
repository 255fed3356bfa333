//! Relationship count module: keeps a [`ShapeCache`] in step with the graph
//!
//! The module reacts to edge events fired inside a unit-of-work, so cached
//! counts commit or roll back together with the edges they describe. A
//! decrement the cache cannot honor is logged and repaired by rebuilding the
//! vertex from its current edges. Vertices created while the module is
//! registered, and vertices counted by [`RelcountModule::initialize`], carry a
//! completeness marker; the falling-back counter trusts the cache only there.
//! During a batch the buffered counts follow the unit-of-work as well: a
//! failed commit restores them, and a deleted vertex takes its buffer with it.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::cache::ShapeCache;
use crate::compact::Compactor;
use crate::config::RelcountConfig;
use crate::count::{describe_edge, edge_weight, CachedCounter, Counter, FallingBackCounter, NaiveCounter};
use crate::error::{RelcountError, Result};
use crate::graph::{EdgeEventHandler, EdgeRecord, GraphStore, VertexId};
use crate::shape::{Direction, Shape};
use crate::strategy::Strategies;

/// One (type, direction) total the cache disagrees on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditMismatch {
    pub vertex: VertexId,
    pub edge_type: String,
    pub direction: Direction,
    pub cached: i64,
    pub actual: i64,
}

/// Result of comparing cached totals against the edges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub vertices_checked: usize,
    pub mismatches: Vec<AuditMismatch>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

type Totals = BTreeMap<(String, Direction), i64>;

/// Relationship counts of one module id, fed by a host's edge events.
///
/// Register it as the [`EdgeEventHandler`] of every unit-of-work, call
/// [`initialize`](Self::initialize) once for a graph that already has edges,
/// and read counts through [`count`](Self::count) or one of the counters.
pub struct RelcountModule {
    config: RelcountConfig,
    strategies: Strategies,
    cache: ShapeCache,
}

impl RelcountModule {
    pub fn new(config: RelcountConfig) -> Result<Self> {
        Self::with_strategies(config, Strategies::default())
    }

    pub fn with_strategies(config: RelcountConfig, strategies: Strategies) -> Result<Self> {
        let compactor = Compactor::new(config.compaction_threshold);
        Self::with_compactor(config, strategies, compactor)
    }

    pub fn with_compactor(config: RelcountConfig, strategies: Strategies, compactor: Compactor) -> Result<Self> {
        let cache = ShapeCache::with_compactor(&config, compactor)?;
        tracing::info!(
            "Relationship count module '{}' ready (threshold {}, {})",
            config.id,
            cache.compactor().threshold(),
            cache.compactor().strategy_name()
        );
        Ok(Self {
            config,
            strategies,
            cache,
        })
    }

    pub fn config(&self) -> &RelcountConfig {
        &self.config
    }

    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    pub fn cache(&self) -> &ShapeCache {
        &self.cache
    }

    pub fn naive_counter(&self) -> NaiveCounter<'_> {
        NaiveCounter::new(&self.strategies)
    }

    pub fn cached_counter(&self) -> CachedCounter<'_> {
        CachedCounter::new(&self.cache)
    }

    pub fn falling_back_counter(&self) -> FallingBackCounter<'_> {
        FallingBackCounter::new(self.cached_counter(), self.naive_counter())
    }

    /// Count with the cache where it is complete, by walking edges elsewhere
    pub fn count<G: GraphStore + ?Sized>(&self, graph: &G, vertex: VertexId, query: &Shape) -> Result<i64> {
        self.falling_back_counter().count(graph, vertex, query)
    }

    pub fn start_batch(&mut self) -> Result<()> {
        self.cache.start_batch()
    }

    pub fn end_batch<G: GraphStore + ?Sized>(&mut self, graph: &mut G) -> Result<usize> {
        self.cache.end_batch(graph)
    }

    pub fn is_complete<G: GraphStore + ?Sized>(&self, graph: &G, vertex: VertexId) -> Result<bool> {
        self.cache.is_complete(graph, vertex)
    }

    /// Recount one vertex from its edges
    pub fn rebuild<G: GraphStore + ?Sized>(&mut self, graph: &mut G, vertex: VertexId) -> Result<()> {
        self.cache.rebuild(graph, vertex, &self.strategies)
    }

    /// Count every vertex of a graph that existed before the module was
    /// registered, and mark it complete.
    ///
    /// Runs as a batch unless one is already in progress. Returns the number
    /// of vertices counted.
    pub fn initialize<G: GraphStore + ?Sized>(&mut self, graph: &mut G) -> Result<usize> {
        let vertices = graph.vertices();
        let own_batch = !self.cache.is_batching();
        if own_batch {
            self.cache.start_batch()?;
        }

        for vertex in &vertices {
            self.cache.rebuild(graph, *vertex, &self.strategies)?;
            self.cache.mark_complete(graph, *vertex)?;
        }

        if own_batch {
            self.cache.end_batch(graph)?;
        }

        tracing::info!("Initialized relationship counts of {} vertices", vertices.len());
        Ok(vertices.len())
    }

    /// Compare cached and actual totals per (type, direction) for each vertex.
    ///
    /// Totals survive compaction unchanged, so any mismatch means the cache
    /// has drifted from the graph.
    pub fn audit<G>(&self, graph: &G, vertices: &[VertexId]) -> Result<AuditReport>
    where
        G: GraphStore + Sync + ?Sized,
    {
        let per_vertex: Vec<Vec<AuditMismatch>> = vertices
            .par_iter()
            .map(|vertex| self.audit_vertex(graph, *vertex))
            .collect::<Result<_>>()?;

        let report = AuditReport {
            vertices_checked: vertices.len(),
            mismatches: per_vertex.into_iter().flatten().collect(),
        };

        if report.is_consistent() {
            tracing::info!("Audit of {} vertices found no drift", report.vertices_checked);
        } else {
            tracing::warn!(
                "Audit of {} vertices found {} mismatched totals",
                report.vertices_checked,
                report.mismatches.len()
            );
        }
        Ok(report)
    }

    fn audit_vertex<G: GraphStore + ?Sized>(&self, graph: &G, vertex: VertexId) -> Result<Vec<AuditMismatch>> {
        let mut cached = Totals::new();
        for (shape, count) in self.cache.entries(graph, vertex)? {
            *cached.entry((shape.edge_type().to_string(), shape.direction())).or_default() += count;
        }

        let mut actual = Totals::new();
        for edge in graph.incident_edges(vertex) {
            if !self.strategies.inclusion.include(&edge, vertex) {
                continue;
            }
            let weight = edge_weight(&edge, vertex, &self.strategies);
            if weight > 0 {
                *actual.entry((edge.edge_type.clone(), edge.direction_from(vertex))).or_default() += weight;
            }
        }

        let mut groups: Vec<&(String, Direction)> = cached.keys().chain(actual.keys()).collect();
        groups.sort();
        groups.dedup();

        Ok(groups
            .into_iter()
            .filter_map(|group| {
                let cached_total = cached.get(group).copied().unwrap_or(0);
                let actual_total = actual.get(group).copied().unwrap_or(0);
                (cached_total != actual_total).then(|| AuditMismatch {
                    vertex,
                    edge_type: group.0.clone(),
                    direction: group.1,
                    cached: cached_total,
                    actual: actual_total,
                })
            })
            .collect())
    }
}

impl std::fmt::Debug for RelcountModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelcountModule")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<G: GraphStore + ?Sized> EdgeEventHandler<G> for RelcountModule {
    fn edge_created(&mut self, graph: &mut G, edge: &EdgeRecord, point_of_view: VertexId) -> Result<()> {
        if !self.strategies.inclusion.include(edge, point_of_view) {
            return Ok(());
        }
        self.cache.handle_created(graph, edge, point_of_view, &self.strategies)
    }

    fn edge_deleted(&mut self, graph: &mut G, edge: &EdgeRecord, point_of_view: VertexId) -> Result<()> {
        if !self.strategies.inclusion.include(edge, point_of_view) {
            return Ok(());
        }

        match self.cache.handle_deleted(graph, edge, point_of_view, &self.strategies) {
            Err(RelcountError::Desynchronized { vertex, shape }) => {
                tracing::warn!(
                    "Relationship counts of vertex {} out of sync at {} (deleting {}), rebuilding",
                    vertex,
                    shape,
                    describe_edge(edge, point_of_view, self.strategies.extraction.as_ref())
                );
                self.cache.rebuild(graph, point_of_view, &self.strategies)
            }
            other => other,
        }
    }

    fn vertex_created(&mut self, graph: &mut G, vertex: VertexId) -> Result<()> {
        self.cache.mark_complete(graph, vertex)
    }

    fn vertex_deleted(&mut self, _graph: &mut G, vertex: VertexId) -> Result<()> {
        self.cache.forget_vertex(vertex);
        Ok(())
    }

    fn unit_started(&mut self) {
        self.cache.begin_unit();
    }

    fn unit_committed(&mut self) {
        self.cache.commit_unit();
    }

    fn unit_aborted(&mut self) {
        self.cache.abort_unit();
    }
}
