//! Threshold-based compaction of a vertex's cached shapes
//!
//! When a (type, direction) group holds more entries than the threshold,
//! several entries are merged into one more general shape whose count is
//! their sum. A merge is only applied when every other entry of the group is
//! mutually exclusive with the new shape, so each edge stays counted under
//! exactly one entry. Compaction trades query precision for space: after a
//! merge, queries narrower than the merged shape over-count.

pub mod generalization;

pub use generalization::{AverageCardinality, GeneralizationStrategy, Group, MaxAbsorption};

use std::collections::{BTreeSet, HashSet};

use crate::cache::CachingVertex;
use crate::shape::generality::{
    all_more_general_within, is_more_general_or_equal, mutually_exclusive, one_step_more_general_within,
};
use crate::shape::{Direction, Shape};

/// Keeps every group of a vertex at or below a threshold
pub struct Compactor {
    threshold: usize,
    strategy: Box<dyn GeneralizationStrategy>,
}

impl Compactor {
    pub fn new(threshold: usize) -> Self {
        Self::with_strategy(threshold, MaxAbsorption)
    }

    pub fn with_strategy(threshold: usize, strategy: impl GeneralizationStrategy + 'static) -> Self {
        Self {
            threshold: threshold.max(1),
            strategy: Box::new(strategy),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Compact every group of the vertex.
    ///
    /// Returns `false` when some group could not be brought down to the
    /// threshold. Running it again on a compacted vertex changes nothing.
    pub fn compact(&self, vertex: &mut CachingVertex) -> bool {
        let mut reached = true;
        for (edge_type, direction) in vertex.groups() {
            reached &= self.compact_group(vertex, &edge_type, direction);
        }
        reached
    }

    fn compact_group(&self, vertex: &mut CachingVertex, edge_type: &str, direction: Direction) -> bool {
        loop {
            let group = vertex.group(edge_type, direction);
            if group.len() <= self.threshold {
                return true;
            }

            let Some((general, absorbed)) = self.choose(&group) else {
                tracing::warn!(
                    "Vertex {}: cannot compact {} {} below {} entries ({} remain)",
                    vertex.id(),
                    edge_type,
                    direction,
                    self.threshold,
                    group.len()
                );
                return false;
            };

            let total: i64 = absorbed.iter().filter_map(|s| group.get(s)).sum();
            tracing::debug!(
                "Vertex {}: merged {} entries into {} (count {})",
                vertex.id(),
                absorbed.len(),
                general,
                total
            );

            for shape in &absorbed {
                vertex.delete(shape);
            }
            vertex.put(general, total);
        }
    }

    /// Best applicable generalization and the entries it absorbs.
    ///
    /// One-step generalizations are tried first; if none applies, every more
    /// general shape is considered.
    fn choose(&self, group: &Group) -> Option<(Shape, Vec<Shape>)> {
        let known_keys: BTreeSet<String> = group
            .keys()
            .filter_map(|s| s.properties())
            .flat_map(|values| values.keys().cloned())
            .collect();

        let one_step = unique(group.keys().flat_map(|s| one_step_more_general_within(s, &known_keys)));
        if let Some(choice) = self.first_applicable(group, one_step) {
            return Some(choice);
        }

        let closure = unique(group.keys().flat_map(|s| all_more_general_within(s, &known_keys)));
        self.first_applicable(group, closure)
    }

    fn first_applicable(&self, group: &Group, candidates: Vec<Shape>) -> Option<(Shape, Vec<Shape>)> {
        self.strategy
            .rank(group, candidates)
            .into_iter()
            .find_map(|candidate| {
                let absorbed = absorbable(&candidate, group)?;
                (absorbed.len() >= 2).then_some((candidate, absorbed))
            })
    }
}

impl std::fmt::Debug for Compactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compactor")
            .field("threshold", &self.threshold)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

fn unique<I: Iterator<Item = Shape>>(shapes: I) -> Vec<Shape> {
    let mut seen = HashSet::new();
    shapes.filter(|s| seen.insert(s.clone())).collect()
}

/// Entries `candidate` would absorb, or `None` when it partially overlaps one
fn absorbable(candidate: &Shape, group: &Group) -> Option<Vec<Shape>> {
    let mut absorbed = Vec::new();
    for entry in group.keys() {
        if is_more_general_or_equal(candidate, entry) {
            absorbed.push(entry.clone());
        } else if !mutually_exclusive(candidate, entry) {
            return None;
        }
    }
    Some(absorbed)
}
