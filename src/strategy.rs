//! Pluggable strategies: which edges count, which properties matter, how much an edge weighs

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{EdgeRecord, VertexId};

/// Decides which edge properties take part in shape matching
pub trait PropertyExtraction: Send + Sync {
    fn extract(&self, edge: &EdgeRecord, point_of_view: VertexId) -> BTreeMap<String, String>;
}

/// Decides how many units an edge counts for
pub trait Weighing: Send + Sync {
    fn weight(&self, edge: &EdgeRecord, point_of_view: VertexId) -> i64;
}

/// Decides which edges, seen from which vertex, are cached at all
pub trait InclusionPolicy: Send + Sync {
    fn include(&self, edge: &EdgeRecord, point_of_view: VertexId) -> bool;
}

/// String form of a JSON property value: strings as-is, everything else as JSON text
pub fn normalize_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every property of the edge
#[derive(Debug, Default, Clone, Copy)]
pub struct AllProperties;

impl PropertyExtraction for AllProperties {
    fn extract(&self, edge: &EdgeRecord, _point_of_view: VertexId) -> BTreeMap<String, String> {
        edge.properties
            .iter()
            .map(|(k, v)| (k.clone(), normalize_value(v)))
            .collect()
    }
}

/// No properties: shapes reduce to type and direction
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProperties;

impl PropertyExtraction for NoProperties {
    fn extract(&self, _edge: &EdgeRecord, _point_of_view: VertexId) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Only the listed property keys
#[derive(Debug, Default, Clone)]
pub struct SelectedProperties {
    keys: BTreeSet<String>,
}

impl SelectedProperties {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl PropertyExtraction for SelectedProperties {
    fn extract(&self, edge: &EdgeRecord, _point_of_view: VertexId) -> BTreeMap<String, String> {
        edge.properties
            .iter()
            .filter(|(k, _)| self.keys.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), normalize_value(v)))
            .collect()
    }
}

impl<F> PropertyExtraction for F
where
    F: Fn(&EdgeRecord, VertexId) -> BTreeMap<String, String> + Send + Sync,
{
    fn extract(&self, edge: &EdgeRecord, point_of_view: VertexId) -> BTreeMap<String, String> {
        self(edge, point_of_view)
    }
}

/// Every edge weighs 1
#[derive(Debug, Default, Clone, Copy)]
pub struct OnePerEdge;

impl Weighing for OnePerEdge {
    fn weight(&self, _edge: &EdgeRecord, _point_of_view: VertexId) -> i64 {
        1
    }
}

/// Weight read from an integer edge property, 1 when missing or not an integer
#[derive(Debug, Clone)]
pub struct PropertyWeight {
    key: String,
}

impl PropertyWeight {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Weighing for PropertyWeight {
    fn weight(&self, edge: &EdgeRecord, _point_of_view: VertexId) -> i64 {
        edge.properties
            .get(&self.key)
            .and_then(|v| v.as_i64())
            .filter(|w| *w > 0)
            .unwrap_or(1)
    }
}

impl<F> Weighing for F
where
    F: Fn(&EdgeRecord, VertexId) -> i64 + Send + Sync,
{
    fn weight(&self, edge: &EdgeRecord, point_of_view: VertexId) -> i64 {
        self(edge, point_of_view)
    }
}

/// Every edge is cached
#[derive(Debug, Default, Clone, Copy)]
pub struct IncludeAll;

impl InclusionPolicy for IncludeAll {
    fn include(&self, _edge: &EdgeRecord, _point_of_view: VertexId) -> bool {
        true
    }
}

/// Only edges of the listed types are cached
#[derive(Debug, Default, Clone)]
pub struct IncludeTypes {
    types: BTreeSet<String>,
}

impl IncludeTypes {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl InclusionPolicy for IncludeTypes {
    fn include(&self, edge: &EdgeRecord, _point_of_view: VertexId) -> bool {
        self.types.contains(&edge.edge_type)
    }
}

impl<F> InclusionPolicy for F
where
    F: Fn(&EdgeRecord, VertexId) -> bool + Send + Sync,
{
    fn include(&self, edge: &EdgeRecord, point_of_view: VertexId) -> bool {
        self(edge, point_of_view)
    }
}

/// The strategies one cache instance works with
pub struct Strategies {
    pub extraction: Box<dyn PropertyExtraction>,
    pub weighing: Box<dyn Weighing>,
    pub inclusion: Box<dyn InclusionPolicy>,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            extraction: Box::new(AllProperties),
            weighing: Box::new(OnePerEdge),
            inclusion: Box::new(IncludeAll),
        }
    }
}

impl Strategies {
    pub fn with_extraction(mut self, extraction: impl PropertyExtraction + 'static) -> Self {
        self.extraction = Box::new(extraction);
        self
    }

    pub fn with_weighing(mut self, weighing: impl Weighing + 'static) -> Self {
        self.weighing = Box::new(weighing);
        self
    }

    pub fn with_inclusion(mut self, inclusion: impl InclusionPolicy + 'static) -> Self {
        self.inclusion = Box::new(inclusion);
        self
    }
}

impl std::fmt::Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategies").finish_non_exhaustive()
    }
}
