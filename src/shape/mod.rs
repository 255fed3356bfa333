//! Relationship shapes: edge type, direction and a property pattern
//!
//! A [`Shape`] describes a class of edges as seen from one vertex. Shapes are
//! immutable values that serialize to a flat, order-independent string so they
//! can be used directly as attached keys on the vertex owning the cache:
//!
//! ```text
//! FOLLOWS#OUTGOING                      type + direction only
//! FOLLOWS#OUTGOING#W#strength#1         wildcard semantics, strength = 1
//! FOLLOWS#OUTGOING#L#since#_ANY_        literal semantics, since = any value
//! ```

pub mod generality;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RelcountError, Result};

/// Marker value meaning "any value (or no value) for this key"
pub const ANY_VALUE: &str = "_ANY_";

const WILDCARD_TAG: &str = "W";
const LITERAL_TAG: &str = "L";

/// Direction of an edge relative to the vertex looking at it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Outgoing,
    Incoming,
    /// Self-loop as a stored direction; "either direction" in a query
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outgoing => "OUTGOING",
            Direction::Incoming => "INCOMING",
            Direction::Both => "BOTH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OUTGOING" => Some(Direction::Outgoing),
            "INCOMING" => Some(Direction::Incoming),
            "BOTH" => Some(Direction::Both),
            _ => None,
        }
    }

    /// Whether a query for `self` counts an edge whose actual direction is `actual`.
    ///
    /// A self-loop is both outgoing and incoming from its vertex.
    pub fn accepts(self, actual: Direction) -> bool {
        self == Direction::Both || actual == Direction::Both || self == actual
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of one key in a property pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyValue {
    /// Matches any value, including the key being absent
    Any,
    Exactly(String),
}

impl PropertyValue {
    pub fn is_any(&self) -> bool {
        matches!(self, PropertyValue::Any)
    }

    fn as_serialized(&self) -> &str {
        match self {
            PropertyValue::Any => ANY_VALUE,
            PropertyValue::Exactly(v) => v,
        }
    }

    fn from_serialized(s: &str) -> Self {
        if s == ANY_VALUE {
            PropertyValue::Any
        } else {
            PropertyValue::Exactly(s.to_string())
        }
    }
}

/// What a shape requires of one property key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint<'a> {
    Any,
    Exactly(&'a str),
    Absent,
}

/// Property pattern variants, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    /// No property constraints at all
    TypeDirection,
    /// Keys not mentioned match anything
    Wildcard(BTreeMap<String, PropertyValue>),
    /// Keys not mentioned must be absent on the edge
    Literal(BTreeMap<String, PropertyValue>),
}

/// An edge type, a direction and a property pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shape {
    edge_type: String,
    direction: Direction,
    kind: ShapeKind,
}

impl Shape {
    /// Shape matching every edge of the type and direction
    pub fn new(edge_type: impl Into<String>, direction: Direction) -> Self {
        Self {
            edge_type: edge_type.into(),
            direction,
            kind: ShapeKind::TypeDirection,
        }
    }

    /// Query shape: unmentioned properties are not constrained
    pub fn wildcard(edge_type: impl Into<String>, direction: Direction) -> Self {
        Self {
            edge_type: edge_type.into(),
            direction,
            kind: ShapeKind::Wildcard(BTreeMap::new()),
        }
    }

    /// Exact shape: unmentioned properties must be absent
    pub fn literal(edge_type: impl Into<String>, direction: Direction) -> Self {
        Self {
            edge_type: edge_type.into(),
            direction,
            kind: ShapeKind::Literal(BTreeMap::new()),
        }
    }

    /// Literal shape of a concrete edge with already extracted properties
    pub fn of_edge(
        edge_type: impl Into<String>,
        direction: Direction,
        properties: BTreeMap<String, String>,
    ) -> Self {
        let values = properties
            .into_iter()
            .map(|(k, v)| (k, PropertyValue::Exactly(v)))
            .collect();
        Self {
            edge_type: edge_type.into(),
            direction,
            kind: ShapeKind::Literal(values),
        }
    }

    /// Add a concrete property constraint.
    ///
    /// A type/direction-only shape becomes a wildcard shape.
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_value(key.into(), PropertyValue::Exactly(value.into()))
    }

    /// Add an "any value" constraint for the key
    pub fn with_any(self, key: impl Into<String>) -> Self {
        self.with_value(key.into(), PropertyValue::Any)
    }

    pub(crate) fn with_value(mut self, key: String, value: PropertyValue) -> Self {
        match &mut self.kind {
            ShapeKind::TypeDirection => {
                let mut values = BTreeMap::new();
                values.insert(key, value);
                self.kind = ShapeKind::Wildcard(values);
            }
            ShapeKind::Wildcard(values) | ShapeKind::Literal(values) => {
                values.insert(key, value);
            }
        }
        self
    }

    pub fn edge_type(&self) -> &str {
        &self.edge_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Explicitly mentioned properties, if the shape has a property pattern
    pub fn properties(&self) -> Option<&BTreeMap<String, PropertyValue>> {
        match &self.kind {
            ShapeKind::TypeDirection => None,
            ShapeKind::Wildcard(values) | ShapeKind::Literal(values) => Some(values),
        }
    }

    pub fn value(&self, key: &str) -> Option<&PropertyValue> {
        self.properties().and_then(|values| values.get(key))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ShapeKind::Literal(_))
    }

    /// Keys carrying a concrete value
    pub fn concrete_keys(&self) -> impl Iterator<Item = &str> {
        self.properties()
            .into_iter()
            .flat_map(|values| values.iter())
            .filter(|(_, v)| !v.is_any())
            .map(|(k, _)| k.as_str())
    }

    /// Same edge type and same stored direction
    pub fn same_type_and_direction(&self, other: &Shape) -> bool {
        self.edge_type == other.edge_type && self.direction == other.direction
    }

    pub(crate) fn constraint(&self, key: &str) -> Constraint<'_> {
        match &self.kind {
            ShapeKind::TypeDirection => Constraint::Any,
            ShapeKind::Wildcard(values) => match values.get(key) {
                Some(PropertyValue::Exactly(v)) => Constraint::Exactly(v),
                _ => Constraint::Any,
            },
            ShapeKind::Literal(values) => match values.get(key) {
                Some(PropertyValue::Exactly(v)) => Constraint::Exactly(v),
                Some(PropertyValue::Any) => Constraint::Any,
                None => Constraint::Absent,
            },
        }
    }

    /// Does `self`, used as a query, count an edge (or cache entry) of shape
    /// `candidate`? Direction is compared leniently: a query for BOTH counts
    /// every direction and a self-loop counts for every query direction.
    pub fn matches(&self, candidate: &Shape) -> bool {
        self.edge_type == candidate.edge_type
            && self.direction.accepts(candidate.direction)
            && generality::properties_cover(self, candidate)
    }

    /// Could some edge match both `self` (a query) and `candidate`?
    pub fn overlaps(&self, candidate: &Shape) -> bool {
        self.edge_type == candidate.edge_type
            && self.direction.accepts(candidate.direction)
            && !generality::properties_disjoint(self, candidate)
    }

    /// Flat string form, independent of the order properties were added in
    pub fn serialize(&self, separator: &str) -> String {
        let mut out = String::with_capacity(32);
        out.push_str(&self.edge_type);
        out.push_str(separator);
        out.push_str(self.direction.as_str());

        let (tag, values) = match &self.kind {
            ShapeKind::TypeDirection => return out,
            ShapeKind::Wildcard(values) => (WILDCARD_TAG, values),
            ShapeKind::Literal(values) => (LITERAL_TAG, values),
        };

        out.push_str(separator);
        out.push_str(tag);
        for (key, value) in values {
            out.push_str(separator);
            out.push_str(key);
            out.push_str(separator);
            out.push_str(value.as_serialized());
        }
        out
    }

    /// Inverse of [`Shape::serialize`]
    pub fn parse(s: &str, separator: &str) -> Result<Self> {
        let mut parts = s.split(separator);

        let edge_type = match parts.next() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(RelcountError::InvalidFormat(format!("missing edge type in '{}'", s))),
        };

        let direction = parts
            .next()
            .and_then(Direction::parse)
            .ok_or_else(|| RelcountError::InvalidFormat(format!("missing or unknown direction in '{}'", s)))?;

        let literal = match parts.next() {
            None => return Ok(Self::new(edge_type, direction)),
            Some(WILDCARD_TAG) => false,
            Some(LITERAL_TAG) => true,
            Some(other) => {
                return Err(RelcountError::InvalidFormat(format!(
                    "unknown property semantics '{}' in '{}'",
                    other, s
                )))
            }
        };

        let mut values = BTreeMap::new();
        while let Some(key) = parts.next() {
            let value = parts.next().ok_or_else(|| {
                RelcountError::InvalidFormat(format!("property '{}' has no value in '{}'", key, s))
            })?;
            if values.insert(key.to_string(), PropertyValue::from_serialized(value)).is_some() {
                return Err(RelcountError::InvalidFormat(format!("duplicate property '{}' in '{}'", key, s)));
            }
        }

        let kind = if literal {
            ShapeKind::Literal(values)
        } else {
            ShapeKind::Wildcard(values)
        };
        Ok(Self {
            edge_type,
            direction,
            kind,
        })
    }

    /// Attached key: `prefix + separator + serialized shape`
    pub fn to_key(&self, prefix: &str, separator: &str) -> String {
        format!("{}{}{}", prefix, separator, self.serialize(separator))
    }

    /// Inverse of [`Shape::to_key`]
    pub fn from_key(key: &str, prefix: &str, separator: &str) -> Result<Self> {
        let rest = key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(separator))
            .ok_or_else(|| RelcountError::InvalidFormat(format!("'{}' does not start with '{}{}'", key, prefix, separator)))?;
        Self::parse(rest, separator)
    }

    /// Check that serializing with `separator` round-trips
    pub fn validate(&self, separator: &str) -> Result<()> {
        if self.edge_type.is_empty() {
            return Err(RelcountError::InvalidShape("edge type must not be empty".into()));
        }
        if self.edge_type.contains(separator) {
            return Err(RelcountError::InvalidShape(format!(
                "edge type '{}' contains separator '{}'",
                self.edge_type, separator
            )));
        }
        for (key, value) in self.properties().into_iter().flatten() {
            if key.contains(separator) {
                return Err(RelcountError::InvalidShape(format!(
                    "property key '{}' contains separator '{}'",
                    key, separator
                )));
            }
            if let PropertyValue::Exactly(v) = value {
                if v.contains(separator) || v == ANY_VALUE {
                    return Err(RelcountError::InvalidShape(format!(
                        "value '{}' of property '{}' is reserved or contains separator '{}'",
                        v, key, separator
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize("#"))
    }
}
