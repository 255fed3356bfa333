//! Ranking of candidate generalizations during compaction

use std::collections::{BTreeMap, BTreeSet};

use crate::shape::generality::is_more_general_or_equal;
use crate::shape::{Constraint, Shape};

/// Entries of one (type, direction) group with their counts
pub type Group = BTreeMap<Shape, i64>;

/// Orders candidate generalizations of a group, best first.
///
/// The compactor applies the first candidate that keeps the group a partition
/// and merges at least two entries, so a strategy only decides preference.
pub trait GeneralizationStrategy: Send + Sync {
    fn rank(&self, group: &Group, candidates: Vec<Shape>) -> Vec<Shape>;

    fn name(&self) -> &'static str;
}

/// Keys `candidate` turns into ANY
fn generalized_keys(candidate: &Shape) -> impl Iterator<Item = &str> {
    candidate
        .properties()
        .into_iter()
        .flatten()
        .filter(|(_, v)| v.is_any())
        .map(|(k, _)| k.as_str())
}

/// Distinct constraints (concrete values and absence) of `key` among `entries`
fn distinct_constraints<'a, I>(entries: I, key: &str) -> usize
where
    I: Iterator<Item = &'a Shape>,
{
    let values: BTreeSet<Option<&str>> = entries
        .filter_map(|s| match s.constraint(key) {
            Constraint::Any => None,
            Constraint::Exactly(v) => Some(Some(v)),
            Constraint::Absent => Some(None),
        })
        .collect();
    values.len()
}

/// Prefers the candidate absorbing the most entries, then the one removing the
/// most distinct values, then the smallest serialized form.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaxAbsorption;

impl GeneralizationStrategy for MaxAbsorption {
    fn rank(&self, group: &Group, candidates: Vec<Shape>) -> Vec<Shape> {
        let mut scored: Vec<(usize, usize, String, Shape)> = candidates
            .into_iter()
            .map(|candidate| {
                let absorbed: Vec<&Shape> = group
                    .keys()
                    .filter(|entry| is_more_general_or_equal(&candidate, entry))
                    .collect();
                let removed: usize = generalized_keys(&candidate)
                    .map(|key| distinct_constraints(absorbed.iter().copied(), key))
                    .sum();
                (absorbed.len(), removed, candidate.serialize("#"), candidate)
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then_with(|| a.2.cmp(&b.2)));
        scored.into_iter().map(|(_, _, _, shape)| shape).collect()
    }

    fn name(&self) -> &'static str {
        "max-absorption"
    }
}

/// Prefers candidates whose constrained keys stay specific while ANY keys
/// already carry a lot of variety or wildcard mass in the group.
///
/// Per key the score is 1 when the candidate keeps it concrete, otherwise
/// `(wildcard mass + distinct values) / (group degree + 1)`; the candidate's
/// score is the mean over its keys plus one.
#[derive(Debug, Default, Clone, Copy)]
pub struct AverageCardinality;

impl AverageCardinality {
    fn score(group: &Group, candidate: &Shape, degree: i64) -> f64 {
        let Some(values) = candidate.properties() else {
            return 0.0;
        };

        let mut total = 1.0;
        for (key, value) in values {
            if !value.is_any() {
                total += 1.0;
                continue;
            }
            let wildcard_mass: i64 = group
                .iter()
                .filter(|(entry, _)| matches!(entry.constraint(key), Constraint::Any))
                .map(|(_, count)| *count)
                .sum();
            let distinct = distinct_constraints(group.keys(), key) as i64;
            total += (wildcard_mass + distinct) as f64 / (degree + 1) as f64;
        }

        total / (values.len() + 1) as f64
    }
}

impl GeneralizationStrategy for AverageCardinality {
    fn rank(&self, group: &Group, candidates: Vec<Shape>) -> Vec<Shape> {
        let degree: i64 = group.values().sum();
        let mut scored: Vec<(f64, String, Shape)> = candidates
            .into_iter()
            .map(|candidate| {
                let score = Self::score(group, &candidate, degree);
                (score, candidate.serialize("#"), candidate)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, _, shape)| shape).collect()
    }

    fn name(&self) -> &'static str {
        "average-cardinality"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Direction;

    fn follows() -> Shape {
        Shape::literal("FOLLOWS", Direction::Outgoing)
    }

    fn group() -> Group {
        [
            (follows().with("strength", "1").with("since", "2013"), 2),
            (follows().with("strength", "2").with("since", "2013"), 1),
            (follows().with("strength", "3").with("since", "2013"), 1),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_max_absorption_prefers_absorbing_more() {
        let candidates = vec![
            follows().with("strength", "1").with_any("since"),
            follows().with_any("strength").with("since", "2013"),
        ];
        let ranked = MaxAbsorption.rank(&group(), candidates);
        assert_eq!(ranked[0], follows().with_any("strength").with("since", "2013"));
    }

    #[test]
    fn test_max_absorption_ties_broken_by_serialized_form() {
        let group: Group = [(follows().with("a", "1"), 1), (follows().with("b", "1"), 1)]
            .into_iter()
            .collect();
        let candidates = vec![follows().with_any("b"), follows().with_any("a")];
        let ranked = MaxAbsorption.rank(&group, candidates);
        assert_eq!(ranked[0], follows().with_any("a"));
    }

    #[test]
    fn test_average_cardinality_prefers_varied_key() {
        let candidates = vec![
            follows().with("strength", "1").with_any("since"),
            follows().with_any("strength").with("since", "2013"),
        ];
        let ranked = AverageCardinality.rank(&group(), candidates);
        assert_eq!(ranked[0], follows().with_any("strength").with("since", "2013"));
        assert_eq!(AverageCardinality.name(), "average-cardinality");
    }
}
