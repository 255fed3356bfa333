//! Generality partial order over shapes
//!
//! `a` is at least as general as `b` when every edge matching `b` also matches
//! `a`. Shapes of different type or stored direction are never comparable.
//! Generalizing replaces one constrained key with [`PropertyValue::Any`];
//! repeated generalization walks up the order until no constraint is left.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet, VecDeque};

use super::{Constraint, PropertyValue, Shape, ShapeKind};

fn covers(general: Constraint<'_>, specific: Constraint<'_>) -> bool {
    match (general, specific) {
        (Constraint::Any, _) => true,
        (Constraint::Exactly(a), Constraint::Exactly(b)) => a == b,
        (Constraint::Absent, Constraint::Absent) => true,
        _ => false,
    }
}

fn disjoint(a: Constraint<'_>, b: Constraint<'_>) -> bool {
    match (a, b) {
        (Constraint::Exactly(x), Constraint::Exactly(y)) => x != y,
        (Constraint::Exactly(_), Constraint::Absent) | (Constraint::Absent, Constraint::Exactly(_)) => true,
        _ => false,
    }
}

fn mentioned_keys<'a>(a: &'a Shape, b: &'a Shape) -> impl Iterator<Item = &'a str> {
    a.properties()
        .into_iter()
        .chain(b.properties())
        .flat_map(|values| values.keys())
        .map(|k| k.as_str())
}

/// Property part of the generality order, ignoring type and direction
pub(crate) fn properties_cover(general: &Shape, specific: &Shape) -> bool {
    match (general.kind(), specific.kind()) {
        (ShapeKind::TypeDirection, _) => true,
        // unmentioned keys of a wildcard shape may hold anything, a literal one forbids them
        (ShapeKind::Literal(_), ShapeKind::TypeDirection | ShapeKind::Wildcard(_)) => false,
        _ => mentioned_keys(general, specific).all(|k| covers(general.constraint(k), specific.constraint(k))),
    }
}

/// Property part of mutual exclusivity, ignoring type and direction
pub(crate) fn properties_disjoint(a: &Shape, b: &Shape) -> bool {
    mentioned_keys(a, b).any(|k| disjoint(a.constraint(k), b.constraint(k)))
}

/// `a >= b` in the generality order
pub fn is_more_general_or_equal(a: &Shape, b: &Shape) -> bool {
    a.same_type_and_direction(b) && properties_cover(a, b)
}

/// `a > b`: `a` covers every edge of `b` and at least one more
pub fn is_strictly_more_general(a: &Shape, b: &Shape) -> bool {
    is_more_general_or_equal(a, b) && !is_more_general_or_equal(b, a)
}

/// `Greater` when `a` is more general, `None` when incomparable
pub fn compare_generality(a: &Shape, b: &Shape) -> Option<Ordering> {
    match (is_more_general_or_equal(a, b), is_more_general_or_equal(b, a)) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Greater),
        (false, true) => Some(Ordering::Less),
        (false, false) => None,
    }
}

/// No single edge can match both shapes.
///
/// Only shapes sharing type and direction are considered; they are exclusive
/// when they disagree on at least one key (two different concrete values, or a
/// concrete value against a key a literal shape requires to be absent).
pub fn mutually_exclusive(a: &Shape, b: &Shape) -> bool {
    a.same_type_and_direction(b) && properties_disjoint(a, b)
}

/// Shapes exactly one step more general: one per concrete key, in key order
pub fn one_step_more_general(shape: &Shape) -> Vec<Shape> {
    one_step_more_general_within(shape, &BTreeSet::new())
}

/// Like [`one_step_more_general`], but keys from `known_keys` that a literal
/// shape requires to be absent are also candidates for becoming ANY.
///
/// `known_keys` is usually every key seen on sibling shapes of the same type
/// and direction.
pub fn one_step_more_general_within(shape: &Shape, known_keys: &BTreeSet<String>) -> Vec<Shape> {
    let mut keys: BTreeSet<&str> = shape.concrete_keys().collect();
    if shape.is_literal() {
        keys.extend(
            known_keys
                .iter()
                .map(|k| k.as_str())
                .filter(|k| shape.value(k).is_none()),
        );
    }

    keys.into_iter()
        .map(|key| shape.clone().with_value(key.to_string(), PropertyValue::Any))
        .collect()
}

/// Every strictly more general shape reachable by generalization steps
pub fn all_more_general(shape: &Shape) -> Vec<Shape> {
    all_more_general_within(shape, &BTreeSet::new())
}

/// Breadth-first closure of [`one_step_more_general_within`], nearest first.
///
/// Each shape is produced once; the input shape itself is not included.
pub fn all_more_general_within(shape: &Shape, known_keys: &BTreeSet<String>) -> Vec<Shape> {
    let mut seen: HashSet<Shape> = HashSet::new();
    let mut queue = VecDeque::from([shape.clone()]);
    let mut result = Vec::new();

    seen.insert(shape.clone());

    while let Some(current) = queue.pop_front() {
        for generalization in one_step_more_general_within(&current, known_keys) {
            if seen.insert(generalization.clone()) {
                result.push(generalization.clone());
                queue.push_back(generalization);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Direction;
    use proptest::prelude::*;

    fn follows() -> Shape {
        Shape::literal("FOLLOWS", Direction::Outgoing)
    }

    #[test]
    fn test_reflexive() {
        let s = follows().with("strength", "1");
        assert!(is_more_general_or_equal(&s, &s));
        assert_eq!(compare_generality(&s, &s), Some(Ordering::Equal));
    }

    #[test]
    fn test_any_covers_concrete_and_absent() {
        let general = follows().with_any("strength");
        assert!(is_strictly_more_general(&general, &follows().with("strength", "1")));
        assert!(is_strictly_more_general(&general, &follows()));
        assert!(!is_more_general_or_equal(&follows().with("strength", "1"), &general));
    }

    #[test]
    fn test_different_values_incomparable_and_exclusive() {
        let one = follows().with("strength", "1");
        let two = follows().with("strength", "2");
        assert_eq!(compare_generality(&one, &two), None);
        assert!(mutually_exclusive(&one, &two));
    }

    #[test]
    fn test_literal_absent_vs_concrete_exclusive() {
        assert!(mutually_exclusive(&follows(), &follows().with("strength", "1")));
        assert!(!mutually_exclusive(&follows().with_any("strength"), &follows().with("strength", "1")));
    }

    #[test]
    fn test_different_direction_not_comparable() {
        let out = Shape::new("FOLLOWS", Direction::Outgoing);
        let inc = Shape::new("FOLLOWS", Direction::Incoming);
        assert_eq!(compare_generality(&out, &inc), None);
        assert!(!mutually_exclusive(&out, &inc));
    }

    #[test]
    fn test_wildcard_more_general_than_literal() {
        let wildcard = Shape::wildcard("FOLLOWS", Direction::Outgoing).with("strength", "1");
        let literal = follows().with("strength", "1").with("since", "2013");
        assert!(is_strictly_more_general(&wildcard, &literal));
        assert!(!is_more_general_or_equal(&literal, &wildcard));
        assert!(is_more_general_or_equal(&Shape::new("FOLLOWS", Direction::Outgoing), &wildcard));
    }

    #[test]
    fn test_one_step_one_per_concrete_key() {
        let s = follows().with("b", "2").with("a", "1").with_any("c");
        let steps = one_step_more_general(&s);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0], follows().with_any("a").with("b", "2").with_any("c"));
        assert_eq!(steps[1], follows().with("a", "1").with_any("b").with_any("c"));
    }

    #[test]
    fn test_one_step_within_known_keys() {
        let known: BTreeSet<String> = ["strength".to_string()].into_iter().collect();
        let steps = one_step_more_general_within(&follows(), &known);
        assert_eq!(steps, vec![follows().with_any("strength")]);

        // wildcard shapes already accept unmentioned keys
        let query = Shape::wildcard("FOLLOWS", Direction::Outgoing);
        assert!(one_step_more_general_within(&query, &known).is_empty());
    }

    #[test]
    fn test_all_more_general_is_powerset() {
        let s = follows().with("a", "1").with("b", "2").with("c", "3");
        let all = all_more_general(&s);
        assert_eq!(all.len(), 7);
        assert!(all.contains(&follows().with_any("a").with_any("b").with_any("c")));
        assert!(!all.contains(&s));

        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_all_more_general_of_fully_general_is_empty() {
        assert!(all_more_general(&follows().with_any("a")).is_empty());
        assert!(all_more_general(&Shape::new("FOLLOWS", Direction::Outgoing)).is_empty());
    }

    proptest! {
        #[test]
        fn generalizations_cover_their_source(
            values in proptest::collection::btree_map("[a-c]", "[0-2]", 0..4)
        ) {
            let mut shape = follows();
            for (k, v) in &values {
                shape = shape.with(k.clone(), v.clone());
            }
            for general in all_more_general(&shape) {
                prop_assert!(is_strictly_more_general(&general, &shape));
            }
            prop_assert_eq!(all_more_general(&shape).len(), (1usize << values.len()) - 1);
        }

        #[test]
        fn more_general_matches_every_edge_of_specific(
            edge in proptest::collection::btree_map("[a-c]", "[0-2]", 0..4),
            query in proptest::collection::btree_map("[a-c]", "[0-2]", 0..3)
        ) {
            let edge_shape = Shape::of_edge("FOLLOWS", Direction::Outgoing, edge);
            let mut specific = Shape::wildcard("FOLLOWS", Direction::Outgoing);
            for (k, v) in &query {
                specific = specific.with(k.clone(), v.clone());
            }
            if specific.matches(&edge_shape) {
                for general in all_more_general(&specific) {
                    prop_assert!(general.matches(&edge_shape));
                }
            }
        }
    }
}
