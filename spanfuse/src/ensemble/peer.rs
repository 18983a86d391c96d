//! Symmetric merging of two peer prediction sets.

use super::{RoutingPlan, SpanMatch};
use crate::model::{DocumentRecord, Entity, PredictionSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// How two peer models are merged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeerStrategy {
    /// Symmetric union; conflicting spans resolved by precedence.
    #[default]
    Union,
    /// Route classes from the second model into the first with `routing`.
    Routed,
}

/// Peer combiner policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PeerPolicy {
    pub strategy: PeerStrategy,
    /// Used only with [`PeerStrategy::Routed`]; the donor is named `second`.
    pub routing: RoutingPlan,
}

impl Default for PeerPolicy {
    fn default() -> Self {
        Self {
            strategy: PeerStrategy::Union,
            routing: RoutingPlan::peers_default(),
        }
    }
}

impl PeerPolicy {
    pub fn routed(routing: RoutingPlan) -> Self {
        Self {
            strategy: PeerStrategy::Routed,
            routing,
        }
    }
}

/// Precedence between two spans: `Less` means `a` wins.
///
/// Higher score first, then location, start, end, label, text and source in
/// ascending order. Only fully identical spans compare `Equal`.
fn precedence(a: &Entity, b: &Entity) -> Ordering {
    b.score_or_zero()
        .total_cmp(&a.score_or_zero())
        .then_with(|| a.location.cmp(&b.location))
        .then_with(|| a.start_idx.cmp(&b.start_idx))
        .then_with(|| a.end_idx.cmp(&b.end_idx))
        .then_with(|| a.label.cmp(&b.label))
        .then_with(|| a.text_span.cmp(&b.text_span))
        .then_with(|| a.source.cmp(&b.source))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    First,
    Second,
}

/// Union of two peer sets.
///
/// Spans are visited in precedence order; a span is accepted unless an already
/// accepted span from the other side matches it. Spans from the same side never
/// suppress each other, so combining with an empty set is the identity, and the
/// accepted set does not depend on argument order. Surviving spans keep their
/// input order, first side before second.
pub fn peer_union(
    first: &PredictionSet,
    second: &PredictionSet,
    span_match: SpanMatch,
) -> PredictionSet {
    let documents: BTreeSet<&String> = first.keys().chain(second.keys()).collect();
    let empty: Vec<Entity> = Vec::new();

    documents
        .into_iter()
        .map(|document| {
            let a = first.get(document);
            let b = second.get(document);
            let a_entities = a.map(|r| &r.entities).unwrap_or(&empty);
            let b_entities = b.map(|r| &r.entities).unwrap_or(&empty);

            let entities = merge_document(a_entities, b_entities, span_match);
            let record = match a.or(b) {
                Some(record) => DocumentRecord {
                    metadata: record.metadata.clone(),
                    entities,
                    relations: record.relations.clone(),
                },
                None => DocumentRecord {
                    entities,
                    ..DocumentRecord::default()
                },
            };
            (document.clone(), record)
        })
        .collect()
}

fn merge_document(a: &[Entity], b: &[Entity], span_match: SpanMatch) -> Vec<Entity> {
    let mut candidates: Vec<(Side, usize, &Entity)> = a
        .iter()
        .enumerate()
        .map(|(i, e)| (Side::First, i, e))
        .chain(b.iter().enumerate().map(|(i, e)| (Side::Second, i, e)))
        .collect();
    candidates.sort_by(|x, y| precedence(x.2, y.2));

    let mut accepted: Vec<(Side, usize, &Entity)> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let (side, _, entity) = candidate;
        let blocked = accepted
            .iter()
            .any(|(other_side, _, other)| *other_side != side && span_match.matches(entity, other));
        if !blocked {
            accepted.push(candidate);
        }
    }

    accepted.sort_by_key(|(side, index, _)| (*side, *index));
    accepted.into_iter().map(|(_, _, e)| e.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::test_support::*;
    use crate::model::Location;

    fn sorted(set: &PredictionSet) -> Vec<(String, Vec<(usize, usize, String)>)> {
        set.iter()
            .map(|(doc, record)| {
                let mut spans: Vec<_> = record
                    .entities
                    .iter()
                    .map(|e| (e.start_idx, e.end_idx, e.label.clone()))
                    .collect();
                spans.sort();
                (doc.clone(), spans)
            })
            .collect()
    }

    #[test]
    fn union_with_empty_is_identity() {
        let a = set(vec![("doc1", vec![abs(0, 4, "ORG", 0.7)])]);
        let empty = PredictionSet::new();

        assert_eq!(peer_union(&a, &empty, SpanMatch::Overlap), a);
        assert_eq!(peer_union(&empty, &a, SpanMatch::Overlap), a);
    }

    #[test]
    fn identity_keeps_same_side_overlaps() {
        let a = set(vec![(
            "doc1",
            vec![abs(0, 10, "gene", 0.7), abs(5, 8, "chemical", 0.9)],
        )]);
        let out = peer_union(&a, &PredictionSet::new(), SpanMatch::Overlap);
        assert_eq!(out["doc1"].entities.len(), 2);
    }

    #[test]
    fn higher_confidence_wins_overlap() {
        let a = set(vec![("doc1", vec![abs(0, 6, "drug", 0.6)])]);
        let b = set(vec![("doc1", vec![abs(2, 9, "chemical", 0.8)])]);

        let out = peer_union(&a, &b, SpanMatch::Overlap);
        assert_eq!(labels(&out, "doc1"), vec!["chemical"]);
    }

    #[test]
    fn identical_spans_collapse_to_one() {
        let a = set(vec![("doc1", vec![abs(0, 6, "drug", 0.6)])]);
        let out = peer_union(&a, &a.clone(), SpanMatch::Overlap);
        assert_eq!(out["doc1"].entities.len(), 1);
    }

    #[test]
    fn union_is_commutative_up_to_order() {
        let a = set(vec![
            (
                "doc1",
                vec![
                    abs(0, 6, "drug", 0.6),
                    abs(10, 14, "gene", 0.9),
                    entity(Location::Title, 0, 3, "food", 0.5),
                ],
            ),
            ("doc2", vec![abs(1, 2, "animal", 0.4)]),
        ]);
        let b = set(vec![
            (
                "doc1",
                vec![
                    abs(2, 9, "chemical", 0.6),
                    abs(12, 20, "gene", 0.5),
                    abs(30, 31, "human", 0.2),
                ],
            ),
            ("doc3", vec![abs(0, 1, "bacteria", 0.99)]),
        ]);

        let ab = peer_union(&a, &b, SpanMatch::Overlap);
        let ba = peer_union(&b, &a, SpanMatch::Overlap);
        assert_eq!(sorted(&ab), sorted(&ba));
        assert_eq!(ab.len(), 3);
    }

    #[test]
    fn chain_of_overlaps_keeps_coverage() {
        // b1 overlaps both a1 and a2; a2 outranks b1, so b1 is dropped and a1
        // survives because nothing accepted from the other side overlaps it.
        let a = set(vec![(
            "doc1",
            vec![abs(0, 5, "gene", 0.3), abs(8, 12, "gene", 0.9)],
        )]);
        let b = set(vec![("doc1", vec![abs(4, 9, "gene", 0.5)])]);

        let out = peer_union(&a, &b, SpanMatch::Overlap);
        let starts: Vec<_> = out["doc1"].entities.iter().map(|e| e.start_idx).collect();
        assert_eq!(starts, vec![0, 8]);
    }
}
