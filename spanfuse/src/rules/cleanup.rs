//! Structural cleanup rules.

use super::PostprocessingRule;
use crate::model::{DocumentRecord, Location, char_len};
use std::collections::{BTreeMap, HashSet};

/// Removes spans with `start > end`, or whose end lies past the segment text.
///
/// The length check needs the record's metadata; records without it are only
/// checked for inverted offsets.
#[derive(Debug, Clone, Default)]
pub struct DropInvalidSpans;

impl DropInvalidSpans {
    pub fn new() -> Self {
        Self
    }
}

impl PostprocessingRule for DropInvalidSpans {
    fn process(&self, record: &mut DocumentRecord) -> usize {
        let lengths = record.metadata.as_ref().map(|metadata| {
            (
                char_len(metadata.segment_text(Location::Title)),
                char_len(metadata.segment_text(Location::Abstract)),
            )
        });

        let before = record.entities.len();
        record.entities.retain(|entity| {
            if entity.start_idx > entity.end_idx {
                return false;
            }
            match lengths {
                Some((title, abstract_len)) => {
                    let len = match entity.location {
                        Location::Title => title,
                        Location::Abstract => abstract_len,
                    };
                    entity.end_idx < len
                }
                None => true,
            }
        });
        before - record.entities.len()
    }

    fn name(&self) -> &str {
        "drop_invalid_spans"
    }
}

/// When several labels claim exactly the same offsets, keep the one with the
/// highest score. Ties go to the label that sorts first.
#[derive(Debug, Clone, Default)]
pub struct ResolveLabelConflicts;

impl ResolveLabelConflicts {
    pub fn new() -> Self {
        Self
    }
}

impl PostprocessingRule for ResolveLabelConflicts {
    fn process(&self, record: &mut DocumentRecord) -> usize {
        let mut winners: BTreeMap<(Location, usize, usize), (f64, &str)> = BTreeMap::new();
        for entity in &record.entities {
            let key = (entity.location, entity.start_idx, entity.end_idx);
            let candidate = (entity.score_or_zero(), entity.label.as_str());
            winners
                .entry(key)
                .and_modify(|best| {
                    let better = candidate.0 > best.0
                        || (candidate.0 == best.0 && candidate.1 < best.1);
                    if better {
                        *best = candidate;
                    }
                })
                .or_insert(candidate);
        }

        let winners: BTreeMap<(Location, usize, usize), String> = winners
            .into_iter()
            .map(|(key, (_, label))| (key, label.to_string()))
            .collect();

        let before = record.entities.len();
        record.entities.retain(|entity| {
            winners
                .get(&(entity.location, entity.start_idx, entity.end_idx))
                .is_none_or(|label| *label == entity.label)
        });
        before - record.entities.len()
    }

    fn name(&self) -> &str {
        "resolve_label_conflicts"
    }
}

/// Keeps the first occurrence of each `(location, start, end, label)`.
#[derive(Debug, Clone, Default)]
pub struct Deduplicate;

impl Deduplicate {
    pub fn new() -> Self {
        Self
    }
}

impl PostprocessingRule for Deduplicate {
    fn process(&self, record: &mut DocumentRecord) -> usize {
        let mut seen = HashSet::new();
        let before = record.entities.len();
        record.entities.retain(|entity| {
            seen.insert((
                entity.location,
                entity.start_idx,
                entity.end_idx,
                entity.label.clone(),
            ))
        });
        before - record.entities.len()
    }

    fn name(&self) -> &str {
        "deduplicate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentMetadata, Entity};

    fn entity(location: Location, start: usize, end: usize, label: &str, score: Option<f64>) -> Entity {
        Entity {
            start_idx: start,
            end_idx: end,
            location,
            text_span: String::new(),
            label: label.to_string(),
            score,
            source: None,
        }
    }

    fn record(entities: Vec<Entity>) -> DocumentRecord {
        let metadata = DocumentMetadata {
            title: "Short".to_string(),
            abstract_text: "A somewhat longer abstract.".to_string(),
            annotator: None,
            extra: Default::default(),
        };
        DocumentRecord::new(metadata, entities)
    }

    #[test]
    fn invalid_spans_are_dropped_per_segment() {
        let mut doc = record(vec![
            entity(Location::Title, 0, 4, "food", None),
            entity(Location::Title, 0, 5, "food", None),
            entity(Location::Abstract, 2, 9, "food", None),
            entity(Location::Abstract, 9, 2, "food", None),
        ]);
        let removed = DropInvalidSpans::new().process(&mut doc);
        assert_eq!(removed, 2);
        let kept: Vec<_> = doc.entities.iter().map(|e| (e.location, e.end_idx)).collect();
        assert_eq!(kept, vec![(Location::Title, 4), (Location::Abstract, 9)]);
    }

    #[test]
    fn without_metadata_only_inverted_spans_go() {
        let mut doc = DocumentRecord {
            metadata: None,
            entities: vec![
                entity(Location::Title, 0, 400, "food", None),
                entity(Location::Title, 5, 4, "food", None),
            ],
            relations: None,
        };
        assert_eq!(DropInvalidSpans::new().process(&mut doc), 1);
        assert_eq!(doc.entities[0].end_idx, 400);
    }

    #[test]
    fn label_conflicts_keep_highest_score() {
        let mut doc = record(vec![
            entity(Location::Abstract, 2, 9, "chemical", Some(0.4)),
            entity(Location::Abstract, 2, 9, "drug", Some(0.7)),
            entity(Location::Title, 2, 9, "chemical", Some(0.4)),
        ]);
        assert_eq!(ResolveLabelConflicts::new().process(&mut doc), 1);
        let labels: Vec<_> = doc.entities.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["drug", "chemical"]);
    }

    #[test]
    fn label_conflict_ties_break_by_label() {
        let mut doc = record(vec![
            entity(Location::Abstract, 2, 9, "gene", None),
            entity(Location::Abstract, 2, 9, "chemical", None),
        ]);
        ResolveLabelConflicts::new().process(&mut doc);
        assert_eq!(doc.entities.len(), 1);
        assert_eq!(doc.entities[0].label, "chemical");
    }

    #[test]
    fn duplicates_collapse_to_first() {
        let mut first = entity(Location::Abstract, 2, 9, "gene", Some(0.9));
        first.source = Some("m1".to_string());
        let mut doc = record(vec![
            first,
            entity(Location::Abstract, 2, 9, "gene", Some(0.3)),
            entity(Location::Title, 2, 9, "gene", Some(0.3)),
        ]);
        assert_eq!(Deduplicate::new().process(&mut doc), 1);
        assert_eq!(doc.entities.len(), 2);
        assert_eq!(doc.entities[0].source.as_deref(), Some("m1"));
    }
}
