//! Class-scoped routing between prediction sets.

use super::{PRECISION, PRIMARY, SECOND, SpanMatch, TIEBREAK};
use crate::model::{DocumentRecord, Entity, PredictionSet};
use crate::{Result, SpanfuseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a donor's spans of one class enter the base set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingAction {
    /// Drop the base's spans of the class and any base span matching an
    /// incoming span, then append the donor's spans of the class.
    Replace,
    /// Drop base spans matching an incoming span, then append the donor's
    /// spans of the class. Base spans of the class that match nothing survive.
    Overwrite,
    /// Drop the base's spans of the class, then append the donor's.
    Substitute,
}

impl RoutingAction {
    fn clears_label(self) -> bool {
        matches!(self, RoutingAction::Replace | RoutingAction::Substitute)
    }

    fn prunes_matches(self) -> bool {
        matches!(self, RoutingAction::Replace | RoutingAction::Overwrite)
    }
}

/// One routing step: take `label` spans from `donor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutingStep {
    pub action: RoutingAction,
    pub label: String,
    pub donor: String,
}

impl RoutingStep {
    pub fn new(action: RoutingAction, label: impl Into<String>, donor: impl Into<String>) -> Self {
        Self {
            action,
            label: label.into(),
            donor: donor.into(),
        }
    }
}

/// An ordered list of routing steps. Later steps see the output of earlier ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RoutingPlan {
    pub steps: Vec<RoutingStep>,
}

impl RoutingPlan {
    pub fn new(steps: Vec<RoutingStep>) -> Self {
        Self { steps }
    }

    /// Plan used by the three-model submission ensemble.
    pub fn recall_precision_default() -> Self {
        let mut steps = Vec::new();
        for label in ["anatomical location", "animal", "human"] {
            steps.push(RoutingStep::new(RoutingAction::Replace, label, TIEBREAK));
        }
        for label in ["DDF", "biomedical technique", "dietary supplement"] {
            steps.push(RoutingStep::new(RoutingAction::Overwrite, label, PRECISION));
        }
        for label in ["microbiome", "statistical technique"] {
            steps.push(RoutingStep::new(RoutingAction::Substitute, label, PRECISION));
        }
        Self { steps }
    }

    /// Plan that routes the second peer's stronger classes into the first.
    pub fn peers_default() -> Self {
        let steps = [
            "anatomical location",
            "animal",
            "bacteria",
            "biomedical technique",
            "statistical technique",
        ]
        .into_iter()
        .map(|label| RoutingStep::new(RoutingAction::Replace, label, SECOND))
        .collect();
        Self { steps }
    }

    /// Plan used when merging two ensemble outputs.
    pub fn ensembles_default() -> Self {
        let steps = ["anatomical location", "animal", "drug"]
            .into_iter()
            .map(|label| RoutingStep::new(RoutingAction::Replace, label, PRIMARY))
            .collect();
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Donor names referenced by this plan that are not in `allowed`.
    pub fn unknown_donors<'a>(&'a self, allowed: &[&str]) -> Vec<&'a str> {
        self.steps
            .iter()
            .map(|step| step.donor.as_str())
            .filter(|donor| !allowed.contains(donor))
            .collect()
    }

    /// Apply every step in order to `base`.
    pub fn apply(
        &self,
        mut base: PredictionSet,
        donors: &BTreeMap<&str, &PredictionSet>,
        span_match: SpanMatch,
    ) -> Result<PredictionSet> {
        for step in &self.steps {
            let donor = donors.get(step.donor.as_str()).ok_or_else(|| {
                SpanfuseError::Configuration(format!(
                    "routing step for '{}' names unknown donor '{}'",
                    step.label, step.donor
                ))
            })?;
            let moved = apply_step(&mut base, donor, step, span_match);
            tracing::debug!(
                action = ?step.action,
                label = %step.label,
                donor = %step.donor,
                imported = moved,
                "applied routing step"
            );
        }
        Ok(base)
    }
}

fn apply_step(
    base: &mut PredictionSet,
    donor: &PredictionSet,
    step: &RoutingStep,
    span_match: SpanMatch,
) -> usize {
    if step.action.clears_label() {
        for record in base.values_mut() {
            record.entities.retain(|e| !e.has_label(&step.label));
        }
    }

    let mut imported = 0;
    for (document, donor_record) in donor {
        let incoming: Vec<Entity> = donor_record
            .entities
            .iter()
            .filter(|e| e.has_label(&step.label))
            .cloned()
            .collect();
        if incoming.is_empty() {
            continue;
        }

        let record = base
            .entry(document.clone())
            .or_insert_with(|| DocumentRecord::shell_of(donor_record));

        if step.action.prunes_matches() {
            record
                .entities
                .retain(|e| !incoming.iter().any(|other| span_match.matches(e, other)));
        }

        imported += incoming.len();
        record.entities.extend(incoming);
    }
    imported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::test_support::*;

    fn donors<'a>(name: &'a str, set: &'a PredictionSet) -> BTreeMap<&'a str, &'a PredictionSet> {
        BTreeMap::from([(name, set)])
    }

    #[test]
    fn replace_drops_class_and_overlaps() {
        let base = set(vec![(
            "doc1",
            vec![abs(0, 4, "animal", 0.9), abs(10, 20, "gene", 0.9), abs(30, 32, "drug", 0.9)],
        )]);
        let donor = set(vec![("doc1", vec![abs(12, 15, "animal", 0.5)])]);
        let plan = RoutingPlan::new(vec![RoutingStep::new(RoutingAction::Replace, "animal", "d")]);

        let out = plan.apply(base, &donors("d", &donor), SpanMatch::Overlap).unwrap();
        assert_eq!(labels(&out, "doc1"), vec!["drug", "animal"]);
        assert_eq!(out["doc1"].entities[1].start_idx, 12);
    }

    #[test]
    fn overwrite_keeps_unmatched_base_spans_of_class() {
        let base = set(vec![(
            "doc1",
            vec![abs(0, 4, "DDF", 0.9), abs(50, 60, "DDF", 0.9)],
        )]);
        let donor = set(vec![("doc1", vec![abs(1, 3, "DDF", 0.95)])]);
        let plan = RoutingPlan::new(vec![RoutingStep::new(RoutingAction::Overwrite, "DDF", "d")]);

        let out = plan.apply(base, &donors("d", &donor), SpanMatch::Overlap).unwrap();
        let starts: Vec<_> = out["doc1"].entities.iter().map(|e| e.start_idx).collect();
        assert_eq!(starts, vec![50, 1]);
    }

    #[test]
    fn substitute_does_not_prune_other_classes() {
        let base = set(vec![(
            "doc1",
            vec![abs(0, 10, "bacteria", 0.9), abs(20, 25, "microbiome", 0.9)],
        )]);
        let donor = set(vec![("doc1", vec![abs(2, 8, "microbiome", 0.6)])]);
        let plan = RoutingPlan::new(vec![RoutingStep::new(
            RoutingAction::Substitute,
            "microbiome",
            "d",
        )]);

        let out = plan.apply(base, &donors("d", &donor), SpanMatch::Overlap).unwrap();
        assert_eq!(labels(&out, "doc1"), vec!["bacteria", "microbiome"]);
        assert_eq!(out["doc1"].entities[1].start_idx, 2);
    }

    #[test]
    fn exact_match_only_prunes_identical_offsets() {
        let base = set(vec![(
            "doc1",
            vec![abs(0, 4, "gene", 0.9), abs(10, 14, "gene", 0.9)],
        )]);
        let donor = set(vec![("doc1", vec![abs(10, 14, "chemical", 0.7), abs(1, 3, "chemical", 0.7)])]);
        let plan = RoutingPlan::new(vec![RoutingStep::new(
            RoutingAction::Overwrite,
            "chemical",
            "d",
        )]);

        let out = plan.apply(base, &donors("d", &donor), SpanMatch::Exact).unwrap();
        assert_eq!(labels(&out, "doc1"), vec!["gene", "chemical", "chemical"]);
        assert_eq!(out["doc1"].entities[0].start_idx, 0);
    }

    #[test]
    fn unknown_donor_is_a_configuration_error() {
        let plan = RoutingPlan::new(vec![RoutingStep::new(RoutingAction::Replace, "drug", "nope")]);
        let base = set(vec![]);
        let other = set(vec![]);
        let err = plan.apply(base, &donors("d", &other), SpanMatch::Overlap).unwrap_err();
        assert!(matches!(err, SpanfuseError::Configuration(_)));
        assert_eq!(plan.unknown_donors(&["d"]), vec!["nope"]);
    }

    #[test]
    fn default_plans_reference_expected_donors() {
        assert!(RoutingPlan::recall_precision_default()
            .unknown_donors(&[PRECISION, TIEBREAK])
            .is_empty());
        assert!(RoutingPlan::peers_default().unknown_donors(&[SECOND]).is_empty());
        assert!(RoutingPlan::ensembles_default().unknown_donors(&[PRIMARY]).is_empty());
        assert_eq!(RoutingPlan::recall_precision_default().steps.len(), 8);
    }
}
