//! Ensemble combiners.
//!
//! Three variants merge prediction sets from different checkpoints:
//!
//! - [`combine_recall_precision`]: a recall-oriented base corrected class by
//!   class from a precision-oriented model and a tie-break model.
//! - [`combine_peers`]: two peer models merged symmetrically (or, if
//!   configured, by routing classes from the second into the first).
//! - [`combine_ensembles`]: two ensemble outputs, with classes routed from the
//!   primary ensemble into the secondary one.
//!
//! All span comparisons go through a [`SpanMatch`], and every variant applies
//! the same [`MissingDocumentPolicy`].

mod peer;
mod routing;

pub use peer::{PeerPolicy, PeerStrategy, peer_union};
pub use routing::{RoutingAction, RoutingPlan, RoutingStep};

use crate::config::EnsembleConfig;
use crate::model::{Entity, PredictionSet, entity_count, validate_set};
use crate::{Result, SpanfuseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Donor name for the precision-oriented model in the recall/precision combiner.
pub const PRECISION: &str = "precision";
/// Donor name for the tie-break model in the recall/precision combiner.
pub const TIEBREAK: &str = "tiebreak";
/// Donor name for the second model in a routed peer combination.
pub const SECOND: &str = "second";
/// Donor name for the primary ensemble in the ensemble-of-ensembles combiner.
pub const PRIMARY: &str = "primary";

/// What counts as "the same span" when two sources disagree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpanMatch {
    /// Same location and intersecting offsets. The test is
    /// `!(a.end <= b.start || b.end <= a.start)` on the stored offsets, so
    /// spans that only share a boundary offset do not match.
    #[default]
    Overlap,
    /// Same location, start and end.
    Exact,
}

impl SpanMatch {
    pub fn matches(self, a: &Entity, b: &Entity) -> bool {
        if a.location != b.location {
            return false;
        }
        match self {
            SpanMatch::Overlap => !(a.end_idx <= b.start_idx || b.end_idx <= a.start_idx),
            SpanMatch::Exact => a.start_idx == b.start_idx && a.end_idx == b.end_idx,
        }
    }
}

/// Behavior when a document appears in some combiner inputs but not others.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingDocumentPolicy {
    /// The absent side contributes no spans for that document.
    #[default]
    TreatAsEmpty,
    /// Abort the combination with a data error.
    Fail,
}

/// Check every input's entities, then that the inputs cover the same
/// documents if the policy demands it.
pub(crate) fn check_coverage(
    policy: MissingDocumentPolicy,
    sources: &[(&str, &PredictionSet)],
) -> Result<()> {
    for (name, set) in sources {
        validate_set(set).map_err(|e| {
            tracing::error!(input = *name, error = %e, "malformed combiner input");
            e
        })?;
    }

    if policy == MissingDocumentPolicy::TreatAsEmpty {
        return Ok(());
    }

    for (name, set) in sources {
        for (other_name, other) in sources {
            if name == other_name {
                continue;
            }
            if let Some(document) = other.keys().find(|doc| !set.contains_key(*doc)) {
                return Err(SpanfuseError::MissingDocument {
                    document: document.clone(),
                    source_name: name.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Variant 1: keep the recall model's spans, corrected by the precision and
/// tie-break models according to `config.recall_precision`.
pub fn combine_recall_precision(
    recall: PredictionSet,
    precision: &PredictionSet,
    tiebreak: &PredictionSet,
    config: &EnsembleConfig,
) -> Result<PredictionSet> {
    check_coverage(
        config.missing_documents,
        &[("recall", &recall), (PRECISION, precision), (TIEBREAK, tiebreak)],
    )?;

    let before = entity_count(&recall);
    let donors = BTreeMap::from([(PRECISION, precision), (TIEBREAK, tiebreak)]);
    let combined = config
        .recall_precision
        .apply(recall, &donors, config.span_match)?;

    tracing::info!(
        variant = "recall_precision",
        documents = combined.len(),
        entities_before = before,
        entities_after = entity_count(&combined),
        "combined predictions"
    );
    Ok(combined)
}

/// Variant 2: merge two peer models according to `config.peers`.
pub fn combine_peers(
    first: PredictionSet,
    second: &PredictionSet,
    config: &EnsembleConfig,
) -> Result<PredictionSet> {
    check_coverage(
        config.missing_documents,
        &[("first", &first), (SECOND, second)],
    )?;

    let combined = match config.peers.strategy {
        PeerStrategy::Union => peer_union(&first, second, config.span_match),
        PeerStrategy::Routed => {
            let donors = BTreeMap::from([(SECOND, second)]);
            config
                .peers
                .routing
                .apply(first, &donors, config.span_match)?
        }
    };

    tracing::info!(
        variant = "peers",
        strategy = ?config.peers.strategy,
        documents = combined.len(),
        entities_after = entity_count(&combined),
        "combined predictions"
    );
    Ok(combined)
}

/// Variant 3: merge two ensemble outputs, routing the classes in
/// `config.ensembles` from the primary ensemble into the secondary one.
pub fn combine_ensembles(
    primary: &PredictionSet,
    secondary: PredictionSet,
    config: &EnsembleConfig,
) -> Result<PredictionSet> {
    check_coverage(
        config.missing_documents,
        &[(PRIMARY, primary), ("secondary", &secondary)],
    )?;

    let before = entity_count(&secondary);
    let donors = BTreeMap::from([(PRIMARY, primary)]);
    let combined = config.ensembles.apply(secondary, &donors, config.span_match)?;

    tracing::info!(
        variant = "ensembles",
        documents = combined.len(),
        entities_before = before,
        entities_after = entity_count(&combined),
        "combined predictions"
    );
    Ok(combined)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::{DocumentMetadata, DocumentRecord, Entity, Location, PredictionSet};

    pub fn entity(location: Location, start: usize, end: usize, label: &str, score: f64) -> Entity {
        Entity {
            start_idx: start,
            end_idx: end,
            location,
            text_span: format!("{label}@{start}"),
            label: label.to_string(),
            score: Some(score),
            source: None,
        }
    }

    pub fn abs(start: usize, end: usize, label: &str, score: f64) -> Entity {
        entity(Location::Abstract, start, end, label, score)
    }

    pub fn set(docs: Vec<(&str, Vec<Entity>)>) -> PredictionSet {
        docs.into_iter()
            .map(|(id, entities)| {
                let metadata = DocumentMetadata {
                    title: String::new(),
                    abstract_text: String::new(),
                    annotator: Some("distant".to_string()),
                    extra: Default::default(),
                };
                (id.to_string(), DocumentRecord::new(metadata, entities))
            })
            .collect()
    }

    pub fn labels(set: &PredictionSet, doc: &str) -> Vec<String> {
        set[doc].entities.iter().map(|e| e.label.clone()).collect()
    }
}
