//! Conversion from raw tagger output to evaluation format.
//!
//! After threshold filtering the raw spans are:
//!
//! 1. validated (offsets inside the span's own segment, score in `[0, 1]`),
//! 2. merged when two spans of the same label and segment touch or are
//!    separated by a single character,
//! 3. rebased to per-segment offsets with inclusive ends,
//! 4. relabelled through the alias table (`ddf` -> `DDF`),
//!
//! and wrapped in [`DocumentRecord`]s carrying the article metadata.

use crate::config::ThresholdConfig;
use crate::model::{
    DocumentMetadata, DocumentRecord, Entity, PredictionSet, RawDocument, RawPredictions, RawSpan,
    Segment, char_len, char_slice,
};
use crate::{Result, SpanfuseError};
use std::collections::BTreeMap;

/// Annotator recorded in the metadata of generated predictions.
pub const DISTANT_ANNOTATOR: &str = "distant";

/// Options for [`to_prediction_set`].
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Lower-case label -> output label
    pub label_aliases: BTreeMap<String, String>,
    /// Model id recorded on each entity
    pub source: Option<String>,
    /// Value for `metadata.annotator`
    pub annotator: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::from_config(&ThresholdConfig::default())
    }
}

impl ConvertOptions {
    pub fn from_config(config: &ThresholdConfig) -> Self {
        Self {
            label_aliases: config.label_aliases.clone(),
            source: None,
            annotator: DISTANT_ANNOTATOR.to_string(),
        }
    }

    /// Record `model_id` as the source of every entity.
    pub fn with_source(mut self, model_id: impl Into<String>) -> Self {
        self.source = Some(model_id.into());
        self
    }

    fn canonical_label(&self, label: &str) -> String {
        self.label_aliases
            .get(&label.to_lowercase())
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }
}

/// Convert filtered raw predictions into a prediction set.
pub fn to_prediction_set(raw: RawPredictions, options: &ConvertOptions) -> Result<PredictionSet> {
    let mut merged_total = 0usize;
    let set = raw
        .into_iter()
        .map(|(document_id, document)| {
            let (record, merged) = convert_document(&document_id, document, options)?;
            merged_total += merged;
            Ok((document_id, record))
        })
        .collect::<Result<PredictionSet>>()?;

    tracing::info!(
        documents = set.len(),
        merged_adjacent = merged_total,
        "converted predictions to evaluation format"
    );
    Ok(set)
}

fn convert_document(
    document_id: &str,
    document: RawDocument,
    options: &ConvertOptions,
) -> Result<(DocumentRecord, usize)> {
    let full_text = document.full_text();
    let full_len = char_len(&full_text);
    let title_len = char_len(&document.title);

    for span in &document.pred_entities {
        validate_raw_span(document_id, span, title_len, full_len)?;
    }

    let before = document.pred_entities.len();
    let spans = merge_adjacent(document.pred_entities, &full_text);
    let merged = before - spans.len();

    let entities = spans
        .into_iter()
        .map(|span| rebase(document_id, span, title_len, options))
        .collect::<Result<Vec<_>>>()?;

    let metadata = DocumentMetadata {
        title: document.title,
        abstract_text: document.abstract_text,
        annotator: Some(options.annotator.clone()),
        extra: document.extra,
    };
    Ok((DocumentRecord::new(metadata, entities), merged))
}

fn validate_raw_span(
    document_id: &str,
    span: &RawSpan,
    title_len: usize,
    full_len: usize,
) -> Result<()> {
    if !(0.0..=1.0).contains(&span.score) {
        return Err(SpanfuseError::malformed(
            document_id,
            format!("score {} of '{}' is outside [0, 1]", span.score, span.text_span),
        ));
    }
    if span.start_idx >= span.end_idx || span.end_idx > full_len {
        return Err(SpanfuseError::malformed(
            document_id,
            format!(
                "span [{}, {}) of '{}' is empty or exceeds the text length {}",
                span.start_idx, span.end_idx, span.text_span, full_len
            ),
        ));
    }

    // The abstract starts after the joining space
    let (lower, upper) = match span.tag {
        Segment::Title => (0, title_len),
        Segment::Abstract => (title_len + 1, full_len),
    };
    if span.start_idx < lower || span.end_idx > upper {
        return Err(SpanfuseError::malformed(
            document_id,
            format!(
                "{} span [{}, {}) of '{}' leaves its segment [{}, {})",
                span.tag.location(),
                span.start_idx,
                span.end_idx,
                span.text_span,
                lower,
                upper
            ),
        ));
    }
    Ok(())
}

/// Merge consecutive spans of the same label and segment that touch or are one
/// character apart. The joining characters come from `full_text`; the merged
/// score is the minimum of the parts.
pub fn merge_adjacent(spans: Vec<RawSpan>, full_text: &str) -> Vec<RawSpan> {
    let mut merged: Vec<RawSpan> = Vec::with_capacity(spans.len());

    for span in spans {
        if let Some(current) = merged.last_mut()
            && current.entity_label == span.entity_label
            && current.tag == span.tag
            && (current.end_idx == span.start_idx || current.end_idx + 1 == span.start_idx)
        {
            let joiner = char_slice(full_text, current.end_idx, span.start_idx).unwrap_or(" ");
            current.text_span.push_str(joiner);
            current.text_span.push_str(&span.text_span);
            current.end_idx = span.end_idx;
            current.score = current.score.min(span.score);
            continue;
        }
        merged.push(span);
    }

    merged
}

fn rebase(
    document_id: &str,
    span: RawSpan,
    title_len: usize,
    options: &ConvertOptions,
) -> Result<Entity> {
    let offset = match span.tag {
        Segment::Title => 0,
        Segment::Abstract => title_len + 1,
    };
    let start = span.start_idx.checked_sub(offset);
    // end_idx > start_idx >= 0 was validated, so end_idx - 1 cannot underflow
    let end = (span.end_idx - 1).checked_sub(offset);

    let (Some(start_idx), Some(end_idx)) = (start, end) else {
        return Err(SpanfuseError::malformed(
            document_id,
            format!(
                "abstract span '{}' starts inside the title (offset {})",
                span.text_span, span.start_idx
            ),
        ));
    };

    Ok(Entity {
        start_idx,
        end_idx,
        location: span.tag.location(),
        text_span: span.text_span,
        label: options.canonical_label(&span.entity_label),
        score: Some(span.score),
        source: options.source.clone(),
    })
}
