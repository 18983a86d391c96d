//! Prediction data model.
//!
//! Two shapes flow through the pipeline. The tagger writes [`RawPredictions`]:
//! articles annotated with spans whose offsets index the joined
//! `title + " " + abstract` text with exclusive ends. Every later stage works
//! on a [`PredictionSet`] in evaluation format, where offsets are relative to
//! one segment and `end_idx` is inclusive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Input articles keyed by document id (PMID).
pub type Articles = BTreeMap<String, Article>;

/// Raw tagger output keyed by document id.
pub type RawPredictions = BTreeMap<String, RawDocument>;

/// Evaluation-format predictions keyed by document id.
pub type PredictionSet = BTreeMap<String, DocumentRecord>;

/// An article to tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Bibliographic fields (author, journal, year, ...) carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Article {
    /// Text the raw offsets index into.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.title, self.abstract_text)
    }
}

/// Which part of an article a raw span was tagged in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    #[serde(rename = "t")]
    Title,
    #[serde(rename = "a")]
    Abstract,
}

impl Segment {
    pub fn location(self) -> Location {
        match self {
            Segment::Title => Location::Title,
            Segment::Abstract => Location::Abstract,
        }
    }
}

/// A span as produced by the tagger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSpan {
    pub start_idx: usize,
    /// Exclusive.
    pub end_idx: usize,
    pub tag: Segment,
    pub text_span: String,
    pub entity_label: String,
    pub score: f64,
}

/// An article together with the spans the tagger found in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDocument {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub pred_entities: Vec<RawSpan>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawDocument {
    pub fn from_article(article: Article, pred_entities: Vec<RawSpan>) -> Self {
        Self {
            title: article.title,
            abstract_text: article.abstract_text,
            pred_entities,
            extra: article.extra,
        }
    }

    pub fn full_text(&self) -> String {
        format!("{} {}", self.title, self.abstract_text)
    }
}

/// Segment of a document an evaluation-format entity lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Title,
    Abstract,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Title => "title",
            Location::Abstract => "abstract",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled span in evaluation format.
///
/// `score` and `source` are bookkeeping carried between stages; the metadata
/// stripper removes them before submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub start_idx: usize,
    /// Inclusive.
    pub end_idx: usize,
    pub location: Location,
    pub text_span: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Entity {
    /// Identity used for deduplication.
    pub fn key(&self) -> SpanKey<'_> {
        SpanKey {
            location: self.location,
            start: self.start_idx,
            end: self.end_idx,
            label: &self.label,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label == label
    }

    /// Score with missing values ranked lowest.
    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

/// `(location, start, end, label)` tuple identifying a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanKey<'a> {
    pub location: Location,
    pub start: usize,
    pub end: usize,
    pub label: &'a str,
}

/// Article text and bibliographic data attached to a prediction record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DocumentMetadata {
    /// Text of the given segment.
    pub fn segment_text(&self, location: Location) -> &str {
        match location {
            Location::Title => &self.title,
            Location::Abstract => &self.abstract_text,
        }
    }
}

/// Predictions for one document in evaluation format.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<Vec<serde_json::Value>>,
}

impl DocumentRecord {
    pub fn new(metadata: DocumentMetadata, entities: Vec<Entity>) -> Self {
        Self {
            metadata: Some(metadata),
            entities,
            relations: Some(Vec::new()),
        }
    }

    /// An empty record that keeps the donor's metadata.
    pub fn shell_of(other: &DocumentRecord) -> Self {
        Self {
            metadata: other.metadata.clone(),
            entities: Vec::new(),
            relations: Some(Vec::new()),
        }
    }
}

/// Slice `text` by character offsets `[start, end)`.
///
/// Offsets throughout the pipeline count Unicode scalar values, not bytes.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let from = indices.nth(start)?;
    let to = if end == start {
        from
    } else {
        indices.nth(end - start - 1)?
    };
    Some(&text[from..to])
}

/// Length of `text` in characters.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Total number of entities across a prediction set.
pub fn entity_count(set: &PredictionSet) -> usize {
    set.values().map(|record| record.entities.len()).sum()
}

/// Check the shape of every entity in a prediction set read from disk.
///
/// Offsets must be ordered (`start_idx <= end_idx`, the end being inclusive)
/// and scores, where present, must lie in `[0, 1]`. Spans running past their
/// segment text are left to the `drop_invalid_spans` rule.
pub fn validate_set(set: &PredictionSet) -> crate::Result<()> {
    for (document_id, record) in set {
        for entity in &record.entities {
            if entity.start_idx > entity.end_idx {
                return Err(crate::SpanfuseError::malformed(
                    document_id,
                    format!(
                        "entity '{}' starts at {} after its end {}",
                        entity.text_span, entity.start_idx, entity.end_idx
                    ),
                ));
            }
            if let Some(score) = entity.score
                && !(0.0..=1.0).contains(&score)
            {
                return Err(crate::SpanfuseError::malformed(
                    document_id,
                    format!("score {score} of '{}' is outside [0, 1]", entity.text_span),
                ));
            }
        }
    }
    Ok(())
}
