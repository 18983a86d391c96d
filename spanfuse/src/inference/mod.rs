//! Model inference adapter.
//!
//! The neural tagger lives outside this crate. [`SpanTagger`] is the seam:
//! given a piece of text it returns labelled spans with scores.
//! [`CommandTagger`] talks to a tagger process; [`InferenceRunner`] drives a
//! tagger over a batch of articles and produces [`RawPredictions`].

mod command;

pub use command::CommandTagger;

use crate::model::{Article, Articles, RawDocument, RawPredictions, RawSpan, Segment, char_len};
use crate::{Result, SpanfuseError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A span reported by a tagger, offsets relative to the text it was given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaggedSpan {
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    pub text: String,
    pub label: String,
    pub score: f64,
}

/// Something that can find entities in text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpanTagger: Send + Sync {
    /// Tag one piece of text.
    async fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>>;
}

/// Runs a tagger over titles and abstracts.
#[derive(Debug)]
pub struct InferenceRunner<T> {
    tagger: T,
}

impl<T: SpanTagger> InferenceRunner<T> {
    pub fn new(tagger: T) -> Self {
        Self { tagger }
    }

    pub fn tagger(&self) -> &T {
        &self.tagger
    }

    pub fn into_inner(self) -> T {
        self.tagger
    }

    /// Tag every article.
    pub async fn run(&self, articles: Articles) -> Result<RawPredictions> {
        self.run_with_progress(articles, |_| {}).await
    }

    /// Tag every article, calling `on_document` after each one.
    pub async fn run_with_progress<F>(
        &self,
        articles: Articles,
        mut on_document: F,
    ) -> Result<RawPredictions>
    where
        F: FnMut(&str),
    {
        let total = articles.len();
        let mut predictions = RawPredictions::new();
        let mut spans = 0usize;

        for (document_id, article) in articles {
            let document = self
                .tag_article(article)
                .await
                .map_err(|e| match e {
                    SpanfuseError::Inference(reason) => {
                        SpanfuseError::Inference(format!("document {document_id}: {reason}"))
                    }
                    other => other,
                })?;
            spans += document.pred_entities.len();
            on_document(&document_id);
            predictions.insert(document_id, document);
        }

        tracing::info!(documents = total, spans, "tagged articles");
        Ok(predictions)
    }

    /// Tag the title and abstract separately and merge the spans into the
    /// `title + " " + abstract` offset space, dropping exact repeats.
    pub async fn tag_article(&self, article: Article) -> Result<RawDocument> {
        let title_spans = self.tag_segment(&article.title).await?;
        let abstract_spans = self.tag_segment(&article.abstract_text).await?;
        let shift = char_len(&article.title) + 1;

        let mut seen = HashSet::new();
        let mut pred_entities = Vec::with_capacity(title_spans.len() + abstract_spans.len());
        let segments = [(Segment::Title, 0, title_spans), (Segment::Abstract, shift, abstract_spans)];

        for (tag, offset, spans) in segments {
            for span in spans {
                let start_idx = span.start + offset;
                let end_idx = span.end + offset;
                let key = (
                    start_idx,
                    end_idx,
                    span.text.clone(),
                    span.label.clone(),
                    span.score.to_bits(),
                );
                if !seen.insert(key) {
                    continue;
                }
                pred_entities.push(RawSpan {
                    start_idx,
                    end_idx,
                    tag,
                    text_span: span.text,
                    entity_label: span.label,
                    score: span.score,
                });
            }
        }

        Ok(RawDocument::from_article(article, pred_entities))
    }

    async fn tag_segment(&self, text: &str) -> Result<Vec<TaggedSpan>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let spans = self.tagger.tag(text).await?;
        if let Some(bad) = spans.iter().find(|s| !(0.0..=1.0).contains(&s.score)) {
            return Err(SpanfuseError::Inference(format!(
                "tagger returned score {} for '{}'",
                bad.score, bad.text
            )));
        }
        Ok(spans)
    }
}
