//! Span extension over trailing keywords ("aspirin" -> "aspirin treatment").

use super::PostprocessingRule;
use crate::model::{DocumentRecord, char_len, char_slice};
use crate::{Result, SpanfuseError};
use regex::Regex;

pub(crate) const DEFAULT_LOOKAHEAD: usize = 20;

/// Extends a span when the text right after it is a space, optional further
/// whitespace, and then one of `words` followed by punctuation, whitespace or
/// the end of the inspected window.
#[derive(Debug, Clone)]
pub struct SuffixExtension {
    labels: Vec<String>,
    lookahead: usize,
    pattern: Regex,
}

impl SuffixExtension {
    /// `labels` empty applies the rule to every label.
    pub fn new(labels: Vec<String>, words: Vec<String>, lookahead: usize) -> Result<Self> {
        if words.is_empty() || words.iter().any(|w| w.trim().is_empty()) {
            return Err(SpanfuseError::Configuration(
                "extend_suffix needs at least one non-empty word".to_string(),
            ));
        }
        if lookahead == 0 {
            return Err(SpanfuseError::Configuration(
                "extend_suffix lookahead must be positive".to_string(),
            ));
        }

        let alternatives = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"^({alternatives})([.,;:!?\s]|$)"))
            .map_err(|e| SpanfuseError::Configuration(format!("invalid extend_suffix words: {e}")))?;

        Ok(Self {
            labels,
            lookahead,
            pattern,
        })
    }

    fn applies_to(&self, label: &str) -> bool {
        self.labels.is_empty() || self.labels.iter().any(|l| l == label)
    }

    /// New exclusive end offset, if the span should grow.
    fn extended_end(&self, text: &str, end_idx: usize) -> Option<usize> {
        let end_pos = end_idx + 1;
        let text_len = char_len(text);
        if end_pos >= text_len {
            return None;
        }

        let window = char_slice(text, end_pos, (end_pos + self.lookahead).min(text_len))?;
        let after_space = window.strip_prefix(' ')?;
        let rest = after_space.trim_start();
        let word = self.pattern.captures(rest)?.get(1)?.as_str();

        let skipped = char_len(after_space) - char_len(rest);
        Some(end_pos + 1 + skipped + char_len(word))
    }
}

impl PostprocessingRule for SuffixExtension {
    fn process(&self, record: &mut DocumentRecord) -> usize {
        let Some(metadata) = record.metadata.as_ref() else {
            return 0;
        };

        let mut extended = 0;
        for entity in record
            .entities
            .iter_mut()
            .filter(|e| self.applies_to(&e.label))
        {
            let text = metadata.segment_text(entity.location);
            let Some(new_end) = self.extended_end(text, entity.end_idx) else {
                continue;
            };
            let Some(span) = char_slice(text, entity.start_idx, new_end) else {
                continue;
            };

            tracing::debug!(
                from = %entity.text_span,
                to = %span,
                location = %entity.location,
                "extended span"
            );
            entity.text_span = span.to_string();
            entity.end_idx = new_end - 1;
            extended += 1;
        }
        extended
    }

    fn name(&self) -> &str {
        "extend_suffix"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentMetadata, Entity, Location};

    fn rule(labels: &[&str], words: &[&str]) -> SuffixExtension {
        SuffixExtension::new(
            labels.iter().map(|s| s.to_string()).collect(),
            words.iter().map(|s| s.to_string()).collect(),
            DEFAULT_LOOKAHEAD,
        )
        .unwrap()
    }

    fn doc(title: &str, entity: Entity) -> DocumentRecord {
        let metadata = DocumentMetadata {
            title: title.to_string(),
            abstract_text: String::new(),
            annotator: None,
            extra: Default::default(),
        };
        DocumentRecord::new(metadata, vec![entity])
    }

    fn title_entity(start: usize, end: usize, text: &str, label: &str) -> Entity {
        Entity {
            start_idx: start,
            end_idx: end,
            location: Location::Title,
            text_span: text.to_string(),
            label: label.to_string(),
            score: Some(0.5),
            source: None,
        }
    }

    #[test]
    fn extends_over_plural_before_punctuation() {
        let mut record = doc(
            "Probiotic interventions, a review",
            title_entity(0, 8, "Probiotic", "dietary supplement"),
        );
        let n = rule(&[], &["intervention", "interventions"]).process(&mut record);
        assert_eq!(n, 1);
        assert_eq!(record.entities[0].text_span, "Probiotic interventions");
        assert_eq!(record.entities[0].end_idx, 22);
    }

    #[test]
    fn tolerates_extra_whitespace_after_the_space() {
        let mut record = doc("Metformin   treatment", title_entity(0, 8, "Metformin", "drug"));
        rule(&["drug"], &["treatment"]).process(&mut record);
        assert_eq!(record.entities[0].text_span, "Metformin   treatment");
        assert_eq!(record.entities[0].end_idx, 20);
    }

    #[test]
    fn needs_a_delimiter_after_the_word() {
        let mut record = doc("Metformin treatmentXYZ", title_entity(0, 8, "Metformin", "drug"));
        assert_eq!(rule(&["drug"], &["treatment"]).process(&mut record), 0);
        assert_eq!(record.entities[0].end_idx, 8);
    }

    #[test]
    fn needs_a_space_right_after_the_span() {
        let mut record = doc("Metformin-treatment", title_entity(0, 8, "Metformin", "drug"));
        assert_eq!(rule(&["drug"], &["treatment"]).process(&mut record), 0);
    }

    #[test]
    fn respects_label_filter() {
        let mut record = doc("Metformin treatment", title_entity(0, 8, "Metformin", "chemical"));
        assert_eq!(rule(&["drug"], &["treatment"]).process(&mut record), 0);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let mut record = doc("β-alanine treatment.", title_entity(0, 8, "β-alanine", "drug"));
        rule(&["drug"], &["treatment"]).process(&mut record);
        assert_eq!(record.entities[0].text_span, "β-alanine treatment");
        assert_eq!(record.entities[0].end_idx, 18);
    }

    #[test]
    fn reapplying_is_a_no_op_once_no_keyword_follows() {
        let extend = rule(&["drug"], &["treatment"]);
        let mut record = doc("Aspirin treatment.", title_entity(0, 6, "Aspirin", "drug"));
        assert_eq!(extend.process(&mut record), 1);
        let once = record.clone();
        assert_eq!(extend.process(&mut record), 0);
        assert_eq!(record, once);
    }

    #[test]
    fn each_application_consumes_one_repeated_keyword() {
        let extend = rule(&["drug"], &["treatment"]);
        let mut record = doc(
            "Aspirin treatment treatment",
            title_entity(0, 6, "Aspirin", "drug"),
        );
        assert_eq!(extend.process(&mut record), 1);
        assert_eq!(record.entities[0].text_span, "Aspirin treatment");
        assert_eq!(record.entities[0].end_idx, 16);

        assert_eq!(extend.process(&mut record), 1);
        assert_eq!(record.entities[0].text_span, "Aspirin treatment treatment");
        assert_eq!(record.entities[0].end_idx, 26);

        assert_eq!(extend.process(&mut record), 0);
    }

    #[test]
    fn rejects_empty_word_list() {
        assert!(SuffixExtension::new(vec![], vec![], 20).is_err());
        assert!(SuffixExtension::new(vec![], vec!["x".to_string()], 0).is_err());
    }
}
