use crate::context::OutputFormat;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use serde_json::json;
use spanfuse::SpanfuseError;
use spanfuse::model::{PredictionSet, entity_count};
use spanfuse::pipeline::{InferenceProgress, PipelineReport};
use std::collections::BTreeMap;
use std::path::Path;

pub struct CliColors;

impl CliColors {
    pub fn success() -> Color {
        Color::TrueColor {
            r: 34,
            g: 197,
            b: 94,
        }
    }

    pub fn error() -> Color {
        Color::TrueColor {
            r: 239,
            g: 68,
            b: 68,
        }
    }

    pub fn warning() -> Color {
        Color::TrueColor {
            r: 245,
            g: 158,
            b: 11,
        }
    }

    pub fn info() -> Color {
        Color::TrueColor {
            r: 59,
            g: 130,
            b: 246,
        }
    }

    pub fn label() -> Color {
        Color::TrueColor {
            r: 168,
            g: 85,
            b: 247,
        }
    }

    pub fn muted() -> Color {
        Color::TrueColor {
            r: 148,
            g: 163,
            b: 184,
        }
    }
}

/// Report an error on stderr, as JSON or colored text.
pub fn output_error(error: &SpanfuseError, output_format: OutputFormat) {
    if output_format == OutputFormat::Json {
        let mut error_response = json!({
            "error": true,
            "code": error.code(),
            "message": error.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        let details = match error {
            SpanfuseError::Stage { stage, .. } => Some(json!({ "stage": stage })),
            SpanfuseError::Io { path, .. }
            | SpanfuseError::Json { path, .. }
            | SpanfuseError::ThresholdTable { path, .. } => Some(json!({ "path": path })),
            SpanfuseError::MissingDocument {
                document,
                source_name,
            } => Some(json!({ "document": document, "source": source_name })),
            SpanfuseError::MalformedRecord { document, .. } => {
                Some(json!({ "document": document }))
            }
            _ => None,
        };
        if let Some(details) = details {
            error_response["details"] = details;
        }

        eprintln!(
            "{}",
            serde_json::to_string_pretty(&error_response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        eprintln!("{}", format_error(&error.to_string()));
    }
}

pub fn format_success(msg: &str) -> String {
    format!(
        "{} {}",
        "✓".color(CliColors::success()).bold(),
        msg.color(CliColors::success())
    )
}

pub fn format_error(msg: &str) -> String {
    format!(
        "{} {}",
        "✗".color(CliColors::error()).bold(),
        msg.color(CliColors::error())
    )
}

pub fn format_warning(msg: &str) -> String {
    format!(
        "{} {}",
        "⚠".color(CliColors::warning()).bold(),
        msg.color(CliColors::warning())
    )
}

pub fn format_info(msg: &str) -> String {
    format!(
        "{} {}",
        "ℹ".color(CliColors::info()).bold(),
        msg.color(CliColors::info())
    )
}

/// Entities per label, sorted by label.
pub fn label_counts(set: &PredictionSet) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for record in set.values() {
        for entity in &record.entities {
            *counts.entry(entity.label.as_str()).or_insert(0) += 1;
        }
    }
    counts
}

/// Summarize a written prediction set.
pub fn print_set_summary(action: &str, path: &Path, set: &PredictionSet, format: OutputFormat) {
    let counts = label_counts(set);
    if format == OutputFormat::Json {
        let summary = json!({
            "action": action,
            "path": path.display().to_string(),
            "documents": set.len(),
            "entities": entity_count(set),
            "labels": counts,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }

    println!(
        "{}",
        format_success(&format!(
            "{action}: {} documents, {} entities -> {}",
            set.len(),
            entity_count(set),
            path.display()
        ))
    );
    for (label, count) in counts {
        println!(
            "  {:<24} {}",
            label.color(CliColors::label()),
            count.to_string().color(CliColors::muted())
        );
    }
}

pub fn print_report(report: &PipelineReport, format: OutputFormat) {
    if format == OutputFormat::Json {
        let outputs: Vec<_> = report
            .outputs
            .iter()
            .map(|(name, path)| json!({ "branch": name, "path": path.display().to_string() }))
            .collect();
        let summary = json!({
            "tagged": report.tagged,
            "reused": report.reused,
            "outputs": outputs,
            "stripped": report.stripped.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }

    if !report.reused.is_empty() {
        println!(
            "{}",
            format_info(&format!("Reused raw predictions: {}", report.reused.join(", ")))
        );
    }
    if !report.tagged.is_empty() {
        println!(
            "{}",
            format_info(&format!("Tagged with: {}", report.tagged.join(", ")))
        );
    }
    for (name, path) in &report.outputs {
        let stripped = report.stripped.contains(path);
        println!(
            "{} {:<28} {}{}",
            "✓".color(CliColors::success()).bold(),
            name.color(CliColors::label()),
            path.display(),
            if stripped {
                " (stripped)".color(CliColors::muted()).to_string()
            } else {
                String::new()
            }
        );
    }
}

/// Progress bar for tagging, shown only on an interactive terminal with text output.
pub fn inference_progress_bar(format: OutputFormat) -> Option<ProgressBar> {
    if format == OutputFormat::Json || !std::io::stdout().is_terminal() {
        return None;
    }

    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {msg:>12} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    Some(pb)
}

/// Drive `pb` from tagger progress events.
pub fn update_progress(pb: &ProgressBar, event: InferenceProgress<'_>) {
    match event {
        InferenceProgress::Started { model, documents } => {
            pb.reset();
            pb.set_length(documents as u64);
            pb.set_message(model.to_string());
        }
        InferenceProgress::Document { .. } => pb.inc(1),
        InferenceProgress::Finished { model } => {
            pb.set_message(format!("{model} done"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spanfuse::model::{DocumentRecord, Entity, Location};

    fn entity(label: &str) -> Entity {
        Entity {
            start_idx: 0,
            end_idx: 3,
            location: Location::Title,
            text_span: "text".to_string(),
            label: label.to_string(),
            score: None,
            source: None,
        }
    }

    #[test]
    fn counts_labels_across_documents() {
        let set = PredictionSet::from([
            (
                "1".to_string(),
                DocumentRecord {
                    entities: vec![entity("drug"), entity("food")],
                    ..DocumentRecord::default()
                },
            ),
            (
                "2".to_string(),
                DocumentRecord {
                    entities: vec![entity("drug")],
                    ..DocumentRecord::default()
                },
            ),
        ]);

        let counts = label_counts(&set);
        assert_eq!(counts["drug"], 2);
        assert_eq!(counts["food"], 1);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn progress_events_move_the_bar() {
        let pb = ProgressBar::hidden();
        update_progress(
            &pb,
            InferenceProgress::Started {
                model: "m1",
                documents: 3,
            },
        );
        update_progress(&pb, InferenceProgress::Document { model: "m1" });
        update_progress(&pb, InferenceProgress::Document { model: "m1" });
        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.position(), 2);

        update_progress(
            &pb,
            InferenceProgress::Started {
                model: "m2",
                documents: 5,
            },
        );
        assert_eq!(pb.position(), 0);
        assert_eq!(pb.length(), Some(5));
    }

    #[test]
    fn messages_carry_the_text() {
        colored::control::set_override(false);
        assert_eq!(format_success("done"), "✓ done");
        assert_eq!(format_error("failed"), "✗ failed");
    }
}
