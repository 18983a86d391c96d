//! Integration tests for the spanfuse CLI
//!
//! These tests drive the command handlers against files in a temporary
//! directory:
//! - threshold -> combine-peers -> rules -> strip
//! - the recall/precision and ensemble combiners
//! - error reporting for missing inputs

use spanfuse::config::SpanfuseConfig;
use spanfuse::io::{read_json, write_json};
use spanfuse::model::{PredictionSet, RawDocument, RawPredictions, RawSpan, Segment};
use spanfuse_cli::args::*;
use spanfuse_cli::handlers::*;
use spanfuse_cli::{CliContext, OutputFormat};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn test_context() -> CliContext {
    CliContext {
        config: SpanfuseConfig::default(),
        config_path: None,
        output_format: OutputFormat::Json,
    }
}

fn raw_predictions(spans: Vec<(usize, usize, &str, &str, f64)>) -> RawPredictions {
    let title = "Probiotic trial";
    let abstract_text = "Children given lactobacillus treatment had fewer infections.";
    let pred_entities = spans
        .into_iter()
        .map(|(start, end, text, label, score)| RawSpan {
            start_idx: start,
            end_idx: end,
            tag: if start < title.len() {
                Segment::Title
            } else {
                Segment::Abstract
            },
            text_span: text.to_string(),
            entity_label: label.to_string(),
            score,
        })
        .collect();
    RawPredictions::from([(
        "31000001".to_string(),
        RawDocument {
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            pred_entities,
            extra: serde_json::Map::new(),
        },
    )])
}

fn write_fixture(dir: &Path, name: &str, raw: &RawPredictions) -> PathBuf {
    let path = dir.join(name);
    write_json(&path, raw, &Default::default()).unwrap();
    path
}

fn threshold(dir: &Path, ctx: &CliContext, raw: &Path, model: &str) -> PathBuf {
    let output = dir.join(format!("{model}.json"));
    handle_threshold(
        ThresholdArgs {
            preds: raw.to_path_buf(),
            output: output.clone(),
            thresholds: dir.join("thresholds.json"),
            model_id: Some(model.to_string()),
        },
        ctx,
    )
    .unwrap();
    output
}

fn setup() -> (TempDir, CliContext, PathBuf, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let ctx = test_context();

    let thresholds = BTreeMap::from([("bacteria", 0.5), ("ddf", 0.4)]);
    write_json(dir.path().join("thresholds.json"), &thresholds, &Default::default()).unwrap();

    // Abstract offsets are shifted by len("Probiotic trial ") = 16
    let raw_a = raw_predictions(vec![
        (31, 44, "lactobacillus", "bacteria", 0.8),
        (65, 75, "infections", "ddf", 0.3),
    ]);
    let raw_b = raw_predictions(vec![
        (31, 44, "lactobacillus", "bacteria", 0.6),
        (65, 75, "infections", "ddf", 0.7),
    ]);
    let a = write_fixture(dir.path(), "raw_a.json", &raw_a);
    let b = write_fixture(dir.path(), "raw_b.json", &raw_b);

    let a = threshold(dir.path(), &ctx, &a, "a");
    let b = threshold(dir.path(), &ctx, &b, "b");
    (dir, ctx, a, b)
}

#[test]
fn test_threshold_drops_low_scores() {
    let (_dir, _ctx, a, b) = setup();

    let a: PredictionSet = read_json(a).unwrap();
    let b: PredictionSet = read_json(b).unwrap();
    assert_eq!(a["31000001"].entities.len(), 1);
    assert_eq!(b["31000001"].entities.len(), 2);

    let ddf = &b["31000001"].entities[1];
    assert_eq!(ddf.label, "DDF");
    assert_eq!(ddf.source.as_deref(), Some("b"));
}

#[test]
fn test_peers_rules_and_strip() {
    let (dir, ctx, a, b) = setup();
    let combined = dir.path().join("ensemble_2.json");
    let final_dir = dir.path().join("final_predictions");
    let published = final_dir.join("ensemble_2.json");

    handle_combine_peers(
        CombinePeersArgs {
            first_preds: a,
            second_preds: b,
            output: combined.clone(),
        },
        &ctx,
    )
    .unwrap();
    handle_rules(
        RulesArgs {
            preds: combined,
            output: published.clone(),
        },
        &ctx,
    )
    .unwrap();
    handle_strip(StripArgs { path: final_dir }, &ctx).unwrap();

    let text = std::fs::read_to_string(&published).unwrap();
    assert!(text.starts_with("{\n  \""));
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let record = value["31000001"].as_object().unwrap();
    assert_eq!(record.len(), 1);

    let entities = record["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0]["text_span"], "lactobacillus");
    assert_eq!(entities[0]["location"], "abstract");
    assert_eq!(entities[1]["label"], "DDF");
    assert!(entities.iter().all(|e| e.get("score").is_none()));
}

#[test]
fn test_recall_precision_and_ensembles() {
    let (dir, ctx, a, b) = setup();
    let three = dir.path().join("ensemble_3.json");
    let two = dir.path().join("ensemble_2.json");
    let both = dir.path().join("ensemble_of_ensembles.json");

    handle_combine_recall_precision(
        CombineRecallPrecisionArgs {
            recall_preds: a.clone(),
            precision_preds: b.clone(),
            model_3_preds: b.clone(),
            output: three.clone(),
        },
        &ctx,
    )
    .unwrap();
    handle_combine_peers(
        CombinePeersArgs {
            first_preds: a,
            second_preds: b,
            output: two.clone(),
        },
        &ctx,
    )
    .unwrap();
    handle_combine_ensembles(
        CombineEnsemblesArgs {
            ensemble_1_preds: three.clone(),
            ensemble_2_preds: two,
            output: both.clone(),
        },
        &ctx,
    )
    .unwrap();

    // DDF is overwritten from the precision file
    let three: PredictionSet = read_json(three).unwrap();
    let labels: Vec<_> = three["31000001"]
        .entities
        .iter()
        .map(|e| e.label.as_str())
        .collect();
    assert_eq!(labels, vec!["bacteria", "DDF"]);

    let both: PredictionSet = read_json(both).unwrap();
    assert_eq!(both["31000001"].entities.len(), 2);
}

#[test]
fn test_missing_input_is_reported() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context();

    let err = handle_rules(
        RulesArgs {
            preds: dir.path().join("absent.json"),
            output: dir.path().join("out.json"),
        },
        &ctx,
    )
    .unwrap_err();
    assert_eq!(err.code(), "IO_ERROR");
    assert!(!dir.path().join("out.json").exists());

    let err = handle_strip(
        StripArgs {
            path: dir.path().join("nowhere"),
        },
        &ctx,
    )
    .unwrap_err();
    assert!(err.to_string().contains("nowhere"));
}

#[test]
fn test_malformed_prediction_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context();
    let preds = dir.path().join("bad.json");
    let set = serde_json::json!({
        "31000001": {"entities": [{
            "start_idx": 9, "end_idx": 2, "location": "abstract",
            "text_span": "lactobacillus", "label": "bacteria", "score": 0.8
        }]}
    });
    std::fs::write(&preds, set.to_string()).unwrap();

    let err = handle_rules(
        RulesArgs {
            preds: preds.clone(),
            output: dir.path().join("out.json"),
        },
        &ctx,
    )
    .unwrap_err();
    assert_eq!(err.code(), "MALFORMED_RECORD");
    assert!(!dir.path().join("out.json").exists());

    let err = handle_combine_peers(
        CombinePeersArgs {
            first_preds: preds.clone(),
            second_preds: preds,
            output: dir.path().join("peers.json"),
        },
        &ctx,
    )
    .unwrap_err();
    assert_eq!(err.code(), "MALFORMED_RECORD");
}
