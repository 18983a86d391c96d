//! `infer` handler

use crate::args::InferArgs;
use crate::context::{CliContext, OutputFormat};
use crate::output::*;
use serde_json::json;
use spanfuse::SpanfuseError;
use spanfuse::config::InferenceConfig;
use spanfuse::io::{read_json, write_json};
use spanfuse::model::Articles;
use spanfuse::pipeline::{CommandPredictor, RawPredictor};
use std::path::Path;

pub async fn handle_infer(args: InferArgs, ctx: &CliContext) -> spanfuse::Result<()> {
    let inference = tagger_config(&ctx.config.inference, args.tagger_command.as_deref())?;
    let model_id = args
        .model_id
        .clone()
        .unwrap_or_else(|| model_id_from_checkpoint(&args.checkpoint_path));

    let articles: Articles = read_json(&args.input_path)?;

    let pb = inference_progress_bar(ctx.output_format);
    let mut predictor = CommandPredictor::new(inference);
    if let Some(bar) = pb.clone() {
        predictor = predictor.with_progress(move |event| update_progress(&bar, event));
    }

    let raw = predictor
        .predict(&model_id, &args.checkpoint_path, articles)
        .await;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let raw = raw?;

    write_json(&args.output_path, &raw, &ctx.config.output)?;

    let spans: usize = raw.values().map(|doc| doc.pred_entities.len()).sum();
    if ctx.output_format == OutputFormat::Json {
        let summary = json!({
            "action": "infer",
            "model": model_id,
            "path": args.output_path.display().to_string(),
            "documents": raw.len(),
            "spans": spans,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        println!(
            "{}",
            format_success(&format!(
                "infer ({model_id}): {} documents, {spans} spans -> {}",
                raw.len(),
                args.output_path.display()
            ))
        );
    }
    Ok(())
}

/// Apply a `--tagger-command` override, split on whitespace.
pub fn tagger_config(
    base: &InferenceConfig,
    command: Option<&str>,
) -> spanfuse::Result<InferenceConfig> {
    let mut inference = base.clone();
    if let Some(command) = command {
        let mut parts = command.split_whitespace().map(str::to_string);
        inference.program = parts.next().ok_or_else(|| {
            SpanfuseError::Configuration("--tagger-command must not be empty".to_string())
        })?;
        inference.args = parts.collect();
    }
    Ok(inference)
}

/// Last path component of the checkpoint, e.g. `checkpoints/model_4` -> `model_4`.
pub fn model_id_from_checkpoint(checkpoint: &Path) -> String {
    checkpoint
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("model")
        .to_string()
}
