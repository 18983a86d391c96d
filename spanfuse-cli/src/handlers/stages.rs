//! Handlers for the single-stage commands: threshold, combine-*, rules

use crate::args::*;
use crate::context::CliContext;
use crate::output::print_set_summary;
use spanfuse::ensemble::{combine_ensembles, combine_peers, combine_recall_precision};
use spanfuse::io::{read_json, read_prediction_set, write_json};
use spanfuse::model::{PredictionSet, RawPredictions};
use spanfuse::pipeline::threshold_stage;
use spanfuse::rules::RuleEngine;
use spanfuse::thresholds::ThresholdTable;
use std::path::Path;

fn finish(action: &str, path: &Path, set: &PredictionSet, ctx: &CliContext) -> spanfuse::Result<()> {
    write_json(path, set, &ctx.config.output)?;
    print_set_summary(action, path, set, ctx.output_format);
    Ok(())
}

pub fn handle_threshold(args: ThresholdArgs, ctx: &CliContext) -> spanfuse::Result<()> {
    let table = ThresholdTable::load(&args.thresholds)?;
    let raw: RawPredictions = read_json(&args.preds)?;
    let set = threshold_stage(raw, &table, &ctx.config.thresholds, args.model_id.as_deref())?;
    finish("threshold", &args.output, &set, ctx)
}

pub fn handle_combine_recall_precision(
    args: CombineRecallPrecisionArgs,
    ctx: &CliContext,
) -> spanfuse::Result<()> {
    let recall = read_prediction_set(&args.recall_preds)?;
    let precision = read_prediction_set(&args.precision_preds)?;
    let tiebreak = read_prediction_set(&args.model_3_preds)?;

    let set = combine_recall_precision(recall, &precision, &tiebreak, &ctx.config.ensemble)?;
    finish("combine-recall-precision", &args.output, &set, ctx)
}

pub fn handle_combine_peers(args: CombinePeersArgs, ctx: &CliContext) -> spanfuse::Result<()> {
    let first = read_prediction_set(&args.first_preds)?;
    let second = read_prediction_set(&args.second_preds)?;

    let set = combine_peers(first, &second, &ctx.config.ensemble)?;
    finish("combine-peers", &args.output, &set, ctx)
}

pub fn handle_combine_ensembles(
    args: CombineEnsemblesArgs,
    ctx: &CliContext,
) -> spanfuse::Result<()> {
    let primary = read_prediction_set(&args.ensemble_1_preds)?;
    let secondary = read_prediction_set(&args.ensemble_2_preds)?;

    let set = combine_ensembles(&primary, secondary, &ctx.config.ensemble)?;
    finish("combine-ensembles", &args.output, &set, ctx)
}

pub fn handle_rules(args: RulesArgs, ctx: &CliContext) -> spanfuse::Result<()> {
    let engine = RuleEngine::from_config(&ctx.config.rules)?;
    tracing::debug!(rules = ?engine.rule_names(), "loaded postprocessing rules");

    let set = read_prediction_set(&args.preds)?;
    let set = engine.apply(set);
    finish("rules", &args.output, &set, ctx)
}
