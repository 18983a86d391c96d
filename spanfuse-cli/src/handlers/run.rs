//! `run` handler

use crate::args::RunArgs;
use crate::context::CliContext;
use crate::output::*;
use spanfuse::SpanfuseError;
use spanfuse::pipeline::{CommandPredictor, Pipeline, PipelineConfig};
use std::collections::BTreeSet;

pub async fn handle_run(args: RunArgs, ctx: &CliContext) -> spanfuse::Result<()> {
    let mut config = ctx.config.clone();
    if args.reuse_raw {
        config.pipeline.reuse_raw = true;
    }
    if !args.branches.is_empty() {
        select_branches(&mut config.pipeline, &args.branches)?;
    }

    let pb = inference_progress_bar(ctx.output_format);
    let mut predictor = CommandPredictor::new(config.inference.clone());
    if let Some(bar) = pb.clone() {
        predictor = predictor.with_progress(move |event| update_progress(&bar, event));
    }

    let result = Pipeline::new(&config, predictor).run().await;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let report = result?;

    print_report(&report, ctx.output_format);
    Ok(())
}

/// Keep only the requested branches and the earlier branches they read.
pub fn select_branches(pipeline: &mut PipelineConfig, wanted: &[String]) -> spanfuse::Result<()> {
    let known: BTreeSet<&str> = pipeline.branches.iter().map(|b| b.name.as_str()).collect();
    if let Some(missing) = wanted.iter().find(|name| !known.contains(name.as_str())) {
        return Err(SpanfuseError::Configuration(format!(
            "unknown branch '{missing}'"
        )));
    }

    let mut needed: BTreeSet<String> = wanted.iter().cloned().collect();
    for branch in pipeline.branches.iter().rev() {
        if needed.contains(&branch.name) {
            for input in branch.combine.inputs() {
                if known.contains(input) {
                    needed.insert(input.to_string());
                }
            }
        }
    }

    pipeline.branches.retain(|b| needed.contains(&b.name));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spanfuse::pipeline::{BranchKind, BranchSpec};

    fn branch(name: &str, combine: BranchKind) -> BranchSpec {
        BranchSpec {
            name: name.to_string(),
            combine,
            apply_rules: true,
            publish: true,
            output: None,
        }
    }

    fn pipeline() -> PipelineConfig {
        PipelineConfig {
            branches: vec![
                branch(
                    "ensemble_2",
                    BranchKind::Peers {
                        first: "m4".to_string(),
                        second: "m5".to_string(),
                    },
                ),
                branch(
                    "ensemble_3",
                    BranchKind::RecallPrecision {
                        recall: "m1".to_string(),
                        precision: "m2".to_string(),
                        tiebreak: "m3".to_string(),
                    },
                ),
                branch(
                    "ensemble_of_ensembles",
                    BranchKind::Ensembles {
                        primary: "ensemble_3".to_string(),
                        secondary: "ensemble_2".to_string(),
                    },
                ),
                branch("single", BranchKind::Single { model: "m1".to_string() }),
            ],
            ..PipelineConfig::default()
        }
    }

    fn names(pipeline: &PipelineConfig) -> Vec<&str> {
        pipeline.branches.iter().map(|b| b.name.as_str()).collect()
    }

    #[test]
    fn selection_pulls_in_dependencies_in_order() {
        let mut config = pipeline();
        select_branches(&mut config, &["ensemble_of_ensembles".to_string()]).unwrap();
        assert_eq!(
            names(&config),
            vec!["ensemble_2", "ensemble_3", "ensemble_of_ensembles"]
        );
    }

    #[test]
    fn selection_of_leaf_branch_keeps_only_it() {
        let mut config = pipeline();
        select_branches(&mut config, &["single".to_string()]).unwrap();
        assert_eq!(names(&config), vec!["single"]);
    }

    #[test]
    fn unknown_branch_is_an_error() {
        let mut config = pipeline();
        let err = select_branches(&mut config, &["nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert_eq!(config.branches.len(), 4);
    }
}
