//! Command argument structures
//!
//! Long flags keep the snake_case names used by the existing shell scripts
//! (`--checkpoint_path`, `--recall_preds`, ...).

use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct InferArgs {
    /// Directory or file of the tagger checkpoint
    #[arg(long = "checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Articles JSON (PMID -> title/abstract)
    #[arg(long = "input_path")]
    pub input_path: PathBuf,

    /// Where to write raw predictions
    #[arg(long = "output_path")]
    pub output_path: PathBuf,

    /// Tagger command line, overriding `[inference]` (e.g. "python3 scripts/gliner_tagger.py")
    #[arg(long = "tagger-command")]
    pub tagger_command: Option<String>,

    /// Model id recorded in logs (defaults to the checkpoint name)
    #[arg(long = "model-id")]
    pub model_id: Option<String>,
}

#[derive(Args)]
pub struct ThresholdArgs {
    /// Raw predictions from `infer`
    #[arg(long)]
    pub preds: PathBuf,

    /// Where to write the evaluation-format predictions
    #[arg(long)]
    pub output: PathBuf,

    /// Threshold table (.pkl, .json or .toml)
    #[arg(long)]
    pub thresholds: PathBuf,

    /// Model id recorded as the source of each entity
    #[arg(long = "model-id")]
    pub model_id: Option<String>,
}

#[derive(Args)]
pub struct CombineRecallPrecisionArgs {
    /// Recall-oriented predictions (the base)
    #[arg(long = "recall_preds")]
    pub recall_preds: PathBuf,

    /// Precision-oriented predictions
    #[arg(long = "precision_preds")]
    pub precision_preds: PathBuf,

    /// Tie-break predictions
    #[arg(long = "model_3_preds")]
    pub model_3_preds: PathBuf,

    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct CombinePeersArgs {
    #[arg(long = "first_preds")]
    pub first_preds: PathBuf,

    #[arg(long = "second_preds")]
    pub second_preds: PathBuf,

    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct CombineEnsemblesArgs {
    /// Primary ensemble, donor of the routed classes
    #[arg(long = "ensemble_1_preds")]
    pub ensemble_1_preds: PathBuf,

    /// Secondary ensemble, the base
    #[arg(long = "ensemble_2_preds")]
    pub ensemble_2_preds: PathBuf,

    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct RulesArgs {
    /// Predictions in evaluation format
    #[arg(long)]
    pub preds: PathBuf,

    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct StripArgs {
    /// Directory of prediction files, or a single file
    #[arg(default_value = spanfuse::strip::DEFAULT_SUBMISSION_DIR)]
    pub path: PathBuf,
}

#[derive(Args)]
pub struct RunArgs {
    /// Reuse raw predictions already in the work directory
    #[arg(long)]
    pub reuse_raw: bool,

    /// Only run these branches (and what they depend on)
    #[arg(long = "branch")]
    pub branches: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell type
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
