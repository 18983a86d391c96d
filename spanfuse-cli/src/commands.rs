//! Command enum definitions

use crate::args::*;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Display version information
    Version,

    /// Tag articles with one checkpoint and write raw predictions
    Infer(InferArgs),

    /// Apply a threshold table and convert to evaluation format
    Threshold(ThresholdArgs),

    /// Combine recall, precision and tie-break predictions
    #[command(
        name = "combine-recall-precision",
        long_about = r#"
Combine three prediction files into one.

The recall file is the base. Classes are then routed in from the other two
files according to `[ensemble.recall_precision]`:
  • replace     drop the base's class and any overlapping span, take the donor's
  • overwrite   drop base spans overlapping the donor's, take the donor's
  • substitute  drop the base's class, take the donor's

Donors are named `precision` (--precision_preds) and `tiebreak` (--model_3_preds).
"#
    )]
    CombineRecallPrecision(CombineRecallPrecisionArgs),

    /// Merge two peer prediction files
    #[command(name = "combine-peers")]
    CombinePeers(CombinePeersArgs),

    /// Merge two ensemble outputs
    #[command(name = "combine-ensembles")]
    CombineEnsembles(CombineEnsemblesArgs),

    /// Apply the postprocessing rules
    Rules(RulesArgs),

    /// Remove metadata and scores from submission files in place
    Strip(StripArgs),

    /// Run the configured pipeline end to end
    #[command(long_about = r#"
Run every branch of the `[pipeline]` configuration section.

Each model a branch needs is tagged once, filtered through its threshold
table and written to `<work_dir>/thresholded/`. Branches then run in order:
combine, apply rules, write. Published branch outputs are stripped last.
The first failing stage stops the run.
"#)]
    Run(RunArgs),

    /// Print the effective configuration
    Config,

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}
