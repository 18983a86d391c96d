//! Declarative description of a multi-branch run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A checkpoint to run, and which threshold table applies to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSpec {
    pub checkpoint: PathBuf,
    /// Key into [`PipelineConfig::threshold_tables`]
    pub thresholds: String,
}

/// How a branch builds its prediction set. Every input names either a model
/// or an earlier branch; a branch input contributes that branch's combined
/// output before rules are applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchKind {
    /// One model, no ensembling.
    Single { model: String },
    /// Recall base corrected from precision and tie-break sources.
    RecallPrecision {
        recall: String,
        precision: String,
        tiebreak: String,
    },
    /// Two peer sources.
    Peers { first: String, second: String },
    /// Classes routed from `primary` into `secondary`.
    Ensembles { primary: String, secondary: String },
}

impl BranchKind {
    /// Names this branch reads, in argument order.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            BranchKind::Single { model } => vec![model.as_str()],
            BranchKind::RecallPrecision {
                recall,
                precision,
                tiebreak,
            } => vec![recall.as_str(), precision.as_str(), tiebreak.as_str()],
            BranchKind::Peers { first, second } => vec![first.as_str(), second.as_str()],
            BranchKind::Ensembles { primary, secondary } => {
                vec![primary.as_str(), secondary.as_str()]
            }
        }
    }
}

fn default_true() -> bool {
    true
}

/// One output of the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchSpec {
    pub name: String,
    pub combine: BranchKind,
    /// Run the postprocessing rules on the combined set
    #[serde(default = "default_true")]
    pub apply_rules: bool,
    /// Write into the output directory (and strip it) rather than the work directory
    #[serde(default = "default_true")]
    pub publish: bool,
    /// Explicit output path; defaults to `<dir>/<name>.json`
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// The `[pipeline]` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Articles to tag (PMID -> title/abstract/...)
    pub input: PathBuf,
    /// Raw and thresholded intermediates go here
    pub work_dir: PathBuf,
    /// Published branch outputs go here
    pub output_dir: PathBuf,
    /// Reuse raw predictions already present in the work directory
    pub reuse_raw: bool,
    /// Strip bookkeeping from published outputs
    pub strip_outputs: bool,
    /// Threshold table id -> file
    pub threshold_tables: BTreeMap<String, PathBuf>,
    /// Model id -> checkpoint and threshold table
    pub models: BTreeMap<String, ModelSpec>,
    /// Branches, run in order
    pub branches: Vec<BranchSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("articles.json"),
            work_dir: PathBuf::from("predictions"),
            output_dir: PathBuf::from(crate::strip::DEFAULT_SUBMISSION_DIR),
            reuse_raw: false,
            strip_outputs: true,
            threshold_tables: BTreeMap::new(),
            models: BTreeMap::new(),
            branches: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn raw_path(&self, model: &str) -> PathBuf {
        self.work_dir.join("raw").join(format!("{model}.json"))
    }

    pub fn thresholded_path(&self, model: &str) -> PathBuf {
        self.work_dir.join("thresholded").join(format!("{model}.json"))
    }

    pub fn output_path(&self, branch: &BranchSpec) -> PathBuf {
        if let Some(path) = &branch.output {
            return path.clone();
        }
        let dir: &Path = if branch.publish {
            &self.output_dir
        } else {
            &self.work_dir
        };
        dir.join(format!("{}.json", branch.name))
    }

    /// Models referenced by at least one branch, directly.
    pub fn used_models(&self) -> BTreeSet<&str> {
        self.branches
            .iter()
            .flat_map(|branch| branch.combine.inputs())
            .filter(|name| self.models.contains_key(*name))
            .collect()
    }

    /// Check that every reference resolves.
    pub fn validate(&self) -> Result<(), String> {
        for (id, model) in &self.models {
            if model.checkpoint.as_os_str().is_empty() {
                return Err(format!("model '{id}' has no checkpoint"));
            }
            if !self.threshold_tables.contains_key(&model.thresholds) {
                return Err(format!(
                    "model '{id}' uses unknown threshold table '{}'",
                    model.thresholds
                ));
            }
        }

        let mut earlier: BTreeSet<&str> = BTreeSet::new();
        for branch in &self.branches {
            if branch.name.trim().is_empty() {
                return Err("branch names must not be empty".to_string());
            }
            if self.models.contains_key(&branch.name) {
                return Err(format!(
                    "branch '{}' has the same name as a model",
                    branch.name
                ));
            }
            for input in branch.combine.inputs() {
                if !self.models.contains_key(input) && !earlier.contains(input) {
                    return Err(format!(
                        "branch '{}' reads '{}', which is neither a model nor an earlier branch",
                        branch.name, input
                    ));
                }
            }
            if !earlier.insert(&branch.name) {
                return Err(format!("duplicate branch name '{}'", branch.name));
            }
        }

        Ok(())
    }
}
