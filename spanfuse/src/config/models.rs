//! Configuration model definitions.
//!
//! This module contains the configuration structures for all spanfuse components.

use crate::ensemble::{MissingDocumentPolicy, PeerPolicy, RoutingPlan, SpanMatch};
use crate::pipeline::PipelineConfig;
use crate::rules::RuleSpec;
use crate::thresholds::UnknownLabelPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration structure for spanfuse.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SpanfuseConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Shape of the JSON artifacts we write
    pub output: OutputConfig,

    /// Tagger process configuration
    pub inference: InferenceConfig,

    /// Threshold filtering and normalization
    pub thresholds: ThresholdConfig,

    /// Ensemble policies for the three combiner variants
    pub ensemble: EnsembleConfig,

    /// Postprocessing rules, applied in order
    pub rules: RulesConfig,

    /// Multi-branch pipeline driven by `spanfuse run`
    pub pipeline: PipelineConfig,
}

/// JSON output style.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Escape non-ASCII characters as `\uXXXX`
    pub ascii: bool,

    /// Spaces per indentation level
    pub indent: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ascii: true,
            indent: 2,
        }
    }
}

/// Entity classes the competition tagger is asked for.
pub const DEFAULT_ENTITY_LABELS: &[&str] = &[
    "anatomical location",
    "animal",
    "biomedical technique",
    "bacteria",
    "chemical",
    "dietary supplement",
    "ddf",
    "drug",
    "food",
    "gene",
    "human",
    "microbiome",
    "statistical technique",
];

/// How to launch the external tagger.
///
/// The process is started once per checkpoint as
/// `<program> <args...> <checkpoint_flag> <checkpoint>` and then speaks one
/// JSON request/response per line on stdin/stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Executable to run
    pub program: String,

    /// Arguments placed before the checkpoint flag
    pub args: Vec<String>,

    /// Flag used to pass the checkpoint path
    pub checkpoint_flag: String,

    /// Labels requested from the tagger
    pub labels: Vec<String>,

    /// Minimum score the tagger should report; per-class thresholds come later
    pub min_score: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["scripts/gliner_tagger.py".to_string()],
            checkpoint_flag: "--checkpoint_path".to_string(),
            labels: DEFAULT_ENTITY_LABELS.iter().map(|s| s.to_string()).collect(),
            min_score: 0.01,
        }
    }
}

/// Threshold filtering and label normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// What to do with predictions whose label has no threshold
    pub unknown_labels: UnknownLabelPolicy,

    /// Lower-case tagger label -> label written to the evaluation format
    pub label_aliases: BTreeMap<String, String>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let mut label_aliases = BTreeMap::new();
        label_aliases.insert("ddf".to_string(), "DDF".to_string());
        Self {
            unknown_labels: UnknownLabelPolicy::Drop,
            label_aliases,
        }
    }
}

/// Ensemble combiner policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// What counts as the same span when pruning overlaps
    pub span_match: SpanMatch,

    /// Behavior when a document is absent from one input
    pub missing_documents: MissingDocumentPolicy,

    /// Variant 1: recall base, precision and tie-break donors
    pub recall_precision: RoutingPlan,

    /// Variant 2: two peer models
    pub peers: PeerPolicy,

    /// Variant 3: two ensemble outputs
    pub ensembles: RoutingPlan,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            span_match: SpanMatch::Overlap,
            missing_documents: MissingDocumentPolicy::TreatAsEmpty,
            recall_precision: RoutingPlan::recall_precision_default(),
            peers: PeerPolicy::default(),
            ensembles: RoutingPlan::ensembles_default(),
        }
    }
}

/// Ordered postprocessing rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub rules: Vec<RuleSpec>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rules: RuleSpec::default_order(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,

    /// Log format
    pub format: LogFormat,

    /// File to log to (if any)
    pub file: Option<PathBuf>,

    /// Whether to log to stderr
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Default,
            file: None,
            stderr: true,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,

    /// Debug level
    Debug,

    /// Info level
    Info,

    /// Warn level
    Warn,

    /// Error level
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default format
    Default,

    /// JSON format
    Json,

    /// Compact format
    Compact,

    /// Pretty format
    Pretty,

    /// Colored single-line format with local timestamps
    Development,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(LogFormat::Default),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "development" | "dev" => Ok(LogFormat::Development),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}
