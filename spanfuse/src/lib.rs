//! # Spanfuse
//!
//! Batch pipeline for turning raw named-entity predictions from several
//! tagger checkpoints into one submission file per branch.
//!
//! ## Stages
//!
//! - **Inference**: drive an external tagger over titles and abstracts
//!   ([`inference`]).
//! - **Threshold filter**: keep spans that clear their class threshold, then
//!   normalize into evaluation format ([`thresholds`], [`convert`]).
//! - **Ensemble**: merge two or three prediction sets with explicit routing or
//!   peer-union policies ([`ensemble`]).
//! - **Rules**: ordered corrective transforms ([`rules`]).
//! - **Strip**: drop bookkeeping before submission ([`strip`]).
//!
//! [`pipeline`] runs all of the above from a single configuration.
//!
//! ```rust,no_run
//! use spanfuse::prelude::*;
//!
//! fn example() -> Result<()> {
//!     let thresholds = ThresholdTable::load("thresholds/model_1.pkl")?;
//!     let raw: RawPredictions = spanfuse::io::read_json("raw/model_1.json")?;
//!     let filtered = thresholds.filter(raw, UnknownLabelPolicy::Drop);
//!     let set = spanfuse::convert::to_prediction_set(filtered, &ConvertOptions::default())?;
//!     let set = RuleEngine::from_specs(&RuleSpec::default_order())?.apply(set);
//!     spanfuse::io::write_json("preds.json", &set, &OutputConfig::default())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod ensemble;
pub mod inference;
pub mod io;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod rules;
pub mod strip;
pub mod thresholds;

/// The prelude re-exports commonly used types for convenience
pub mod prelude {
    pub use crate::config::{
        ConfigBuilder, ConfigLoader, LogFormat, LogLevel, OutputConfig, SpanfuseConfig,
    };
    pub use crate::convert::ConvertOptions;
    pub use crate::ensemble::{
        MissingDocumentPolicy, PeerPolicy, RoutingPlan, RoutingStep, SpanMatch,
    };
    pub use crate::inference::{CommandTagger, InferenceRunner, SpanTagger, TaggedSpan};
    pub use crate::model::{
        Article, Articles, DocumentMetadata, DocumentRecord, Entity, Location, PredictionSet,
        RawDocument, RawPredictions, RawSpan, Segment,
    };
    pub use crate::rules::{PostprocessingRule, RuleEngine, RuleSpec};
    pub use crate::thresholds::{ThresholdTable, UnknownLabelPolicy};
    pub use crate::{Result, SpanfuseError};
}

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error type for spanfuse operations
#[derive(Debug, thiserror::Error)]
pub enum SpanfuseError {
    /// Configuration error (config file, checkpoint, tagger command)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Threshold table could not be loaded
    #[error("Failed to load threshold table {path}: {reason}")]
    ThresholdTable { path: String, reason: String },

    /// Filesystem error with the path involved
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization error with the path involved
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A prediction record violates the data model
    #[error("Malformed record for document {document}: {reason}")]
    MalformedRecord { document: String, reason: String },

    /// A document is absent from one ensemble input
    #[error("Document {document} is missing from source '{source_name}'")]
    MissingDocument {
        document: String,
        source_name: String,
    },

    /// The tagger failed or produced unusable output
    #[error("Inference error: {0}")]
    Inference(String),

    /// A pipeline stage failed; downstream stages were not run
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<SpanfuseError>,
    },

    /// Logging error
    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LogError),

    /// Other unclassified errors
    #[error("{0}")]
    Other(String),
}

impl SpanfuseError {
    /// Wrap an error with the name of the stage it came from.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        SpanfuseError::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    pub fn malformed(document: impl Into<String>, reason: impl Into<String>) -> Self {
        SpanfuseError::MalformedRecord {
            document: document.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable code, used by the CLI's JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            SpanfuseError::Configuration(_) => "CONFIGURATION_ERROR",
            SpanfuseError::ThresholdTable { .. } => "THRESHOLD_TABLE_ERROR",
            SpanfuseError::Io { .. } => "IO_ERROR",
            SpanfuseError::Json { .. } => "JSON_ERROR",
            SpanfuseError::MalformedRecord { .. } => "MALFORMED_RECORD",
            SpanfuseError::MissingDocument { .. } => "MISSING_DOCUMENT",
            SpanfuseError::Inference(_) => "INFERENCE_ERROR",
            SpanfuseError::Stage { source, .. } => source.code(),
            SpanfuseError::Logging(_) => "LOGGING_ERROR",
            SpanfuseError::Other(_) => "ERROR",
        }
    }
}

impl From<crate::config::ConfigError> for SpanfuseError {
    fn from(err: crate::config::ConfigError) -> Self {
        SpanfuseError::Configuration(err.to_string())
    }
}

/// Result type for spanfuse operations
pub type Result<T> = std::result::Result<T, SpanfuseError>;
