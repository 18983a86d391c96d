//! Configuration builder.
//!
//! This module provides a builder pattern API for creating configurations.

use super::{Result, models::*, validation};
use crate::ensemble::{MissingDocumentPolicy, PeerPolicy, RoutingPlan, SpanMatch};
use crate::pipeline::PipelineConfig;
use crate::rules::RuleSpec;
use crate::thresholds::UnknownLabelPolicy;
use std::path::Path;

/// Builder for creating SpanfuseConfig instances.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: SpanfuseConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self {
            config: SpanfuseConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SpanfuseConfig) -> Self {
        Self { config }
    }

    /// Set the log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set the log format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    /// Also write logs to a file.
    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.logging.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Escape non-ASCII characters in written artifacts.
    pub fn with_ascii_output(mut self, ascii: bool) -> Self {
        self.config.output.ascii = ascii;
        self
    }

    /// Command used to launch the tagger.
    pub fn with_tagger_command(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.config.inference.program = program.into();
        self.config.inference.args = args;
        self
    }

    /// Labels requested from the tagger.
    pub fn with_entity_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.inference.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Policy for labels absent from a threshold table.
    pub fn with_unknown_label_policy(mut self, policy: UnknownLabelPolicy) -> Self {
        self.config.thresholds.unknown_labels = policy;
        self
    }

    /// Map a tagger label to the label written in evaluation format.
    pub fn with_label_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config
            .thresholds
            .label_aliases
            .insert(from.into().to_lowercase(), to.into());
        self
    }

    /// What counts as the same span in the combiners.
    pub fn with_span_match(mut self, span_match: SpanMatch) -> Self {
        self.config.ensemble.span_match = span_match;
        self
    }

    /// Behavior for documents missing from one combiner input.
    pub fn with_missing_documents(mut self, policy: MissingDocumentPolicy) -> Self {
        self.config.ensemble.missing_documents = policy;
        self
    }

    /// Routing plan for the recall/precision combiner.
    pub fn with_recall_precision_plan(mut self, plan: RoutingPlan) -> Self {
        self.config.ensemble.recall_precision = plan;
        self
    }

    /// Policy for the peer combiner.
    pub fn with_peer_policy(mut self, policy: PeerPolicy) -> Self {
        self.config.ensemble.peers = policy;
        self
    }

    /// Routing plan for the ensemble-of-ensembles combiner.
    pub fn with_ensembles_plan(mut self, plan: RoutingPlan) -> Self {
        self.config.ensemble.ensembles = plan;
        self
    }

    /// Replace the postprocessing rule list.
    pub fn with_rules(mut self, rules: Vec<RuleSpec>) -> Self {
        self.config.rules.rules = rules;
        self
    }

    /// Set the pipeline definition used by `spanfuse run`.
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.config.pipeline = pipeline;
        self
    }

    /// Quiet configuration for tests and embedding.
    pub fn minimal() -> Self {
        Self::new().with_log_level(LogLevel::Warn)
    }

    /// Build the configuration, validating it in the process.
    pub fn build(self) -> Result<SpanfuseConfig> {
        validation::validate_config(&self.config)?;

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
