//! Postprocessing rules.
//!
//! A [`RuleEngine`] holds an ordered list of [`PostprocessingRule`]s and runs
//! them one after the other over every document of a prediction set. Later
//! rules see the output of earlier ones. Rules are pure: the same input always
//! yields the same output.

mod cleanup;
mod suffix;

pub use cleanup::{Deduplicate, DropInvalidSpans, ResolveLabelConflicts};
pub use suffix::SuffixExtension;

use crate::config::RulesConfig;
use crate::model::{DocumentRecord, PredictionSet, entity_count};
use crate::{Result, SpanfuseError};
use serde::{Deserialize, Serialize};

/// A deterministic correction applied to one document at a time.
pub trait PostprocessingRule: Send + Sync + std::fmt::Debug {
    /// Rewrite the entities of `record`, returning how many were changed or removed.
    fn process(&self, record: &mut DocumentRecord) -> usize;

    /// Get the name of this rule
    fn name(&self) -> &str;
}

fn default_lookahead() -> usize {
    suffix::DEFAULT_LOOKAHEAD
}

/// Serializable description of a rule, as found in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Remove spans whose offsets are inverted or fall outside their segment.
    DropInvalidSpans,
    /// Extend spans over a trailing keyword such as "treatment".
    ExtendSuffix {
        /// Labels the rule applies to; empty means every label
        #[serde(default)]
        labels: Vec<String>,
        words: Vec<String>,
        /// Characters after the span that are inspected
        #[serde(default = "default_lookahead")]
        lookahead: usize,
    },
    /// Keep one label per identical `(location, start, end)`.
    ResolveLabelConflicts,
    /// Remove repeated `(location, start, end, label)`.
    Deduplicate,
}

impl RuleSpec {
    /// The rules used for the submission runs.
    pub fn default_order() -> Vec<RuleSpec> {
        vec![
            RuleSpec::DropInvalidSpans,
            RuleSpec::ExtendSuffix {
                labels: vec!["drug".to_string()],
                words: vec!["treatment".to_string(), "treatments".to_string()],
                lookahead: suffix::DEFAULT_LOOKAHEAD,
            },
            RuleSpec::ExtendSuffix {
                labels: Vec::new(),
                words: vec!["intervention".to_string(), "interventions".to_string()],
                lookahead: suffix::DEFAULT_LOOKAHEAD,
            },
            RuleSpec::ResolveLabelConflicts,
            RuleSpec::Deduplicate,
        ]
    }

    /// Instantiate the rule.
    pub fn build(&self) -> Result<Box<dyn PostprocessingRule>> {
        let rule: Box<dyn PostprocessingRule> = match self {
            RuleSpec::DropInvalidSpans => Box::new(DropInvalidSpans::new()),
            RuleSpec::ExtendSuffix {
                labels,
                words,
                lookahead,
            } => Box::new(SuffixExtension::new(labels.clone(), words.clone(), *lookahead)?),
            RuleSpec::ResolveLabelConflicts => Box::new(ResolveLabelConflicts::new()),
            RuleSpec::Deduplicate => Box::new(Deduplicate::new()),
        };
        Ok(rule)
    }
}

/// Runs postprocessing rules in order.
#[derive(Debug)]
pub struct RuleEngine {
    rules: Vec<Box<dyn PostprocessingRule>>,
}

impl RuleEngine {
    /// Create a new engine builder
    pub fn builder() -> RuleEngineBuilder {
        RuleEngineBuilder::new()
    }

    /// Build an engine from rule descriptions, preserving their order.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        let rules = specs.iter().map(RuleSpec::build).collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn from_config(config: &RulesConfig) -> Result<Self> {
        Self::from_specs(&config.rules)
    }

    /// Names of the configured rules, in application order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Apply every rule to every document.
    pub fn apply(&self, mut set: PredictionSet) -> PredictionSet {
        for rule in &self.rules {
            let mut changed = 0usize;
            let mut documents_changed = 0usize;
            for record in set.values_mut() {
                let n = rule.process(record);
                if n > 0 {
                    documents_changed += 1;
                }
                changed += n;
            }
            tracing::info!(
                rule = rule.name(),
                changed,
                documents_changed,
                entities = entity_count(&set),
                "applied postprocessing rule"
            );
        }
        set
    }
}

/// Builder for [`RuleEngine`]
#[derive(Debug, Default)]
pub struct RuleEngineBuilder {
    rules: Vec<Box<dyn PostprocessingRule>>,
}

impl RuleEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    pub fn rule(mut self, rule: Box<dyn PostprocessingRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn build(self) -> Result<RuleEngine> {
        if self.rules.is_empty() {
            return Err(SpanfuseError::Configuration(
                "rule engine requires at least one rule".to_string(),
            ));
        }
        Ok(RuleEngine { rules: self.rules })
    }
}
