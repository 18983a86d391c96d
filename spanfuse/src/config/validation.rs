//! Configuration validation utilities.
//!
//! This module provides validation functions for configuration values.

use super::ConfigError;
use super::models::*;
use crate::ensemble::{PRECISION, PRIMARY, PeerStrategy, RoutingPlan, SECOND, TIEBREAK};
use crate::rules::RuleEngine;

/// Deepest indentation accepted for written JSON.
const MAX_INDENT: usize = 16;

/// Validate the entire configuration.
pub fn validate_config(config: &SpanfuseConfig) -> Result<(), ConfigError> {
    validate_output_config(&config.output)?;
    validate_inference_config(&config.inference)?;
    validate_threshold_config(&config.thresholds)?;
    validate_ensemble_config(&config.ensemble)?;

    // Rule specs are only checked by building them
    RuleEngine::from_config(&config.rules)
        .map_err(|e| ConfigError::ValidationError(format!("rules: {e}")))?;

    config
        .pipeline
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("pipeline: {e}")))?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.indent > MAX_INDENT {
        return Err(ConfigError::ValidationError(format!(
            "Output indent must be at most {MAX_INDENT}, got {}",
            config.indent
        )));
    }
    Ok(())
}

fn validate_inference_config(config: &InferenceConfig) -> Result<(), ConfigError> {
    if config.program.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Tagger program cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_flag.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Checkpoint flag cannot be empty".to_string(),
        ));
    }

    if config.labels.is_empty() || config.labels.iter().any(|l| l.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "Entity labels must be a non-empty list of non-empty names".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.min_score) {
        return Err(ConfigError::ValidationError(format!(
            "Minimum tagger score must be in [0, 1], got {}",
            config.min_score
        )));
    }

    Ok(())
}

fn validate_threshold_config(config: &ThresholdConfig) -> Result<(), ConfigError> {
    for (from, to) in &config.label_aliases {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Label alias '{from}' -> '{to}' has an empty side"
            )));
        }
        if *from != from.to_lowercase() {
            return Err(ConfigError::ValidationError(format!(
                "Label alias source '{from}' must be lower case"
            )));
        }
    }
    Ok(())
}

fn validate_ensemble_config(config: &EnsembleConfig) -> Result<(), ConfigError> {
    check_donors("recall_precision", &config.recall_precision, &[PRECISION, TIEBREAK])?;
    check_donors("ensembles", &config.ensembles, &[PRIMARY])?;

    if config.peers.strategy == PeerStrategy::Routed {
        if config.peers.routing.is_empty() {
            return Err(ConfigError::ValidationError(
                "Routed peer strategy needs at least one routing step".to_string(),
            ));
        }
        check_donors("peers", &config.peers.routing, &[SECOND])?;
    }

    Ok(())
}

fn check_donors(plan_name: &str, plan: &RoutingPlan, allowed: &[&str]) -> Result<(), ConfigError> {
    let unknown = plan.unknown_donors(allowed);
    if let Some(donor) = unknown.first() {
        return Err(ConfigError::ValidationError(format!(
            "Routing plan '{plan_name}' names donor '{donor}'; expected one of: {}",
            allowed.join(", ")
        )));
    }

    if let Some(step) = plan.steps.iter().find(|step| step.label.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "Routing plan '{plan_name}' has a step from '{}' with an empty label",
            step.donor
        )));
    }

    Ok(())
}
