//! End-to-end orchestration.
//!
//! A run tags the input articles with every model a branch needs, filters
//! each model's raw output through its threshold table, then builds the
//! branches in order: combine, apply rules, write. Published outputs are
//! stripped last. The first failing stage aborts the run; its error is
//! wrapped with the stage name.

mod config;

pub use config::{BranchKind, BranchSpec, ModelSpec, PipelineConfig};

use crate::config::{InferenceConfig, SpanfuseConfig, ThresholdConfig};
use crate::convert::{ConvertOptions, to_prediction_set};
use crate::ensemble::{combine_ensembles, combine_peers, combine_recall_precision};
use crate::inference::{CommandTagger, InferenceRunner};
use crate::io::{read_json, write_json};
use crate::model::{Articles, PredictionSet, RawPredictions};
use crate::rules::RuleEngine;
use crate::strip::strip_file;
use crate::thresholds::ThresholdTable;
use crate::{Result, SpanfuseError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Produces raw predictions for one model.
#[async_trait]
pub trait RawPredictor: Send + Sync {
    async fn predict(
        &self,
        model_id: &str,
        checkpoint: &Path,
        articles: Articles,
    ) -> Result<RawPredictions>;
}

/// Progress notifications from [`CommandPredictor`].
#[derive(Debug, Clone, Copy)]
pub enum InferenceProgress<'a> {
    Started { model: &'a str, documents: usize },
    Document { model: &'a str },
    Finished { model: &'a str },
}

type ProgressCallback = Arc<dyn Fn(InferenceProgress<'_>) + Send + Sync>;

/// [`RawPredictor`] that starts a [`CommandTagger`] per model.
#[derive(Clone)]
pub struct CommandPredictor {
    inference: InferenceConfig,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for CommandPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPredictor")
            .field("inference", &self.inference)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl CommandPredictor {
    pub fn new(inference: InferenceConfig) -> Self {
        Self {
            inference,
            progress: None,
        }
    }

    /// Report progress through `callback`.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(InferenceProgress<'_>) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    fn report(&self, event: InferenceProgress<'_>) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }
}

#[async_trait]
impl RawPredictor for CommandPredictor {
    async fn predict(
        &self,
        model_id: &str,
        checkpoint: &Path,
        articles: Articles,
    ) -> Result<RawPredictions> {
        let tagger = CommandTagger::spawn(&self.inference, checkpoint).await?;
        let runner = InferenceRunner::new(tagger);

        self.report(InferenceProgress::Started {
            model: model_id,
            documents: articles.len(),
        });
        let predictions = runner
            .run_with_progress(articles, |_| {
                self.report(InferenceProgress::Document { model: model_id })
            })
            .await?;
        self.report(InferenceProgress::Finished { model: model_id });

        runner.into_inner().shutdown().await?;
        Ok(predictions)
    }
}

/// Apply a threshold table and convert to evaluation format.
pub fn threshold_stage(
    raw: RawPredictions,
    table: &ThresholdTable,
    config: &ThresholdConfig,
    model_id: Option<&str>,
) -> Result<PredictionSet> {
    let filtered = table.filter(raw, config.unknown_labels);
    let mut options = ConvertOptions::from_config(config);
    if let Some(id) = model_id {
        options = options.with_source(id);
    }
    to_prediction_set(filtered, &options)
}

/// Combine the inputs of one branch.
pub fn combine_branch(
    kind: &BranchKind,
    sets: &BTreeMap<String, PredictionSet>,
    config: &SpanfuseConfig,
) -> Result<PredictionSet> {
    let get = |name: &str| {
        sets.get(name).ok_or_else(|| {
            SpanfuseError::Configuration(format!("no prediction set named '{name}'"))
        })
    };

    match kind {
        BranchKind::Single { model } => Ok(get(model)?.clone()),
        BranchKind::RecallPrecision {
            recall,
            precision,
            tiebreak,
        } => combine_recall_precision(
            get(recall)?.clone(),
            get(precision)?,
            get(tiebreak)?,
            &config.ensemble,
        ),
        BranchKind::Peers { first, second } => {
            combine_peers(get(first)?.clone(), get(second)?, &config.ensemble)
        }
        BranchKind::Ensembles { primary, secondary } => {
            combine_ensembles(get(primary)?, get(secondary)?.clone(), &config.ensemble)
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Models that were tagged in this run (not reused)
    pub tagged: Vec<String>,
    /// Models whose raw predictions were reused
    pub reused: Vec<String>,
    /// Branch name -> written file
    pub outputs: Vec<(String, PathBuf)>,
    /// Files stripped for submission
    pub stripped: Vec<PathBuf>,
}

/// Runs a [`PipelineConfig`].
pub struct Pipeline<'a, P> {
    config: &'a SpanfuseConfig,
    predictor: P,
}

impl<'a, P: RawPredictor> Pipeline<'a, P> {
    pub fn new(config: &'a SpanfuseConfig, predictor: P) -> Self {
        Self { config, predictor }
    }

    fn pipeline(&self) -> &PipelineConfig {
        &self.config.pipeline
    }

    /// Run every branch.
    pub async fn run(&self) -> Result<PipelineReport> {
        let pipeline = self.pipeline();
        pipeline
            .validate()
            .map_err(|e| SpanfuseError::Configuration(e).in_stage("validate"))?;
        if pipeline.branches.is_empty() {
            return Err(SpanfuseError::Configuration(
                "pipeline defines no branches".to_string(),
            ));
        }

        let engine = RuleEngine::from_config(&self.config.rules).map_err(|e| e.in_stage("rules"))?;
        let mut report = PipelineReport::default();
        let mut sets: BTreeMap<String, PredictionSet> = BTreeMap::new();
        let mut tables: BTreeMap<&str, ThresholdTable> = BTreeMap::new();
        let mut articles: Option<Articles> = None;

        for model_id in pipeline.used_models() {
            let spec = &pipeline.models[model_id];

            let raw = self
                .raw_predictions(model_id, spec, &mut articles, &mut report)
                .await
                .map_err(|e| e.in_stage(format!("infer:{model_id}")))?;

            let stage = format!("threshold:{model_id}");
            if !tables.contains_key(spec.thresholds.as_str()) {
                let path = &pipeline.threshold_tables[&spec.thresholds];
                let table = ThresholdTable::load(path).map_err(|e| e.in_stage(&stage))?;
                tables.insert(spec.thresholds.as_str(), table);
            }
            let table = &tables[spec.thresholds.as_str()];
            let set = threshold_stage(raw, table, &self.config.thresholds, Some(model_id))
                .map_err(|e| e.in_stage(&stage))?;
            write_json(pipeline.thresholded_path(model_id), &set, &self.config.output)
                .map_err(|e| e.in_stage(&stage))?;
            sets.insert(model_id.to_string(), set);
        }

        for branch in &pipeline.branches {
            let stage = format!("branch:{}", branch.name);
            let span = tracing::info_span!("branch", name = %branch.name);
            let _entered = span.enter();

            let combined = combine_branch(&branch.combine, &sets, self.config)
                .map_err(|e| e.in_stage(&stage))?;
            let output = if branch.apply_rules {
                engine.apply(combined.clone())
            } else {
                combined.clone()
            };

            let path = pipeline.output_path(branch);
            write_json(&path, &output, &self.config.output).map_err(|e| e.in_stage(&stage))?;
            tracing::info!(path = %path.display(), documents = output.len(), "wrote branch output");

            sets.insert(branch.name.clone(), combined);
            report.outputs.push((branch.name.clone(), path));
        }

        if pipeline.strip_outputs {
            for (name, path) in &report.outputs {
                let published = pipeline
                    .branches
                    .iter()
                    .any(|b| &b.name == name && b.publish);
                if published {
                    strip_file(path, &self.config.output).map_err(|e| e.in_stage("strip"))?;
                    report.stripped.push(path.clone());
                }
            }
        }

        tracing::info!(
            branches = report.outputs.len(),
            tagged = report.tagged.len(),
            reused = report.reused.len(),
            "pipeline finished"
        );
        Ok(report)
    }

    async fn raw_predictions(
        &self,
        model_id: &str,
        spec: &ModelSpec,
        articles: &mut Option<Articles>,
        report: &mut PipelineReport,
    ) -> Result<RawPredictions> {
        let pipeline = self.pipeline();
        let raw_path = pipeline.raw_path(model_id);

        if pipeline.reuse_raw && raw_path.exists() {
            tracing::info!(model = model_id, path = %raw_path.display(), "reusing raw predictions");
            report.reused.push(model_id.to_string());
            return read_json(&raw_path);
        }

        if articles.is_none() {
            *articles = Some(read_json(&pipeline.input)?);
        }
        let input = articles.clone().unwrap_or_default();

        let raw = self
            .predictor
            .predict(model_id, &spec.checkpoint, input)
            .await?;
        write_json(&raw_path, &raw, &self.config.output)?;
        report.tagged.push(model_id.to_string());
        Ok(raw)
    }
}
