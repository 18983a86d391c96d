//! Per-class confidence thresholds.
//!
//! A [`ThresholdTable`] maps entity labels to the minimum score a raw
//! prediction needs to be kept. Labels are compared case-insensitively. Tables
//! are usually the pickled `dict[str, float]` written by threshold learning;
//! JSON and TOML files with the same shape are accepted too.

use crate::model::RawPredictions;
use crate::{Result, SpanfuseError};
use figment::Figment;
use figment::providers::{Format, Toml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::BufReader;
use std::path::Path;

/// What to do with a prediction whose label has no threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownLabelPolicy {
    /// Discard it.
    #[default]
    Drop,
    /// Keep it regardless of score.
    Keep,
}

/// Minimum confidence per entity label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThresholdTable {
    thresholds: BTreeMap<String, f64>,
}

impl ThresholdTable {
    /// Build a table, rejecting thresholds outside `[0, 1]`.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut thresholds = BTreeMap::new();
        for (label, value) in entries {
            let label = label.as_ref();
            if !(0.0..=1.0).contains(&value) {
                return Err(SpanfuseError::Configuration(format!(
                    "threshold for '{label}' must be within [0, 1], got {value}"
                )));
            }
            thresholds.insert(label.to_lowercase(), value);
        }
        Ok(Self { thresholds })
    }

    /// Load a table from a `.pkl`/`.pickle`, `.json` or `.toml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fail = |reason: String| SpanfuseError::ThresholdTable {
            path: path.display().to_string(),
            reason,
        };

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        let raw: BTreeMap<String, f64> = match extension.as_deref() {
            Some("pkl") | Some("pickle") => {
                let file = fs::File::open(path).map_err(|e| fail(e.to_string()))?;
                serde_pickle::from_reader(BufReader::new(file), serde_pickle::DeOptions::new())
                    .map_err(|e| fail(e.to_string()))?
            }
            Some("json") => {
                let file = fs::File::open(path).map_err(|e| fail(e.to_string()))?;
                serde_json::from_reader(BufReader::new(file)).map_err(|e| fail(e.to_string()))?
            }
            Some("toml") => {
                if !path.exists() {
                    return Err(fail("file not found".to_string()));
                }
                Figment::from(Toml::file(path))
                    .extract()
                    .map_err(|e| fail(e.to_string()))?
            }
            _ => return Err(fail("unsupported format, expected .pkl, .json or .toml".to_string())),
        };

        let table = Self::new(raw).map_err(|e| fail(e.to_string()))?;
        tracing::debug!(path = %path.display(), labels = table.len(), "loaded threshold table");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Labels (lower-cased) that have a threshold.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.thresholds.keys().map(String::as_str)
    }

    pub fn threshold_for(&self, label: &str) -> Option<f64> {
        self.thresholds.get(&label.to_lowercase()).copied()
    }

    /// Whether a prediction survives filtering.
    pub fn passes(&self, label: &str, score: f64, policy: UnknownLabelPolicy) -> bool {
        match self.threshold_for(label) {
            Some(threshold) => score >= threshold,
            None => policy == UnknownLabelPolicy::Keep,
        }
    }

    /// Drop every raw prediction below its class threshold.
    ///
    /// Documents are kept even when all of their predictions are dropped.
    pub fn filter(&self, mut predictions: RawPredictions, policy: UnknownLabelPolicy) -> RawPredictions {
        let mut kept = 0usize;
        let mut dropped = 0usize;
        for document in predictions.values_mut() {
            let before = document.pred_entities.len();
            document
                .pred_entities
                .retain(|span| self.passes(&span.entity_label, span.score, policy));
            kept += document.pred_entities.len();
            dropped += before - document.pred_entities.len();
        }
        tracing::info!(kept, dropped, policy = ?policy, "applied class thresholds");
        predictions
    }
}
