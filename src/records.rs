// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Labeled query records and their loaders
//!
//! Ground truth is decoded strictly: every record needs a `query` string and a
//! boolean `is_reject`. Predictions come from untrusted files, so their
//! `is_reject` is kept as a [`PredictionValue`] and validated during alignment.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A ground-truth record: a query and whether it should be rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub query: String,
    pub is_reject: bool,
}

impl LabeledRecord {
    pub fn new(query: impl Into<String>, is_reject: bool) -> Self {
        Self {
            query: query.into(),
            is_reject,
        }
    }
}

/// Raw `is_reject` value of a prediction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionValue {
    /// A JSON boolean
    Boolean(bool),
    /// Any other JSON value ("yes", 1, null, ...)
    Other(serde_json::Value),
}

impl PredictionValue {
    /// The boolean label, if the value is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PredictionValue::Boolean(value) => Some(*value),
            PredictionValue::Other(_) => None,
        }
    }
}

/// A missing `is_reject` field decodes as `null`.
impl Default for PredictionValue {
    fn default() -> Self {
        PredictionValue::Other(serde_json::Value::Null)
    }
}

impl From<bool> for PredictionValue {
    fn from(value: bool) -> Self {
        PredictionValue::Boolean(value)
    }
}

/// A prediction record as produced by the system under evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub query: String,
    #[serde(default)]
    pub is_reject: PredictionValue,
}

impl PredictionRecord {
    pub fn new(query: impl Into<String>, is_reject: bool) -> Self {
        Self {
            query: query.into(),
            is_reject: PredictionValue::Boolean(is_reject),
        }
    }

    /// Prediction whose label is not a boolean
    pub fn malformed(query: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            query: query.into(),
            is_reject: PredictionValue::Other(value),
        }
    }
}

impl From<LabeledRecord> for PredictionRecord {
    fn from(record: LabeledRecord) -> Self {
        Self {
            query: record.query,
            is_reject: PredictionValue::Boolean(record.is_reject),
        }
    }
}

/// Load ground-truth records from a JSON array or `.jsonl` file
pub fn load_ground_truth(path: &Path) -> Result<Vec<LabeledRecord>> {
    let records = load_records(path)
        .with_context(|| format!("Failed to load ground truth: {}", path.display()))?;
    tracing::info!("Loaded {} ground-truth records from {}", records.len(), path.display());
    Ok(records)
}

/// Load prediction records from a JSON array or `.jsonl` file
pub fn load_predictions(path: &Path) -> Result<Vec<PredictionRecord>> {
    let records = load_records(path)
        .with_context(|| format!("Failed to load predictions: {}", path.display()))?;
    tracing::info!("Loaded {} prediction records from {}", records.len(), path.display());
    Ok(records)
}

fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let is_jsonl = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));

    if is_jsonl {
        parse_json_lines(&content)
    } else {
        serde_json::from_str(&content).context("Expected a JSON array of records")
    }
}

fn parse_json_lines<T: DeserializeOwned>(content: &str) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line)
            .with_context(|| format!("Invalid record on line {}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}
