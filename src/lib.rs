// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Scoring for query rejection predictions
//!
//! This crate provides:
//! - Ground-truth and prediction record loading (JSON array or JSONL)
//! - Alignment of predictions to ground truth by query, scoring missing or
//!   non-boolean predictions as wrong
//! - Accuracy, recall and F1 for the reject class
//! - An evaluation pipeline with JSON and markdown output

pub mod evaluator;
pub mod metrics;
pub mod pipeline;
pub mod records;

pub use evaluator::{
    align, evaluate, evaluate_detailed, AlignedPair, Alignment, Evaluation, GroundTruthIndex, LabelIndex,
    PredictionIndex, PredictionSource,
};
pub use metrics::{ConfusionMatrix, MetricsResult};
pub use pipeline::{EvaluationConfig, EvaluationPipeline, EvaluationResults, OutputFormat};
pub use records::{load_ground_truth, load_predictions, LabeledRecord, PredictionRecord, PredictionValue};
