// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation pipeline for reject predictions
//!
//! Orchestrates:
//! - Loading ground truth and predictions
//! - Alignment and metrics computation
//! - Results serialization and markdown reporting

use crate::evaluator::{align, AlignedPair, Evaluation, GroundTruthIndex, PredictionIndex, PredictionSource};
use crate::records::{load_ground_truth, load_predictions};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which result files to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
    Both,
}

impl OutputFormat {
    pub fn includes_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }

    pub fn includes_markdown(self) -> bool {
        matches!(self, OutputFormat::Markdown | OutputFormat::Both)
    }
}

/// Configuration for the evaluation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Ground-truth records (JSON array or JSONL)
    pub ground_truth_path: PathBuf,
    /// Prediction records (JSON array or JSONL)
    pub predictions_path: PathBuf,
    /// Output directory for results; nothing is written when unset
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
    /// Maximum number of wrongly scored queries kept in the results
    pub error_samples: usize,
}

impl EvaluationConfig {
    pub fn new(ground_truth_path: impl Into<PathBuf>, predictions_path: impl Into<PathBuf>) -> Self {
        Self {
            ground_truth_path: ground_truth_path.into(),
            predictions_path: predictions_path.into(),
            output_dir: None,
            format: OutputFormat::default(),
            error_samples: 10,
        }
    }
}

/// Shape of the two input collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub ground_truth_records: usize,
    pub prediction_records: usize,
    pub unique_queries: usize,
    pub reject_queries: usize,
    pub duplicate_ground_truth: usize,
    pub duplicate_predictions: usize,
    /// Predicted queries absent from ground truth (not scored)
    pub extra_predictions: usize,
}

/// A query whose prediction was scored wrong
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSample {
    pub query: String,
    pub expected_reject: bool,
    pub predicted_reject: bool,
    pub source: PredictionSource,
}

impl From<&AlignedPair> for ErrorSample {
    fn from(pair: &AlignedPair) -> Self {
        Self {
            query: pair.query.clone(),
            expected_reject: pair.true_is_reject,
            predicted_reject: pair.pred_is_reject,
            source: pair.source,
        }
    }
}

/// Complete evaluation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub config: EvaluationConfig,
    pub dataset_info: DatasetInfo,
    pub evaluation: Evaluation,
    pub error_samples: Vec<ErrorSample>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Main evaluation pipeline
pub struct EvaluationPipeline {
    config: EvaluationConfig,
}

impl EvaluationPipeline {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    /// Load both files and score the predictions
    pub fn run(&self) -> Result<EvaluationResults> {
        let ground_truth = load_ground_truth(&self.config.ground_truth_path)?;
        let predictions = load_predictions(&self.config.predictions_path)?;

        let gt_index = GroundTruthIndex::from_records(&ground_truth);
        let pred_index = PredictionIndex::from_records(&predictions);

        let extra_predictions = pred_index
            .iter()
            .filter(|(query, _)| !gt_index.contains(query))
            .count();
        if extra_predictions > 0 {
            tracing::info!("{} predictions have no ground-truth query and are ignored", extra_predictions);
        }

        let dataset_info = DatasetInfo {
            ground_truth_records: ground_truth.len(),
            prediction_records: predictions.len(),
            unique_queries: gt_index.len(),
            reject_queries: gt_index.reject_count(),
            duplicate_ground_truth: gt_index.duplicates(),
            duplicate_predictions: pred_index.duplicates(),
            extra_predictions,
        };

        if dataset_info.reject_queries == 0 {
            tracing::warn!("Ground truth has no reject queries; recall and F1 are reported as 0.0");
        }

        let alignment = align(&gt_index, &pred_index);
        let evaluation = Evaluation::from_alignment(&alignment);

        let error_samples = alignment
            .pairs
            .iter()
            .filter(|pair| !pair.is_correct())
            .take(self.config.error_samples)
            .map(ErrorSample::from)
            .collect();

        tracing::info!(
            "Evaluated {} queries - Accuracy: {:.4}, Recall: {:.4}, F1: {:.4}",
            evaluation.metrics.total,
            evaluation.metrics.accuracy,
            evaluation.metrics.recall,
            evaluation.metrics.f1
        );

        Ok(EvaluationResults {
            config: self.config.clone(),
            dataset_info,
            evaluation,
            error_samples,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Write results to the configured output directory, returning the written paths
    pub fn save_outputs(&self, results: &EvaluationResults) -> Result<Vec<PathBuf>> {
        let Some(ref output_dir) = self.config.output_dir else {
            return Ok(Vec::new());
        };

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

        let stem = format!("reject_eval_{}", results.timestamp.format("%Y%m%d_%H%M%S"));
        let mut written = Vec::new();

        if self.config.format.includes_json() {
            let json_path = output_dir.join(format!("{}.json", stem));
            Self::save_results(results, &json_path)?;
            written.push(json_path);
        }

        if self.config.format.includes_markdown() {
            let md_path = output_dir.join(format!("{}.md", stem));
            std::fs::write(&md_path, Self::generate_report(results))
                .with_context(|| format!("Failed to write report: {}", md_path.display()))?;
            tracing::info!("Report saved to {}", md_path.display());
            written.push(md_path);
        }

        Ok(written)
    }

    /// Save results to JSON file
    pub fn save_results(results: &EvaluationResults, output_path: &Path) -> Result<()> {
        std::fs::create_dir_all(output_path.parent().unwrap_or(Path::new(".")))?;
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write results: {}", output_path.display()))?;
        tracing::info!("Results saved to {}", output_path.display());
        Ok(())
    }

    /// Generate a markdown report
    pub fn generate_report(results: &EvaluationResults) -> String {
        let metrics = &results.evaluation.metrics;
        let cm = &results.evaluation.confusion_matrix;
        let info = &results.dataset_info;
        let mut report = String::new();

        report.push_str("# Reject Evaluation Report\n\n");
        report.push_str(&format!("**Generated:** {}\n\n", results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        report.push_str(&format!("**Version:** {}\n\n", results.version));

        report.push_str("## Inputs\n\n");
        report.push_str(&format!(
            "- **Ground truth:** {} ({} records, {} unique queries, {} reject)\n",
            results.config.ground_truth_path.display(),
            info.ground_truth_records,
            info.unique_queries,
            info.reject_queries
        ));
        report.push_str(&format!(
            "- **Predictions:** {} ({} records)\n",
            results.config.predictions_path.display(),
            info.prediction_records
        ));
        report.push_str(&format!(
            "- **Duplicates:** ground truth={}, predictions={}\n",
            info.duplicate_ground_truth, info.duplicate_predictions
        ));
        report.push_str(&format!("- **Unscored extra predictions:** {}\n\n", info.extra_predictions));

        report.push_str("## Metrics\n\n");
        report.push_str("| Total | Correct | Accuracy | Recall | F1 Score |\n");
        report.push_str("|-------|---------|----------|--------|----------|\n");
        report.push_str(&format!(
            "| {} | {} | {:.2} | {:.2} | {:.2} |\n\n",
            metrics.total, metrics.correct, metrics.accuracy, metrics.recall, metrics.f1
        ));
        report.push_str(&format!("Precision: {:.2}\n\n", results.evaluation.precision));

        report.push_str("### Confusion Matrix\n\n");
        report.push_str("| | Predicted reject | Predicted accept |\n");
        report.push_str("|---|---|---|\n");
        report.push_str(&format!("| **Actual reject** | {} | {} |\n", cm.tp, cm.fn_));
        report.push_str(&format!("| **Actual accept** | {} | {} |\n\n", cm.fp, cm.tn));

        report.push_str("## Substituted Predictions\n\n");
        report.push_str(&format!(
            "- Missing: {}\n- Malformed: {}\n\n",
            results.evaluation.missing_predictions, results.evaluation.malformed_predictions
        ));

        if !results.error_samples.is_empty() {
            report.push_str("## Sample Errors\n\n");
            report.push_str("| Query | Expected | Predicted | Source |\n");
            report.push_str("|-------|----------|-----------|--------|\n");
            for sample in &results.error_samples {
                report.push_str(&format!(
                    "| {} | {} | {} | {:?} |\n",
                    sample.query.replace('|', "\\|"),
                    label_name(sample.expected_reject),
                    label_name(sample.predicted_reject),
                    sample.source
                ));
            }
            report.push('\n');
        }

        report.push_str("## Configuration\n\n");
        report.push_str(&format!("```json\n{}\n```\n", serde_json::to_string_pretty(&results.config).unwrap_or_default()));

        report
    }
}

fn label_name(is_reject: bool) -> &'static str {
    if is_reject {
        "reject"
    } else {
        "accept"
    }
}
