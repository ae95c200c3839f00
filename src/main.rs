// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reject evaluation CLI
//!
//! Usage:
//!   reject-eval --ground-truth gt.json --predictions preds.json
//!   reject-eval -g gt.jsonl -p preds.jsonl --output eval/results --format both

use anyhow::Result;
use clap::Parser;
use reject_eval::pipeline::{EvaluationConfig, EvaluationPipeline, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reject-eval")]
#[command(about = "Score reject predictions against ground truth")]
#[command(version)]
struct Args {
    /// Ground-truth records (JSON array, or JSON Lines with a .jsonl extension)
    #[arg(short, long)]
    ground_truth: PathBuf,

    /// Prediction records (JSON array, or JSON Lines with a .jsonl extension)
    #[arg(short, long)]
    predictions: PathBuf,

    /// Output directory for result files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format for result files
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Number of wrongly scored queries to keep in the results
    #[arg(long, default_value_t = 10)]
    error_samples: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("Ground truth: {}", args.ground_truth.display());
    tracing::info!("Predictions: {}", args.predictions.display());

    let config = EvaluationConfig {
        ground_truth_path: args.ground_truth,
        predictions_path: args.predictions,
        output_dir: args.output,
        format: args.format,
        error_samples: args.error_samples,
    };

    let pipeline = EvaluationPipeline::new(config);
    let results = pipeline.run()?;

    println!("{}", results.evaluation.metrics.format());

    let evaluation = &results.evaluation;
    if evaluation.missing_predictions > 0 || evaluation.malformed_predictions > 0 {
        println!(
            "Scored as wrong: {} missing, {} malformed",
            evaluation.missing_predictions, evaluation.malformed_predictions
        );
    }

    for path in pipeline.save_outputs(&results)? {
        println!("Saved: {}", path.display());
    }

    Ok(())
}
