// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Binary classification metrics with "reject" as the positive class
//!
//! Every ratio with a zero denominator is reported as 0.0, so ground truth
//! without reject cases yields recall and F1 of 0.0 instead of failing.

use serde::{Deserialize, Serialize};

/// Confusion matrix for reject/accept classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// True Positives (reject predicted as reject)
    pub tp: usize,
    /// True Negatives (accept predicted as accept)
    pub tn: usize,
    /// False Positives (accept predicted as reject)
    pub fp: usize,
    /// False Negatives (reject predicted as accept)
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Build from `(true_is_reject, pred_is_reject)` pairs
    pub fn from_labels<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (bool, bool)>,
    {
        let mut matrix = Self::default();

        for (truth, pred) in pairs {
            match (truth, pred) {
                (true, true) => matrix.tp += 1,
                (false, false) => matrix.tn += 1,
                (false, true) => matrix.fp += 1,
                (true, false) => matrix.fn_ += 1,
            }
        }

        matrix
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Samples where prediction equals ground truth
    pub fn correct(&self) -> usize {
        self.tp + self.tn
    }

    /// Ground-truth reject cases
    pub fn positives(&self) -> usize {
        self.tp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Recall: TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.positives())
    }

    /// F1 Score: 2 * (Precision * Recall) / (Precision + Recall)
    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        let denom = precision + recall;
        if denom == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / denom
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

/// Scores for one evaluation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub recall: f64,
    pub f1: f64,
}

impl MetricsResult {
    pub fn from_confusion_matrix(cm: &ConfusionMatrix) -> Self {
        Self {
            total: cm.total(),
            correct: cm.correct(),
            accuracy: cm.accuracy(),
            recall: cm.recall(),
            f1: cm.f1_score(),
        }
    }

    /// Format as a human-readable summary
    pub fn format(&self) -> String {
        format!(
            "Total:    {} (correct: {})\nAccuracy: {:.2}\nRecall:   {:.2}\nF1 Score: {:.2}\n",
            self.total, self.correct, self.accuracy, self.recall, self.f1
        )
    }
}
