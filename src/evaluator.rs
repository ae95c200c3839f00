// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Alignment of predictions against ground truth
//!
//! Both record lists are keyed on `query`. Every ground-truth query yields
//! exactly one [`AlignedPair`]; a prediction that is missing or whose label is
//! not a boolean is scored as the opposite of the ground truth.

use crate::metrics::{ConfusionMatrix, MetricsResult};
use crate::records::{LabeledRecord, PredictionRecord, PredictionValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered `query -> label` map
///
/// A repeated query keeps the position of its first occurrence and the label
/// of its last one.
#[derive(Debug, Clone)]
pub struct LabelIndex<V> {
    entries: IndexMap<String, V>,
    duplicates: usize,
}

pub type GroundTruthIndex = LabelIndex<bool>;
pub type PredictionIndex = LabelIndex<PredictionValue>;

impl<V> LabelIndex<V> {
    fn from_entries<I>(kind: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, V)>,
    {
        let mut index = Self {
            entries: IndexMap::new(),
            duplicates: 0,
        };
        for (query, value) in entries {
            if index.entries.insert(query, value).is_some() {
                index.duplicates += 1;
            }
        }
        if index.duplicates > 0 {
            tracing::warn!(
                "{} {} records repeat an earlier query; the last occurrence wins",
                index.duplicates,
                kind
            );
        }
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records that overwrote an earlier record with the same query
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn get(&self, query: &str) -> Option<&V> {
        self.entries.get(query)
    }

    pub fn contains(&self, query: &str) -> bool {
        self.entries.contains_key(query)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(query, value)| (query.as_str(), value))
    }
}

impl GroundTruthIndex {
    pub fn from_records(records: &[LabeledRecord]) -> Self {
        Self::from_entries(
            "ground-truth",
            records.iter().map(|r| (r.query.clone(), r.is_reject)),
        )
    }

    /// Number of reject (positive) queries
    pub fn reject_count(&self) -> usize {
        self.entries.values().filter(|is_reject| **is_reject).count()
    }
}

impl PredictionIndex {
    pub fn from_records(records: &[PredictionRecord]) -> Self {
        Self::from_entries(
            "prediction",
            records.iter().map(|r| (r.query.clone(), r.is_reject.clone())),
        )
    }
}

/// How the predicted label of an aligned pair was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    /// A boolean prediction was present
    Present,
    /// No prediction for the query; scored wrong
    Missing,
    /// Prediction label was not a boolean; scored wrong
    Malformed,
}

/// One ground-truth query paired with its (possibly substituted) prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub query: String,
    pub true_is_reject: bool,
    pub pred_is_reject: bool,
    pub source: PredictionSource,
}

impl AlignedPair {
    pub fn is_correct(&self) -> bool {
        self.true_is_reject == self.pred_is_reject
    }
}

/// Ground truth aligned with predictions, in ground-truth order
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub pairs: Vec<AlignedPair>,
    pub missing: usize,
    pub malformed: usize,
}

impl Alignment {
    pub fn true_labels(&self) -> Vec<bool> {
        self.pairs.iter().map(|p| p.true_is_reject).collect()
    }

    pub fn predicted_labels(&self) -> Vec<bool> {
        self.pairs.iter().map(|p| p.pred_is_reject).collect()
    }

    pub fn confusion_matrix(&self) -> ConfusionMatrix {
        ConfusionMatrix::from_labels(self.pairs.iter().map(|p| (p.true_is_reject, p.pred_is_reject)))
    }
}

/// Pair every ground-truth query with a boolean prediction
pub fn align(ground_truth: &GroundTruthIndex, predictions: &PredictionIndex) -> Alignment {
    let mut alignment = Alignment {
        pairs: Vec::with_capacity(ground_truth.len()),
        ..Alignment::default()
    };

    for (query, &true_is_reject) in ground_truth.iter() {
        let (pred_is_reject, source) = match predictions.get(query).map(PredictionValue::as_bool) {
            Some(Some(pred)) => (pred, PredictionSource::Present),
            Some(None) => {
                tracing::debug!("Malformed prediction for query {:?}, scoring as wrong", query);
                alignment.malformed += 1;
                (!true_is_reject, PredictionSource::Malformed)
            }
            None => {
                tracing::debug!("No prediction for query {:?}, scoring as wrong", query);
                alignment.missing += 1;
                (!true_is_reject, PredictionSource::Missing)
            }
        };

        alignment.pairs.push(AlignedPair {
            query: query.to_string(),
            true_is_reject,
            pred_is_reject,
            source,
        });
    }

    if alignment.missing > 0 || alignment.malformed > 0 {
        tracing::warn!(
            "{} missing and {} malformed predictions scored as wrong",
            alignment.missing,
            alignment.malformed
        );
    }

    alignment
}

/// Metrics plus the alignment diagnostics behind them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub metrics: MetricsResult,
    pub confusion_matrix: ConfusionMatrix,
    pub precision: f64,
    pub missing_predictions: usize,
    pub malformed_predictions: usize,
}

impl Evaluation {
    pub fn from_alignment(alignment: &Alignment) -> Self {
        let confusion_matrix = alignment.confusion_matrix();
        Self {
            metrics: MetricsResult::from_confusion_matrix(&confusion_matrix),
            precision: confusion_matrix.precision(),
            confusion_matrix,
            missing_predictions: alignment.missing,
            malformed_predictions: alignment.malformed,
        }
    }
}

/// Score predictions against ground truth
pub fn evaluate(ground_truth: &[LabeledRecord], predictions: &[PredictionRecord]) -> MetricsResult {
    evaluate_detailed(ground_truth, predictions).metrics
}

/// Like [`evaluate`], also reporting the confusion matrix and substitutions
pub fn evaluate_detailed(ground_truth: &[LabeledRecord], predictions: &[PredictionRecord]) -> Evaluation {
    let ground_truth = GroundTruthIndex::from_records(ground_truth);
    let predictions = PredictionIndex::from_records(predictions);
    Evaluation::from_alignment(&align(&ground_truth, &predictions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use serde_json::json;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_perfect_match() {
        let gt = vec![LabeledRecord::new("q1", true), LabeledRecord::new("q2", false)];
        let preds = vec![PredictionRecord::new("q1", true), PredictionRecord::new("q2", false)];

        let metrics = evaluate(&gt, &preds);

        assert_eq!(metrics.total, 2);
        assert_eq!(metrics.correct, 2);
        assert_close(metrics.accuracy, 1.0);
        assert_close(metrics.recall, 1.0);
        assert_close(metrics.f1, 1.0);
    }

    #[test]
    fn test_missing_prediction_scored_wrong() {
        let gt = vec![LabeledRecord::new("q1", true)];

        let evaluation = evaluate_detailed(&gt, &[]);

        assert_eq!(evaluation.metrics.total, 1);
        assert_eq!(evaluation.metrics.correct, 0);
        assert_eq!(evaluation.metrics.accuracy, 0.0);
        assert_eq!(evaluation.metrics.recall, 0.0);
        assert_eq!(evaluation.metrics.f1, 0.0);
        assert_eq!(evaluation.missing_predictions, 1);
        assert_eq!(evaluation.malformed_predictions, 0);
    }

    #[test]
    fn test_malformed_prediction_scored_wrong() {
        let gt = vec![LabeledRecord::new("q1", true)];
        let preds = vec![PredictionRecord::malformed("q1", json!("yes"))];

        let evaluation = evaluate_detailed(&gt, &preds);

        assert_eq!(evaluation.metrics.total, 1);
        assert_eq!(evaluation.metrics.correct, 0);
        assert_eq!(evaluation.metrics.accuracy, 0.0);
        assert_eq!(evaluation.malformed_predictions, 1);
        assert_eq!(evaluation.confusion_matrix.fn_, 1);
    }

    #[test]
    fn test_malformed_accept_becomes_false_positive() {
        let gt = vec![LabeledRecord::new("q1", false)];
        let preds = vec![PredictionRecord::malformed("q1", json!(null))];

        let alignment = align(
            &GroundTruthIndex::from_records(&gt),
            &PredictionIndex::from_records(&preds),
        );

        assert!(alignment.pairs[0].pred_is_reject);
        assert_eq!(alignment.pairs[0].source, PredictionSource::Malformed);
        assert_eq!(alignment.confusion_matrix().fp, 1);
    }

    #[test]
    fn test_alignment_follows_ground_truth_order() {
        let gt = vec![
            LabeledRecord::new("c", true),
            LabeledRecord::new("a", false),
            LabeledRecord::new("b", true),
        ];
        let preds = vec![
            PredictionRecord::new("b", true),
            PredictionRecord::new("unknown", true),
            PredictionRecord::new("c", false),
        ];

        let alignment = align(
            &GroundTruthIndex::from_records(&gt),
            &PredictionIndex::from_records(&preds),
        );

        let queries: Vec<&str> = alignment.pairs.iter().map(|p| p.query.as_str()).collect();
        assert_eq!(queries, vec!["c", "a", "b"]);
        assert_eq!(alignment.true_labels(), vec![true, false, true]);
        assert_eq!(alignment.predicted_labels(), vec![false, true, true]);
        assert_eq!(alignment.missing, 1);
    }

    #[test]
    fn test_duplicate_query_last_wins_first_position() {
        let gt = vec![
            LabeledRecord::new("q1", true),
            LabeledRecord::new("q2", false),
            LabeledRecord::new("q1", false),
        ];

        let index = GroundTruthIndex::from_records(&gt);

        assert_eq!(index.len(), 2);
        assert_eq!(index.duplicates(), 1);
        assert_eq!(index.get("q1"), Some(&false));
        assert_eq!(index.iter().map(|(q, _)| q).collect::<Vec<_>>(), vec!["q1", "q2"]);
        assert_eq!(index.reject_count(), 0);
    }

    #[test]
    fn test_duplicate_prediction_last_wins() {
        let gt = vec![LabeledRecord::new("q1", true)];
        let preds = vec![
            PredictionRecord::new("q1", true),
            PredictionRecord::malformed("q1", json!("maybe")),
        ];

        let evaluation = evaluate_detailed(&gt, &preds);

        assert_eq!(evaluation.metrics.correct, 0);
        assert_eq!(evaluation.malformed_predictions, 1);
    }

    #[test]
    fn test_no_reject_cases() {
        let gt = vec![LabeledRecord::new("q1", false), LabeledRecord::new("q2", false)];
        let preds = vec![PredictionRecord::new("q1", false), PredictionRecord::new("q2", false)];

        let metrics = evaluate(&gt, &preds);

        assert_close(metrics.accuracy, 1.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1, 0.0);
    }

    #[test]
    fn test_empty_ground_truth() {
        let preds = vec![PredictionRecord::new("q1", true)];

        let metrics = evaluate(&[], &preds);

        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.correct, 0);
        assert_eq!(metrics.accuracy, 0.0);
    }

    fn arb_query() -> impl Strategy<Value = String> {
        "q[0-9]{1,2}"
    }

    fn arb_prediction() -> impl Strategy<Value = PredictionRecord> {
        let value = prop_oneof![
            any::<bool>().prop_map(PredictionValue::Boolean),
            Just(PredictionValue::Other(json!(null))),
            Just(PredictionValue::Other(json!("yes"))),
            (0i64..3).prop_map(|n| PredictionValue::Other(json!(n))),
        ];
        (arb_query(), value).prop_map(|(query, is_reject)| PredictionRecord { query, is_reject })
    }

    fn arb_ground_truth() -> impl Strategy<Value = Vec<LabeledRecord>> {
        vec((arb_query(), any::<bool>()).prop_map(|(q, r)| LabeledRecord::new(q, r)), 0..40)
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn total_matches_unique_ground_truth(gt in arb_ground_truth(), preds in vec(arb_prediction(), 0..40)) {
            let index = GroundTruthIndex::from_records(&gt);
            let metrics = evaluate(&gt, &preds);

            prop_assert_eq!(metrics.total, index.len());
            prop_assert!(metrics.correct <= metrics.total);
            prop_assert!((0.0..=1.0).contains(&metrics.accuracy));
            prop_assert!((0.0..=1.0).contains(&metrics.recall));
            prop_assert!((0.0..=1.0).contains(&metrics.f1));
            if metrics.total > 0 {
                prop_assert!((metrics.accuracy - metrics.correct as f64 / metrics.total as f64).abs() < 1e-12);
            }
        }

        #[test]
        fn substituted_predictions_are_wrong(gt in arb_ground_truth(), preds in vec(arb_prediction(), 0..40)) {
            let prediction_index = PredictionIndex::from_records(&preds);
            let alignment = align(&GroundTruthIndex::from_records(&gt), &prediction_index);

            for pair in &alignment.pairs {
                match prediction_index.get(&pair.query) {
                    None => prop_assert_eq!(pair.source, PredictionSource::Missing),
                    Some(PredictionValue::Other(_)) => prop_assert_eq!(pair.source, PredictionSource::Malformed),
                    Some(PredictionValue::Boolean(b)) => {
                        prop_assert_eq!(pair.source, PredictionSource::Present);
                        prop_assert_eq!(pair.pred_is_reject, *b);
                    }
                }
                if pair.source != PredictionSource::Present {
                    prop_assert!(!pair.is_correct());
                }
            }
        }

        #[test]
        fn only_last_duplicate_matters(
            gt in arb_ground_truth(),
            preds in vec(arb_prediction(), 0..40),
            first in any::<bool>(),
            last in any::<bool>(),
        ) {
            let mut with_duplicate = vec![LabeledRecord::new("dup", first)];
            with_duplicate.extend(gt.iter().cloned());
            with_duplicate.push(LabeledRecord::new("dup", last));

            let mut last_only = vec![LabeledRecord::new("dup", last)];
            last_only.extend(gt.iter().filter(|r| r.query != "dup").cloned());

            prop_assert_eq!(evaluate(&with_duplicate, &preds), evaluate(&last_only, &preds));
        }

        #[test]
        fn perfect_predictions_score_one(gt in arb_ground_truth()) {
            let preds: Vec<PredictionRecord> = gt.iter().cloned().map(PredictionRecord::from).collect();
            let index = GroundTruthIndex::from_records(&gt);
            let metrics = evaluate(&gt, &preds);

            prop_assert_eq!(metrics.correct, metrics.total);
            if metrics.total > 0 {
                prop_assert!((metrics.accuracy - 1.0).abs() < 1e-12);
            }
            if index.reject_count() > 0 {
                prop_assert!((metrics.recall - 1.0).abs() < 1e-12);
                prop_assert!((metrics.f1 - 1.0).abs() < 1e-12);
            }
        }
    }
}
