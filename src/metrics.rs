//! Classification metrics for probability-scoring classifiers.
//!
//! Provides confusion-matrix-derived metrics, rank-based AUC, and the Brier
//! score. Every denominator that can degenerate to zero resolves to a `0.0`
//! fallback; the same policy applies throughout the crate (hyperparameter
//! search, threshold scanning, and final evaluation), so metric values are
//! always finite and comparable across stages.

use serde::{Deserialize, Serialize};

/// The metric tuple reported for every scored prediction set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// (tp + tn) / total
    pub accuracy: f32,
    /// tn / (tn + fp)
    pub specificity: f32,
    /// tp / (tp + fn), sensitivity
    pub recall: f32,
    /// tp / (tp + fp)
    pub precision: f32,
    /// Harmonic mean of precision and recall
    pub f1: f32,
    /// Area under the ROC curve (threshold-independent)
    pub auc: f32,
    /// Mean squared error of probability vs outcome (lower is better)
    pub brier: f32,
}

impl MetricSet {
    /// True when every metric is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.accuracy.is_finite()
            && self.specificity.is_finite()
            && self.recall.is_finite()
            && self.precision.is_finite()
            && self.f1.is_finite()
            && self.auc.is_finite()
            && self.brier.is_finite()
    }

    /// Element-wise mean across a non-empty slice of metric sets.
    ///
    /// # Panics
    ///
    /// Panics if `sets` is empty.
    #[must_use]
    pub fn mean(sets: &[MetricSet]) -> MetricSet {
        assert!(!sets.is_empty(), "cannot average zero metric sets");
        let n = sets.len() as f32;
        MetricSet {
            accuracy: sets.iter().map(|s| s.accuracy).sum::<f32>() / n,
            specificity: sets.iter().map(|s| s.specificity).sum::<f32>() / n,
            recall: sets.iter().map(|s| s.recall).sum::<f32>() / n,
            precision: sets.iter().map(|s| s.precision).sum::<f32>() / n,
            f1: sets.iter().map(|s| s.f1).sum::<f32>() / n,
            auc: sets.iter().map(|s| s.auc).sum::<f32>() / n,
            brier: sets.iter().map(|s| s.brier).sum::<f32>() / n,
        }
    }

    /// Element-wise population standard deviation across metric sets.
    ///
    /// # Panics
    ///
    /// Panics if `sets` is empty.
    #[must_use]
    pub fn std(sets: &[MetricSet]) -> MetricSet {
        let mean = Self::mean(sets);
        let n = sets.len() as f32;
        let var = |f: fn(&MetricSet) -> f32, m: f32| -> f32 {
            (sets.iter().map(|s| (f(s) - m).powi(2)).sum::<f32>() / n).sqrt()
        };
        MetricSet {
            accuracy: var(|s| s.accuracy, mean.accuracy),
            specificity: var(|s| s.specificity, mean.specificity),
            recall: var(|s| s.recall, mean.recall),
            precision: var(|s| s.precision, mean.precision),
            f1: var(|s| s.f1, mean.f1),
            auc: var(|s| s.auc, mean.auc),
            brier: var(|s| s.brier, mean.brier),
        }
    }
}

/// Confusion counts at a fixed decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    /// Counts outcomes of classifying `prediction > threshold` as positive.
    ///
    /// # Panics
    ///
    /// Panics if slices have different lengths.
    #[must_use]
    pub fn from_predictions(predictions: &[f32], labels: &[f32], threshold: f32) -> Self {
        assert_eq!(
            predictions.len(),
            labels.len(),
            "predictions and labels must have same length"
        );
        let mut counts = Self {
            true_positives: 0,
            false_positives: 0,
            true_negatives: 0,
            false_negatives: 0,
        };
        for (&prediction, &label) in predictions.iter().zip(labels.iter()) {
            let predicted_positive = prediction > threshold;
            let actual_positive = label == 1.0;
            match (predicted_positive, actual_positive) {
                (true, true) => counts.true_positives += 1,
                (true, false) => counts.false_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (false, true) => counts.false_negatives += 1,
            }
        }
        counts
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    #[must_use]
    pub fn accuracy(&self) -> f32 {
        safe_ratio(
            (self.true_positives + self.true_negatives) as f32,
            self.total() as f32,
        )
    }

    #[must_use]
    pub fn specificity(&self) -> f32 {
        safe_ratio(
            self.true_negatives as f32,
            (self.true_negatives + self.false_positives) as f32,
        )
    }

    #[must_use]
    pub fn recall(&self) -> f32 {
        safe_ratio(
            self.true_positives as f32,
            (self.true_positives + self.false_negatives) as f32,
        )
    }

    #[must_use]
    pub fn precision(&self) -> f32 {
        safe_ratio(
            self.true_positives as f32,
            (self.true_positives + self.false_positives) as f32,
        )
    }

    #[must_use]
    pub fn f1(&self) -> f32 {
        let precision = self.precision();
        let recall = self.recall();
        safe_ratio(2.0 * precision * recall, precision + recall)
    }
}

/// Zero-fallback division: `0.0` whenever the denominator is zero.
fn safe_ratio(numerator: f32, denominator: f32) -> f32 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Scores predictions against labels at a decision threshold.
///
/// Confusion-derived metrics use `prediction > threshold`; AUC and Brier are
/// threshold-independent and computed from the full prediction vector.
///
/// # Panics
///
/// Panics if slices have different lengths or are empty.
///
/// # Examples
///
/// ```
/// use readmit::metrics::score;
///
/// let labels = vec![0.0, 0.0, 1.0, 1.0];
/// let predictions = vec![0.2, 0.4, 0.6, 0.8];
/// let metrics = score(&predictions, &labels, 0.5);
/// assert!((metrics.accuracy - 1.0).abs() < 1e-6);
/// assert!((metrics.auc - 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn score(predictions: &[f32], labels: &[f32], threshold: f32) -> MetricSet {
    assert!(!labels.is_empty(), "cannot score an empty prediction set");
    let counts = ConfusionCounts::from_predictions(predictions, labels, threshold);
    MetricSet {
        accuracy: counts.accuracy(),
        specificity: counts.specificity(),
        recall: counts.recall(),
        precision: counts.precision(),
        f1: counts.f1(),
        auc: roc_auc(predictions, labels),
        brier: brier_score(predictions, labels),
    }
}

/// Rank-based area under the ROC curve.
///
/// Computed as the Mann-Whitney statistic over prediction ranks with
/// average ranks assigned to ties. Returns `0.0` when either class is
/// absent (zero-fallback policy).
///
/// # Panics
///
/// Panics if slices have different lengths.
#[must_use]
pub fn roc_auc(predictions: &[f32], labels: &[f32]) -> f32 {
    assert_eq!(
        predictions.len(),
        labels.len(),
        "predictions and labels must have same length"
    );

    let n_positive = labels.iter().filter(|&&l| l == 1.0).count();
    let n_negative = labels.len() - n_positive;
    if n_positive == 0 || n_negative == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..predictions.len()).collect();
    order.sort_by(|&a, &b| {
        predictions[a]
            .partial_cmp(&predictions[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks over tied prediction values, then sum positive ranks.
    let mut positive_rank_sum = 0.0_f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && predictions[order[j + 1]] == predictions[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied values i..=j share the average rank.
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1.0 {
                positive_rank_sum += average_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_positive as f64;
    let n_neg = n_negative as f64;
    let u_statistic = positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    (u_statistic / (n_pos * n_neg)) as f32
}

/// Brier score: mean squared error between predicted probability and the
/// binary outcome. Lower is better; a perfectly calibrated, perfectly
/// discriminating predictor scores 0.
///
/// # Panics
///
/// Panics if slices have different lengths or are empty.
#[must_use]
pub fn brier_score(predictions: &[f32], labels: &[f32]) -> f32 {
    assert_eq!(
        predictions.len(),
        labels.len(),
        "predictions and labels must have same length"
    );
    assert!(!predictions.is_empty(), "cannot score an empty prediction set");
    predictions
        .iter()
        .zip(labels.iter())
        .map(|(&p, &y)| (p - y).powi(2))
        .sum::<f32>()
        / predictions.len() as f32
}
