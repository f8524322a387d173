//! F1-optimal decision-threshold selection.
//!
//! Scans a fixed grid of candidate thresholds and returns the one that
//! maximizes F1. The zero-fallback metric policy guarantees every candidate
//! produces a finite F1, so the scan always has a valid argmax.

use crate::metrics::ConfusionCounts;

/// Inclusive scan bounds and step, in hundredths: 0.10, 0.11, ..., 0.90.
const GRID_START: usize = 10;
const GRID_END: usize = 90;

/// Returns the threshold in `[0.10, 0.90]` with maximal F1.
///
/// Ties are broken by the first occurrence in ascending threshold order.
///
/// # Panics
///
/// Panics if slices have different lengths or are empty.
///
/// # Examples
///
/// ```
/// use readmit::threshold::optimal_threshold;
///
/// let labels = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
/// let predictions = vec![0.1, 0.2, 0.3, 0.7, 0.8, 0.9];
/// let threshold = optimal_threshold(&predictions, &labels);
/// assert!(threshold > 0.3 && threshold <= 0.7);
/// ```
#[must_use]
pub fn optimal_threshold(predictions: &[f32], labels: &[f32]) -> f32 {
    assert_eq!(
        predictions.len(),
        labels.len(),
        "predictions and labels must have same length"
    );
    assert!(!predictions.is_empty(), "cannot scan an empty prediction set");

    let mut best_threshold = GRID_START as f32 / 100.0;
    let mut best_f1 = f32::NEG_INFINITY;

    for hundredths in GRID_START..=GRID_END {
        let threshold = hundredths as f32 / 100.0;
        let f1 = ConfusionCounts::from_predictions(predictions, labels, threshold).f1();
        if f1 > best_f1 {
            best_f1 = f1;
            best_threshold = threshold;
        }
    }

    best_threshold
}
