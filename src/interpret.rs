//! Feature-importance aggregation across evaluation folds.
//!
//! Attribution matrices come from an external explainer (see
//! [`crate::traits::AttributionExplainer`]); this module condenses each
//! fold's matrix into a per-feature mean absolute attribution and averages
//! those summaries across folds. A fold whose attribution computation
//! failed simply contributes nothing — it never aborts the evaluation.

use crate::error::{ReadmitError, Result};
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};

/// Per-feature mean absolute attribution over the rows of one matrix.
///
/// # Examples
///
/// ```
/// use readmit::interpret::mean_absolute_attribution;
/// use readmit::primitives::Matrix;
///
/// let attributions = Matrix::from_vec(2, 2, vec![0.5, -1.0, -0.5, 3.0])
///     .expect("valid dims");
/// assert_eq!(mean_absolute_attribution(&attributions), vec![0.5, 2.0]);
/// ```
#[must_use]
pub fn mean_absolute_attribution(attributions: &Matrix<f32>) -> Vec<f32> {
    let (rows, cols) = attributions.shape();
    let mut sums = vec![0.0_f32; cols];
    for row in 0..rows {
        for (col, sum) in sums.iter_mut().enumerate() {
            *sum += attributions.get(row, col).abs();
        }
    }
    if rows > 0 {
        for sum in &mut sums {
            *sum /= rows as f32;
        }
    }
    sums
}

/// One feature's averaged importance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Column index in the encoded feature matrix.
    pub feature: usize,
    /// Mean absolute attribution, averaged across contributing folds.
    pub importance: f32,
}

/// Ranked importances plus the bookkeeping of which folds contributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceReport {
    /// Features sorted by descending importance; ties by ascending index.
    pub ranked: Vec<FeatureImportance>,
    /// Folds whose attribution summaries entered the average.
    pub contributing_folds: usize,
    /// Folds absent because their attribution computation failed.
    pub skipped_folds: usize,
}

/// Averages per-fold attribution summaries into a ranked importance list.
#[derive(Debug, Clone, Copy)]
pub struct ImportanceAggregator {
    n_features: usize,
}

impl ImportanceAggregator {
    #[must_use]
    pub fn new(n_features: usize) -> Self {
        Self { n_features }
    }

    /// Aggregates the per-fold summaries, skipping `None` entries (folds
    /// whose attribution failed).
    ///
    /// # Errors
    ///
    /// Returns [`ReadmitError::DimensionMismatch`] if a contributing
    /// summary's length differs from the feature count.
    pub fn aggregate(&self, per_fold: &[Option<Vec<f32>>]) -> Result<ImportanceReport> {
        let mut sums = vec![0.0_f32; self.n_features];
        let mut contributing_folds = 0usize;
        let mut skipped_folds = 0usize;

        for summary in per_fold {
            let Some(values) = summary else {
                skipped_folds += 1;
                continue;
            };
            if values.len() != self.n_features {
                return Err(ReadmitError::dimension_mismatch(
                    "features",
                    self.n_features,
                    values.len(),
                ));
            }
            for (sum, &value) in sums.iter_mut().zip(values.iter()) {
                *sum += value;
            }
            contributing_folds += 1;
        }

        let mut ranked: Vec<FeatureImportance> = sums
            .into_iter()
            .enumerate()
            .map(|(feature, sum)| FeatureImportance {
                feature,
                importance: if contributing_folds > 0 {
                    sum / contributing_folds as f32
                } else {
                    0.0
                },
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.feature.cmp(&b.feature))
        });

        Ok(ImportanceReport {
            ranked,
            contributing_folds,
            skipped_folds,
        })
    }
}
