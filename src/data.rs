//! Dataset container for binary classification cases.
//!
//! A [`Dataset`] pairs an encoded feature matrix with a binary label vector
//! and is immutable for the lifetime of an evaluation run. Fold-level views
//! are produced by [`Dataset::select`], which copies the requested rows so
//! each fold owns its data.

use crate::error::{ReadmitError, Result};
use crate::primitives::{Matrix, Vector};

/// Feature matrix plus binary label vector with matching row counts.
///
/// Labels must be 0.0 or 1.0; construction validates both the label domain
/// and the row-count agreement.
///
/// # Examples
///
/// ```
/// use readmit::data::Dataset;
/// use readmit::primitives::{Matrix, Vector};
///
/// let x = Matrix::from_vec(4, 1, vec![0.1, 0.2, 0.8, 0.9]).expect("valid dims");
/// let y = Vector::from_slice(&[0.0, 0.0, 1.0, 1.0]);
/// let data = Dataset::new(x, y).expect("consistent rows and binary labels");
/// assert_eq!(data.n_rows(), 4);
/// assert_eq!(data.n_positive(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Matrix<f32>,
    labels: Vector<f32>,
}

impl Dataset {
    /// Creates a dataset from a feature matrix and a binary label vector.
    ///
    /// # Errors
    ///
    /// Returns [`ReadmitError::DimensionMismatch`] if row counts disagree and
    /// [`ReadmitError::Other`] if a label is not 0.0 or 1.0.
    pub fn new(features: Matrix<f32>, labels: Vector<f32>) -> Result<Self> {
        if features.n_rows() != labels.len() {
            return Err(ReadmitError::dimension_mismatch(
                "rows",
                features.n_rows(),
                labels.len(),
            ));
        }
        for (i, &label) in labels.iter().enumerate() {
            if label != 0.0 && label != 1.0 {
                return Err(ReadmitError::Other(format!(
                    "label at row {i} is {label}, expected 0.0 or 1.0"
                )));
            }
        }
        Ok(Self { features, labels })
    }

    /// Number of cases.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.n_rows()
    }

    /// Number of encoded features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.n_cols()
    }

    /// The feature matrix.
    #[must_use]
    pub fn features(&self) -> &Matrix<f32> {
        &self.features
    }

    /// The label vector.
    #[must_use]
    pub fn labels(&self) -> &Vector<f32> {
        &self.labels
    }

    /// Builds a new dataset from the given rows, in order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        let features = self.features.select_rows(indices);
        let labels: Vec<f32> = indices.iter().map(|&i| self.labels[i]).collect();
        Self {
            features,
            labels: Vector::from_vec(labels),
        }
    }

    /// Number of positive (label 1) cases.
    #[must_use]
    pub fn n_positive(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1.0).count()
    }

    /// Number of negative (label 0) cases.
    #[must_use]
    pub fn n_negative(&self) -> usize {
        self.n_rows() - self.n_positive()
    }

    /// Fraction of positive cases; 0.0 for an empty dataset.
    #[must_use]
    pub fn positive_ratio(&self) -> f32 {
        if self.n_rows() == 0 {
            return 0.0;
        }
        self.n_positive() as f32 / self.n_rows() as f32
    }

    /// Class-imbalance weight: negatives over positives.
    ///
    /// Returns 1.0 (neutral weight) when there are no positive cases, so a
    /// degenerate split cannot poison a trainer configuration with a
    /// non-finite weight.
    #[must_use]
    pub fn scale_pos_weight(&self) -> f32 {
        let positives = self.n_positive();
        if positives == 0 {
            return 1.0;
        }
        self.n_negative() as f32 / positives as f32
    }
}
