//! Stratified cross-validation splitting.
//!
//! Partitions a binary label vector into k folds while approximately
//! preserving the positive-class ratio in every validation fold. Splits are
//! fully determined by `(labels, k, seed)`: the generator owns its own
//! seeded random source and never touches global RNG state, so the same
//! inputs always produce the same partition.

use crate::error::{ReadmitError, Result};
use crate::primitives::Vector;

use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One fold: training indices and validation indices, both sorted ascending.
pub type Split = (Vec<usize>, Vec<usize>);

/// Stratified K-Fold cross-validator for binary labels.
///
/// Each class's indices are shuffled with a seeded generator and dealt into
/// k contiguous chunks; chunk sizes differ by at most one, with the
/// remainder going to the earliest folds.
///
/// # Examples
///
/// ```
/// use readmit::model_selection::StratifiedKFold;
/// use readmit::primitives::Vector;
///
/// let y = Vector::from_slice(&[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
/// let skfold = StratifiedKFold::new(2).with_seed(42);
///
/// let splits = skfold.split(&y).expect("2 folds fit 4 cases per class");
/// assert_eq!(splits.len(), 2);
/// for (train, valid) in &splits {
///     assert_eq!(train.len(), 4);
///     assert_eq!(valid.len(), 4);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    /// Create a new stratified cross-validator with the default seed 0.
    #[must_use]
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits, seed: 0 }
    }

    /// Set the seed for reproducible shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of folds this validator produces.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate stratified (train, validation) index pairs for each fold.
    ///
    /// The union of each pair is the full index range and the pair is
    /// disjoint; every index appears in exactly one validation fold.
    ///
    /// # Errors
    ///
    /// Returns [`ReadmitError::InvalidHyperparameter`] if `n_splits < 2` and
    /// [`ReadmitError::InvalidPartition`] if a class has fewer cases than
    /// folds (a fold would receive no example of that class).
    pub fn split(&self, labels: &Vector<f32>) -> Result<Vec<Split>> {
        if self.n_splits < 2 {
            return Err(ReadmitError::InvalidHyperparameter {
                param: "n_splits".to_string(),
                value: self.n_splits.to_string(),
                constraint: ">= 2".to_string(),
            });
        }

        let mut positives = Vec::new();
        let mut negatives = Vec::new();
        for (i, &label) in labels.iter().enumerate() {
            if label == 1.0 {
                positives.push(i);
            } else {
                negatives.push(i);
            }
        }

        if positives.len() < self.n_splits {
            return Err(ReadmitError::InvalidPartition {
                folds: self.n_splits,
                class: "positive",
                class_count: positives.len(),
            });
        }
        if negatives.len() < self.n_splits {
            return Err(ReadmitError::InvalidPartition {
                folds: self.n_splits,
                class: "negative",
                class_count: negatives.len(),
            });
        }

        // One RNG stream, classes shuffled in a fixed order, so the whole
        // partition is a function of (labels, k, seed).
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.seed);
        negatives.shuffle(&mut rng);
        positives.shuffle(&mut rng);

        let mut fold_validation: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for class_indices in [&negatives, &positives] {
            for (fold, chunk) in chunk_ranges(class_indices.len(), self.n_splits)
                .into_iter()
                .enumerate()
            {
                fold_validation[fold].extend_from_slice(&class_indices[chunk]);
            }
        }

        let n_samples = labels.len();
        let mut result = Vec::with_capacity(self.n_splits);
        for i in 0..self.n_splits {
            let mut validation = fold_validation[i].clone();
            validation.sort_unstable();

            let mut train = Vec::with_capacity(n_samples - validation.len());
            for (j, fold) in fold_validation.iter().enumerate() {
                if i != j {
                    train.extend_from_slice(fold);
                }
            }
            train.sort_unstable();

            result.push((train, validation));
        }

        Ok(result)
    }
}

/// Splits `0..len` into `k` contiguous ranges whose sizes differ by at most
/// one, larger ranges first.
fn chunk_ranges(len: usize, k: usize) -> Vec<std::ops::Range<usize>> {
    let base = len / k;
    let remainder = len % k;

    let mut ranges = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let size = if i < remainder { base + 1 } else { base };
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}
