//! Boundary traits for external collaborators.
//!
//! The evaluation pipeline consumes a boosted-tree trainer, a feature
//! attribution backend, and optional preprocessing transforms through these
//! seams. The crate never implements the algorithms behind them; tests use
//! deterministic stand-ins.
//!
//! All collaborator traits are `Send + Sync` because the hyperparameter
//! search evaluates configurations in parallel and shares the collaborators
//! across worker threads.

use crate::data::Dataset;
use crate::error::Result;
use crate::primitives::{Matrix, Vector};
use crate::tuning::HyperparamConfig;

/// A fitted model produced by a [`ModelTrainer`].
///
/// `predict` must be deterministic for a given trained model.
pub trait TrainedModel {
    /// Raw scores for each row of `x`, aligned by row index.
    fn predict(&self, x: &Matrix<f32>) -> Vector<f32>;

    /// The boosting round at which the monitored validation metric was best.
    ///
    /// Equals the requested round count when training ran without early
    /// stopping.
    fn best_iteration(&self) -> usize;
}

/// Trains a boosted-tree classifier for one configuration.
///
/// When `valid` and `patience` are both supplied, training stops once the
/// monitored validation metric has failed to improve for `patience`
/// consecutive rounds. Without them, training runs exactly `max_rounds`
/// rounds.
pub trait ModelTrainer: Send + Sync {
    /// The model type this trainer produces.
    type Model: TrainedModel;

    /// Fits a model on `train`, optionally monitoring `valid` for early
    /// stopping.
    ///
    /// # Errors
    ///
    /// Implementations report malformed configurations or non-finite
    /// training losses as errors; the caller decides whether the failure is
    /// fatal (a single tuning candidate is not).
    fn train(
        &self,
        train: &Dataset,
        valid: Option<&Dataset>,
        config: &HyperparamConfig,
        max_rounds: usize,
        patience: Option<usize>,
    ) -> Result<Self::Model>;
}

/// Per-row, per-feature attribution scores for a trained model.
pub trait AttributionExplainer<M: TrainedModel>: Send + Sync {
    /// Returns a `rows x features` matrix of attribution values for `x`.
    ///
    /// # Errors
    ///
    /// A failure here is recoverable at fold level: the orchestrator logs it
    /// and excludes the fold from importance aggregation.
    fn explain(&self, model: &M, x: &Matrix<f32>) -> Result<Matrix<f32>>;
}

/// Missing-data completion, fit on a training partition.
///
/// The statistics learned from `train` are applied to both returned
/// datasets, so evaluation partitions never contribute to them.
/// Implementations must preserve row count and row order — downstream
/// prediction slots are aligned by row index.
pub trait Imputer: Send + Sync {
    /// Completes `train` and `eval` using statistics learned from `train`
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the datasets are structurally incompatible.
    fn impute(&self, train: &Dataset, eval: &Dataset) -> Result<(Dataset, Dataset)>;
}

/// Synthetic minority oversampling of a training partition.
///
/// Only ever applied to training data; validation and test partitions must
/// never contain synthetic cases.
pub trait Oversampler: Send + Sync {
    /// Returns a class-rebalanced copy of `train`.
    ///
    /// `neighbors` is the neighborhood size used for synthesis and
    /// `target_ratio` the desired minority/majority ratio after balancing.
    ///
    /// # Errors
    ///
    /// Returns an error if `train` is too small for the requested
    /// neighborhood.
    fn oversample(&self, train: &Dataset, neighbors: usize, target_ratio: f32)
        -> Result<Dataset>;
}
