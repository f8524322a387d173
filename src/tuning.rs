//! Hyperparameter grid search driven by inner cross-validation.
//!
//! A [`ParamGrid`] enumerates candidate [`HyperparamConfig`]s in a fixed
//! order; the [`InnerEvaluator`] scores one configuration across k inner
//! folds, and the [`GridSearchTuner`] selects the configuration with the
//! highest mean inner AUC. Configurations are independent, so the tuner
//! evaluates them in parallel; selection runs after the join and is
//! deterministic.

use crate::calibration::PlattScaling;
use crate::data::Dataset;
use crate::error::{ReadmitError, Result};
use crate::metrics::{score, MetricSet};
use crate::model_selection::StratifiedKFold;
use crate::threshold::optimal_threshold;
use crate::traits::{Imputer, ModelTrainer, Oversampler, TrainedModel};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate configuration for the boosted-tree trainer.
///
/// Immutable once built; `with_*` methods return modified copies. The
/// `scale_pos_weight` knob is not part of the search grid — it is derived
/// from each training split's class balance just before training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperparamConfig {
    pub learning_rate: f32,
    pub max_depth: usize,
    pub num_leaves: usize,
    pub min_samples_leaf: usize,
    /// Fraction of features sampled per tree.
    pub feature_fraction: f32,
    /// Fraction of rows sampled when bagging is active.
    pub bagging_fraction: f32,
    /// Re-sample rows every this many rounds; 0 disables bagging.
    pub bagging_freq: usize,
    pub lambda_l1: f32,
    pub lambda_l2: f32,
    /// Negative-to-positive weight ratio for the training split.
    pub scale_pos_weight: f32,
}

impl Default for HyperparamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_depth: 6,
            num_leaves: 31,
            min_samples_leaf: 20,
            feature_fraction: 1.0,
            bagging_fraction: 1.0,
            bagging_freq: 0,
            lambda_l1: 0.0,
            lambda_l2: 0.0,
            scale_pos_weight: 1.0,
        }
    }
}

impl HyperparamConfig {
    /// Copy of this configuration with the given class-imbalance weight.
    #[must_use]
    pub fn with_scale_pos_weight(mut self, scale_pos_weight: f32) -> Self {
        self.scale_pos_weight = scale_pos_weight;
        self
    }
}

impl fmt::Display for HyperparamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lr={} depth={} leaves={} min_leaf={} ff={} bf={} freq={} l1={} l2={} spw={:.3}",
            self.learning_rate,
            self.max_depth,
            self.num_leaves,
            self.min_samples_leaf,
            self.feature_fraction,
            self.bagging_fraction,
            self.bagging_freq,
            self.lambda_l1,
            self.lambda_l2,
            self.scale_pos_weight,
        )
    }
}

/// Candidate values per knob; the grid is their Cartesian product.
///
/// # Examples
///
/// ```
/// use readmit::tuning::ParamGrid;
///
/// let grid = ParamGrid {
///     learning_rates: vec![0.05, 0.1],
///     max_depths: vec![3, 5],
///     ..ParamGrid::minimal()
/// };
/// assert_eq!(grid.configs().len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub learning_rates: Vec<f32>,
    pub max_depths: Vec<usize>,
    pub num_leaves: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub feature_fractions: Vec<f32>,
    pub bagging_fractions: Vec<f32>,
    pub bagging_freqs: Vec<usize>,
    pub lambda_l1: Vec<f32>,
    pub lambda_l2: Vec<f32>,
}

impl Default for ParamGrid {
    /// A small search space around common boosted-tree settings.
    fn default() -> Self {
        Self {
            learning_rates: vec![0.05, 0.1],
            max_depths: vec![3, 5],
            num_leaves: vec![15, 31],
            min_samples_leaf: vec![20],
            feature_fractions: vec![0.8],
            bagging_fractions: vec![0.8],
            bagging_freqs: vec![1],
            lambda_l1: vec![0.0],
            lambda_l2: vec![0.0, 1.0],
        }
    }
}

impl ParamGrid {
    /// A one-configuration grid holding the default knob values.
    #[must_use]
    pub fn minimal() -> Self {
        let defaults = HyperparamConfig::default();
        Self {
            learning_rates: vec![defaults.learning_rate],
            max_depths: vec![defaults.max_depth],
            num_leaves: vec![defaults.num_leaves],
            min_samples_leaf: vec![defaults.min_samples_leaf],
            feature_fractions: vec![defaults.feature_fraction],
            bagging_fractions: vec![defaults.bagging_fraction],
            bagging_freqs: vec![defaults.bagging_freq],
            lambda_l1: vec![defaults.lambda_l1],
            lambda_l2: vec![defaults.lambda_l2],
        }
    }

    /// Enumerates the Cartesian product in a fixed, reproducible order.
    ///
    /// A configuration's position in the returned vector is its stable
    /// enumeration index, used for tie-breaking during selection.
    #[must_use]
    pub fn configs(&self) -> Vec<HyperparamConfig> {
        let mut configs = Vec::new();
        for &learning_rate in &self.learning_rates {
            for &max_depth in &self.max_depths {
                for &num_leaves in &self.num_leaves {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        for &feature_fraction in &self.feature_fractions {
                            for &bagging_fraction in &self.bagging_fractions {
                                for &bagging_freq in &self.bagging_freqs {
                                    for &lambda_l1 in &self.lambda_l1 {
                                        for &lambda_l2 in &self.lambda_l2 {
                                            configs.push(HyperparamConfig {
                                                learning_rate,
                                                max_depth,
                                                num_leaves,
                                                min_samples_leaf,
                                                feature_fraction,
                                                bagging_fraction,
                                                bagging_freq,
                                                lambda_l1,
                                                lambda_l2,
                                                scale_pos_weight: 1.0,
                                            });
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        configs
    }
}

/// Optional preprocessing collaborators applied per training split.
///
/// Imputation statistics come from the training partition and are applied to
/// both partitions; oversampling touches the training partition only.
#[derive(Clone, Copy)]
pub struct Preprocessing<'a> {
    pub imputer: Option<&'a dyn Imputer>,
    pub oversampler: Option<&'a dyn Oversampler>,
    /// Neighborhood size passed to the oversampler.
    pub oversample_neighbors: usize,
    /// Desired minority/majority ratio passed to the oversampler.
    pub oversample_ratio: f32,
}

impl Default for Preprocessing<'_> {
    fn default() -> Self {
        Self {
            imputer: None,
            oversampler: None,
            oversample_neighbors: 5,
            oversample_ratio: 1.0,
        }
    }
}

impl Preprocessing<'_> {
    /// No preprocessing; splits pass through unchanged.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Applies imputation to both partitions and oversampling to the
    /// training partition.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    pub fn prepare(&self, train: Dataset, eval: Dataset) -> Result<(Dataset, Dataset)> {
        let (train, eval) = match self.imputer {
            Some(imputer) => imputer.impute(&train, &eval)?,
            None => (train, eval),
        };
        let train = match self.oversampler {
            Some(oversampler) => {
                oversampler.oversample(&train, self.oversample_neighbors, self.oversample_ratio)?
            }
            None => train,
        };
        Ok((train, eval))
    }
}

/// Averaged inner-fold performance of one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InnerScore {
    /// Arithmetic mean of the metric tuple over finite inner folds.
    pub metrics: MetricSet,
    /// Mean early-stopping round over the same folds.
    pub mean_best_iteration: f32,
    /// Inner folds that produced finite metrics.
    pub evaluated_folds: usize,
    /// Inner folds skipped (calibration non-convergence or non-finite
    /// metrics).
    pub skipped_folds: usize,
}

/// Runs the k inner folds for one configuration.
///
/// Calibration at this stage is fit on the same validation predictions it
/// rescales: only the relative ranking of configurations matters here, not
/// unbiased absolute metrics.
#[derive(Debug, Clone, Copy)]
pub struct InnerEvaluator {
    n_splits: usize,
    seed: u64,
    max_rounds: usize,
    patience: usize,
}

impl InnerEvaluator {
    /// Inner evaluator with `n_splits` folds, seed 0, 500 max rounds, and a
    /// patience of 50 rounds.
    #[must_use]
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            seed: 0,
            max_rounds: 500,
            patience: 50,
        }
    }

    /// Seed for the inner partition.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Maximum boosting rounds per inner training run.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Early-stopping patience in rounds.
    #[must_use]
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Scores `config` across the inner folds of `data`.
    ///
    /// Returns `Ok(None)` when no inner fold produced finite metrics — the
    /// configuration is ineligible, which the tuner records without
    /// aborting the search.
    ///
    /// # Errors
    ///
    /// Propagates partition errors (fatal) and trainer failures (caught by
    /// the tuner at configuration level).
    pub fn evaluate<T: ModelTrainer>(
        &self,
        trainer: &T,
        data: &Dataset,
        config: &HyperparamConfig,
        preprocessing: &Preprocessing<'_>,
    ) -> Result<Option<InnerScore>> {
        let splits = StratifiedKFold::new(self.n_splits)
            .with_seed(self.seed)
            .split(data.labels())?;

        let mut fold_metrics = Vec::with_capacity(self.n_splits);
        let mut best_iterations = Vec::with_capacity(self.n_splits);
        let mut skipped_folds = 0usize;

        for (train_idx, valid_idx) in &splits {
            let train = data.select(train_idx);
            let valid = data.select(valid_idx);
            let (train, valid) = preprocessing.prepare(train, valid)?;

            let fold_config = config.with_scale_pos_weight(train.scale_pos_weight());
            let model = trainer.train(
                &train,
                Some(&valid),
                &fold_config,
                self.max_rounds,
                Some(self.patience),
            )?;

            let raw = model.predict(valid.features());
            let platt = match PlattScaling::fit(raw.as_slice(), valid.labels().as_slice()) {
                Ok(platt) => platt,
                Err(ReadmitError::CalibrationConvergence { .. }) => {
                    skipped_folds += 1;
                    continue;
                }
                Err(other) => return Err(other),
            };

            let calibrated = platt.apply(raw.as_slice());
            let threshold = optimal_threshold(&calibrated, valid.labels().as_slice());
            let metrics = score(&calibrated, valid.labels().as_slice(), threshold);

            if metrics.is_finite() {
                fold_metrics.push(metrics);
                best_iterations.push(model.best_iteration() as f32);
            } else {
                skipped_folds += 1;
            }
        }

        if fold_metrics.is_empty() {
            return Ok(None);
        }

        let mean_best_iteration =
            best_iterations.iter().sum::<f32>() / best_iterations.len() as f32;
        Ok(Some(InnerScore {
            metrics: MetricSet::mean(&fold_metrics),
            mean_best_iteration,
            evaluated_folds: fold_metrics.len(),
            skipped_folds,
        }))
    }
}

/// One configuration's tuning record: either an averaged score or the
/// retained reason it was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigScore {
    /// Stable enumeration index within the grid.
    pub config_index: usize,
    pub config: HyperparamConfig,
    pub score: Option<InnerScore>,
    /// Why the configuration was ineligible, when `score` is `None`.
    pub skipped_reason: Option<String>,
}

/// Outcome of a grid search over one outer-training portion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneOutcome {
    pub best_config: HyperparamConfig,
    /// Enumeration index of the winning configuration.
    pub best_index: usize,
    /// Mean early-stopping round of the winner, rounded to a whole round
    /// budget for the final model.
    pub round_budget: usize,
    /// Per-configuration records in enumeration order.
    pub scores: Vec<ConfigScore>,
    /// Configurations that failed or produced no finite inner fold.
    pub skipped_configs: usize,
}

/// Exhaustive search over a [`ParamGrid`], selecting by mean inner AUC.
#[derive(Debug, Clone, Copy)]
pub struct GridSearchTuner {
    inner: InnerEvaluator,
}

impl GridSearchTuner {
    #[must_use]
    pub fn new(inner: InnerEvaluator) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn inner(&self) -> &InnerEvaluator {
        &self.inner
    }

    /// Evaluates every configuration and returns the best one.
    ///
    /// Configurations run in parallel; results are collected in enumeration
    /// order and the argmax is taken sequentially, so exact AUC ties resolve
    /// to the lowest enumeration index. A trainer failure marks its
    /// configuration ineligible and the search continues.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty grid, on partition failures, and when
    /// every configuration was ineligible.
    pub fn tune<T: ModelTrainer>(
        &self,
        trainer: &T,
        data: &Dataset,
        grid: &ParamGrid,
        preprocessing: &Preprocessing<'_>,
    ) -> Result<TuneOutcome> {
        let configs = grid.configs();
        if configs.is_empty() {
            return Err(ReadmitError::InvalidHyperparameter {
                param: "grid".to_string(),
                value: "0 configurations".to_string(),
                constraint: "at least one candidate per knob".to_string(),
            });
        }

        let scores: Vec<ConfigScore> = configs
            .into_par_iter()
            .enumerate()
            .map(|(config_index, config)| {
                match self.inner.evaluate(trainer, data, &config, preprocessing) {
                    Ok(Some(score)) => Ok(ConfigScore {
                        config_index,
                        config,
                        score: Some(score),
                        skipped_reason: None,
                    }),
                    Ok(None) => Ok(ConfigScore {
                        config_index,
                        config,
                        score: None,
                        skipped_reason: Some(
                            "no inner fold produced finite metrics".to_string(),
                        ),
                    }),
                    Err(err) if err.is_recoverable() => Ok(ConfigScore {
                        config_index,
                        config,
                        score: None,
                        skipped_reason: Some(err.to_string()),
                    }),
                    Err(fatal) => Err(fatal),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let best_index = select_best(&scores).ok_or_else(|| {
            ReadmitError::Other(format!(
                "all {} grid configurations were ineligible",
                scores.len()
            ))
        })?;

        let best = &scores[best_index];
        let best_score = best.score.as_ref().expect("selected config has a score");
        let round_budget = (best_score.mean_best_iteration.round() as usize).max(1);
        let skipped_configs = scores.iter().filter(|s| s.score.is_none()).count();

        Ok(TuneOutcome {
            best_config: best.config,
            best_index,
            round_budget,
            scores,
            skipped_configs,
        })
    }
}

/// Index of the eligible configuration with maximal mean inner AUC; exact
/// ties keep the earliest index. `None` when nothing is eligible.
#[must_use]
pub fn select_best(scores: &[ConfigScore]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for record in scores {
        let Some(score) = &record.score else { continue };
        let auc = score.metrics.auc;
        match best {
            Some((_, best_auc)) if auc <= best_auc => {}
            _ => best = Some((record.config_index, auc)),
        }
    }
    best.map(|(index, _)| index)
}
