//! Nested cross-validation orchestration.
//!
//! The outer loop measures generalization: per outer fold it tunes
//! hyperparameters on the outer-training portion (inner loop), trains a
//! final model on that whole portion, fits probability calibration on
//! out-of-fold predictions over the same portion, and only then scores the
//! untouched outer-test portion. Per-fold results are returned as an
//! ordered, immutable sequence; aggregation (mean, standard deviation, and
//! pooled metrics) is derived from it afterwards.
//!
//! Execution is synchronous fold by fold; the hyperparameter search inside
//! each fold evaluates configurations in parallel. Every partitioning call
//! receives a seed derived from the run seed and the fold index, so no step
//! reads shared random state.

use crate::calibration::PlattScaling;
use crate::data::Dataset;
use crate::error::{ReadmitError, Result};
use crate::interpret::{mean_absolute_attribution, ImportanceAggregator, ImportanceReport};
use crate::metrics::{score, MetricSet};
use crate::model_selection::StratifiedKFold;
use crate::threshold::optimal_threshold;
use crate::traits::{AttributionExplainer, ModelTrainer, TrainedModel};
use crate::tuning::{GridSearchTuner, HyperparamConfig, InnerEvaluator, ParamGrid, Preprocessing, TuneOutcome};

use serde::{Deserialize, Serialize};

/// Where the decision threshold for an outer fold comes from.
///
/// The choice is always explicit; nothing in the pipeline selects a policy
/// silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdPolicy {
    /// Select the threshold on the calibrated out-of-fold predictions over
    /// the outer-training portion. No outer-test label influences the
    /// reported metrics.
    OutOfFoldTrain,
    /// Select the threshold on the calibrated outer-test predictions using
    /// the outer-test labels. Reproduces a historical protocol for
    /// comparison; the resulting metrics are optimistically biased because
    /// the threshold has seen the labels it is evaluated against.
    TestLabels,
}

/// How much progress output the orchestrator writes to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent,
    Summary,
    PerFold,
}

/// Verbosity-gated progress logging for an evaluation run.
///
/// Failure reasons are always retained on the result records as well, so
/// nothing downstream depends on captured log output.
struct RunLogger {
    verbosity: Verbosity,
}

impl RunLogger {
    fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    fn start_run(&self, outer_folds: usize, grid_size: usize) {
        if self.verbosity >= Verbosity::Summary {
            eprintln!(
                "evaluating {outer_folds} outer folds over {grid_size} configurations"
            );
        }
    }

    fn fold_completed(&self, fold: usize, metrics: &MetricSet, threshold: f32, config: usize) {
        if self.verbosity >= Verbosity::PerFold {
            eprintln!(
                "fold {fold}: auc={:.4} f1={:.4} brier={:.4} threshold={threshold:.2} config={config}",
                metrics.auc, metrics.f1, metrics.brier
            );
        }
    }

    fn fold_skipped(&self, fold: usize, stage: &str, reason: &str) {
        if self.verbosity >= Verbosity::PerFold {
            eprintln!("fold {fold} skipped at {stage}: {reason}");
        }
    }

    fn attribution_skipped(&self, fold: usize, reason: &str) {
        if self.verbosity >= Verbosity::PerFold {
            eprintln!("fold {fold}: attribution unavailable: {reason}");
        }
    }

    fn finish(&self, aggregate: &AggregateResult) {
        if self.verbosity >= Verbosity::Summary {
            eprintln!(
                "done: mean auc={:.4} pooled auc={:.4}, {} of {} folds evaluated",
                aggregate.mean.auc,
                aggregate.pooled.auc,
                aggregate.evaluated_folds,
                aggregate.evaluated_folds + aggregate.skipped_folds
            );
        }
    }
}

/// Class-balance statistics of one fold's final training split, computed
/// once when the split is built and reused by reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldStats {
    pub n_train: usize,
    pub n_test: usize,
    pub train_positive_ratio: f32,
    pub scale_pos_weight: f32,
}

/// Metrics, threshold, and configuration that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub metrics: MetricSet,
    pub threshold: f32,
    /// Enumeration index of the selected configuration within the grid.
    pub config_index: usize,
    pub config: HyperparamConfig,
}

/// Everything one completed outer fold produced.
#[derive(Debug)]
pub struct FoldResult<M> {
    pub fold_index: usize,
    pub outcome: EvaluationOutcome,
    /// Final model trained on the full outer-training portion.
    pub model: M,
    /// Calibration fit on out-of-fold predictions over the outer-training
    /// portion.
    pub calibration: PlattScaling,
    /// Raw scores on the outer-test portion.
    pub raw_predictions: Vec<f32>,
    /// Calibrated scores on the outer-test portion.
    pub calibrated_predictions: Vec<f32>,
    /// Outer-test labels, aligned with the predictions.
    pub labels: Vec<f32>,
    pub stats: FoldStats,
    /// Per-feature mean absolute attribution on the outer-test portion,
    /// when an explainer was supplied and succeeded.
    pub attribution: Option<Vec<f32>>,
    /// Retained reason when attribution was requested but failed.
    pub attribution_error: Option<String>,
    /// Full tuning record for this fold.
    pub tuning: TuneOutcome,
}

/// A fold either completed or was skipped with a retained reason.
#[derive(Debug)]
pub enum FoldOutcome<M> {
    Completed(FoldResult<M>),
    Skipped {
        fold_index: usize,
        /// Pipeline stage that failed (e.g. "calibration", "training").
        stage: String,
        reason: String,
    },
}

impl<M> FoldOutcome<M> {
    /// The completed result, if any.
    #[must_use]
    pub fn result(&self) -> Option<&FoldResult<M>> {
        match self {
            FoldOutcome::Completed(result) => Some(result),
            FoldOutcome::Skipped { .. } => None,
        }
    }

    #[must_use]
    pub fn fold_index(&self) -> usize {
        match self {
            FoldOutcome::Completed(result) => result.fold_index,
            FoldOutcome::Skipped { fold_index, .. } => *fold_index,
        }
    }
}

/// Across-fold aggregation of the per-fold metrics.
///
/// `mean`/`std` answer "how stable is performance across folds"; `pooled`
/// scores the concatenation of every fold's calibrated test predictions,
/// answering "how well do the pooled predictions discriminate". The two
/// views legitimately differ — AUC in particular is not linear in its
/// inputs — so both are reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub mean: MetricSet,
    pub std: MetricSet,
    pub pooled: MetricSet,
    /// Threshold used for the pooled confusion metrics: the mean of the
    /// per-fold selected thresholds.
    pub pooled_threshold: f32,
    pub evaluated_folds: usize,
    pub skipped_folds: usize,
}

/// Full output of a nested evaluation run.
#[derive(Debug)]
pub struct EvaluationReport<M> {
    /// Per-fold outcomes in fold order.
    pub folds: Vec<FoldOutcome<M>>,
    pub aggregate: AggregateResult,
    /// Present when an attribution explainer was supplied.
    pub importance: Option<ImportanceReport>,
}

/// Serializable view of one fold for report summaries.
#[derive(Debug, Clone, Serialize)]
struct FoldSummary {
    fold_index: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<EvaluationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<FoldStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped_reason: Option<String>,
}

#[derive(Serialize)]
struct ReportSummary<'a> {
    folds: Vec<FoldSummary>,
    aggregate: &'a AggregateResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    importance: &'a Option<ImportanceReport>,
}

impl<M> EvaluationReport<M> {
    /// Iterator over the completed folds, in order.
    pub fn completed(&self) -> impl Iterator<Item = &FoldResult<M>> {
        self.folds.iter().filter_map(FoldOutcome::result)
    }

    /// JSON rendering of the structured result records (per-fold outcomes,
    /// aggregate, importances). Models and stored prediction vectors are not
    /// included.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn summary_json(&self) -> Result<String> {
        let folds = self
            .folds
            .iter()
            .map(|fold| match fold {
                FoldOutcome::Completed(result) => FoldSummary {
                    fold_index: result.fold_index,
                    status: "completed",
                    outcome: Some(result.outcome),
                    stats: Some(result.stats),
                    skipped_stage: None,
                    skipped_reason: None,
                },
                FoldOutcome::Skipped {
                    fold_index,
                    stage,
                    reason,
                } => FoldSummary {
                    fold_index: *fold_index,
                    status: "skipped",
                    outcome: None,
                    stats: None,
                    skipped_stage: Some(stage.clone()),
                    skipped_reason: Some(reason.clone()),
                },
            })
            .collect();

        let summary = ReportSummary {
            folds,
            aggregate: &self.aggregate,
            importance: &self.importance,
        };
        serde_json::to_string_pretty(&summary)
            .map_err(|e| ReadmitError::Other(format!("summary serialization failed: {e}")))
    }
}

/// Nested cross-validation driver.
///
/// # Examples
///
/// ```ignore
/// use readmit::evaluation::NestedEvaluation;
/// use readmit::tuning::ParamGrid;
///
/// let report = NestedEvaluation::new(5, 3)
///     .with_seed(42)
///     .run(&trainer, &data, &ParamGrid::default())?;
/// println!("{}", report.summary_json()?);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NestedEvaluation {
    outer_splits: usize,
    inner_splits: usize,
    seed: u64,
    max_rounds: usize,
    patience: usize,
    threshold_policy: ThresholdPolicy,
    verbosity: Verbosity,
}

impl NestedEvaluation {
    /// Evaluation with the given outer and inner fold counts; seed 0,
    /// 500 max rounds, patience 50, leak-free threshold policy, silent.
    #[must_use]
    pub fn new(outer_splits: usize, inner_splits: usize) -> Self {
        Self {
            outer_splits,
            inner_splits,
            seed: 0,
            max_rounds: 500,
            patience: 50,
            threshold_policy: ThresholdPolicy::OutOfFoldTrain,
            verbosity: Verbosity::Silent,
        }
    }

    /// Seed from which every partition seed in the run is derived.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Maximum boosting rounds for inner training runs.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Early-stopping patience for inner training runs.
    #[must_use]
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Decision-threshold selection policy.
    #[must_use]
    pub fn with_threshold_policy(mut self, policy: ThresholdPolicy) -> Self {
        self.threshold_policy = policy;
        self
    }

    /// Progress-output level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Runs the full nested evaluation without preprocessing or attribution.
    ///
    /// # Errors
    ///
    /// See [`NestedEvaluation::run_with`].
    pub fn run<T: ModelTrainer>(
        &self,
        trainer: &T,
        data: &Dataset,
        grid: &ParamGrid,
    ) -> Result<EvaluationReport<T::Model>> {
        self.run_with(trainer, data, grid, &Preprocessing::none(), None)
    }

    /// Runs the full nested evaluation with optional preprocessing
    /// collaborators and an optional attribution explainer.
    ///
    /// Recoverable per-fold failures (calibration non-convergence, trainer
    /// failures on the selected configuration) skip the fold with a
    /// retained reason; attribution failures only exclude the fold from
    /// importance aggregation.
    ///
    /// # Errors
    ///
    /// Fatal: an impossible stratified partition, an empty grid, every
    /// configuration ineligible within a fold, or every outer fold skipped.
    pub fn run_with<T: ModelTrainer>(
        &self,
        trainer: &T,
        data: &Dataset,
        grid: &ParamGrid,
        preprocessing: &Preprocessing<'_>,
        explainer: Option<&dyn AttributionExplainer<T::Model>>,
    ) -> Result<EvaluationReport<T::Model>> {
        let logger = RunLogger::new(self.verbosity);
        let outer = StratifiedKFold::new(self.outer_splits)
            .with_seed(self.seed)
            .split(data.labels())?;
        logger.start_run(outer.len(), grid.configs().len());

        let mut folds: Vec<FoldOutcome<T::Model>> = Vec::with_capacity(outer.len());
        for (fold_index, (train_idx, test_idx)) in outer.iter().enumerate() {
            match self.run_fold(
                trainer,
                data,
                grid,
                preprocessing,
                explainer,
                fold_index,
                train_idx,
                test_idx,
                &logger,
            ) {
                Ok(result) => {
                    logger.fold_completed(
                        fold_index,
                        &result.outcome.metrics,
                        result.outcome.threshold,
                        result.outcome.config_index,
                    );
                    folds.push(FoldOutcome::Completed(result));
                }
                Err(err) if err.is_recoverable() => {
                    let stage = failure_stage(&err);
                    logger.fold_skipped(fold_index, stage, &err.to_string());
                    folds.push(FoldOutcome::Skipped {
                        fold_index,
                        stage: stage.to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(fatal) => {
                    return Err(ReadmitError::Other(format!(
                        "outer fold {fold_index}: {fatal}"
                    )))
                }
            }
        }

        let aggregate = aggregate_folds(&folds)?;
        let importance = match explainer {
            None => None,
            Some(_) => {
                let per_fold: Vec<Option<Vec<f32>>> = folds
                    .iter()
                    .filter_map(FoldOutcome::result)
                    .map(|result| result.attribution.clone())
                    .collect();
                Some(ImportanceAggregator::new(data.n_features()).aggregate(&per_fold)?)
            }
        };

        logger.finish(&aggregate);
        Ok(EvaluationReport {
            folds,
            aggregate,
            importance,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_fold<T: ModelTrainer>(
        &self,
        trainer: &T,
        data: &Dataset,
        grid: &ParamGrid,
        preprocessing: &Preprocessing<'_>,
        explainer: Option<&dyn AttributionExplainer<T::Model>>,
        fold_index: usize,
        train_idx: &[usize],
        test_idx: &[usize],
        logger: &RunLogger,
    ) -> Result<FoldResult<T::Model>> {
        let tuning_seed = derive_seed(self.seed, fold_index as u64 * 2 + 1);
        let oof_seed = derive_seed(self.seed, fold_index as u64 * 2 + 2);

        let outer_train = data.select(train_idx);
        let outer_test = data.select(test_idx);

        // Inner loop: hyperparameter selection on the outer-training
        // portion only.
        let tuner = GridSearchTuner::new(
            InnerEvaluator::new(self.inner_splits)
                .with_seed(tuning_seed)
                .with_max_rounds(self.max_rounds)
                .with_patience(self.patience),
        );
        let tuning = tuner.tune(trainer, &outer_train, grid, preprocessing)?;

        // Final model: full outer-training portion, fixed round budget from
        // the tuner, no early stopping.
        let (final_train, final_test) =
            preprocessing.prepare(outer_train.clone(), outer_test)?;
        let config = tuning
            .best_config
            .with_scale_pos_weight(final_train.scale_pos_weight());
        let stats = FoldStats {
            n_train: final_train.n_rows(),
            n_test: final_test.n_rows(),
            train_positive_ratio: final_train.positive_ratio(),
            scale_pos_weight: config.scale_pos_weight,
        };
        let model = trainer.train(&final_train, None, &config, tuning.round_budget, None)?;

        // Calibration inputs: out-of-fold predictions over the
        // outer-training portion. The outer-test portion never enters the
        // fit.
        let oof_raw = self.out_of_fold_predictions(
            trainer,
            &outer_train,
            &config,
            tuning.round_budget,
            oof_seed,
            preprocessing,
        )?;
        let calibration = PlattScaling::fit(&oof_raw, outer_train.labels().as_slice())?;

        let raw_predictions = model.predict(final_test.features());
        let calibrated_predictions = calibration.apply(raw_predictions.as_slice());

        let threshold = match self.threshold_policy {
            ThresholdPolicy::OutOfFoldTrain => {
                let oof_calibrated = calibration.apply(&oof_raw);
                optimal_threshold(&oof_calibrated, outer_train.labels().as_slice())
            }
            ThresholdPolicy::TestLabels => {
                optimal_threshold(&calibrated_predictions, final_test.labels().as_slice())
            }
        };
        let metrics = score(
            &calibrated_predictions,
            final_test.labels().as_slice(),
            threshold,
        );

        let (attribution, attribution_error) = match explainer {
            None => (None, None),
            Some(explainer) => match explainer.explain(&model, final_test.features()) {
                Ok(matrix) => (Some(mean_absolute_attribution(&matrix)), None),
                Err(err) => {
                    logger.attribution_skipped(fold_index, &err.to_string());
                    (None, Some(err.to_string()))
                }
            },
        };

        Ok(FoldResult {
            fold_index,
            outcome: EvaluationOutcome {
                metrics,
                threshold,
                config_index: tuning.best_index,
                config,
            },
            model,
            calibration,
            raw_predictions: raw_predictions.as_slice().to_vec(),
            calibrated_predictions,
            labels: final_test.labels().as_slice().to_vec(),
            stats,
            attribution,
            attribution_error,
            tuning,
        })
    }

    /// Cross-validated raw predictions over `train_data`: every row is
    /// predicted by a model that did not see it during fitting.
    fn out_of_fold_predictions<T: ModelTrainer>(
        &self,
        trainer: &T,
        train_data: &Dataset,
        config: &HyperparamConfig,
        rounds: usize,
        seed: u64,
        preprocessing: &Preprocessing<'_>,
    ) -> Result<Vec<f32>> {
        let splits = StratifiedKFold::new(self.inner_splits)
            .with_seed(seed)
            .split(train_data.labels())?;

        let mut out_of_fold = vec![0.0_f32; train_data.n_rows()];
        for (fit_idx, held_idx) in &splits {
            let fit = train_data.select(fit_idx);
            let held = train_data.select(held_idx);
            let (fit, held) = preprocessing.prepare(fit, held)?;

            let fold_config = config.with_scale_pos_weight(fit.scale_pos_weight());
            let model = trainer.train(&fit, None, &fold_config, rounds, None)?;
            let predictions = model.predict(held.features());
            for (&slot, &prediction) in held_idx.iter().zip(predictions.iter()) {
                out_of_fold[slot] = prediction;
            }
        }
        Ok(out_of_fold)
    }
}

/// Maps a recoverable error to the pipeline stage it names.
fn failure_stage(err: &ReadmitError) -> &'static str {
    match err {
        ReadmitError::CalibrationConvergence { .. } => "calibration",
        ReadmitError::TrainerFailure { .. } => "training",
        ReadmitError::ExternalComputation { .. } => "attribution",
        _ => "evaluation",
    }
}

/// Derives an independent seed stream from the run seed.
fn derive_seed(base: u64, stream: u64) -> u64 {
    let mut z = base.wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Mean/std over completed folds plus pooled metrics over their
/// concatenated predictions.
fn aggregate_folds<M>(folds: &[FoldOutcome<M>]) -> Result<AggregateResult> {
    let completed: Vec<&FoldResult<M>> = folds.iter().filter_map(FoldOutcome::result).collect();
    let skipped_folds = folds.len() - completed.len();
    if completed.is_empty() {
        return Err(ReadmitError::Other(format!(
            "all {} outer folds were skipped",
            folds.len()
        )));
    }

    let metric_sets: Vec<MetricSet> = completed.iter().map(|f| f.outcome.metrics).collect();
    let mean = MetricSet::mean(&metric_sets);
    let std = MetricSet::std(&metric_sets);

    let mut pooled_predictions = Vec::new();
    let mut pooled_labels = Vec::new();
    let mut threshold_sum = 0.0_f32;
    for fold in &completed {
        pooled_predictions.extend_from_slice(&fold.calibrated_predictions);
        pooled_labels.extend_from_slice(&fold.labels);
        threshold_sum += fold.outcome.threshold;
    }
    let pooled_threshold = threshold_sum / completed.len() as f32;
    let pooled = score(&pooled_predictions, &pooled_labels, pooled_threshold);

    Ok(AggregateResult {
        mean,
        std,
        pooled,
        pooled_threshold,
        evaluated_folds: completed.len(),
        skipped_folds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{overlap_dataset, FlakyExplainer, ScoreByFeatureTrainer, WeightedExplainer};

    fn quick_evaluation() -> NestedEvaluation {
        NestedEvaluation::new(5, 3)
            .with_seed(42)
            .with_max_rounds(40)
            .with_patience(5)
    }

    fn small_grid() -> ParamGrid {
        ParamGrid {
            learning_rates: vec![0.05, 0.1],
            ..ParamGrid::minimal()
        }
    }

    #[test]
    fn test_run_produces_one_outcome_per_outer_fold() {
        let data = overlap_dataset(120);
        let report = quick_evaluation()
            .run(&ScoreByFeatureTrainer::default(), &data, &small_grid())
            .expect("evaluation completes");

        assert_eq!(report.folds.len(), 5);
        for (i, fold) in report.folds.iter().enumerate() {
            assert_eq!(fold.fold_index(), i);
        }
        assert_eq!(
            report.aggregate.evaluated_folds + report.aggregate.skipped_folds,
            5
        );
        assert!(report.aggregate.evaluated_folds >= 1);
    }

    #[test]
    fn test_run_is_deterministic() {
        let data = overlap_dataset(120);
        let trainer = ScoreByFeatureTrainer::default();
        let grid = small_grid();

        let a = quick_evaluation().run(&trainer, &data, &grid).expect("runs");
        let b = quick_evaluation().run(&trainer, &data, &grid).expect("runs");

        assert_eq!(a.aggregate, b.aggregate);
        for (fa, fb) in a.completed().zip(b.completed()) {
            assert_eq!(fa.outcome, fb.outcome);
            assert_eq!(fa.calibrated_predictions, fb.calibrated_predictions);
        }
    }

    #[test]
    fn test_fold_results_are_internally_consistent() {
        let data = overlap_dataset(120);
        let report = quick_evaluation()
            .run(&ScoreByFeatureTrainer::default(), &data, &small_grid())
            .expect("evaluation completes");

        for fold in report.completed() {
            assert_eq!(fold.raw_predictions.len(), fold.labels.len());
            assert_eq!(fold.calibrated_predictions.len(), fold.labels.len());
            assert_eq!(fold.stats.n_test, fold.labels.len());
            assert!(fold.outcome.metrics.is_finite());
            assert!((0.10..=0.90).contains(&fold.outcome.threshold));
            assert!(fold
                .calibrated_predictions
                .iter()
                .all(|&p| p > 0.0 && p < 1.0));
            // The calibration map reproduces the stored calibrated scores.
            for (&raw, &calibrated) in
                fold.raw_predictions.iter().zip(&fold.calibrated_predictions)
            {
                assert!((fold.calibration.predict_one(raw) - calibrated).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_pooled_metrics_may_differ_from_mean_metrics() {
        let data = overlap_dataset(120);
        let report = quick_evaluation()
            .run(&ScoreByFeatureTrainer::default(), &data, &small_grid())
            .expect("evaluation completes");

        // Both views must exist and be finite; they are allowed to differ
        // (AUC is not linear in its inputs), so nothing here asserts
        // equality between them.
        assert!(report.aggregate.mean.is_finite());
        assert!(report.aggregate.pooled.is_finite());
        assert!(report.aggregate.pooled.auc > 0.5);
        assert!((0.10..=0.90).contains(&report.aggregate.pooled_threshold));
    }

    #[test]
    fn test_test_labels_policy_stores_the_test_side_optimum() {
        // Under the TestLabels policy the stored threshold is recomputable
        // from the stored test predictions and labels.
        let data = overlap_dataset(120);
        let report = quick_evaluation()
            .with_threshold_policy(ThresholdPolicy::TestLabels)
            .run(&ScoreByFeatureTrainer::default(), &data, &small_grid())
            .expect("evaluation completes");

        for fold in report.completed() {
            let recomputed =
                optimal_threshold(&fold.calibrated_predictions, &fold.labels);
            assert!(
                (fold.outcome.threshold - recomputed).abs() < 1e-6,
                "fold {}: stored {} vs recomputed {}",
                fold.fold_index,
                fold.outcome.threshold,
                recomputed
            );
        }
    }

    #[test]
    fn test_threshold_policies_are_selectable() {
        let data = overlap_dataset(120);
        let trainer = ScoreByFeatureTrainer::default();
        let grid = small_grid();

        let leak_free = quick_evaluation()
            .with_threshold_policy(ThresholdPolicy::OutOfFoldTrain)
            .run(&trainer, &data, &grid)
            .expect("runs");
        let leaky = quick_evaluation()
            .with_threshold_policy(ThresholdPolicy::TestLabels)
            .run(&trainer, &data, &grid)
            .expect("runs");

        // The leaky policy optimizes F1 against the labels it is scored
        // on, so per fold its F1 is at least the leak-free policy's F1
        // whenever both evaluated the same fold.
        for (a, b) in leaky.completed().zip(leak_free.completed()) {
            assert!(
                a.outcome.metrics.f1 >= b.outcome.metrics.f1 - 1e-6,
                "fold {}: leaky F1 {} below leak-free F1 {}",
                a.fold_index,
                a.outcome.metrics.f1,
                b.outcome.metrics.f1
            );
        }
    }

    #[test]
    fn test_attribution_failure_skips_fold_in_importance_only() {
        let data = overlap_dataset(120);
        let explainer = FlakyExplainer::failing_on_call(2, vec![1.0, 0.1]);

        let report = quick_evaluation()
            .run_with(
                &ScoreByFeatureTrainer::default(),
                &data,
                &small_grid(),
                &Preprocessing::none(),
                Some(&explainer),
            )
            .expect("evaluation completes despite one attribution failure");

        // The failing fold still completed its evaluation.
        assert_eq!(report.aggregate.evaluated_folds, 5);

        let importance = report.importance.as_ref().expect("explainer was supplied");
        assert_eq!(importance.contributing_folds, 4);
        assert_eq!(importance.skipped_folds, 1);

        let with_error: Vec<_> = report
            .completed()
            .filter(|f| f.attribution_error.is_some())
            .collect();
        assert_eq!(with_error.len(), 1);
        assert!(with_error[0].attribution.is_none());
    }

    #[test]
    fn test_importance_ranks_signal_feature_first() {
        let data = overlap_dataset(120);
        let explainer = WeightedExplainer {
            weights: vec![1.0, 0.05],
        };

        let report = quick_evaluation()
            .run_with(
                &ScoreByFeatureTrainer::default(),
                &data,
                &small_grid(),
                &Preprocessing::none(),
                Some(&explainer),
            )
            .expect("evaluation completes");

        let importance = report.importance.expect("explainer was supplied");
        assert_eq!(importance.ranked[0].feature, 0);
    }

    #[test]
    fn test_outer_partition_too_fine_is_fatal() {
        let data = overlap_dataset(16);
        let result = NestedEvaluation::new(10, 3)
            .run(&ScoreByFeatureTrainer::default(), &data, &small_grid());
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_json_round_trips_structure() {
        let data = overlap_dataset(120);
        let report = quick_evaluation()
            .run(&ScoreByFeatureTrainer::default(), &data, &small_grid())
            .expect("evaluation completes");

        let json = report.summary_json().expect("serializes");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(parsed["folds"].as_array().expect("folds array").len(), 5);
        assert!(parsed["aggregate"]["mean"]["auc"].is_number());
        assert!(parsed["aggregate"]["pooled"]["auc"].is_number());
    }

    #[test]
    fn test_derive_seed_streams_are_distinct() {
        let base = 42;
        let seeds: Vec<u64> = (0..10).map(|i| derive_seed(base, i)).collect();
        let mut deduped = seeds.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), seeds.len());
    }
}
