//! Integration tests for the nested evaluation pipeline.
//!
//! These tests drive the full orchestration — stratified outer folds, grid
//! search, out-of-fold calibration, threshold selection, scoring, and
//! aggregation — through the public API with deterministic collaborator
//! stand-ins.

use readmit::prelude::*;
use readmit::testing::{
    overlap_dataset, ColumnMeanImputer, DuplicatingOversampler, ScoreByFeatureModel,
    ScoreByFeatureTrainer, WeightedExplainer,
};

use std::sync::Mutex;

/// Imbalanced cohort (~38% positive) with class overlap and a few missing
/// feature entries for the imputer to fill.
fn imbalanced_dataset_with_missing(n: usize) -> Dataset {
    let mut features = Vec::with_capacity(n * 2);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let x0 = i as f32 / n as f32;
        let x1 = ((i * 7) % 10) as f32 / 10.0;
        // Every 17th entry of the secondary feature is missing.
        features.push(x0);
        features.push(if i % 17 == 5 { f32::NAN } else { x1 });

        let base = x0 >= 0.7;
        let flipped = i % 5 == 3;
        labels.push(if base != flipped { 1.0 } else { 0.0 });
    }
    let x = Matrix::from_vec(n, 2, features).expect("valid dims");
    Dataset::new(x, Vector::from_vec(labels)).expect("binary labels")
}

#[test]
fn test_full_pipeline_with_preprocessing_and_attribution() {
    let data = imbalanced_dataset_with_missing(150);
    assert!(data.positive_ratio() < 0.45, "cohort should be imbalanced");

    let trainer = ScoreByFeatureTrainer::default();
    let imputer = ColumnMeanImputer;
    let oversampler = DuplicatingOversampler;
    let explainer = WeightedExplainer {
        weights: vec![1.0, 0.1],
    };
    let preprocessing = Preprocessing {
        imputer: Some(&imputer),
        oversampler: Some(&oversampler),
        oversample_neighbors: 5,
        oversample_ratio: 1.0,
    };

    let report = NestedEvaluation::new(5, 3)
        .with_seed(7)
        .with_max_rounds(60)
        .with_patience(10)
        .run_with(
            &trainer,
            &data,
            &ParamGrid {
                learning_rates: vec![0.05, 0.1],
                ..ParamGrid::minimal()
            },
            &preprocessing,
            Some(&explainer),
        )
        .expect("pipeline completes");

    assert_eq!(report.folds.len(), 5);
    assert!(report.aggregate.evaluated_folds >= 4);

    for fold in report.completed() {
        // Oversampling balanced the training partition and grew it past
        // the raw outer-training size (4/5 of the cohort).
        assert!(fold.stats.n_train > 120);
        assert!((fold.stats.train_positive_ratio - 0.5).abs() < 0.05);
        assert!((fold.stats.scale_pos_weight - 1.0).abs() < 0.1);
        // The test partition is never oversampled.
        assert_eq!(fold.stats.n_test, fold.labels.len());
        assert!((29..=31).contains(&fold.stats.n_test));

        assert!(fold.outcome.metrics.is_finite());
        assert!(fold
            .calibrated_predictions
            .iter()
            .all(|&p| p > 0.0 && p < 1.0));
    }

    // The signal feature outranks the cyclic one.
    let importance = report.importance.expect("explainer supplied");
    assert_eq!(importance.ranked[0].feature, 0);
    assert_eq!(importance.contributing_folds, report.aggregate.evaluated_folds);
}

#[test]
fn test_reports_are_reproducible_across_runs() {
    let data = overlap_dataset(120);
    let trainer = ScoreByFeatureTrainer::default();
    let grid = ParamGrid::minimal();

    let run = || {
        NestedEvaluation::new(5, 3)
            .with_seed(99)
            .with_max_rounds(40)
            .run(&trainer, &data, &grid)
            .expect("pipeline completes")
    };
    let a = run();
    let b = run();

    assert_eq!(a.aggregate, b.aggregate);
    assert_eq!(
        a.summary_json().expect("serializes"),
        b.summary_json().expect("serializes")
    );
}

#[test]
fn test_mean_and_pooled_views_are_both_reported() {
    let data = overlap_dataset(120);
    let report = NestedEvaluation::new(5, 3)
        .with_seed(3)
        .with_max_rounds(40)
        .run(&ScoreByFeatureTrainer::default(), &data, &ParamGrid::minimal())
        .expect("pipeline completes");

    let aggregate = &report.aggregate;
    assert!(aggregate.mean.is_finite());
    assert!(aggregate.std.is_finite());
    assert!(aggregate.pooled.is_finite());
    // Pooled predictions cover every completed fold's test partition.
    let pooled_rows: usize = report.completed().map(|f| f.labels.len()).sum();
    assert_eq!(
        pooled_rows,
        report.completed().map(|f| f.stats.n_test).sum::<usize>()
    );
    // The two AUC views answer different questions and are allowed to
    // differ; neither is asserted equal to the other.
    assert!(aggregate.mean.auc > 0.5);
    assert!(aggregate.pooled.auc > 0.5);
}

/// Model stand-in used by [`ConstantOnHoldoutTrainer`].
enum PipelineTestModel {
    Feature(ScoreByFeatureModel),
    Constant,
}

impl TrainedModel for PipelineTestModel {
    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        match self {
            PipelineTestModel::Feature(model) => model.predict(x),
            PipelineTestModel::Constant => Vector::from_vec(vec![0.5; x.n_rows()]),
        }
    }

    fn best_iteration(&self) -> usize {
        match self {
            PipelineTestModel::Feature(model) => model.best_iteration(),
            PipelineTestModel::Constant => 1,
        }
    }
}

/// Trainer whose first `constant_runs` non-monitored small-split trainings
/// produce a constant-score model. Constant scores make the downstream
/// calibration fit degenerate, simulating a fold whose calibration fails.
struct ConstantOnHoldoutTrainer {
    delegate: ScoreByFeatureTrainer,
    full_train_rows: usize,
    constant_runs: usize,
    calls: Mutex<usize>,
}

impl ConstantOnHoldoutTrainer {
    fn new(full_train_rows: usize, constant_runs: usize) -> Self {
        Self {
            delegate: ScoreByFeatureTrainer::default(),
            full_train_rows,
            constant_runs,
            calls: Mutex::new(0),
        }
    }
}

impl ModelTrainer for ConstantOnHoldoutTrainer {
    type Model = PipelineTestModel;

    fn train(
        &self,
        train: &Dataset,
        valid: Option<&Dataset>,
        config: &HyperparamConfig,
        max_rounds: usize,
        patience: Option<usize>,
    ) -> readmit::Result<Self::Model> {
        // Out-of-fold trainings are the non-monitored runs on less than the
        // full outer-training portion.
        if valid.is_none() && train.n_rows() < self.full_train_rows {
            let mut calls = self.calls.lock().expect("counter lock");
            let current = *calls;
            *calls += 1;
            if current < self.constant_runs {
                return Ok(PipelineTestModel::Constant);
            }
        }
        self.delegate
            .train(train, valid, config, max_rounds, patience)
            .map(PipelineTestModel::Feature)
    }
}

#[test]
fn test_calibration_failure_skips_fold_and_run_continues() {
    let data = overlap_dataset(120);
    // Outer 5-fold on 120 rows: outer-training portions have 96 rows and
    // out-of-fold fits 64. The first fold's three out-of-fold trainings
    // yield constant scores, so that fold's calibration cannot converge.
    let trainer = ConstantOnHoldoutTrainer::new(96, 3);

    let report = NestedEvaluation::new(5, 3)
        .with_seed(5)
        .with_max_rounds(40)
        .run(&trainer, &data, &ParamGrid::minimal())
        .expect("run completes with partial results");

    assert_eq!(report.aggregate.skipped_folds, 1);
    assert_eq!(report.aggregate.evaluated_folds, 4);

    match &report.folds[0] {
        FoldOutcome::Skipped {
            fold_index,
            stage,
            reason,
        } => {
            assert_eq!(*fold_index, 0);
            assert_eq!(stage, "calibration");
            assert!(reason.contains("converge"), "reason: {reason}");
        }
        FoldOutcome::Completed(_) => panic!("fold 0 should have been skipped"),
    }

    // Aggregation is based on the remaining folds only.
    let pooled_rows: usize = report.completed().map(|f| f.labels.len()).sum();
    assert_eq!(pooled_rows, 96);
}

#[test]
fn test_impossible_outer_partition_aborts_the_run() {
    // 6 positives cannot fill 8 stratified outer folds.
    let mut labels = vec![0.0; 34];
    labels.extend(vec![1.0; 6]);
    let x = Matrix::from_vec(40, 1, (0..40).map(|i| i as f32 / 40.0).collect())
        .expect("valid dims");
    let data = Dataset::new(x, Vector::from_vec(labels)).expect("binary labels");

    let err = NestedEvaluation::new(8, 3)
        .run(&ScoreByFeatureTrainer::default(), &data, &ParamGrid::minimal())
        .expect_err("partition is impossible");
    assert!(matches!(err, ReadmitError::InvalidPartition { .. }));
}
