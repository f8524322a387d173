//! Deterministic stand-ins for the external collaborator boundaries.
//!
//! The evaluation pipeline treats the boosted-tree trainer, the attribution
//! backend, and the preprocessing transforms as opaque collaborators. The
//! types here satisfy those contracts with fully deterministic behavior so
//! the pipeline can be exercised end to end without a real training
//! backend. They are intentionally simple; none of them implements a
//! learning algorithm worth using outside a test.

use crate::data::Dataset;
use crate::error::{ReadmitError, Result};
use crate::primitives::{Matrix, Vector};
use crate::traits::{AttributionExplainer, Imputer, ModelTrainer, Oversampler, TrainedModel};
use crate::tuning::HyperparamConfig;

use std::sync::Mutex;

/// Synthetic binary-classification dataset with overlapping classes.
///
/// Feature 0 carries the signal (row position scaled to `[0, 1)`), feature 1
/// is an uninformative cyclic value. Labels follow `feature 0 >= 0.5` with
/// every fourth row flipped, so the classes overlap everywhere along the
/// score axis and the positive ratio stays close to one half.
#[must_use]
pub fn overlap_dataset(n: usize) -> Dataset {
    let mut features = Vec::with_capacity(n * 2);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let x0 = i as f32 / n as f32;
        let x1 = ((i * 7) % 10) as f32 / 10.0;
        features.push(x0);
        features.push(x1);

        let base = x0 >= 0.5;
        let flipped = i % 4 == 2;
        labels.push(if base != flipped { 1.0 } else { 0.0 });
    }
    let x = Matrix::from_vec(n, 2, features).expect("feature construction is consistent");
    Dataset::new(x, Vector::from_vec(labels)).expect("labels are binary by construction")
}

/// Model that scores rows by a logistic transform of one feature.
#[derive(Debug, Clone)]
pub struct ScoreByFeatureModel {
    feature: usize,
    midpoint: f32,
    steepness: f32,
    best_iteration: usize,
}

impl TrainedModel for ScoreByFeatureModel {
    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let scores: Vec<f32> = (0..x.n_rows())
            .map(|row| {
                let value = x.get(row, self.feature);
                1.0 / (1.0 + (-(value - self.midpoint) * self.steepness).exp())
            })
            .collect();
        Vector::from_vec(scores)
    }

    fn best_iteration(&self) -> usize {
        self.best_iteration
    }
}

/// Trainer whose models score by one feature, centered on the training mean.
///
/// With a validation set and patience it reports `max_rounds / 2` as the
/// best iteration, simulating an early stop; otherwise training "runs to
/// completion" and the best iteration equals `max_rounds`.
#[derive(Debug, Clone)]
pub struct ScoreByFeatureTrainer {
    pub feature: usize,
    pub steepness: f32,
}

impl Default for ScoreByFeatureTrainer {
    fn default() -> Self {
        Self {
            feature: 0,
            steepness: 4.0,
        }
    }
}

impl ModelTrainer for ScoreByFeatureTrainer {
    type Model = ScoreByFeatureModel;

    fn train(
        &self,
        train: &Dataset,
        valid: Option<&Dataset>,
        config: &HyperparamConfig,
        max_rounds: usize,
        patience: Option<usize>,
    ) -> Result<Self::Model> {
        if config.learning_rate <= 0.0 {
            return Err(ReadmitError::TrainerFailure {
                message: format!("learning_rate {} must be positive", config.learning_rate),
            });
        }
        if self.feature >= train.n_features() {
            return Err(ReadmitError::TrainerFailure {
                message: format!(
                    "feature {} out of range for {} columns",
                    self.feature,
                    train.n_features()
                ),
            });
        }

        let column_sum: f32 = (0..train.n_rows())
            .map(|row| train.features().get(row, self.feature))
            .sum();
        let midpoint = column_sum / train.n_rows() as f32;

        let best_iteration = if valid.is_some() && patience.is_some() {
            (max_rounds / 2).max(1)
        } else {
            max_rounds
        };

        Ok(ScoreByFeatureModel {
            feature: self.feature,
            midpoint,
            steepness: self.steepness,
            best_iteration,
        })
    }
}

enum FailMode {
    Always,
    MaxDepth(usize),
}

/// Trainer that fails deterministically, delegating otherwise.
pub struct FailingTrainer {
    mode: FailMode,
    delegate: ScoreByFeatureTrainer,
}

impl FailingTrainer {
    /// Fails every training call.
    #[must_use]
    pub fn always() -> Self {
        Self {
            mode: FailMode::Always,
            delegate: ScoreByFeatureTrainer::default(),
        }
    }

    /// Fails only for configurations with the given `max_depth`.
    #[must_use]
    pub fn for_max_depth(max_depth: usize) -> Self {
        Self {
            mode: FailMode::MaxDepth(max_depth),
            delegate: ScoreByFeatureTrainer::default(),
        }
    }
}

impl ModelTrainer for FailingTrainer {
    type Model = ScoreByFeatureModel;

    fn train(
        &self,
        train: &Dataset,
        valid: Option<&Dataset>,
        config: &HyperparamConfig,
        max_rounds: usize,
        patience: Option<usize>,
    ) -> Result<Self::Model> {
        let fails = match self.mode {
            FailMode::Always => true,
            FailMode::MaxDepth(depth) => config.max_depth == depth,
        };
        if fails {
            return Err(ReadmitError::TrainerFailure {
                message: "simulated non-finite training loss".to_string(),
            });
        }
        self.delegate.train(train, valid, config, max_rounds, patience)
    }
}

/// Attribution stand-in: each attribution value is the feature value scaled
/// by a fixed per-feature weight.
#[derive(Debug, Clone)]
pub struct WeightedExplainer {
    pub weights: Vec<f32>,
}

impl<M: TrainedModel> AttributionExplainer<M> for WeightedExplainer {
    fn explain(&self, _model: &M, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        if self.weights.len() != x.n_cols() {
            return Err(ReadmitError::ExternalComputation {
                message: format!(
                    "{} weights for {} features",
                    self.weights.len(),
                    x.n_cols()
                ),
            });
        }
        let mut data = Vec::with_capacity(x.n_rows() * x.n_cols());
        for row in 0..x.n_rows() {
            for col in 0..x.n_cols() {
                data.push(x.get(row, col) * self.weights[col]);
            }
        }
        Ok(Matrix::from_vec(x.n_rows(), x.n_cols(), data).expect("dimensions are consistent"))
    }
}

/// Attribution stand-in that fails on one specific call (0-based), counting
/// calls across its lifetime, and delegates to [`WeightedExplainer`]
/// otherwise.
pub struct FlakyExplainer {
    target_call: usize,
    calls: Mutex<usize>,
    delegate: WeightedExplainer,
}

impl FlakyExplainer {
    #[must_use]
    pub fn failing_on_call(target_call: usize, weights: Vec<f32>) -> Self {
        Self {
            target_call,
            calls: Mutex::new(0),
            delegate: WeightedExplainer { weights },
        }
    }
}

impl<M: TrainedModel> AttributionExplainer<M> for FlakyExplainer {
    fn explain(&self, model: &M, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let call = {
            let mut calls = self.calls.lock().expect("counter lock");
            let current = *calls;
            *calls += 1;
            current
        };
        if call == self.target_call {
            return Err(ReadmitError::ExternalComputation {
                message: "simulated attribution backend failure".to_string(),
            });
        }
        self.delegate.explain(model, x)
    }
}

/// Imputation stand-in: replaces non-finite feature entries with the
/// training column mean, in both partitions.
#[derive(Debug, Clone, Default)]
pub struct ColumnMeanImputer;

impl ColumnMeanImputer {
    fn column_means(train: &Dataset) -> Vec<f32> {
        let x = train.features();
        (0..x.n_cols())
            .map(|col| {
                let mut sum = 0.0;
                let mut count = 0usize;
                for row in 0..x.n_rows() {
                    let value = x.get(row, col);
                    if value.is_finite() {
                        sum += value;
                        count += 1;
                    }
                }
                if count == 0 {
                    0.0
                } else {
                    sum / count as f32
                }
            })
            .collect()
    }

    fn fill(data: &Dataset, means: &[f32]) -> Result<Dataset> {
        let x = data.features();
        let mut filled = Vec::with_capacity(x.n_rows() * x.n_cols());
        for row in 0..x.n_rows() {
            for col in 0..x.n_cols() {
                let value = x.get(row, col);
                filled.push(if value.is_finite() { value } else { means[col] });
            }
        }
        let features = Matrix::from_vec(x.n_rows(), x.n_cols(), filled)
            .map_err(|e| ReadmitError::Other(e.to_string()))?;
        Dataset::new(features, data.labels().clone())
    }
}

impl Imputer for ColumnMeanImputer {
    fn impute(&self, train: &Dataset, eval: &Dataset) -> Result<(Dataset, Dataset)> {
        if train.n_features() != eval.n_features() {
            return Err(ReadmitError::dimension_mismatch(
                "features",
                train.n_features(),
                eval.n_features(),
            ));
        }
        let means = Self::column_means(train);
        Ok((Self::fill(train, &means)?, Self::fill(eval, &means)?))
    }
}

/// Oversampling stand-in: duplicates minority rows cyclically until the
/// minority/majority ratio reaches `target_ratio`.
#[derive(Debug, Clone, Default)]
pub struct DuplicatingOversampler;

impl Oversampler for DuplicatingOversampler {
    fn oversample(
        &self,
        train: &Dataset,
        neighbors: usize,
        target_ratio: f32,
    ) -> Result<Dataset> {
        let positives: Vec<usize> = (0..train.n_rows())
            .filter(|&i| train.labels()[i] == 1.0)
            .collect();
        let negatives: Vec<usize> = (0..train.n_rows())
            .filter(|&i| train.labels()[i] == 0.0)
            .collect();

        let (minority, majority) = if positives.len() <= negatives.len() {
            (positives, negatives)
        } else {
            (negatives, positives)
        };
        if minority.len() <= neighbors {
            return Err(ReadmitError::Other(format!(
                "minority class has {} cases, need more than {neighbors} neighbors",
                minority.len()
            )));
        }

        let target = (majority.len() as f32 * target_ratio).round() as usize;
        let mut indices: Vec<usize> = (0..train.n_rows()).collect();
        let mut next = 0usize;
        let mut minority_count = minority.len();
        while minority_count < target {
            indices.push(minority[next % minority.len()]);
            next += 1;
            minority_count += 1;
        }

        Ok(train.select(&indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_dataset_is_balanced_with_overlap() {
        let data = overlap_dataset(80);
        assert_eq!(data.n_rows(), 80);
        assert_eq!(data.n_features(), 2);
        let ratio = data.positive_ratio();
        assert!((ratio - 0.5).abs() < 0.05, "positive ratio {ratio}");

        // Flipped rows exist on both sides of the midpoint.
        let labels = data.labels();
        let low_positive = (0..40).any(|i| labels[i] == 1.0);
        let high_negative = (40..80).any(|i| labels[i] == 0.0);
        assert!(low_positive && high_negative);
    }

    #[test]
    fn test_score_by_feature_trainer_is_deterministic() {
        let data = overlap_dataset(40);
        let trainer = ScoreByFeatureTrainer::default();
        let config = HyperparamConfig::default();

        let a = trainer
            .train(&data, None, &config, 100, None)
            .expect("training succeeds");
        let b = trainer
            .train(&data, None, &config, 100, None)
            .expect("training succeeds");
        assert_eq!(
            a.predict(data.features()).as_slice(),
            b.predict(data.features()).as_slice()
        );
        assert_eq!(a.best_iteration(), 100);
    }

    #[test]
    fn test_score_by_feature_trainer_simulates_early_stop() {
        let data = overlap_dataset(40);
        let valid = data.select(&[0, 1, 2, 3, 8, 9, 30, 31]);
        let trainer = ScoreByFeatureTrainer::default();
        let model = trainer
            .train(&data, Some(&valid), &HyperparamConfig::default(), 100, Some(10))
            .expect("training succeeds");
        assert_eq!(model.best_iteration(), 50);
    }

    #[test]
    fn test_failing_trainer_modes() {
        let data = overlap_dataset(40);
        let config = HyperparamConfig::default();

        let always = FailingTrainer::always();
        assert!(always.train(&data, None, &config, 10, None).is_err());

        let selective = FailingTrainer::for_max_depth(config.max_depth);
        assert!(selective.train(&data, None, &config, 10, None).is_err());

        let other_depth = FailingTrainer::for_max_depth(config.max_depth + 1);
        assert!(other_depth.train(&data, None, &config, 10, None).is_ok());
    }

    #[test]
    fn test_flaky_explainer_fails_once() {
        let data = overlap_dataset(10);
        let trainer = ScoreByFeatureTrainer::default();
        let model = trainer
            .train(&data, None, &HyperparamConfig::default(), 10, None)
            .expect("training succeeds");

        let explainer = FlakyExplainer::failing_on_call(1, vec![1.0, 1.0]);
        assert!(AttributionExplainer::explain(&explainer, &model, data.features()).is_ok());
        assert!(AttributionExplainer::explain(&explainer, &model, data.features()).is_err());
        assert!(AttributionExplainer::explain(&explainer, &model, data.features()).is_ok());
    }

    #[test]
    fn test_column_mean_imputer_uses_train_statistics() {
        let train_x =
            Matrix::from_vec(3, 1, vec![1.0, 3.0, f32::NAN]).expect("valid dims");
        let train = Dataset::new(train_x, Vector::from_slice(&[0.0, 1.0, 0.0]))
            .expect("valid dataset");
        let eval_x = Matrix::from_vec(2, 1, vec![f32::NAN, 10.0]).expect("valid dims");
        let eval = Dataset::new(eval_x, Vector::from_slice(&[1.0, 0.0])).expect("valid dataset");

        let (train_filled, eval_filled) = ColumnMeanImputer
            .impute(&train, &eval)
            .expect("imputation succeeds");

        // Train mean of finite entries is 2.0; it fills both partitions.
        assert_eq!(train_filled.features().get(2, 0), 2.0);
        assert_eq!(eval_filled.features().get(0, 0), 2.0);
        assert_eq!(eval_filled.features().get(1, 0), 10.0);
    }

    #[test]
    fn test_duplicating_oversampler_reaches_target_ratio() {
        let x = Matrix::from_vec(10, 1, (0..10).map(|i| i as f32).collect()).expect("valid dims");
        let y = Vector::from_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
        let data = Dataset::new(x, y).expect("valid dataset");

        let balanced = DuplicatingOversampler
            .oversample(&data, 1, 1.0)
            .expect("oversampling succeeds");
        assert_eq!(balanced.n_positive(), 8);
        assert_eq!(balanced.n_negative(), 8);
    }

    #[test]
    fn test_duplicating_oversampler_rejects_tiny_minority() {
        let x = Matrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).expect("valid dims");
        let y = Vector::from_slice(&[0.0, 0.0, 0.0, 1.0]);
        let data = Dataset::new(x, y).expect("valid dataset");
        assert!(DuplicatingOversampler.oversample(&data, 5, 1.0).is_err());
    }
}
