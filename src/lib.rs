//! Readmit: statistically rigorous evaluation of readmission-risk classifiers.
//!
//! Readmit evaluates binary classifiers for clinical-readmission risk with
//! nested cross-validation (unbiased hyperparameter selection), post-hoc
//! probability calibration fit on out-of-fold predictions, and F1-optimal
//! decision-threshold selection. The boosted-tree trainer itself, feature
//! attribution, and preprocessing transforms are consumed through trait
//! boundaries; this crate owns the orchestration and its isolation
//! guarantees.
//!
//! # Quick Start
//!
//! ```
//! use readmit::prelude::*;
//! use readmit::testing::{overlap_dataset, ScoreByFeatureTrainer};
//!
//! // A synthetic cohort and a deterministic stand-in trainer.
//! let data = overlap_dataset(120);
//! let trainer = ScoreByFeatureTrainer::default();
//!
//! let report = NestedEvaluation::new(5, 3)
//!     .with_seed(42)
//!     .with_max_rounds(40)
//!     .run(&trainer, &data, &ParamGrid::minimal())
//!     .unwrap();
//!
//! assert_eq!(report.folds.len(), 5);
//! assert!(report.aggregate.mean.is_finite());
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Vector and Matrix types
//! - [`data`]: Dataset container (features + binary labels)
//! - [`error`]: Error taxonomy and `Result` alias
//! - [`traits`]: Boundaries for the trainer, attribution, and preprocessing
//! - [`model_selection`]: Deterministic stratified k-fold splitting
//! - [`metrics`]: Confusion-derived metrics, rank-based AUC, Brier score
//! - [`threshold`]: F1-optimal threshold scan
//! - [`calibration`]: Platt scaling with surfaced convergence failures
//! - [`tuning`]: Hyperparameter grid, inner evaluation, grid search
//! - [`evaluation`]: Nested cross-validation orchestration and aggregation
//! - [`interpret`]: Cross-fold feature-importance aggregation
//! - [`testing`]: Deterministic collaborator stand-ins for tests

pub mod calibration;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod interpret;
pub mod metrics;
pub mod model_selection;
pub mod prelude;
pub mod primitives;
pub mod testing;
pub mod threshold;
pub mod traits;
pub mod tuning;

pub use error::{ReadmitError, Result};
pub use primitives::{Matrix, Vector};
pub use traits::{AttributionExplainer, Imputer, ModelTrainer, Oversampler, TrainedModel};
