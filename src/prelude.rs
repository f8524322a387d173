//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use readmit::prelude::*;
//! ```

pub use crate::data::Dataset;
pub use crate::error::{ReadmitError, Result};
pub use crate::evaluation::{
    AggregateResult, EvaluationReport, FoldOutcome, FoldResult, NestedEvaluation,
    ThresholdPolicy, Verbosity,
};
pub use crate::calibration::PlattScaling;
pub use crate::metrics::MetricSet;
pub use crate::model_selection::StratifiedKFold;
pub use crate::primitives::{Matrix, Vector};
pub use crate::traits::{AttributionExplainer, Imputer, ModelTrainer, Oversampler, TrainedModel};
pub use crate::tuning::{GridSearchTuner, HyperparamConfig, InnerEvaluator, ParamGrid, Preprocessing};
