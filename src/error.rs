//! Error types for readmit operations.
//!
//! Provides rich error context for library consumers, distinguishing fatal
//! failures (impossible partitions) from recoverable per-fold failures
//! (calibration non-convergence, attribution errors).

use std::fmt;

/// Main error type for readmit operations.
///
/// Fatal variants abort an evaluation run; recoverable variants are caught
/// at fold or configuration level and retained on the corresponding result
/// records.
///
/// # Examples
///
/// ```
/// use readmit::error::ReadmitError;
///
/// let err = ReadmitError::InvalidPartition {
///     folds: 10,
///     class: "positive",
///     class_count: 4,
/// };
/// assert!(err.to_string().contains("stratified"));
/// ```
#[derive(Debug)]
pub enum ReadmitError {
    /// Stratified split impossible: more folds than members of a class.
    InvalidPartition {
        /// Requested fold count
        folds: usize,
        /// Name of the class that is too small
        class: &'static str,
        /// Number of cases in that class
        class_count: usize,
    },

    /// Probability calibration failed to converge.
    CalibrationConvergence {
        /// Number of iterations attempted
        iterations: usize,
        /// Magnitude of the last parameter update
        final_change: f64,
    },

    /// The external trainer rejected a configuration or produced a
    /// non-finite result. Fold and configuration context is carried by the
    /// result record that retains the failure.
    TrainerFailure {
        /// Trainer-supplied failure description
        message: String,
    },

    /// An external collaborator (e.g. attribution) failed.
    ExternalComputation {
        /// Collaborator-supplied failure description
        message: String,
    },

    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter or option value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for ReadmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadmitError::InvalidPartition {
                folds,
                class,
                class_count,
            } => {
                write!(
                    f,
                    "stratified split impossible: {folds} folds requested but only \
                     {class_count} {class} cases available"
                )
            }
            ReadmitError::CalibrationConvergence {
                iterations,
                final_change,
            } => {
                write!(
                    f,
                    "calibration failed to converge after {iterations} iterations, \
                     last step = {final_change}"
                )
            }
            ReadmitError::TrainerFailure { message } => {
                write!(f, "trainer failure: {message}")
            }
            ReadmitError::ExternalComputation { message } => {
                write!(f, "external computation failed: {message}")
            }
            ReadmitError::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            ReadmitError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            ReadmitError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ReadmitError {}

impl From<&str> for ReadmitError {
    fn from(msg: &str) -> Self {
        ReadmitError::Other(msg.to_string())
    }
}

impl From<String> for ReadmitError {
    fn from(msg: String) -> Self {
        ReadmitError::Other(msg)
    }
}

impl ReadmitError {
    /// Create a dimension mismatch error with descriptive context.
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create an empty input error.
    #[must_use]
    pub fn empty_input(context: &str) -> Self {
        Self::Other(format!("empty input: {context}"))
    }

    /// True for failures that are caught at fold or configuration level
    /// rather than aborting the whole run.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReadmitError::CalibrationConvergence { .. }
                | ReadmitError::TrainerFailure { .. }
                | ReadmitError::ExternalComputation { .. }
        )
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, ReadmitError>;
