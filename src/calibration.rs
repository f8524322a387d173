//! Post-hoc probability calibration.
//!
//! Raw classifier scores are mapped to calibrated probabilities by a
//! one-dimensional logistic regression of the true label on the raw score
//! (Platt scaling). Calibration must be fit on scores that are held out from
//! the population later scored with the fitted model; the evaluation
//! orchestrator enforces that ordering.

use crate::error::{ReadmitError, Result};
use serde::{Deserialize, Serialize};

const MAX_ITERATIONS: usize = 100;
const STEP_TOLERANCE: f64 = 1e-6;
// Floor on the Hessian determinant; perfectly separated scores drive the
// curvature to zero and must surface as a convergence failure.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Sigmoid-shaped recalibration map: `sigmoid(intercept + slope * raw)`.
///
/// # Examples
///
/// ```
/// use readmit::calibration::PlattScaling;
///
/// // Noisy scores around the true probabilities.
/// let raw = vec![0.1, 0.3, 0.35, 0.4, 0.6, 0.65, 0.7, 0.9];
/// let labels = vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
/// let platt = PlattScaling::fit(&raw, &labels).expect("fit converges");
///
/// let calibrated = platt.apply(&raw);
/// assert!(calibrated.iter().all(|&p| p > 0.0 && p < 1.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    intercept: f32,
    slope: f32,
}

impl PlattScaling {
    /// Fits the recalibration map by Newton-Raphson on the log-loss.
    ///
    /// # Errors
    ///
    /// Returns [`ReadmitError::CalibrationConvergence`] when the
    /// optimization fails to converge within the iteration budget or the
    /// curvature degenerates (e.g. perfectly separated raw scores). The
    /// failure is surfaced, never silently replaced with an identity map.
    pub fn fit(raw: &[f32], labels: &[f32]) -> Result<Self> {
        if raw.is_empty() {
            return Err(ReadmitError::empty_input("calibration scores"));
        }
        if raw.len() != labels.len() {
            return Err(ReadmitError::dimension_mismatch(
                "scores",
                raw.len(),
                labels.len(),
            ));
        }

        let mut intercept = 0.0_f64;
        let mut slope = 1.0_f64;
        let mut last_step = f64::INFINITY;

        for _ in 0..MAX_ITERATIONS {
            let mut grad_intercept = 0.0_f64;
            let mut grad_slope = 0.0_f64;
            let mut h_ii = 0.0_f64;
            let mut h_is = 0.0_f64;
            let mut h_ss = 0.0_f64;

            for (&x, &y) in raw.iter().zip(labels.iter()) {
                let x = f64::from(x);
                let p = sigmoid_f64(intercept + slope * x);
                let diff = p - f64::from(y);
                let weight = p * (1.0 - p);

                grad_intercept += diff;
                grad_slope += diff * x;
                h_ii += weight;
                h_is += weight * x;
                h_ss += weight * x * x;
            }

            let det = h_ii * h_ss - h_is * h_is;
            if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
                return Err(ReadmitError::CalibrationConvergence {
                    iterations: MAX_ITERATIONS,
                    final_change: last_step,
                });
            }

            // Newton step: solve H * delta = gradient for the 2x2 system.
            let delta_intercept = (h_ss * grad_intercept - h_is * grad_slope) / det;
            let delta_slope = (h_ii * grad_slope - h_is * grad_intercept) / det;

            intercept -= delta_intercept;
            slope -= delta_slope;
            last_step = delta_intercept.abs().max(delta_slope.abs());

            if !last_step.is_finite() {
                return Err(ReadmitError::CalibrationConvergence {
                    iterations: MAX_ITERATIONS,
                    final_change: last_step,
                });
            }
            if last_step < STEP_TOLERANCE {
                return Ok(Self {
                    intercept: intercept as f32,
                    slope: slope as f32,
                });
            }
        }

        Err(ReadmitError::CalibrationConvergence {
            iterations: MAX_ITERATIONS,
            final_change: last_step,
        })
    }

    /// Maps a single raw score to a calibrated probability in (0, 1).
    #[must_use]
    pub fn predict_one(&self, raw: f32) -> f32 {
        sigmoid_f64(f64::from(self.intercept) + f64::from(self.slope) * f64::from(raw)) as f32
    }

    /// Maps raw scores to calibrated probabilities in (0, 1).
    #[must_use]
    pub fn apply(&self, raw: &[f32]) -> Vec<f32> {
        raw.iter().map(|&x| self.predict_one(x)).collect()
    }

    /// The fitted (intercept, slope) pair.
    #[must_use]
    pub fn params(&self) -> (f32, f32) {
        (self.intercept, self.slope)
    }
}

fn sigmoid_f64(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
