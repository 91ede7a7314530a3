//! Single-table regressors used inside the pooling wrappers.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use wlu_core::errors::{ErrorInfo, WluError};

use crate::linalg::{linear_predict, normal_equations, solve};

/// Regressor fitted on one feature matrix.
pub trait Regressor: Debug + Clone + Send + Sync + 'static {
    /// Short label recorded in model metadata.
    fn name(&self) -> &'static str;

    /// Returns an unfitted copy carrying the same hyper-parameters.
    fn unfitted(&self) -> Self;

    /// Fits the regressor.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), WluError>;

    /// Predicts one value per row.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, WluError>;

    /// Fitted intercept followed by the option influences.
    fn parameters(&self) -> Option<(f64, Vec<f64>)>;
}

fn not_fitted(name: &str) -> WluError {
    WluError::Model(
        ErrorInfo::new("regressor_not_fitted", "predict called before fit")
            .with_context("regressor", name.to_string()),
    )
}

fn check_training(name: &str, x: &[Vec<f64>], y: &[f64]) -> Result<(), WluError> {
    if y.is_empty() || x.len() != y.len() {
        return Err(WluError::Model(
            ErrorInfo::new("regressor_training_data", "training data is empty or misaligned")
                .with_context("regressor", name.to_string())
                .with_context("rows", x.len().to_string())
                .with_context("targets", y.len().to_string()),
        ));
    }
    Ok(())
}

/// Predicts the training mean for every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MeanRegressor {
    mean: Option<f64>,
}

impl Regressor for MeanRegressor {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn unfitted(&self) -> Self {
        Self::default()
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), WluError> {
        check_training(self.name(), x, y)?;
        self.mean = Some(y.iter().sum::<f64>() / y.len() as f64);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, WluError> {
        let mean = self.mean.ok_or_else(|| not_fitted(self.name()))?;
        Ok(vec![mean; x.len()])
    }

    fn parameters(&self) -> Option<(f64, Vec<f64>)> {
        self.mean.map(|mean| (mean, Vec::new()))
    }
}

/// Ordinary least squares with a small ridge term on the influences.
///
/// The ridge term keeps the normal equations solvable when the training set
/// has fewer rows than options, which happens for small relative sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeastSquares {
    /// Penalty added to the diagonal of the influences.
    pub ridge: f64,
    #[serde(skip)]
    fitted: Option<(f64, Vec<f64>)>,
}

impl LeastSquares {
    /// Creates a regressor with the given ridge penalty.
    pub fn new(ridge: f64) -> Self {
        Self {
            ridge,
            fitted: None,
        }
    }
}

impl Default for LeastSquares {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl Regressor for LeastSquares {
    fn name(&self) -> &'static str {
        "least-squares"
    }

    fn unfitted(&self) -> Self {
        Self::new(self.ridge)
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), WluError> {
        check_training(self.name(), x, y)?;
        let (mut xtx, xty) = normal_equations(x, y);
        for (idx, row) in xtx.iter_mut().enumerate().skip(1) {
            row[idx] += self.ridge;
        }
        let solution = solve(xtx, xty).ok_or_else(|| {
            WluError::Model(
                ErrorInfo::new("least_squares_singular", "normal equations are singular")
                    .with_context("rows", y.len().to_string())
                    .with_hint("increase the ridge penalty"),
            )
        })?;
        self.fitted = Some((solution[0], solution[1..].to_vec()));
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, WluError> {
        let (intercept, coefficients) = self.fitted.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        Ok(x.iter()
            .map(|row| linear_predict(*intercept, coefficients, row))
            .collect())
    }

    fn parameters(&self) -> Option<(f64, Vec<f64>)> {
        self.fitted.clone()
    }
}

/// L1-regularised regression fitted by cyclic coordinate descent.
///
/// Minimises `1/(2n) ||y - b - Xw||² + alpha ||w||₁` with an unpenalised
/// intercept `b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lasso {
    /// L1 penalty weight.
    pub alpha: f64,
    /// Coordinate descent sweeps.
    pub max_iter: usize,
    /// Largest coefficient step that still counts as converged.
    pub tol: f64,
    #[serde(skip)]
    fitted: Option<(f64, Vec<f64>)>,
}

impl Lasso {
    /// Creates a lasso regressor with default iteration limits.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-6,
            fitted: None,
        }
    }
}

impl Default for Lasso {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

impl Regressor for Lasso {
    fn name(&self) -> &'static str {
        "lasso"
    }

    fn unfitted(&self) -> Self {
        Self {
            fitted: None,
            ..self.clone()
        }
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), WluError> {
        check_training(self.name(), x, y)?;
        let n = y.len() as f64;
        let p = x[0].len();
        let x_mean: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n;
        let xc: Vec<Vec<f64>> = x
            .iter()
            .map(|row| row.iter().zip(&x_mean).map(|(v, m)| v - m).collect())
            .collect();
        let col_sq: Vec<f64> = (0..p)
            .map(|j| xc.iter().map(|row| row[j] * row[j]).sum::<f64>() / n)
            .collect();

        let mut weights = vec![0.0; p];
        let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
        for _ in 0..self.max_iter {
            let mut max_step: f64 = 0.0;
            for j in 0..p {
                if col_sq[j] == 0.0 {
                    continue;
                }
                let rho = xc
                    .iter()
                    .zip(&residual)
                    .map(|(row, r)| row[j] * (r + row[j] * weights[j]))
                    .sum::<f64>()
                    / n;
                let updated = soft_threshold(rho, self.alpha) / col_sq[j];
                let delta = updated - weights[j];
                if delta != 0.0 {
                    for (row, r) in xc.iter().zip(residual.iter_mut()) {
                        *r -= row[j] * delta;
                    }
                    weights[j] = updated;
                }
                max_step = max_step.max(delta.abs());
            }
            if max_step < self.tol {
                break;
            }
        }
        let intercept = y_mean - x_mean.iter().zip(&weights).map(|(m, w)| m * w).sum::<f64>();
        self.fitted = Some((intercept, weights));
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, WluError> {
        let (intercept, coefficients) = self.fitted.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        Ok(x.iter()
            .map(|row| linear_predict(*intercept, coefficients, row))
            .collect())
    }

    fn parameters(&self) -> Option<(f64, Vec<f64>)> {
        self.fitted.clone()
    }
}
