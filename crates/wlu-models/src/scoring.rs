//! Per-environment prediction scores.

use serde_json::{json, Value};
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{Evaluation, EvaluationContext, Table};

/// Score table header.
pub const SCORE_COLUMNS: [&str; 6] = ["env_id", "env", "n_test", "mape", "rmse", "r2"];

/// Score and metadata tables produced by the reference models.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvaluation {
    /// One row per test environment.
    pub scores: Table,
    /// Fitted parameters.
    pub metadata: Table,
}

impl Evaluation for ScoredEvaluation {
    fn scores(&self) -> Table {
        self.scores.clone()
    }

    fn metadata(&self) -> Table {
        self.metadata.clone()
    }
}

/// Mean absolute percentage error in percent; rows with a zero target are
/// skipped.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if terms.is_empty() {
        return f64::NAN;
    }
    100.0 * terms.iter().sum::<f64>() / terms.len() as f64
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    let sse: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    (sse / actual.len() as f64).sqrt()
}

/// Coefficient of determination; undefined for constant targets.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return f64::NAN;
    }
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

/// Scores each environment's predictions; NaN scores become nulls.
pub fn score_predictions(ctx: EvaluationContext<'_>) -> Result<Table, WluError> {
    if ctx.predictions.len() != ctx.test.len() {
        return Err(WluError::Model(
            ErrorInfo::new("score_alignment", "predictions and test data differ in length")
                .with_context("predictions", ctx.predictions.len().to_string())
                .with_context("envs", ctx.test.len().to_string()),
        ));
    }
    let mut table = Table::new(SCORE_COLUMNS);
    for (env, predicted) in ctx.test.iter().zip(ctx.predictions) {
        if predicted.len() != env.len() {
            return Err(WluError::Model(
                ErrorInfo::new("score_alignment", "prediction count differs from rows")
                    .with_context("env", env.env_label().to_string())
                    .with_context("rows", env.len().to_string())
                    .with_context("predictions", predicted.len().to_string()),
            ));
        }
        let actual = env.targets();
        table.push_row(vec![
            json!(env.env_id()),
            json!(env.env_label()),
            json!(env.len()),
            Value::from(mape(actual, predicted)),
            Value::from(rmse(actual, predicted)),
            Value::from(r2(actual, predicted)),
        ])?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_score_zero_error() {
        let actual = [1.0, 2.0, 4.0];
        assert_eq!(mape(&actual, &actual), 0.0);
        assert_eq!(rmse(&actual, &actual), 0.0);
        assert_eq!(r2(&actual, &actual), 1.0);
    }

    #[test]
    fn mape_skips_zero_targets() {
        assert_eq!(mape(&[0.0, 2.0], &[5.0, 1.0]), 50.0);
        assert!(mape(&[0.0], &[1.0]).is_nan());
    }

    #[test]
    fn nan_scores_serialise_as_null() {
        assert_eq!(Value::from(f64::NAN), Value::Null);
    }
}
