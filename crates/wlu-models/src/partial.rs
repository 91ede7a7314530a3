//! Partial pooling by shrinking per-environment fits toward a pooled one.

use serde_json::{json, Value};
use tracing::debug;
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{
    EnvData, Evaluation, EvaluationContext, Model, PoolingCategory, Predictions, Table,
    WorkloadDataset,
};

use crate::linalg::{linear_predict, normal_equations, solve};
use crate::pooling::{env_label, not_fitted, shared_width};
use crate::preprocess::Standardizer;
use crate::regressor::{LeastSquares, Regressor};
use crate::scoring::{score_predictions, ScoredEvaluation};

/// Linear model whose per-environment parameters are pulled toward the
/// parameters fitted on all environments together.
///
/// For environment `i` the parameters solve
/// `(XᵢᵀXᵢ + λI) βᵢ = Xᵢᵀyᵢ + λ β₀`, where `β₀` is the pooled fit. A
/// shrinkage of zero recovers no pooling, a very large one complete pooling.
#[derive(Debug, Clone)]
pub struct PartialPoolingModel {
    shrinkage: f64,
    ridge: f64,
    env_labels: Vec<String>,
    scaler: Option<Standardizer>,
    pooled: Vec<f64>,
    per_env: Vec<Vec<f64>>,
}

impl PartialPoolingModel {
    /// Creates an unfitted model.
    pub fn new(shrinkage: f64, ridge: f64) -> Self {
        Self {
            shrinkage,
            ridge,
            env_labels: Vec::new(),
            scaler: None,
            pooled: Vec::new(),
            per_env: Vec::new(),
        }
    }

    fn shrink(&self, env: &EnvData, x: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>, WluError> {
        let (mut xtx, mut xty) = normal_equations(x, y);
        for (idx, row) in xtx.iter_mut().enumerate() {
            row[idx] += self.shrinkage;
            xty[idx] += self.shrinkage * self.pooled[idx];
        }
        solve(xtx, xty).ok_or_else(|| {
            WluError::Model(
                ErrorInfo::new("partial_pooling_singular", "shrunk normal equations are singular")
                    .with_context("env", env.env_label().to_string())
                    .with_context("shrinkage", self.shrinkage.to_string()),
            )
        })
    }
}

impl Default for PartialPoolingModel {
    fn default() -> Self {
        Self::new(10.0, 1e-3)
    }
}

impl Model for PartialPoolingModel {
    fn instantiate(&self) -> Box<dyn Model> {
        Box::new(Self::new(self.shrinkage, self.ridge))
    }

    fn set_envs(&mut self, dataset: &WorkloadDataset) {
        self.env_labels = dataset.env_labels().into_iter().map(str::to_string).collect();
    }

    fn pooling_cat(&self) -> PoolingCategory {
        PoolingCategory::PartialPooling
    }

    fn fit(&mut self, train: &[EnvData]) -> Result<(), WluError> {
        shared_width(train, "partial-pooling")?;
        let x: Vec<Vec<f64>> = train.iter().flat_map(|env| env.features().to_vec()).collect();
        let y: Vec<f64> = train.iter().flat_map(|env| env.targets().to_vec()).collect();
        let scaler = Standardizer::fit(&x, &y, true);

        let mut pooled = LeastSquares::new(self.ridge);
        pooled.fit(&scaler.transform_x(&x), &scaler.transform_y(&y))?;
        let (intercept, coefficients) = pooled.parameters().unwrap_or_default();
        self.pooled = std::iter::once(intercept).chain(coefficients).collect();
        self.scaler = Some(scaler);

        let mut per_env = Vec::with_capacity(train.len());
        if let Some(scaler) = &self.scaler {
            for env in train {
                let beta = self.shrink(
                    env,
                    &scaler.transform_x(env.features()),
                    &scaler.transform_y(env.targets()),
                )?;
                per_env.push(beta);
            }
        }
        debug!(envs = per_env.len(), shrinkage = self.shrinkage, "partial pooling fitted");
        self.per_env = per_env;
        Ok(())
    }

    fn predict(&self, test: &[EnvData]) -> Result<Predictions, WluError> {
        let scaler = self.scaler.as_ref().ok_or_else(|| not_fitted("partial-pooling"))?;
        shared_width(test, "partial-pooling")?;
        if self.per_env.len() != test.len() {
            return Err(WluError::Model(
                ErrorInfo::new("env_count", "test environments differ from fitted ones")
                    .with_context("fitted", self.per_env.len().to_string())
                    .with_context("test", test.len().to_string()),
            ));
        }
        Ok(self
            .per_env
            .iter()
            .zip(test)
            .map(|(beta, env)| {
                let scaled: Vec<f64> = scaler
                    .transform_x(env.features())
                    .iter()
                    .map(|row| linear_predict(beta[0], &beta[1..], row))
                    .collect();
                scaler.inverse_y(scaled)
            })
            .collect())
    }

    fn evaluate(&self, ctx: EvaluationContext<'_>) -> Result<Box<dyn Evaluation>, WluError> {
        let scores = score_predictions(ctx)?;
        let mut metadata = Table::new(["env", "shrinkage", "intercept", "coefficients"]);
        for (idx, (beta, env)) in self.per_env.iter().zip(ctx.test).enumerate() {
            metadata.push_row(vec![
                json!(env_label(&self.env_labels, idx, env)),
                Value::from(self.shrinkage),
                Value::from(beta[0]),
                json!(&beta[1..]),
            ])?;
        }
        Ok(Box::new(ScoredEvaluation { scores, metadata }))
    }
}
