//! No-pooling and complete-pooling wrappers around a [`Regressor`].

use serde_json::{json, Value};
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{
    EnvData, Evaluation, EvaluationContext, Model, PoolingCategory, Predictions, Table,
    WorkloadDataset,
};

use crate::preprocess::Standardizer;
use crate::regressor::Regressor;
use crate::scoring::{score_predictions, ScoredEvaluation};

pub(crate) const METADATA_COLUMNS: [&str; 5] =
    ["env", "regressor", "standardized", "intercept", "coefficients"];

/// A regressor together with the scaling it was fitted under.
#[derive(Debug, Clone)]
pub(crate) struct Fitted<R> {
    pub(crate) scaler: Option<Standardizer>,
    pub(crate) regressor: R,
}

impl<R: Regressor> Fitted<R> {
    pub(crate) fn fit(proto: &R, x: &[Vec<f64>], y: &[f64], standardize: bool) -> Result<Self, WluError> {
        let mut regressor = proto.unfitted();
        let scaler = standardize.then(|| Standardizer::fit(x, y, true));
        match &scaler {
            Some(scaler) => regressor.fit(&scaler.transform_x(x), &scaler.transform_y(y))?,
            None => regressor.fit(x, y)?,
        }
        Ok(Self { scaler, regressor })
    }

    pub(crate) fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, WluError> {
        match &self.scaler {
            Some(scaler) => Ok(scaler.inverse_y(self.regressor.predict(&scaler.transform_x(x))?)),
            None => self.regressor.predict(x),
        }
    }

    fn metadata_row(&self, env: &str) -> Vec<Value> {
        let (intercept, coefficients) = self.regressor.parameters().unwrap_or_default();
        vec![
            json!(env),
            json!(self.regressor.name()),
            json!(self.scaler.is_some()),
            Value::from(intercept),
            json!(coefficients),
        ]
    }
}

pub(crate) fn not_fitted(model: &str) -> WluError {
    WluError::Model(
        ErrorInfo::new("model_not_fitted", "predict called before fit")
            .with_context("model", model.to_string()),
    )
}

/// Option count shared by every environment a pooled fit stacks together.
pub(crate) fn shared_width(envs: &[EnvData], model: &str) -> Result<usize, WluError> {
    let width = envs.first().map_or(0, EnvData::n_options);
    match envs.iter().find(|env| env.n_options() != width) {
        Some(env) => Err(WluError::Model(
            ErrorInfo::new("feature_width", "pooled environments differ in option count")
                .with_context("model", model.to_string())
                .with_context("env", env.env_label().to_string())
                .with_context("expected", width.to_string())
                .with_context("found", env.n_options().to_string())
                .with_hint("use a no-pooling model for workloads with different options"),
        )),
        None => Ok(width),
    }
}

pub(crate) fn env_label(labels: &[String], idx: usize, fallback: &EnvData) -> String {
    labels
        .get(idx)
        .cloned()
        .unwrap_or_else(|| fallback.env_label().to_string())
}

/// Independent regressor per environment.
#[derive(Debug, Clone)]
pub struct NoPoolingModel<R> {
    proto: R,
    standardize: bool,
    env_labels: Vec<String>,
    fitted: Vec<Fitted<R>>,
}

impl<R: Regressor> NoPoolingModel<R> {
    /// Wraps a regressor prototype.
    pub fn new(proto: R, standardize: bool) -> Self {
        Self {
            proto,
            standardize,
            env_labels: Vec::new(),
            fitted: Vec::new(),
        }
    }
}

impl<R: Regressor> Model for NoPoolingModel<R> {
    fn instantiate(&self) -> Box<dyn Model> {
        Box::new(Self::new(self.proto.unfitted(), self.standardize))
    }

    fn set_envs(&mut self, dataset: &WorkloadDataset) {
        self.env_labels = dataset.env_labels().into_iter().map(str::to_string).collect();
    }

    fn pooling_cat(&self) -> PoolingCategory {
        PoolingCategory::NoPooling
    }

    fn fit(&mut self, train: &[EnvData]) -> Result<(), WluError> {
        self.fitted = train
            .iter()
            .map(|env| {
                Fitted::fit(&self.proto, env.features(), env.targets(), self.standardize).map_err(
                    |err| match err {
                        WluError::Model(info) => {
                            WluError::Model(info.with_context("env", env.env_label().to_string()))
                        }
                        other => other,
                    },
                )
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn predict(&self, test: &[EnvData]) -> Result<Predictions, WluError> {
        if self.fitted.is_empty() {
            return Err(not_fitted("no-pooling"));
        }
        if self.fitted.len() != test.len() {
            return Err(WluError::Model(
                ErrorInfo::new("env_count", "test environments differ from fitted ones")
                    .with_context("fitted", self.fitted.len().to_string())
                    .with_context("test", test.len().to_string()),
            ));
        }
        self.fitted
            .iter()
            .zip(test)
            .map(|(fitted, env)| fitted.predict(env.features()))
            .collect()
    }

    fn evaluate(&self, ctx: EvaluationContext<'_>) -> Result<Box<dyn Evaluation>, WluError> {
        let scores = score_predictions(ctx)?;
        let mut metadata = Table::new(METADATA_COLUMNS);
        for (idx, (fitted, env)) in self.fitted.iter().zip(ctx.test).enumerate() {
            metadata.push_row(fitted.metadata_row(&env_label(&self.env_labels, idx, env)))?;
        }
        Ok(Box::new(ScoredEvaluation { scores, metadata }))
    }
}

/// One regressor on the union of all environments' rows.
#[derive(Debug, Clone)]
pub struct CompletePoolingModel<R> {
    proto: R,
    standardize: bool,
    fitted: Option<Fitted<R>>,
}

impl<R: Regressor> CompletePoolingModel<R> {
    /// Wraps a regressor prototype.
    pub fn new(proto: R, standardize: bool) -> Self {
        Self {
            proto,
            standardize,
            fitted: None,
        }
    }
}

impl<R: Regressor> Model for CompletePoolingModel<R> {
    fn instantiate(&self) -> Box<dyn Model> {
        Box::new(Self::new(self.proto.unfitted(), self.standardize))
    }

    fn set_envs(&mut self, _dataset: &WorkloadDataset) {}

    fn pooling_cat(&self) -> PoolingCategory {
        PoolingCategory::CompletePooling
    }

    fn fit(&mut self, train: &[EnvData]) -> Result<(), WluError> {
        shared_width(train, "complete-pooling")?;
        let x: Vec<Vec<f64>> = train.iter().flat_map(|env| env.features().to_vec()).collect();
        let y: Vec<f64> = train.iter().flat_map(|env| env.targets().to_vec()).collect();
        self.fitted = Some(Fitted::fit(&self.proto, &x, &y, self.standardize)?);
        Ok(())
    }

    fn predict(&self, test: &[EnvData]) -> Result<Predictions, WluError> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted("complete-pooling"))?;
        shared_width(test, "complete-pooling")?;
        test.iter().map(|env| fitted.predict(env.features())).collect()
    }

    fn evaluate(&self, ctx: EvaluationContext<'_>) -> Result<Box<dyn Evaluation>, WluError> {
        let scores = score_predictions(ctx)?;
        let mut metadata = Table::new(METADATA_COLUMNS);
        if let Some(fitted) = &self.fitted {
            metadata.push_row(fitted.metadata_row("pooled"))?;
        }
        Ok(Box::new(ScoredEvaluation { scores, metadata }))
    }
}
