//! Collaborator contracts for performance-prediction models.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::data::{EnvData, WorkloadDataset};
use crate::errors::WluError;
use crate::table::Table;

/// Point predictions, one vector per environment in input order.
pub type Predictions = Vec<Vec<f64>>;

/// How a model shares statistical strength across environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoolingCategory {
    /// One independent model per environment.
    NoPooling,
    /// A single model ignoring environment identity.
    CompletePooling,
    /// Per-environment models shrunk toward a shared one.
    PartialPooling,
}

impl PoolingCategory {
    /// Stable label used in tracked parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolingCategory::NoPooling => "no-pooling",
            PoolingCategory::CompletePooling => "complete-pooling",
            PoolingCategory::PartialPooling => "partial-pooling",
        }
    }
}

impl Display for PoolingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predictions paired with the environments they were made for.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Per-environment predictions, index-aligned with `test`.
    pub predictions: &'a [Vec<f64>],
    /// Evaluation data.
    pub test: &'a [EnvData],
}

/// Outcome of [`Model::evaluate`].
pub trait Evaluation: Send {
    /// Score table, typically one row per environment.
    fn scores(&self) -> Table;

    /// Model specific metadata table.
    fn metadata(&self) -> Table;
}

/// Capability interface every model variant implements.
///
/// A registered model acts as a prototype: the planner never fits it
/// directly but asks for an exclusively owned instance per task.
pub trait Model: Send + Sync {
    /// Produces an independent, unfitted instance with the same settings.
    fn instantiate(&self) -> Box<dyn Model>;

    /// Attaches the dataset the instance will be trained on.
    fn set_envs(&mut self, dataset: &WorkloadDataset);

    /// Pooling category used for bookkeeping.
    fn pooling_cat(&self) -> PoolingCategory;

    /// Fits the model on per-environment training data.
    fn fit(&mut self, train: &[EnvData]) -> Result<(), WluError>;

    /// Predicts performance for every row of every environment.
    fn predict(&self, test: &[EnvData]) -> Result<Predictions, WluError>;

    /// Scores predictions against the evaluation data.
    fn evaluate(&self, ctx: EvaluationContext<'_>) -> Result<Box<dyn Evaluation>, WluError>;
}
