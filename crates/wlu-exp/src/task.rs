use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{EnvData, Model, PoolingCategory};

/// Kind of experiment a task belongs to; tasks are grouped into one family
/// per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentType {
    /// Fit on the train subsets, evaluate on the shared test sets.
    Multitask,
    /// Fit on the train subsets, evaluate on every row not used for training.
    Holdout,
}

impl ExperimentType {
    /// Label used in task ids, params and artifact names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentType::Multitask => "multitask",
            ExperimentType::Holdout => "holdout",
        }
    }
}

impl Display for ExperimentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentType {
    type Err = WluError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "multitask" => Ok(ExperimentType::Multitask),
            "holdout" => Ok(ExperimentType::Holdout),
            other => Err(WluError::Config(
                ErrorInfo::new("experiment_type", "unknown experiment type")
                    .with_context("value", other.to_string())
                    .with_hint("expected multitask or holdout"),
            )),
        }
    }
}

/// Renders a relative train size the way it appears in task ids.
pub fn format_rel_size(rel: f64) -> String {
    format!("{rel:?}")
}

/// One unit of work: a model instance plus the data it trains and is scored on.
///
/// The task owns its model exclusively. Train and test lists are
/// index-aligned per environment and shared read-only with every other task
/// planned for the same (dataset, train size, repetition).
pub struct Task {
    pub(crate) exp_type: ExperimentType,
    pub(crate) model_label: String,
    pub(crate) model: Box<dyn Model>,
    pub(crate) dataset_label: String,
    pub(crate) feature_names: Vec<String>,
    pub(crate) train: Arc<Vec<EnvData>>,
    pub(crate) test: Arc<Vec<EnvData>>,
    pub(crate) abs_train_size: usize,
    pub(crate) rel_train_size: f64,
    pub(crate) rnd: u64,
    pub(crate) pooling_cat: PoolingCategory,
    pub(crate) exp_id: String,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("rnd", &self.rnd)
            .field("abs_train_size", &self.abs_train_size)
            .field("pooling_cat", &self.pooling_cat)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// `"{type}-{model} on {dataset}-trainx{rel}"`.
    ///
    /// The repetition is not part of the id; it is always tracked as the
    /// `rnd` parameter instead.
    pub fn id(&self) -> String {
        format!(
            "{}-{} on {}-trainx{}",
            self.exp_type,
            self.model_label,
            self.dataset_label,
            format_rel_size(self.rel_train_size)
        )
    }

    /// Experiment family.
    pub fn exp_type(&self) -> ExperimentType {
        self.exp_type
    }

    /// Registry label of the model.
    pub fn model_label(&self) -> &str {
        &self.model_label
    }

    /// Subject system.
    pub fn dataset_label(&self) -> &str {
        &self.dataset_label
    }

    /// Feature names the model is trained on.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Per-environment training subsets.
    pub fn train(&self) -> &[EnvData] {
        &self.train
    }

    /// Per-environment evaluation data.
    pub fn test(&self) -> &[EnvData] {
        &self.test
    }

    /// Shared handle to the training subsets.
    pub fn train_handle(&self) -> &Arc<Vec<EnvData>> {
        &self.train
    }

    /// Rows in the first environment's training subset.
    pub fn abs_train_size(&self) -> usize {
        self.abs_train_size
    }

    /// Train size as a multiple of the option count.
    pub fn rel_train_size(&self) -> f64 {
        self.rel_train_size
    }

    /// Repetition seed.
    pub fn rnd(&self) -> u64 {
        self.rnd
    }

    /// Pooling category reported by the model.
    pub fn pooling_cat(&self) -> PoolingCategory {
        self.pooling_cat
    }

    /// Replication the task was planned for.
    pub fn exp_id(&self) -> &str {
        &self.exp_id
    }

    /// Read access to the task's model instance.
    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Mutable access to the task's model instance.
    pub fn model_mut(&mut self) -> &mut dyn Model {
        self.model.as_mut()
    }

    /// Metadata dict logged as run parameters and written onto every result
    /// row.
    pub fn metadata(&self) -> BTreeMap<String, Value> {
        let mut meta = BTreeMap::new();
        meta.insert("rnd".to_string(), json!(self.rnd));
        meta.insert("model".to_string(), json!(self.model_label));
        meta.insert("train_size".to_string(), json!(self.abs_train_size));
        meta.insert("subject_system".to_string(), json!(self.dataset_label));
        meta.insert("relative_train_size".to_string(), json!(self.rel_train_size));
        meta.insert("pooling_cat".to_string(), json!(self.pooling_cat.as_str()));
        meta.insert("exp_id".to_string(), json!(self.exp_id));
        meta.insert("experiment_type".to_string(), json!(self.exp_type.as_str()));
        meta.insert("n_train_features".to_string(), json!(self.feature_names.len()));
        meta
    }
}
