//! Per-environment observation tables and the deterministic splitter.

use std::collections::BTreeSet;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{ErrorInfo, WluError};

// Absorbs products such as 0.7 * 10 landing just below an integer.
const SIZE_EPSILON: f64 = 1e-9;

/// Converts a size relative to the option count into a row count (floor).
pub fn relative_to_rows(relative: f64, n_options: usize) -> usize {
    if !relative.is_finite() || relative <= 0.0 {
        return 0;
    }
    (relative * n_options as f64 + SIZE_EPSILON).floor() as usize
}

/// Observations of a single workload: option settings mapped to performance.
///
/// Every row keeps the index it had in the table it was loaded from, so
/// subsets produced by [`EnvData::get_split`] remain comparable by identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvData {
    env_id: usize,
    env_label: String,
    feature_names: Vec<String>,
    row_ids: Vec<usize>,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl EnvData {
    /// Creates a table from feature rows and measured performance values.
    pub fn new(
        env_id: usize,
        env_label: impl Into<String>,
        feature_names: Vec<String>,
        x: Vec<Vec<f64>>,
        y: Vec<f64>,
    ) -> Result<Self, WluError> {
        let env_label = env_label.into();
        if x.len() != y.len() {
            return Err(WluError::Data(
                ErrorInfo::new("env_shape", "feature rows and targets differ in length")
                    .with_context("env", env_label)
                    .with_context("rows", x.len().to_string())
                    .with_context("targets", y.len().to_string()),
            ));
        }
        if let Some((idx, row)) = x
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != feature_names.len())
        {
            return Err(WluError::Data(
                ErrorInfo::new("env_width", "row width does not match the feature schema")
                    .with_context("env", env_label)
                    .with_context("row", idx.to_string())
                    .with_context("width", row.len().to_string())
                    .with_context("features", feature_names.len().to_string()),
            ));
        }
        Ok(Self {
            env_id,
            env_label,
            feature_names,
            row_ids: (0..y.len()).collect(),
            x,
            y,
        })
    }

    /// Ordinal of the environment inside its dataset.
    pub fn env_id(&self) -> usize {
        self.env_id
    }

    /// Human readable workload label.
    pub fn env_label(&self) -> &str {
        &self.env_label
    }

    /// Names of the configuration options, in column order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of configuration options, the unit of relative sizes.
    pub fn n_options(&self) -> usize {
        self.feature_names.len()
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Returns true when the table holds no observations.
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Row identities relative to the originally loaded table.
    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    /// Feature matrix, one row per observation.
    pub fn features(&self) -> &[Vec<f64>] {
        &self.x
    }

    /// Measured performance values.
    pub fn targets(&self) -> &[f64] {
        &self.y
    }

    /// Returns the rows at the given positions, in the given order.
    pub fn select(&self, positions: &[usize]) -> EnvData {
        EnvData {
            env_id: self.env_id,
            env_label: self.env_label.clone(),
            feature_names: self.feature_names.clone(),
            row_ids: positions.iter().map(|&pos| self.row_ids[pos]).collect(),
            x: positions.iter().map(|&pos| self.x[pos].clone()).collect(),
            y: positions.iter().map(|&pos| self.y[pos]).collect(),
        }
    }

    /// Returns every row whose identity is not contained in `excluded`.
    pub fn without_rows(&self, excluded: &BTreeSet<usize>) -> EnvData {
        let positions: Vec<usize> = self
            .row_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !excluded.contains(id))
            .map(|(pos, _)| pos)
            .collect();
        self.select(&positions)
    }

    /// Produces a reproducible train/test split.
    ///
    /// Both sizes are multiples of [`EnvData::n_options`] rounded down. The
    /// rows are permuted by a generator seeded with `seed`; the train subset
    /// is the first `n_train` rows of that permutation and the test set the
    /// first `n_test` rows, so the test set always contains the train set and
    /// does not depend on `train_rel`.
    pub fn get_split(&self, seed: u32, train_rel: f64, test_rel: f64) -> Result<Split, WluError> {
        let n_options = self.n_options();
        let n_train = relative_to_rows(train_rel, n_options);
        if n_train < 1 || n_train > self.len() {
            return Err(WluError::Split(
                ErrorInfo::new("split_train_size", "requested train size is unsatisfiable")
                    .with_context("env", self.env_label.clone())
                    .with_context("train_rel", train_rel.to_string())
                    .with_context("n_options", n_options.to_string())
                    .with_context("n_train", n_train.to_string())
                    .with_context("n_rows", self.len().to_string())
                    .with_hint("train size must cover at least one and at most all rows"),
            ));
        }
        let mut n_test = relative_to_rows(test_rel, n_options).max(n_train);
        if n_test > self.len() {
            warn!(
                env = %self.env_label,
                requested = n_test,
                available = self.len(),
                "test size exceeds environment rows, clamping"
            );
            n_test = self.len();
        }

        let mut order: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(u64::from(seed));
        order.shuffle(&mut rng);

        Ok(Split {
            train: self.select(&order[..n_train]),
            test: self.select(&order[..n_test]),
        })
    }
}

/// Train subset plus the test set it was drawn with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Rows used to fit the model.
    pub train: EnvData,
    /// Rows used for evaluation; a superset of `train`.
    pub test: EnvData,
}

/// Per-workload tables of one subject system.
///
/// Each environment carries its own schema, so option counts may differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDataset {
    label: String,
    envs: Vec<EnvData>,
}

impl WorkloadDataset {
    /// Builds a dataset from at least one environment.
    pub fn new(label: impl Into<String>, envs: Vec<EnvData>) -> Result<Self, WluError> {
        let label = label.into();
        if envs.is_empty() {
            return Err(WluError::Data(
                ErrorInfo::new("dataset_empty", "dataset contains no environments")
                    .with_context("dataset", label),
            ));
        }
        Ok(Self { label, envs })
    }

    /// Dataset label (subject system).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Per-environment tables in their fixed order.
    pub fn workloads_data(&self) -> &[EnvData] {
        &self.envs
    }

    /// Feature schema of the first environment.
    pub fn feature_names(&self) -> &[String] {
        self.envs[0].feature_names()
    }

    /// Workload labels in environment order.
    pub fn env_labels(&self) -> Vec<&str> {
        self.envs.iter().map(EnvData::env_label).collect()
    }

    /// Number of environments.
    pub fn n_envs(&self) -> usize {
        self.envs.len()
    }
}
