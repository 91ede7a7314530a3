use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use wlu_core::{Model, RunProvenance, WorkloadDataset};
use wlu_track::{Params, TrackingSession};

use crate::executor::{ExecutionFailure, ExecutionReport, Executor};
use crate::planner::{plan_digest, plan_with_scope, TestScope};
use crate::serde::to_canonical_value;
use crate::task::ExperimentType;

/// `"{date}_{time}-{uuid prefix}"`, unique per replication.
pub fn date_time_uuid() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y-%m-%d_%H-%M-%S"), &uuid[..8])
}

/// One full sweep of models × datasets × train sizes × repetitions tracked
/// under a single parent run.
pub struct Replication {
    /// Experiment families to plan.
    pub exp_types: Vec<ExperimentType>,
    /// Model prototypes by label.
    pub models: BTreeMap<String, Box<dyn Model>>,
    /// Datasets by label.
    pub datasets: BTreeMap<String, WorkloadDataset>,
    /// Train sizes relative to the option count.
    pub train_sizes: Vec<f64>,
    /// Repetition seeds.
    pub rnds: Vec<u64>,
    /// Evaluation data of multitask runs.
    pub test_scope: TestScope,
    label: String,
}

impl Replication {
    /// Creates a replication; `label` is prefixed with a date-time-uuid
    /// stamp.
    pub fn new(
        exp_types: Vec<ExperimentType>,
        models: BTreeMap<String, Box<dyn Model>>,
        datasets: BTreeMap<String, WorkloadDataset>,
        train_sizes: Vec<f64>,
        rnds: Vec<u64>,
        label: &str,
    ) -> Self {
        Self {
            exp_types,
            models,
            datasets,
            train_sizes,
            rnds,
            test_scope: TestScope::default(),
            label: format!("{}-{}", date_time_uuid(), label),
        }
    }

    /// Replaces the evaluation data of multitask runs.
    pub fn with_test_scope(mut self, scope: TestScope) -> Self {
        self.test_scope = scope;
        self
    }

    /// Stamped replication label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// `uncertainty-learning-{label}`; names the parent run and is recorded
    /// as `exp_id` on every task.
    pub fn experiment_name(&self) -> String {
        format!("uncertainty-learning-{}", self.label)
    }

    fn parent_params(&self) -> Result<Params, wlu_core::WluError> {
        let model_labels: Vec<String> = self.models.keys().cloned().collect();
        let dataset_labels: Vec<String> = self.datasets.keys().cloned().collect();
        let digest = plan_digest(
            &self.exp_types,
            &model_labels,
            &dataset_labels,
            &self.train_sizes,
            &self.rnds,
            self.test_scope,
        )?;
        let provenance = RunProvenance::new(digest.clone(), self.rnds.clone(), Utc::now().to_rfc3339())
            .with_crate(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let mut params = Params::new();
        params.insert("replication".into(), json!(self.label));
        params.insert("plan_digest".into(), json!(digest));
        params.insert("models".into(), json!(model_labels));
        params.insert("datasets".into(), json!(dataset_labels));
        params.insert("train_sizes".into(), json!(self.train_sizes));
        params.insert("rnds".into(), json!(self.rnds));
        params.insert("provenance".into(), to_canonical_value(&provenance)?);
        Ok(params)
    }

    /// Opens and closes the parent run, plans every task and executes them.
    ///
    /// The parent run id is part of both the report and the failure, so
    /// partially persisted results stay reachable after an abort.
    pub fn run(
        &self,
        session: &TrackingSession,
        executor: &Executor,
    ) -> Result<ExecutionReport, ExecutionFailure> {
        let fail = |parent: Option<&str>, error| ExecutionFailure {
            parent_run_id: parent.map(str::to_string),
            completed: Vec::new(),
            error,
        };
        let name = self.experiment_name().replace(' ', "");
        let params = self.parent_params().map_err(|err| fail(None, err))?;
        let parent_run_id = session
            .open_parent(&name, &params)
            .map_err(|err| fail(None, err))?;
        info!(parent_run_id = %parent_run_id, replication = %self.label, "parent run opened");

        let families = plan_with_scope(
            &self.exp_types,
            &self.models,
            &self.datasets,
            &self.train_sizes,
            &self.rnds,
            &self.experiment_name(),
            self.test_scope,
        )
        .map_err(|err| fail(Some(&parent_run_id), err))?;
        info!(workers = ?executor.workers(), "planning done, executing");

        let report = executor.run(session, families, &parent_run_id)?;
        info!(
            parent_run_id = %report.parent_run_id,
            tasks = report.outcomes.len(),
            "replication finished"
        );
        Ok(report)
    }
}
