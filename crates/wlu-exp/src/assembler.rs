use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{Evaluation, Table};
use wlu_track::{Metrics, RunGuard};

use crate::serde::to_canonical_value;
use crate::task::Task;

/// Name of the dict artifact holding the training feature names.
pub const FEATURE_NAMES_ARTIFACT: &str = "feature_names.json";
/// Name of the dict artifact holding the annotated score table.
pub const SCORES_ARTIFACT: &str = "scores.json";
/// Name of the dict artifact holding the annotated model metadata table.
pub const METADATA_ARTIFACT: &str = "metadata.json";

/// Results of one completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Task id, shared by every repetition of the same configuration.
    pub task_id: String,
    /// Child run the results were logged to, if it could be opened.
    pub run_id: Option<String>,
    /// Metadata dict the task was tagged with.
    pub metadata: BTreeMap<String, Value>,
    /// Score table annotated with `metadata`.
    pub scores: Table,
    /// Model metadata table annotated with `metadata`.
    pub model_metadata: Table,
    /// Tracking failures that did not stop the task.
    #[serde(default)]
    pub tracking_errors: Vec<WluError>,
}

/// Transient file removed when the guard goes out of scope.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Path for `{exp_type}_scores-{task_id}-{uuid}.csv` under `dir`.
    pub fn for_scores(dir: &Path, task: &Task) -> Self {
        let name = format!(
            "{}_scores-{}-{}.csv",
            task.exp_type(),
            task.id(),
            Uuid::new_v4().simple()
        );
        Self { path: dir.join(name) }
    }

    /// Location of the transient file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `table` as CSV to the transient location.
    pub fn write_table(&self, table: &Table) -> Result<(), WluError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| artifact_error("scratch_dir", parent, err))?;
        }
        let file = File::create(&self.path).map_err(|err| artifact_error("scratch_create", &self.path, err))?;
        table.write_csv(file)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "failed to remove transient artifact"),
        }
    }
}

fn artifact_error(code: &str, path: &Path, err: impl ToString) -> WluError {
    WluError::Tracking(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Mean of every numeric column, keyed `mean_{column}`; null cells are
/// skipped.
pub fn mean_scores(scores: &Table) -> Metrics {
    let mut metrics = Metrics::new();
    for (idx, column) in scores.columns().iter().enumerate() {
        let values: Vec<f64> = scores
            .rows()
            .iter()
            .filter_map(|row| row.get(idx).and_then(Value::as_f64))
            .collect();
        let numeric_column = scores
            .rows()
            .iter()
            .all(|row| matches!(row.get(idx), Some(Value::Number(_)) | Some(Value::Null)));
        if numeric_column && !values.is_empty() {
            metrics.insert(
                format!("mean_{column}"),
                values.iter().sum::<f64>() / values.len() as f64,
            );
        }
    }
    metrics
}

fn record(result: Result<(), WluError>, errors: &mut Vec<WluError>, task_id: &str, step: &str) {
    if let Err(err) = result {
        warn!(task = task_id, step, error = %err, "tracking call failed, keeping results");
        errors.push(err);
    }
}

/// Annotates both tables with the task metadata and hands them to the run.
///
/// The score table travels to the backend through a transient CSV that is
/// removed afterwards whether or not logging succeeded. Tracking failures
/// are collected on the outcome instead of discarding computed results.
pub fn assemble(
    task: &Task,
    evaluation: &dyn Evaluation,
    run: Option<&RunGuard>,
    scratch_dir: &Path,
) -> TaskOutcome {
    let task_id = task.id();
    let metadata = task.metadata();
    let raw_scores = evaluation.scores();
    let metrics = mean_scores(&raw_scores);

    let mut scores = raw_scores;
    scores.assign(&metadata);
    let mut model_metadata = evaluation.metadata();
    model_metadata.assign(&metadata);

    let mut tracking_errors = Vec::new();
    if let Some(run) = run {
        let artifact = TempArtifact::for_scores(scratch_dir, task);
        let handoff = artifact
            .write_table(&scores)
            .and_then(|()| run.log_artifact(artifact.path()));
        record(handoff, &mut tracking_errors, &task_id, "log_artifact");
        drop(artifact);

        let scores_json = to_canonical_value(&scores);
        record(
            scores_json.and_then(|value| run.log_dict(SCORES_ARTIFACT, &value)),
            &mut tracking_errors,
            &task_id,
            "log_scores",
        );
        let metadata_json = to_canonical_value(&model_metadata);
        record(
            metadata_json.and_then(|value| run.log_dict(METADATA_ARTIFACT, &value)),
            &mut tracking_errors,
            &task_id,
            "log_metadata",
        );
        record(run.log_metrics(&metrics), &mut tracking_errors, &task_id, "log_metrics");
    }

    TaskOutcome {
        task_id,
        run_id: run.map(|run| run.run_id().to_string()),
        metadata,
        scores,
        model_metadata,
        tracking_errors,
    }
}
