//! Tracking backend contract and endpoint resolution.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use wlu_core::errors::{ErrorInfo, WluError};

use crate::file::FileTracker;
use crate::memory::MemoryTracker;
use crate::records::{ExperimentRecord, RunRecord, RunStatus};

/// Scalar parameters logged on a run.
pub type Params = BTreeMap<String, Value>;

/// Numeric metrics logged on a run.
pub type Metrics = BTreeMap<String, f64>;

/// Store for experiments, parent and nested runs, and their payloads.
///
/// Implementations are shared between worker threads and coordinate purely by
/// run id: two tasks never address the same child run.
pub trait TrackingBackend: Send + Sync {
    /// Location runs are written to.
    fn endpoint(&self) -> String;

    /// Creates the experiment if needed and returns its record.
    fn set_experiment(&self, name: &str) -> Result<ExperimentRecord, WluError>;

    /// Opens a new run, nested under `parent` when given.
    fn create_run(
        &self,
        experiment: &str,
        name: &str,
        parent: Option<&str>,
    ) -> Result<RunRecord, WluError>;

    /// Re-enters an existing run by id without changing its status.
    fn resume_run(&self, run_id: &str) -> Result<RunRecord, WluError>;

    /// Leaves a scope opened with [`TrackingBackend::resume_run`].
    fn release_run(&self, run_id: &str) -> Result<(), WluError>;

    /// Closes a run opened with [`TrackingBackend::create_run`].
    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<(), WluError>;

    /// Merges parameters into the run.
    fn log_params(&self, run_id: &str, params: &Params) -> Result<(), WluError>;

    /// Merges metrics into the run.
    fn log_metrics(&self, run_id: &str, metrics: &Metrics) -> Result<(), WluError>;

    /// Stores a JSON document under `name`.
    fn log_dict(&self, run_id: &str, name: &str, payload: &Value) -> Result<(), WluError>;

    /// Copies a local file into the run's artifacts.
    fn log_artifact(&self, run_id: &str, path: &Path) -> Result<(), WluError>;

    /// Looks up a run.
    fn get_run(&self, run_id: &str) -> Result<RunRecord, WluError>;

    /// Runs nested directly under `parent`, ordered by name then id.
    fn child_runs(&self, parent: &str) -> Result<Vec<RunRecord>, WluError>;

    /// Reads back a document stored with [`TrackingBackend::log_dict`].
    fn load_dict(&self, run_id: &str, name: &str) -> Result<Value, WluError>;
}

pub(crate) fn unknown_run(run_id: &str) -> WluError {
    WluError::Tracking(
        ErrorInfo::new("run_unknown", "no run with this id").with_context("run_id", run_id.to_string()),
    )
}

/// Opens the backend behind a tracking endpoint.
///
/// `memory://` selects a fresh in-process tracker; `file://<dir>` or a bare
/// path selects a directory tracker.
pub fn connect(endpoint: &str) -> Result<Arc<dyn TrackingBackend>, WluError> {
    if endpoint == "memory://" {
        return Ok(Arc::new(MemoryTracker::new()));
    }
    let dir = endpoint.strip_prefix("file://").unwrap_or(endpoint);
    if dir.is_empty() || dir.contains("://") {
        return Err(WluError::Config(
            ErrorInfo::new("tracking_endpoint", "unsupported tracking endpoint")
                .with_context("endpoint", endpoint.to_string())
                .with_hint("use memory:// or a directory path"),
        ));
    }
    Ok(Arc::new(FileTracker::open(dir)?))
}
