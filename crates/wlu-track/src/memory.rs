//! In-process backend that records every call.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use serde_json::Value;
use wlu_core::errors::{ErrorInfo, WluError};

use crate::backend::{unknown_run, Metrics, Params, TrackingBackend};
use crate::records::{ExperimentRecord, RunRecord, RunStatus};

/// One backend interaction, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    /// Experiment selected.
    SetExperiment { name: String },
    /// Run opened.
    CreateRun {
        run_id: String,
        name: String,
        parent: Option<String>,
    },
    /// Existing run re-entered.
    ResumeRun { run_id: String },
    /// Resumed scope left.
    ReleaseRun { run_id: String },
    /// Run closed.
    EndRun { run_id: String, status: RunStatus },
    /// Parameters logged.
    LogParams { run_id: String, params: Params },
    /// Metrics logged.
    LogMetrics { run_id: String, metrics: Metrics },
    /// JSON document logged.
    LogDict { run_id: String, name: String },
    /// File logged.
    LogArtifact { run_id: String, name: String },
}

/// Everything stored for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    /// Run record.
    pub record: RunRecord,
    /// Merged parameters.
    pub params: Params,
    /// Merged metrics.
    pub metrics: Metrics,
    /// Logged JSON documents by name.
    pub dicts: BTreeMap<String, Value>,
    /// Logged file contents by file name.
    pub artifacts: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    experiments: BTreeMap<String, ExperimentRecord>,
    runs: BTreeMap<String, RunSnapshot>,
    events: Vec<TrackingEvent>,
    failing: BTreeSet<String>,
    next_id: u64,
}

impl MemoryState {
    fn check(&self, operation: &str) -> Result<(), WluError> {
        if self.failing.contains(operation) {
            return Err(WluError::Tracking(
                ErrorInfo::new("injected_failure", "operation configured to fail")
                    .with_context("operation", operation.to_string()),
            ));
        }
        Ok(())
    }

    fn run_mut(&mut self, run_id: &str) -> Result<&mut RunSnapshot, WluError> {
        self.runs.get_mut(run_id).ok_or_else(|| unknown_run(run_id))
    }
}

/// Backend keeping runs in memory; used as the fake tracker in tests and for
/// dry runs.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    state: Mutex<MemoryState>,
}

impl MemoryTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of the named operation (for example
    /// `"log_artifact"`) fail with a tracking error.
    pub fn fail_operation(&self, operation: &str) {
        self.state.lock().failing.insert(operation.to_string());
    }

    /// Calls received so far.
    pub fn events(&self) -> Vec<TrackingEvent> {
        self.state.lock().events.clone()
    }

    /// Snapshot of one run.
    pub fn run(&self, run_id: &str) -> Option<RunSnapshot> {
        self.state.lock().runs.get(run_id).cloned()
    }

    /// Snapshots of every run, ordered by id.
    pub fn runs(&self) -> Vec<RunSnapshot> {
        self.state.lock().runs.values().cloned().collect()
    }

    /// Snapshots of runs nested under `parent`.
    pub fn children(&self, parent: &str) -> Vec<RunSnapshot> {
        self.state
            .lock()
            .runs
            .values()
            .filter(|run| run.record.parent_run_id() == Some(parent))
            .cloned()
            .collect()
    }
}

impl TrackingBackend for MemoryTracker {
    fn endpoint(&self) -> String {
        "memory://".to_string()
    }

    fn set_experiment(&self, name: &str) -> Result<ExperimentRecord, WluError> {
        let mut state = self.state.lock();
        state.check("set_experiment")?;
        state.events.push(TrackingEvent::SetExperiment { name: name.to_string() });
        Ok(state
            .experiments
            .entry(name.to_string())
            .or_insert_with(|| ExperimentRecord::new(name))
            .clone())
    }

    fn create_run(
        &self,
        experiment: &str,
        name: &str,
        parent: Option<&str>,
    ) -> Result<RunRecord, WluError> {
        let mut state = self.state.lock();
        state.check("create_run")?;
        if let Some(parent) = parent {
            if !state.runs.contains_key(parent) {
                return Err(unknown_run(parent));
            }
        }
        state.next_id += 1;
        let run_id = format!("run-{:04}", state.next_id);
        let record = RunRecord::start(&run_id, experiment, name, parent.map(str::to_string));
        state.events.push(TrackingEvent::CreateRun {
            run_id: run_id.clone(),
            name: name.to_string(),
            parent: parent.map(str::to_string),
        });
        state.runs.insert(
            run_id,
            RunSnapshot {
                record: record.clone(),
                params: Params::new(),
                metrics: Metrics::new(),
                dicts: BTreeMap::new(),
                artifacts: BTreeMap::new(),
            },
        );
        Ok(record)
    }

    fn resume_run(&self, run_id: &str) -> Result<RunRecord, WluError> {
        let mut state = self.state.lock();
        state.check("resume_run")?;
        let record = state.run_mut(run_id)?.record.clone();
        state.events.push(TrackingEvent::ResumeRun { run_id: run_id.to_string() });
        Ok(record)
    }

    fn release_run(&self, run_id: &str) -> Result<(), WluError> {
        let mut state = self.state.lock();
        state.check("release_run")?;
        state.run_mut(run_id)?;
        state.events.push(TrackingEvent::ReleaseRun { run_id: run_id.to_string() });
        Ok(())
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<(), WluError> {
        let mut state = self.state.lock();
        state.check("end_run")?;
        state.run_mut(run_id)?.record.complete(status);
        state.events.push(TrackingEvent::EndRun {
            run_id: run_id.to_string(),
            status,
        });
        Ok(())
    }

    fn log_params(&self, run_id: &str, params: &Params) -> Result<(), WluError> {
        let mut state = self.state.lock();
        state.check("log_params")?;
        state.run_mut(run_id)?.params.extend(params.clone());
        state.events.push(TrackingEvent::LogParams {
            run_id: run_id.to_string(),
            params: params.clone(),
        });
        Ok(())
    }

    fn log_metrics(&self, run_id: &str, metrics: &Metrics) -> Result<(), WluError> {
        let mut state = self.state.lock();
        state.check("log_metrics")?;
        state.run_mut(run_id)?.metrics.extend(metrics.clone());
        state.events.push(TrackingEvent::LogMetrics {
            run_id: run_id.to_string(),
            metrics: metrics.clone(),
        });
        Ok(())
    }

    fn log_dict(&self, run_id: &str, name: &str, payload: &Value) -> Result<(), WluError> {
        let mut state = self.state.lock();
        state.check("log_dict")?;
        state
            .run_mut(run_id)?
            .dicts
            .insert(name.to_string(), payload.clone());
        state.events.push(TrackingEvent::LogDict {
            run_id: run_id.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    fn log_artifact(&self, run_id: &str, path: &Path) -> Result<(), WluError> {
        let mut state = self.state.lock();
        state.check("log_artifact")?;
        let contents = fs::read_to_string(path).map_err(|err| {
            WluError::Tracking(
                ErrorInfo::new("artifact_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        state
            .run_mut(run_id)?
            .artifacts
            .insert(name.clone(), contents);
        state.events.push(TrackingEvent::LogArtifact {
            run_id: run_id.to_string(),
            name,
        });
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord, WluError> {
        self.run(run_id)
            .map(|run| run.record)
            .ok_or_else(|| unknown_run(run_id))
    }

    fn child_runs(&self, parent: &str) -> Result<Vec<RunRecord>, WluError> {
        let mut runs: Vec<RunRecord> = self.children(parent).into_iter().map(|run| run.record).collect();
        runs.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.run_id().cmp(b.run_id())));
        Ok(runs)
    }

    fn load_dict(&self, run_id: &str, name: &str) -> Result<Value, WluError> {
        let state = self.state.lock();
        let run = state.runs.get(run_id).ok_or_else(|| unknown_run(run_id))?;
        run.dicts.get(name).cloned().ok_or_else(|| {
            WluError::Tracking(
                ErrorInfo::new("dict_missing", "run has no document with this name")
                    .with_context("run_id", run_id.to_string())
                    .with_context("name", name.to_string()),
            )
        })
    }
}
