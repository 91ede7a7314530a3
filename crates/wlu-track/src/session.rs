//! Explicit tracking session and scoped run guards.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use wlu_core::errors::WluError;

use crate::backend::{Metrics, Params, TrackingBackend};
use crate::pacing::Pacing;
use crate::records::RunStatus;

/// Handle threading one backend and experiment through a replication.
///
/// Cloning is cheap; clones address the same backend.
#[derive(Clone)]
pub struct TrackingSession {
    backend: Arc<dyn TrackingBackend>,
    experiment: String,
    pacing: Pacing,
}

impl std::fmt::Debug for TrackingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSession")
            .field("endpoint", &self.backend.endpoint())
            .field("experiment", &self.experiment)
            .field("pacing", &self.pacing)
            .finish()
    }
}

impl TrackingSession {
    /// Selects (creating if needed) the experiment on the backend.
    pub fn new(backend: Arc<dyn TrackingBackend>, experiment: impl Into<String>) -> Result<Self, WluError> {
        let experiment = experiment.into();
        backend.set_experiment(&experiment)?;
        Ok(Self {
            backend,
            experiment,
            pacing: Pacing::default(),
        })
    }

    /// Replaces the delay applied before logging calls.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Experiment all runs are created in.
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Underlying backend.
    pub fn backend(&self) -> &Arc<dyn TrackingBackend> {
        &self.backend
    }

    /// Opens a new run, nested under `parent` when given.
    pub fn start_run(&self, name: &str, parent: Option<&str>) -> Result<RunGuard, WluError> {
        let record = self.backend.create_run(&self.experiment, name, parent)?;
        debug!(run_id = record.run_id(), name, parent, "run opened");
        Ok(RunGuard {
            session: self.clone(),
            run_id: record.run_id().to_string(),
            scope: Scope::Owned,
            closed: false,
        })
    }

    /// Enters the scope of an existing run by explicit id.
    pub fn resume_run(&self, run_id: &str) -> Result<RunGuard, WluError> {
        let record = self.backend.resume_run(run_id)?;
        Ok(RunGuard {
            session: self.clone(),
            run_id: record.run_id().to_string(),
            scope: Scope::Resumed,
            closed: false,
        })
    }

    /// Opens a root run, logs `params` on it, closes it and returns its id.
    pub fn open_parent(&self, name: &str, params: &Params) -> Result<String, WluError> {
        let run = self.start_run(name, None)?;
        run.log_params(params)?;
        let run_id = run.run_id().to_string();
        run.finish()?;
        Ok(run_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Owned,
    Resumed,
}

/// Run scope closed exactly once.
///
/// [`RunGuard::finish`] closes an owned run as successful. A guard dropped
/// without finishing closes it as failed, so an early return never leaves a
/// dangling open run.
#[derive(Debug)]
pub struct RunGuard {
    session: TrackingSession,
    run_id: String,
    scope: Scope,
    closed: bool,
}

impl RunGuard {
    /// Id of the run this guard scopes.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Opens a run nested under this one.
    pub fn start_child(&self, name: &str) -> Result<RunGuard, WluError> {
        self.session.start_run(name, Some(&self.run_id))
    }

    /// Logs parameters.
    pub fn log_params(&self, params: &Params) -> Result<(), WluError> {
        self.session.pacing.pause();
        self.session.backend.log_params(&self.run_id, params)
    }

    /// Logs metrics.
    pub fn log_metrics(&self, metrics: &Metrics) -> Result<(), WluError> {
        self.session.pacing.pause();
        self.session.backend.log_metrics(&self.run_id, metrics)
    }

    /// Logs a JSON document.
    pub fn log_dict(&self, name: &str, payload: &Value) -> Result<(), WluError> {
        self.session.pacing.pause();
        self.session.backend.log_dict(&self.run_id, name, payload)
    }

    /// Logs a local file.
    pub fn log_artifact(&self, path: &Path) -> Result<(), WluError> {
        self.session.pacing.pause();
        self.session.backend.log_artifact(&self.run_id, path)
    }

    /// Closes the scope successfully.
    pub fn finish(mut self) -> Result<(), WluError> {
        self.close(RunStatus::Success)
    }

    /// Closes the scope as failed.
    pub fn fail(mut self) -> Result<(), WluError> {
        self.close(RunStatus::Failed)
    }

    fn close(&mut self, status: RunStatus) -> Result<(), WluError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.scope {
            Scope::Owned => self.session.backend.end_run(&self.run_id, status),
            Scope::Resumed => self.session.backend.release_run(&self.run_id),
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Err(err) = self.close(RunStatus::Failed) {
            warn!(run_id = %self.run_id, error = %err, "failed to close run");
        }
    }
}
