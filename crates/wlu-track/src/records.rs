//! Experiment and run records kept by every backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Opened and not yet closed.
    Running,
    /// Closed after the scope completed.
    Success,
    /// Closed because the scope was left early.
    Failed,
}

impl RunStatus {
    /// Returns true once the run has been closed.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Named experiment that groups runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    name: String,
    created_at: DateTime<Utc>,
}

impl ExperimentRecord {
    /// Creates a record stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// Experiment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One run, optionally nested under a parent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    run_id: String,
    experiment: String,
    name: String,
    parent_run_id: Option<String>,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Creates a running record.
    pub fn start(
        run_id: impl Into<String>,
        experiment: impl Into<String>,
        name: impl Into<String>,
        parent_run_id: Option<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment: experiment.into(),
            name: name.into(),
            parent_run_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Run identifier assigned by the backend.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Owning experiment.
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Display name; task runs use the task id.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent run, if nested.
    pub fn parent_run_id(&self) -> Option<&str> {
        self.parent_run_id.as_deref()
    }

    /// Current status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Opening timestamp.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Closing timestamp, once closed.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Closes the run with the given status.
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}
