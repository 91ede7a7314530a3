use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::EvaluationContext;
use wlu_track::{RunGuard, TrackingSession};

use crate::assembler::{assemble, TaskOutcome, FEATURE_NAMES_ARTIFACT};
use crate::planner::TaskFamilies;
use crate::task::Task;

/// Shared flag asking running tasks to stop at their next phase boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`CancellationToken::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcomes of a replication whose tasks all completed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Parent run every task was nested under.
    pub parent_run_id: String,
    /// One outcome per task, in completion order.
    pub outcomes: Vec<TaskOutcome>,
}

/// A replication aborted by a task failure.
///
/// Outcomes completed before the failure were already persisted and are
/// returned alongside the error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("replication aborted after {} completed task(s): {error}", .completed.len())]
pub struct ExecutionFailure {
    /// Parent run the completed outcomes are persisted under, when one was
    /// opened.
    pub parent_run_id: Option<String>,
    /// Tasks that finished before the replication aborted.
    pub completed: Vec<TaskOutcome>,
    /// First failure observed.
    pub error: WluError,
}

/// Logs sequential progress through `tracing`.
#[derive(Debug)]
pub struct Progress {
    total: usize,
    done: usize,
    started: Instant,
}

impl Progress {
    /// Starts tracking `total` tasks.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            started: Instant::now(),
        }
    }

    /// Records one finished task.
    pub fn tick(&mut self, task_id: &str) {
        self.done += 1;
        let elapsed = self.started.elapsed().as_secs_f64();
        let remaining = self.total.saturating_sub(self.done) as f64;
        let eta = elapsed / self.done as f64 * remaining;
        info!(
            done = self.done,
            total = self.total,
            elapsed_s = (elapsed * 10.0).round() / 10.0,
            eta_s = (eta * 10.0).round() / 10.0,
            task = task_id,
            "progress"
        );
    }
}

/// Runs planned task families against a tracking session.
#[derive(Debug, Clone)]
pub struct Executor {
    parallelism: Option<usize>,
    cancel: Option<CancellationToken>,
    scratch_dir: PathBuf,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Executor {
    /// `None` or `Some(0)` runs tasks one after another; `Some(n)` runs them
    /// on a pool of `n` worker threads.
    pub fn new(parallelism: Option<usize>) -> Self {
        Self {
            parallelism,
            cancel: None,
            scratch_dir: std::env::temp_dir().join("wlu-scratch"),
        }
    }

    /// Observes `token` between task phases.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Directory for transient score files.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Worker count, or `None` when running sequentially.
    pub fn workers(&self) -> Option<usize> {
        self.parallelism.filter(|n| *n > 0)
    }

    /// Executes every family in experiment-type order.
    ///
    /// Sequential mode stops at the first failing task. Parallel mode stops
    /// handing out tasks after the first failure and lets in-flight tasks
    /// finish. Completed outcomes are never rolled back.
    pub fn run(
        &self,
        session: &TrackingSession,
        families: TaskFamilies,
        parent_run_id: &str,
    ) -> Result<ExecutionReport, ExecutionFailure> {
        let mut outcomes = Vec::new();
        let pool = match self.workers() {
            Some(workers) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|err| ExecutionFailure {
                        parent_run_id: Some(parent_run_id.to_string()),
                        completed: Vec::new(),
                        error: WluError::Config(
                            ErrorInfo::new("thread_pool", err.to_string())
                                .with_context("workers", workers.to_string()),
                        ),
                    })?,
            ),
            None => None,
        };

        for (exp_type, tasks) in families {
            info!(family = %exp_type, tasks = tasks.len(), "executing family");
            let result = match &pool {
                Some(pool) => self.run_parallel(pool, session, tasks, parent_run_id, &mut outcomes),
                None => self.run_sequential(session, tasks, parent_run_id, &mut outcomes),
            };
            if let Err(error) = result {
                warn!(parent_run_id, error = %error, "replication aborted");
                return Err(ExecutionFailure {
                    parent_run_id: Some(parent_run_id.to_string()),
                    completed: outcomes,
                    error,
                });
            }
        }
        Ok(ExecutionReport {
            parent_run_id: parent_run_id.to_string(),
            outcomes,
        })
    }

    fn run_sequential(
        &self,
        session: &TrackingSession,
        tasks: Vec<Task>,
        parent_run_id: &str,
        outcomes: &mut Vec<TaskOutcome>,
    ) -> Result<(), WluError> {
        let mut progress = Progress::new(tasks.len());
        for task in tasks {
            let outcome = execute_task(task, session, parent_run_id, self.cancel.as_ref(), &self.scratch_dir)?;
            progress.tick(&outcome.task_id);
            outcomes.push(outcome);
        }
        Ok(())
    }

    fn run_parallel(
        &self,
        pool: &rayon::ThreadPool,
        session: &TrackingSession,
        tasks: Vec<Task>,
        parent_run_id: &str,
        outcomes: &mut Vec<TaskOutcome>,
    ) -> Result<(), WluError> {
        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<(usize, WluError)>> = Mutex::new(None);
        let finished: Mutex<Vec<TaskOutcome>> = Mutex::new(Vec::new());
        let cancel = self.cancel.as_ref();
        let scratch_dir = self.scratch_dir.as_path();

        pool.scope_fifo(|scope| {
            for (index, task) in tasks.into_iter().enumerate() {
                let failed = &failed;
                let first_error = &first_error;
                let finished = &finished;
                scope.spawn_fifo(move |_| {
                    if failed.load(Ordering::SeqCst) {
                        debug!(task = %task.id(), "skipped after earlier failure");
                        return;
                    }
                    match execute_task(task, session, parent_run_id, cancel, scratch_dir) {
                        Ok(outcome) => finished.lock().push(outcome),
                        Err(err) => {
                            failed.store(true, Ordering::SeqCst);
                            let mut slot = first_error.lock();
                            if slot.as_ref().map_or(true, |(seen, _)| index < *seen) {
                                *slot = Some((index, err));
                            }
                        }
                    }
                });
            }
        });

        outcomes.extend(finished.into_inner());
        match first_error.into_inner() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

fn checkpoint(cancel: Option<&CancellationToken>, task_id: &str, phase: &str) -> Result<(), WluError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(WluError::Cancelled(
            ErrorInfo::new("task_cancelled", "cancellation requested")
                .with_context("task", task_id.to_string())
                .with_context("phase", phase.to_string()),
        )),
        _ => Ok(()),
    }
}

fn model_step(err: WluError, task_id: &str, step: &str) -> WluError {
    err.into_model().with_context("task", task_id).with_context("step", step)
}

fn tracked<T>(result: Result<T, WluError>, errors: &mut Vec<WluError>, task_id: &str, step: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(task = task_id, step, error = %err, "tracking call failed, continuing");
            errors.push(err);
            None
        }
    }
}

/// Runs one task end to end and drops it, model included, before returning.
pub fn execute_task(
    mut task: Task,
    session: &TrackingSession,
    parent_run_id: &str,
    cancel: Option<&CancellationToken>,
    scratch_dir: &Path,
) -> Result<TaskOutcome, WluError> {
    let task_id = task.id();
    debug!(task = %task_id, rnd = task.rnd(), "task started");
    let mut tracking_errors = Vec::new();

    let scope: Option<RunGuard> = tracked(
        session.resume_run(parent_run_id),
        &mut tracking_errors,
        &task_id,
        "resume_parent",
    );
    let child: Option<RunGuard> = scope.as_ref().and_then(|scope| {
        tracked(scope.start_child(&task_id), &mut tracking_errors, &task_id, "start_child")
    });
    if let Some(run) = &child {
        tracked(run.log_params(&task.metadata()), &mut tracking_errors, &task_id, "log_params");
        tracked(
            run.log_dict(FEATURE_NAMES_ARTIFACT, &json!(task.feature_names())),
            &mut tracking_errors,
            &task_id,
            "log_feature_names",
        );
    }

    checkpoint(cancel, &task_id, "pre_fit")?;
    let train = Arc::clone(task.train_handle());
    task.model_mut()
        .fit(&train)
        .map_err(|err| model_step(err, &task_id, "fit"))?;
    checkpoint(cancel, &task_id, "post_fit")?;
    let predictions = task
        .model()
        .predict(task.test())
        .map_err(|err| model_step(err, &task_id, "predict"))?;
    checkpoint(cancel, &task_id, "post_predict")?;
    let evaluation = task
        .model()
        .evaluate(EvaluationContext {
            predictions: &predictions,
            test: task.test(),
        })
        .map_err(|err| model_step(err, &task_id, "evaluate"))?;

    let mut outcome = assemble(&task, evaluation.as_ref(), child.as_ref(), scratch_dir);
    drop(task);

    if let Some(run) = child {
        tracked(run.finish(), &mut tracking_errors, &task_id, "end_child");
    }
    if let Some(scope) = scope {
        tracked(scope.finish(), &mut tracking_errors, &task_id, "release_parent");
    }
    tracking_errors.append(&mut outcome.tracking_errors);
    outcome.tracking_errors = tracking_errors;
    debug!(task = %task_id, "task finished");
    Ok(outcome)
}
