mod common;

use std::collections::BTreeMap;
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tempfile::tempdir;
use wlu_core::errors::WluError;
use wlu_core::Model;
use wlu_exp::{
    plan, CancellationToken, ExperimentType, Executor, SCORES_ARTIFACT, FEATURE_NAMES_ARTIFACT,
};
use wlu_track::{Params, RunStatus, TrackingEvent};

use common::ScriptedModel;

fn scripted_models(scripted: ScriptedModel) -> BTreeMap<String, Box<dyn Model>> {
    BTreeMap::from([("scripted".to_string(), Box::new(scripted) as Box<dyn Model>)])
}

#[test]
fn sequential_run_aborts_at_failing_task_and_keeps_earlier_results() {
    let (tracker, session) = common::memory_session();
    let scratch = tempdir().expect("scratch");
    let models = scripted_models(ScriptedModel::new(Some(3)));
    let families = plan(
        &[ExperimentType::Multitask],
        &models,
        &common::datasets(),
        &[1.0],
        &[0, 1, 2, 3, 4],
        "exp",
    )
    .expect("plan");
    let parent = session.open_parent("replication", &Params::new()).expect("parent");

    let failure = Executor::new(None)
        .with_scratch_dir(scratch.path())
        .run(&session, families, &parent)
        .unwrap_err();
    assert_eq!(failure.parent_run_id.as_deref(), Some(parent.as_str()));
    assert_eq!(failure.completed.len(), 2);
    assert_eq!(failure.error.info().code, "scripted_fit");
    assert!(matches!(failure.error, WluError::Model(_)));

    let children = tracker.children(&parent);
    assert_eq!(children.len(), 3);
    let succeeded: Vec<_> = children
        .iter()
        .filter(|run| run.record.status() == RunStatus::Success)
        .collect();
    assert_eq!(succeeded.len(), 2);
    for run in &succeeded {
        assert!(run.dicts.contains_key(SCORES_ARTIFACT));
        assert_eq!(run.artifacts.len(), 1);
    }
    let failed = children
        .iter()
        .find(|run| run.record.status() == RunStatus::Failed)
        .expect("failed child closed");
    assert!(failed.dicts.contains_key(FEATURE_NAMES_ARTIFACT));
    assert!(!failed.dicts.contains_key(SCORES_ARTIFACT));
    assert_eq!(fs::read_dir(scratch.path()).expect("scratch").count(), 0);
}

#[test]
fn task_runs_are_nested_and_closed_in_order() {
    let (tracker, session) = common::memory_session();
    let scratch = tempdir().expect("scratch");
    let families = plan(
        &[ExperimentType::Multitask],
        &common::models(&["cpooling-dummy"]),
        &common::datasets(),
        &[1.0],
        &[9],
        "exp",
    )
    .expect("plan");
    let parent = session.open_parent("replication", &Params::new()).expect("parent");
    let report = Executor::new(Some(0))
        .with_scratch_dir(scratch.path())
        .run(&session, families, &parent)
        .expect("run");
    assert_eq!(report.outcomes.len(), 1);
    let child = report.outcomes[0].run_id.clone().expect("child run");

    let events = tracker.events();
    let position = |wanted: &dyn Fn(&TrackingEvent) -> bool| events.iter().position(|e| wanted(e)).expect("event");
    let resume = position(&|e| matches!(e, TrackingEvent::ResumeRun { run_id } if *run_id == parent));
    let create = position(&|e| matches!(e, TrackingEvent::CreateRun { run_id, .. } if *run_id == child));
    let end = position(&|e| matches!(e, TrackingEvent::EndRun { run_id, status: RunStatus::Success } if *run_id == child));
    let release = position(&|e| matches!(e, TrackingEvent::ReleaseRun { run_id } if *run_id == parent));
    assert!(resume < create && create < end && end < release);

    let stored = tracker.run(&child).expect("child");
    assert_eq!(stored.record.name(), "multitask-cpooling-dummy on A-trainx1.0");
    for key in ["model", "subject_system", "train_size", "relative_train_size", "rnd", "pooling_cat", "experiment_type", "exp_id"] {
        assert!(stored.params.contains_key(key), "missing param {key}");
    }
    assert!(stored.metrics.contains_key("mean_rmse"));

    let scores = &report.outcomes[0].scores;
    let rnd_col = scores.column_index("rnd").expect("annotated");
    assert!(scores.rows().iter().all(|row| row[rnd_col] == serde_json::json!(9)));
    assert_eq!(scores.len(), 3);
}

#[test]
fn parallel_run_completes_every_task() {
    let (tracker, session) = common::memory_session();
    let scratch = tempdir().expect("scratch");
    let families = plan(
        &[ExperimentType::Multitask, ExperimentType::Holdout],
        &common::models(&["no-pooling-lin", "cpooling-lin"]),
        &common::datasets(),
        &[1.0, 2.0],
        &[0, 1],
        "exp",
    )
    .expect("plan");
    let parent = session.open_parent("replication", &Params::new()).expect("parent");
    let report = Executor::new(Some(4))
        .with_scratch_dir(scratch.path())
        .run(&session, families, &parent)
        .expect("run");
    assert_eq!(report.outcomes.len(), 2 * 2 * 2 * 2);
    let children = tracker.children(&parent);
    assert_eq!(children.len(), 16);
    assert!(children.iter().all(|run| run.record.status() == RunStatus::Success));
    assert!(report.outcomes.iter().all(|outcome| outcome.tracking_errors.is_empty()));
}

#[test]
fn parallel_failure_is_surfaced_with_parent_id() {
    let (_tracker, session) = common::memory_session();
    let scratch = tempdir().expect("scratch");
    let models = scripted_models(ScriptedModel::new(Some(1)));
    let families = plan(&[ExperimentType::Multitask], &models, &common::datasets(), &[1.0], &[0, 1, 2], "exp")
        .expect("plan");
    let parent = session.open_parent("replication", &Params::new()).expect("parent");
    let failure = Executor::new(Some(2))
        .with_scratch_dir(scratch.path())
        .run(&session, families, &parent)
        .unwrap_err();
    assert_eq!(failure.parent_run_id.as_deref(), Some(parent.as_str()));
    assert!(failure.completed.len() <= 2);
    assert_eq!(failure.error.info().code, "scripted_fit");
}

#[test]
fn models_are_released_after_execution() {
    let (_tracker, session) = common::memory_session();
    let scratch = tempdir().expect("scratch");
    let scripted = ScriptedModel::new(Some(2));
    let live = scripted.live_counter();
    let models = scripted_models(scripted);
    let families = plan(&[ExperimentType::Multitask], &models, &common::datasets(), &[1.0], &[0, 1, 2], "exp")
        .expect("plan");
    assert_eq!(live.load(Ordering::SeqCst), 3);
    let parent = session.open_parent("replication", &Params::new()).expect("parent");
    let failure = Executor::new(None)
        .with_scratch_dir(scratch.path())
        .run(&session, families, &parent)
        .unwrap_err();
    assert_eq!(failure.completed.len(), 1);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn task_models_do_not_share_state() {
    let datasets = common::datasets();
    let models = common::models(&["no-pooling-lin"]);
    let mut families = plan(&[ExperimentType::Multitask], &models, &datasets, &[2.0], &[0, 1], "exp").expect("plan");
    let mut tasks = families.remove(&ExperimentType::Multitask).expect("family");
    tasks.sort_by_key(|task| task.rnd());
    let (first, rest) = tasks.split_first_mut().expect("two tasks");
    let second = &mut rest[0];

    let first_train = Arc::clone(first.train_handle());
    first.model_mut().fit(&first_train).expect("fit first");
    let before = first.model().predict(first.test()).expect("predict");

    let second_train = Arc::clone(second.train_handle());
    second.model_mut().fit(&second_train).expect("fit second");
    let after = first.model().predict(first.test()).expect("predict");
    assert_eq!(before, after);

    let other = second.model().predict(first.test()).expect("predict");
    assert_ne!(before, other);
}

#[test]
fn cancelled_token_stops_before_fit() {
    let (_tracker, session) = common::memory_session();
    let scratch = tempdir().expect("scratch");
    let scripted = ScriptedModel::new(None);
    let fits = scripted.fit_counter();
    let families = plan(&[ExperimentType::Multitask], &scripted_models(scripted), &common::datasets(), &[1.0], &[0, 1], "exp")
        .expect("plan");
    let parent = session.open_parent("replication", &Params::new()).expect("parent");
    let token = CancellationToken::new();
    token.cancel();
    let failure = Executor::new(None)
        .with_cancellation(token)
        .with_scratch_dir(scratch.path())
        .run(&session, families, &parent)
        .unwrap_err();
    assert!(matches!(failure.error, WluError::Cancelled(_)));
    assert_eq!(failure.error.info().context.get("phase").map(String::as_str), Some("pre_fit"));
    assert_eq!(fits.load(Ordering::SeqCst), 0);
}

#[test]
fn tracking_failures_keep_computed_results() {
    let (tracker, session) = common::memory_session();
    tracker.fail_operation("log_artifact");
    tracker.fail_operation("log_metrics");
    let scratch = tempdir().expect("scratch");
    let families = plan(
        &[ExperimentType::Multitask],
        &common::models(&["cpooling-dummy"]),
        &common::datasets(),
        &[1.0],
        &[0, 1],
        "exp",
    )
    .expect("plan");
    let parent = session.open_parent("replication", &Params::new()).expect("parent");
    let report = Executor::new(None)
        .with_scratch_dir(scratch.path())
        .run(&session, families, &parent)
        .expect("tracking trouble is not fatal");
    assert_eq!(report.outcomes.len(), 2);
    for outcome in &report.outcomes {
        assert_eq!(outcome.tracking_errors.len(), 2);
        assert!(outcome.tracking_errors.iter().all(WluError::is_tracking));
        assert_eq!(outcome.scores.len(), 3);
    }
    assert_eq!(fs::read_dir(scratch.path()).expect("scratch").count(), 0);
}

#[test]
fn data_errors_from_a_fit_surface_as_model_failures() {
    let (_tracker, session) = common::memory_session();
    let scratch = tempdir().expect("scratch");
    let models = scripted_models(ScriptedModel::new(Some(1)).with_data_failure());
    let families = plan(&[ExperimentType::Multitask], &models, &common::datasets(), &[1.0], &[0], "exp")
        .expect("plan");
    let parent = session.open_parent("replication", &Params::new()).expect("parent");
    let failure = Executor::new(None)
        .with_scratch_dir(scratch.path())
        .run(&session, families, &parent)
        .unwrap_err();

    assert!(matches!(failure.error, WluError::Model(_)));
    let info = failure.error.info();
    assert_eq!(info.code, "bad_shape");
    assert!(info.message.contains("ragged matrix"));
    assert_eq!(info.context.get("family").map(String::as_str), Some("data"));
    assert_eq!(info.context.get("step").map(String::as_str), Some("fit"));
    assert_eq!(info.context.get("rows").map(String::as_str), Some("3"));
    assert!(info.context.contains_key("task"));
}
