#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{
    EnvData, Evaluation, EvaluationContext, Model, PoolingCategory, Predictions, Table,
    WorkloadDataset,
};
use wlu_data::ArtificialSpec;
use wlu_models::{builtin_models, score_predictions, ScoredEvaluation};
use wlu_track::{MemoryTracker, Pacing, TrackingSession};

pub fn dataset(label: &str, seed: u64) -> WorkloadDataset {
    ArtificialSpec {
        n_envs: 3,
        n_options: 4,
        n_rows: 40,
        seed,
        ..ArtificialSpec::default()
    }
    .generate(label)
    .expect("generate")
}

pub fn datasets() -> BTreeMap<String, WorkloadDataset> {
    BTreeMap::from([("A".to_string(), dataset("A", 1))])
}

pub fn models(labels: &[&str]) -> BTreeMap<String, Box<dyn Model>> {
    let mut all = builtin_models();
    labels
        .iter()
        .map(|label| (label.to_string(), all.remove(*label).expect("builtin model")))
        .collect()
}

pub fn memory_session() -> (Arc<MemoryTracker>, TrackingSession) {
    let tracker = Arc::new(MemoryTracker::new());
    let session = TrackingSession::new(tracker.clone(), "wlu-tests")
        .expect("session")
        .with_pacing(Pacing::none());
    (tracker, session)
}

/// Predicts the training mean and can be told to fail on the n-th fit call
/// across all of its instances. Tracks how many instances are alive.
pub struct ScriptedModel {
    fits: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    fail_on_fit: Option<usize>,
    data_failure: bool,
    instance: bool,
    mean: Option<f64>,
}

impl ScriptedModel {
    pub fn new(fail_on_fit: Option<usize>) -> Self {
        Self {
            fits: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
            fail_on_fit,
            data_failure: false,
            instance: false,
            mean: None,
        }
    }

    /// Fails with a data error instead of a model error.
    pub fn with_data_failure(mut self) -> Self {
        self.data_failure = true;
        self
    }

    pub fn live_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live)
    }

    pub fn fit_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fits)
    }
}

impl Drop for ScriptedModel {
    fn drop(&mut self) {
        if self.instance {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Model for ScriptedModel {
    fn instantiate(&self) -> Box<dyn Model> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedModel {
            fits: Arc::clone(&self.fits),
            live: Arc::clone(&self.live),
            fail_on_fit: self.fail_on_fit,
            data_failure: self.data_failure,
            instance: true,
            mean: None,
        })
    }

    fn set_envs(&mut self, _dataset: &WorkloadDataset) {}

    fn pooling_cat(&self) -> PoolingCategory {
        PoolingCategory::CompletePooling
    }

    fn fit(&mut self, train: &[EnvData]) -> Result<(), WluError> {
        let call = self.fits.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(call) == self.fail_on_fit && self.data_failure {
            return Err(WluError::Data(
                ErrorInfo::new("bad_shape", format!("fit call {call} saw a ragged matrix"))
                    .with_context("rows", "3"),
            ));
        }
        if Some(call) == self.fail_on_fit {
            return Err(WluError::model("scripted_fit", format!("fit call {call} fails")));
        }
        let targets: Vec<f64> = train.iter().flat_map(|env| env.targets().to_vec()).collect();
        self.mean = Some(targets.iter().sum::<f64>() / targets.len() as f64);
        Ok(())
    }

    fn predict(&self, test: &[EnvData]) -> Result<Predictions, WluError> {
        let mean = self.mean.ok_or_else(|| WluError::model("scripted_predict", "not fitted"))?;
        Ok(test.iter().map(|env| vec![mean; env.len()]).collect())
    }

    fn evaluate(&self, ctx: EvaluationContext<'_>) -> Result<Box<dyn Evaluation>, WluError> {
        Ok(Box::new(ScoredEvaluation {
            scores: score_predictions(ctx)?,
            metadata: Table::new(["mean"]),
        }))
    }
}
