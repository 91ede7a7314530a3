use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{environment_seeds, EnvData, Model, RngHandle, WorkloadDataset};

use crate::hash::stable_hash_string;
use crate::task::{format_rel_size, ExperimentType, Task};

/// Tasks grouped by experiment type, each family in submission order.
pub type TaskFamilies = BTreeMap<ExperimentType, Vec<Task>>;

/// Data a multitask run is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestScope {
    /// The split's test set, sized by the largest train size of the sweep.
    #[default]
    Ceiling,
    /// Every row of the environment.
    Full,
}

/// Splits of every environment for one (dataset, train size, repetition).
struct SplitSet {
    train: Arc<Vec<EnvData>>,
    test: Arc<Vec<EnvData>>,
    holdout: Option<Arc<Vec<EnvData>>>,
}

fn split_dataset(
    dataset: &WorkloadDataset,
    rel: f64,
    max_rel: f64,
    rnd: u64,
    scope: TestScope,
    needs_holdout: bool,
) -> Result<SplitSet, WluError> {
    let envs = dataset.workloads_data();
    let seeds = environment_seeds(rnd, envs.len());
    let mut train = Vec::with_capacity(envs.len());
    let mut test = Vec::with_capacity(envs.len());
    for (env, seed) in envs.iter().zip(seeds) {
        let split = env.get_split(seed, rel, max_rel).map_err(|err| {
            err.with_context("dataset", dataset.label())
                .with_context("rnd", rnd.to_string())
        })?;
        train.push(split.train);
        test.push(match scope {
            TestScope::Ceiling => split.test,
            TestScope::Full => env.clone(),
        });
    }
    let holdout = if needs_holdout {
        let sets = envs
            .iter()
            .zip(&train)
            .map(|(env, train)| {
                let used: BTreeSet<usize> = train.row_ids().iter().copied().collect();
                let rest = env.without_rows(&used);
                if rest.is_empty() {
                    return Err(WluError::Split(
                        ErrorInfo::new("holdout_empty", "no rows left for holdout evaluation")
                            .with_context("dataset", dataset.label().to_string())
                            .with_context("env", env.env_label().to_string())
                            .with_context("train_rel", rel.to_string()),
                    ));
                }
                Ok(rest)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Some(Arc::new(sets))
    } else {
        None
    };
    Ok(SplitSet {
        train: Arc::new(train),
        test: Arc::new(test),
        holdout,
    })
}

fn validate_inputs(exp_types: &[ExperimentType], train_sizes: &[f64], rnds: &[u64]) -> Result<(), WluError> {
    if exp_types.is_empty() {
        return Err(WluError::Config(ErrorInfo::new(
            "plan_experiment_types",
            "at least one experiment type is required",
        )));
    }
    if rnds.is_empty() {
        return Err(WluError::Config(ErrorInfo::new(
            "plan_repetitions",
            "at least one repetition seed is required",
        )));
    }
    if train_sizes.is_empty() {
        return Err(WluError::Config(ErrorInfo::new(
            "plan_train_sizes",
            "at least one train size is required",
        )));
    }
    if let Some(bad) = train_sizes.iter().find(|size| !size.is_finite() || **size <= 0.0) {
        return Err(WluError::Config(
            ErrorInfo::new("plan_train_sizes", "train sizes must be positive and finite")
                .with_context("train_size", bad.to_string()),
        ));
    }
    Ok(())
}

/// Plans every task of a replication with the default [`TestScope`].
pub fn plan(
    exp_types: &[ExperimentType],
    models: &BTreeMap<String, Box<dyn Model>>,
    datasets: &BTreeMap<String, WorkloadDataset>,
    train_sizes: &[f64],
    rnds: &[u64],
    exp_id: &str,
) -> Result<TaskFamilies, WluError> {
    plan_with_scope(exp_types, models, datasets, train_sizes, rnds, exp_id, TestScope::default())
}

/// Expands the cross product of experiment types, models, datasets, train
/// sizes and repetitions into task families.
///
/// Splits are computed once per (dataset, train size, repetition) and shared
/// by every model and experiment type, so all of them see identical rows.
/// The test size of every split is taken from the largest requested train
/// size. Each family is shuffled with one generator seeded by `rnds[0]`.
pub fn plan_with_scope(
    exp_types: &[ExperimentType],
    models: &BTreeMap<String, Box<dyn Model>>,
    datasets: &BTreeMap<String, WorkloadDataset>,
    train_sizes: &[f64],
    rnds: &[u64],
    exp_id: &str,
    scope: TestScope,
) -> Result<TaskFamilies, WluError> {
    validate_inputs(exp_types, train_sizes, rnds)?;
    let types: BTreeSet<ExperimentType> = exp_types.iter().copied().collect();
    let needs_holdout = types.contains(&ExperimentType::Holdout);
    let max_rel = train_sizes.iter().copied().fold(f64::MIN, f64::max);

    let mut families: TaskFamilies = types.iter().map(|ty| (*ty, Vec::new())).collect();
    for (dataset_label, dataset) in datasets {
        for &rel in train_sizes {
            for &rnd in rnds {
                let splits = split_dataset(dataset, rel, max_rel, rnd, scope, needs_holdout)?;
                let abs_train_size = splits.train.first().map_or(0, EnvData::len);
                for (model_label, prototype) in models {
                    for exp_type in &types {
                        let mut model = prototype.instantiate();
                        model.set_envs(dataset);
                        let pooling_cat = model.pooling_cat();
                        let test = match (exp_type, &splits.holdout) {
                            (ExperimentType::Holdout, Some(holdout)) => Arc::clone(holdout),
                            _ => Arc::clone(&splits.test),
                        };
                        let task = Task {
                            exp_type: *exp_type,
                            model_label: model_label.clone(),
                            model,
                            dataset_label: dataset_label.clone(),
                            feature_names: dataset.feature_names().to_vec(),
                            train: Arc::clone(&splits.train),
                            test,
                            abs_train_size,
                            rel_train_size: rel,
                            rnd,
                            pooling_cat,
                            exp_id: exp_id.to_string(),
                        };
                        debug!(task = %task.id(), rnd, "task planned");
                        families.entry(*exp_type).or_default().push(task);
                    }
                }
            }
        }
    }

    let mut rng = RngHandle::from_seed(rnds[0]);
    for tasks in families.values_mut() {
        rng.shuffle(tasks);
    }
    info!(
        exp_id,
        tasks = families.values().map(Vec::len).sum::<usize>(),
        families = families.len(),
        "replication planned"
    );
    Ok(families)
}

/// Digest of the planning inputs, identical for identical sweeps.
pub fn plan_digest(
    exp_types: &[ExperimentType],
    model_labels: &[String],
    dataset_labels: &[String],
    train_sizes: &[f64],
    rnds: &[u64],
    scope: TestScope,
) -> Result<String, WluError> {
    let sizes: Vec<String> = train_sizes.iter().map(|rel| format_rel_size(*rel)).collect();
    stable_hash_string(&serde_json::json!({
        "experiment_types": exp_types,
        "models": model_labels,
        "datasets": dataset_labels,
        "train_sizes": sizes,
        "rnds": rnds,
        "test_scope": scope,
    }))
}
