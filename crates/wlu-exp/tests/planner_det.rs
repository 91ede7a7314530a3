mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;
use wlu_core::{EnvData, WorkloadDataset};
use wlu_exp::{plan, plan_digest, plan_with_scope, ExperimentType, TaskFamilies, TestScope};

fn row_sets(families: &TaskFamilies) -> BTreeMap<(String, String), Vec<(Vec<usize>, Vec<usize>)>> {
    families
        .values()
        .flatten()
        .map(|task| {
            let key = (format!("{}|{}", task.id(), task.rnd()), task.exp_type().to_string());
            let rows = task
                .train()
                .iter()
                .zip(task.test())
                .map(|(train, test)| (train.row_ids().to_vec(), test.row_ids().to_vec()))
                .collect();
            (key, rows)
        })
        .collect()
}

#[test]
fn planning_is_deterministic() {
    let datasets = common::datasets();
    let models = common::models(&["no-pooling-lin", "cpooling-dummy"]);
    let sizes = [0.5, 1.0, 2.0];
    let rnds = [7, 8];
    let first = plan(&[ExperimentType::Multitask], &models, &datasets, &sizes, &rnds, "exp").expect("plan");
    let second = plan(&[ExperimentType::Multitask], &models, &datasets, &sizes, &rnds, "exp").expect("plan");
    assert_eq!(row_sets(&first), row_sets(&second));

    let order = |families: &TaskFamilies| -> Vec<String> {
        families[&ExperimentType::Multitask]
            .iter()
            .map(|task| format!("{}|{}", task.id(), task.rnd()))
            .collect()
    };
    assert_eq!(order(&first), order(&second));
    assert_eq!(first[&ExperimentType::Multitask].len(), 2 * 3 * 2);
}

#[test]
fn models_and_experiment_types_see_identical_rows() {
    let datasets = common::datasets();
    let models = common::models(&["no-pooling-lin", "cpooling-lin"]);
    let families = plan(
        &[ExperimentType::Multitask, ExperimentType::Holdout],
        &models,
        &datasets,
        &[1.0],
        &[7],
        "exp",
    )
    .expect("plan");
    let trains: Vec<Vec<Vec<usize>>> = families
        .values()
        .flatten()
        .map(|task| task.train().iter().map(|env| env.row_ids().to_vec()).collect())
        .collect();
    assert_eq!(trains.len(), 4);
    assert!(trains.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_sets_follow_the_largest_train_size() {
    let datasets = common::datasets();
    let models = common::models(&["cpooling-dummy"]);
    let families = plan(&[ExperimentType::Multitask], &models, &datasets, &[0.5, 1.0, 2.0], &[7], "exp")
        .expect("plan");
    let tasks = &families[&ExperimentType::Multitask];
    let ceiling = tasks
        .iter()
        .find(|task| task.rel_train_size() == 2.0)
        .expect("largest size planned");
    for task in tasks {
        for (env, (test, ceiling_train)) in task.test().iter().zip(ceiling.train()).enumerate() {
            assert_eq!(test.row_ids(), ceiling_train.row_ids(), "env {env}");
            assert_eq!(test.len(), 8);
        }
        let train_rows = task.train()[0].len();
        assert_eq!(task.abs_train_size(), train_rows);
        assert_eq!(train_rows, (task.rel_train_size() * 4.0) as usize);
    }
}

#[test]
fn full_scope_evaluates_on_every_row() {
    let datasets = common::datasets();
    let models = common::models(&["cpooling-dummy"]);
    let families = plan_with_scope(
        &[ExperimentType::Multitask],
        &models,
        &datasets,
        &[1.0],
        &[3],
        "exp",
        TestScope::Full,
    )
    .expect("plan");
    let task = &families[&ExperimentType::Multitask][0];
    assert!(task.test().iter().all(|env| env.len() == 40));
}

#[test]
fn holdout_excludes_training_rows() {
    let datasets = common::datasets();
    let models = common::models(&["cpooling-dummy"]);
    let families = plan(&[ExperimentType::Holdout], &models, &datasets, &[2.0], &[5], "exp").expect("plan");
    let task = &families[&ExperimentType::Holdout][0];
    for (train, test) in task.train().iter().zip(task.test()) {
        assert_eq!(train.len() + test.len(), 40);
        assert!(train.row_ids().iter().all(|id| !test.row_ids().contains(id)));
    }
}

#[test]
fn unsatisfiable_split_fails_planning() {
    let datasets = common::datasets();
    let models = common::models(&["cpooling-dummy"]);
    let err = plan(&[ExperimentType::Multitask], &models, &datasets, &[100.0], &[1], "exp").unwrap_err();
    assert_eq!(err.info().code, "split_train_size");
    assert_eq!(err.info().context.get("dataset").map(String::as_str), Some("A"));

    let err = plan(&[ExperimentType::Multitask], &models, &datasets, &[0.1], &[1], "exp").unwrap_err();
    assert_eq!(err.info().code, "split_train_size");
}

#[test]
fn task_ids_exclude_the_repetition() {
    let datasets = common::datasets();
    let models = common::models(&["no-pooling-lin"]);
    let families = plan(&[ExperimentType::Multitask], &models, &datasets, &[1.0], &[1, 2], "exp").expect("plan");
    let tasks = &families[&ExperimentType::Multitask];
    assert_eq!(tasks[0].id(), "multitask-no-pooling-lin on A-trainx1.0");
    assert_eq!(tasks[0].id(), tasks[1].id());
    assert_ne!(tasks[0].rnd(), tasks[1].rnd());
    assert_eq!(tasks[0].metadata()["rnd"], serde_json::json!(tasks[0].rnd()));
}

fn mixed_option_dataset() -> BTreeMap<String, WorkloadDataset> {
    let envs = [4usize, 6, 8]
        .into_iter()
        .enumerate()
        .map(|(env_id, n_options)| {
            let names = (0..n_options).map(|i| format!("o{i}")).collect();
            let x = (0..32)
                .map(|r| (0..n_options).map(|c| ((r >> (c % 5)) & 1) as f64).collect())
                .collect();
            let y = (0..32).map(|r| 20.0 + r as f64).collect();
            EnvData::new(env_id, format!("w{env_id}"), names, x, y).expect("env")
        })
        .collect();
    BTreeMap::from([("A".to_string(), WorkloadDataset::new("A", envs).expect("dataset"))])
}

#[test]
fn environments_with_different_option_counts_are_planned() {
    let datasets = mixed_option_dataset();
    let models = common::models(&["no-pooling-dummy"]);
    let first = plan(&[ExperimentType::Multitask], &models, &datasets, &[1.0, 2.0], &[7], "exp").expect("plan");
    let task = first[&ExperimentType::Multitask]
        .iter()
        .find(|task| task.rel_train_size() == 1.0)
        .expect("size 1.0 planned");
    let train: Vec<usize> = task.train().iter().map(EnvData::len).collect();
    let test: Vec<usize> = task.test().iter().map(EnvData::len).collect();
    assert_eq!(train, vec![4, 6, 8]);
    assert_eq!(test, vec![8, 12, 16]);

    let second = plan(&[ExperimentType::Multitask], &models, &datasets, &[1.0, 2.0], &[7], "exp").expect("plan");
    assert_eq!(row_sets(&first), row_sets(&second));
}

#[test]
fn every_type_collects_the_full_cross_product() {
    let datasets = common::datasets();
    let models = common::models(&["no-pooling-lin", "cpooling-dummy", "cpooling-lin"]);
    let types = [ExperimentType::Multitask, ExperimentType::Holdout];
    let sizes = [1.0, 2.0];
    let rnds = [0, 1, 2];
    let families = plan(&types, &models, &datasets, &sizes, &rnds, "exp").expect("plan");
    assert_eq!(families.len(), types.len());
    for exp_type in types {
        let tasks = &families[&exp_type];
        assert_eq!(tasks.len(), models.len() * sizes.len() * rnds.len());
        assert!(tasks.iter().all(|task| task.exp_type() == exp_type));
    }
    let total: usize = families.values().map(Vec::len).sum();
    assert_eq!(total, models.len() * types.len() * sizes.len() * rnds.len());
}

#[test]
fn plan_digest_tracks_inputs() {
    let labels = vec!["m".to_string()];
    let data = vec!["A".to_string()];
    let a = plan_digest(&[ExperimentType::Multitask], &labels, &data, &[1.0], &[1], TestScope::Ceiling)
        .expect("digest");
    let b = plan_digest(&[ExperimentType::Multitask], &labels, &data, &[1.0], &[1], TestScope::Ceiling)
        .expect("digest");
    let c = plan_digest(&[ExperimentType::Multitask], &labels, &data, &[1.0], &[2], TestScope::Ceiling)
        .expect("digest");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn holdout_rows_never_overlap_training(rnd in 0u64..10_000, size_idx in 0usize..3) {
        let sizes = [0.5, 1.0, 2.0];
        let datasets = common::datasets();
        let models = common::models(&["cpooling-dummy"]);
        let families = plan(
            &[ExperimentType::Multitask, ExperimentType::Holdout],
            &models,
            &datasets,
            &[sizes[size_idx]],
            &[rnd],
            "exp",
        )
        .expect("plan");
        let multitask = &families[&ExperimentType::Multitask][0];
        let holdout = &families[&ExperimentType::Holdout][0];
        for (env, train) in holdout.train().iter().enumerate() {
            let test = &holdout.test()[env];
            prop_assert!(train.row_ids().iter().all(|id| !test.row_ids().contains(id)));
            prop_assert_eq!(train.row_ids(), multitask.train()[env].row_ids());
        }
    }
}
