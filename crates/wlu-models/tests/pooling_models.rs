use wlu_core::errors::WluError;
use wlu_core::{EnvData, EvaluationContext, Model, PoolingCategory, WorkloadDataset};
use wlu_data::ArtificialSpec;
use wlu_models::{builtin_models, select_models, PartialPoolingModel, SCORE_COLUMNS};

fn dataset(noise_std: f64) -> WorkloadDataset {
    ArtificialSpec {
        noise_std,
        seed: 7,
        ..ArtificialSpec::default()
    }
    .generate("artificial")
    .expect("generate")
}

fn mixed_width_dataset() -> WorkloadDataset {
    let envs = [4usize, 6]
        .into_iter()
        .enumerate()
        .map(|(env_id, n_options)| {
            let names = (0..n_options).map(|i| format!("o{i}")).collect();
            let x = (0..12)
                .map(|r| (0..n_options).map(|c| ((r + c) % 3) as f64).collect())
                .collect();
            let y = (0..12).map(|r| 5.0 + r as f64).collect();
            EnvData::new(env_id, format!("w{env_id}"), names, x, y).expect("env")
        })
        .collect();
    WorkloadDataset::new("mixed", envs).expect("dataset")
}

#[test]
fn every_builtin_fits_predicts_and_scores() {
    let data = dataset(1.0);
    let envs = data.workloads_data();
    for (label, proto) in builtin_models() {
        let mut model = proto.instantiate();
        model.set_envs(&data);
        model.fit(envs).unwrap_or_else(|err| panic!("{label}: {err}"));
        let predictions = model.predict(envs).expect("predict");
        assert_eq!(predictions.len(), envs.len(), "{label}");
        let evaluation = model
            .evaluate(EvaluationContext {
                predictions: &predictions,
                test: envs,
            })
            .expect("evaluate");
        let scores = evaluation.scores();
        assert_eq!(scores.len(), envs.len(), "{label}");
        assert_eq!(scores.columns(), SCORE_COLUMNS.map(String::from).as_slice());
        assert!(!evaluation.metadata().is_empty(), "{label}");
    }
}

#[test]
fn linear_models_beat_the_dummy_on_low_noise_data() {
    let data = dataset(0.1);
    let envs = data.workloads_data();
    let models = builtin_models();
    let rmse_of = |label: &str| -> f64 {
        let mut model = models[label].instantiate();
        model.set_envs(&data);
        model.fit(envs).expect("fit");
        let predictions = model.predict(envs).expect("predict");
        let scores = model
            .evaluate(EvaluationContext {
                predictions: &predictions,
                test: envs,
            })
            .expect("evaluate")
            .scores();
        let idx = scores.column_index("rmse").expect("rmse column");
        scores
            .rows()
            .iter()
            .map(|row| row[idx].as_f64().expect("finite rmse"))
            .sum::<f64>()
    };
    assert!(rmse_of("no-pooling-lin") < rmse_of("no-pooling-dummy"));
    assert!(rmse_of("no-pooling-lin") < 1.0 * envs.len() as f64);
}

#[test]
fn instantiate_yields_an_unfitted_copy() {
    let data = dataset(1.0);
    let mut fitted = PartialPoolingModel::default();
    fitted.fit(data.workloads_data()).expect("fit");
    let fresh = fitted.instantiate();
    assert_eq!(fresh.pooling_cat(), PoolingCategory::PartialPooling);
    let err = fresh.predict(data.workloads_data()).unwrap_err();
    assert_eq!(err.info().code, "model_not_fitted");
}

#[test]
fn unknown_model_label_is_a_config_error() {
    let err = select_models(&["gp-magic".to_string()]).err().expect("unknown label");
    assert_eq!(err.info().code, "model_unknown");
    let picked = select_models(&["cpooling-lin".to_string()]).expect("known label");
    assert_eq!(picked.len(), 1);
    assert_eq!(
        picked["cpooling-lin"].pooling_cat(),
        PoolingCategory::CompletePooling
    );
}

#[test]
fn pooled_models_reject_environments_of_different_width() {
    let data = mixed_width_dataset();
    let envs = data.workloads_data();
    let mut models = builtin_models();
    for label in ["cpooling-dummy", "cpooling-lin", "partial-pooling-ridge"] {
        let mut model = models.remove(label).expect("builtin").instantiate();
        model.set_envs(&data);
        let err = model.fit(envs).unwrap_err();
        assert!(matches!(err, WluError::Model(_)), "{label}");
        assert_eq!(err.info().code, "feature_width", "{label}");
        assert_eq!(err.info().context.get("found").map(String::as_str), Some("6"), "{label}");
    }

    let mut unpooled = models.remove("no-pooling-dummy").expect("builtin").instantiate();
    unpooled.set_envs(&data);
    unpooled.fit(envs).expect("per-environment fit");
    let predictions = unpooled.predict(envs).expect("predict");
    assert_eq!(predictions.iter().map(Vec::len).collect::<Vec<_>>(), vec![12, 12]);
}
