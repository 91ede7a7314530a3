use std::collections::BTreeMap;

use criterion::{criterion_group, criterion_main, Criterion};
use wlu_data::ArtificialSpec;
use wlu_exp::{plan, summarize_tables, ExperimentType};
use wlu_models::builtin_models;

fn bench_plan(c: &mut Criterion) {
    let datasets: BTreeMap<_, _> = ["A", "B"]
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let dataset = ArtificialSpec {
                n_envs: 6,
                n_options: 8,
                n_rows: 256,
                seed: i as u64,
                ..ArtificialSpec::default()
            }
            .generate(label)
            .expect("generate");
            (label.to_string(), dataset)
        })
        .collect();
    let models = builtin_models();
    let sizes = [0.5, 1.0, 2.0, 3.0];
    let rnds: Vec<u64> = (0..10).collect();

    c.bench_function("plan_throughput", |b| {
        b.iter(|| {
            let families = plan(
                &[ExperimentType::Multitask, ExperimentType::Holdout],
                &models,
                &datasets,
                &sizes,
                &rnds,
                "bench",
            )
            .expect("plan");
            criterion::black_box(families.values().map(Vec::len).sum::<usize>());
        });
    });

    let tables: Vec<_> = (0..200)
        .map(|rep| {
            let mut table = wlu_core::Table::new(["model", "subject_system", "relative_train_size", "experiment_type", "rnd", "mape", "rmse", "r2"]);
            for env in 0..6 {
                table
                    .push_row(vec![
                        serde_json::json!("m"),
                        serde_json::json!("A"),
                        serde_json::json!(1.0),
                        serde_json::json!("multitask"),
                        serde_json::json!(rep),
                        serde_json::json!(10.0 + env as f64),
                        serde_json::json!(1.0),
                        serde_json::json!(0.5),
                    ])
                    .expect("row");
            }
            table
        })
        .collect();
    c.bench_function("summary_throughput", |b| {
        b.iter(|| criterion::black_box(summarize_tables(tables.iter()).expect("summary").len()));
    });
}

criterion_group!(benches, bench_plan);
criterion_main!(benches);
