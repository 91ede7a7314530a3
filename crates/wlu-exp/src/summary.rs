use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};
use wlu_core::errors::WluError;
use wlu_core::Table;
use wlu_track::{RunStatus, TrackingBackend};

use crate::assembler::{TaskOutcome, SCORES_ARTIFACT};

/// Score columns aggregated by [`summarize`].
pub const SUMMARY_SCORES: [&str; 3] = ["mape", "rmse", "r2"];

const GROUP_KEYS: [&str; 4] = ["model", "subject_system", "relative_train_size", "experiment_type"];

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    (mean, var.sqrt())
}

fn group_key(record: &BTreeMap<String, Value>) -> Vec<String> {
    GROUP_KEYS
        .iter()
        .map(|key| match record.get(*key) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect()
}

#[derive(Default)]
struct Group {
    key_values: Vec<Value>,
    rnds: BTreeSet<String>,
    scores: BTreeMap<&'static str, Vec<f64>>,
}

/// Aggregates annotated score tables per (model, subject system, relative
/// train size, experiment type).
///
/// Each score column gets a mean and a sample standard deviation over all
/// environments and repetitions; `n_reps` counts distinct repetitions.
pub fn summarize_tables<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Result<Table, WluError> {
    let mut groups: BTreeMap<Vec<String>, Group> = BTreeMap::new();
    for table in tables {
        for record in table.records() {
            let group = groups.entry(group_key(&record)).or_default();
            if group.key_values.is_empty() {
                group.key_values = GROUP_KEYS
                    .iter()
                    .map(|key| record.get(*key).cloned().unwrap_or(Value::Null))
                    .collect();
            }
            if let Some(rnd) = record.get("rnd") {
                group.rnds.insert(rnd.to_string());
            }
            for score in SUMMARY_SCORES {
                if let Some(value) = record.get(score).and_then(Value::as_f64) {
                    group.scores.entry(score).or_default().push(value);
                }
            }
        }
    }

    let mut columns: Vec<String> = GROUP_KEYS.iter().map(|key| key.to_string()).collect();
    columns.push("n_reps".into());
    for score in SUMMARY_SCORES {
        columns.push(format!("{score}_mean"));
        columns.push(format!("{score}_std"));
    }
    let mut summary = Table::new(columns);
    for group in groups.into_values() {
        let mut row = group.key_values;
        row.push(json!(group.rnds.len()));
        for score in SUMMARY_SCORES {
            match group.scores.get(score) {
                Some(values) if !values.is_empty() => {
                    let (mean, std) = mean_std(values);
                    row.push(Value::from(mean));
                    row.push(Value::from(std));
                }
                _ => {
                    row.push(Value::Null);
                    row.push(Value::Null);
                }
            }
        }
        summary.push_row(row)?;
    }
    Ok(summary)
}

/// Aggregates the outcomes of one replication.
pub fn summarize(outcomes: &[TaskOutcome]) -> Result<Table, WluError> {
    summarize_tables(outcomes.iter().map(|outcome| &outcome.scores))
}

/// Rebuilds the summary from the score tables logged under a parent run.
///
/// Child runs that did not finish successfully are skipped.
pub fn summarize_parent(backend: &dyn TrackingBackend, parent_run_id: &str) -> Result<Table, WluError> {
    let mut tables = Vec::new();
    for run in backend.child_runs(parent_run_id)? {
        if run.status() != RunStatus::Success {
            continue;
        }
        let value = backend.load_dict(run.run_id(), SCORES_ARTIFACT)?;
        let table: Table = serde_json::from_value(value)
            .map_err(|err| WluError::serde("scores_decode", err))?;
        tables.push(table);
    }
    summarize_tables(tables.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
        let mut table = Table::new(columns.iter().copied());
        for row in rows {
            table.push_row(row).expect("row");
        }
        table
    }

    #[test]
    fn every_group_yields_one_row() {
        let full = scores(
            &["model", "subject_system", "relative_train_size", "experiment_type", "rnd", "mape", "rmse", "r2"],
            vec![
                vec![json!("m1"), json!("A"), json!(1.0), json!("multitask"), json!(0), json!(10.0), json!(2.0), json!(0.5)],
                vec![json!("m1"), json!("A"), json!(1.0), json!("multitask"), json!(1), json!(20.0), json!(4.0), json!(0.7)],
            ],
        );
        let sparse = scores(
            &["model", "subject_system", "relative_train_size", "experiment_type", "rmse"],
            vec![vec![json!("m2"), json!("B"), json!(2.0), json!("holdout"), json!(3.0)]],
        );
        let summary = summarize_tables([&full, &sparse]).expect("summary");
        assert_eq!(summary.len(), 2);

        let records = summary.records();
        let first = &records[0];
        assert_eq!(first["model"], json!("m1"));
        assert_eq!(first["n_reps"], json!(2));
        assert_eq!(first["mape_mean"], json!(15.0));
        assert!((first["mape_std"].as_f64().expect("std") - 50f64.sqrt()).abs() < 1e-12);

        let second = &records[1];
        assert_eq!(second["n_reps"], json!(0));
        assert_eq!(second["rmse_mean"], json!(3.0));
        assert_eq!(second["rmse_std"], json!(0.0));
        assert_eq!(second["mape_mean"], Value::Null);
        assert_eq!(second["r2_std"], Value::Null);
    }

    #[test]
    fn no_tables_give_an_empty_summary() {
        let summary = summarize_tables(std::iter::empty()).expect("summary");
        assert!(summary.is_empty());
        assert_eq!(summary.columns().len(), GROUP_KEYS.len() + 1 + 2 * SUMMARY_SCORES.len());
    }
}
