//! Long-format CSV workload tables.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{EnvData, WorkloadDataset};

fn csv_error(code: &str, path: &Path, err: impl ToString) -> WluError {
    WluError::Data(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Column roles inside a long-format measurement file.
///
/// Every column that is neither the workload nor the target column (nor
/// explicitly ignored) is a configuration option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvLayout {
    #[serde(default = "CsvLayout::default_workload_column")]
    pub workload_column: String,
    #[serde(default = "CsvLayout::default_target_column")]
    pub target_column: String,
    #[serde(default)]
    pub ignore_columns: Vec<String>,
}

impl CsvLayout {
    fn default_workload_column() -> String {
        "workload".to_string()
    }

    fn default_target_column() -> String {
        "performance".to_string()
    }
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            workload_column: Self::default_workload_column(),
            target_column: Self::default_target_column(),
            ignore_columns: Vec::new(),
        }
    }
}

/// Loads a CSV file and groups its rows into environments.
///
/// Environments are ordered by workload label so the environment ordinal,
/// and with it every derived split seed, is stable across runs.
pub fn load_csv(
    label: &str,
    path: &Path,
    layout: &CsvLayout,
) -> Result<WorkloadDataset, WluError> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| csv_error("csv_open", path, err))?;
    let headers = reader
        .headers()
        .map_err(|err| csv_error("csv_headers", path, err))?
        .clone();

    let find = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            WluError::Data(
                ErrorInfo::new("csv_column", "required column missing")
                    .with_context("path", path.display().to_string())
                    .with_context("column", name.to_string()),
            )
        })
    };
    let workload_idx = find(&layout.workload_column)?;
    let target_idx = find(&layout.target_column)?;
    let option_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(idx, name)| {
            *idx != workload_idx
                && *idx != target_idx
                && !layout.ignore_columns.iter().any(|ignored| ignored == name)
        })
        .map(|(idx, _)| idx)
        .collect();
    let feature_names: Vec<String> = option_idx
        .iter()
        .map(|&idx| headers[idx].to_string())
        .collect();

    let mut grouped: BTreeMap<String, (Vec<Vec<f64>>, Vec<f64>)> = BTreeMap::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| csv_error("csv_record", path, err))?;
        let parse = |idx: usize| -> Result<f64, WluError> {
            let raw = record.get(idx).unwrap_or_default().trim();
            parse_cell(raw).ok_or_else(|| {
                WluError::Data(
                    ErrorInfo::new("csv_value", "cell is not numeric")
                        .with_context("path", path.display().to_string())
                        .with_context("line", (line + 2).to_string())
                        .with_context("column", headers[idx].to_string())
                        .with_context("value", raw.to_string()),
                )
            })
        };
        let row = option_idx
            .iter()
            .map(|&idx| parse(idx))
            .collect::<Result<Vec<_>, _>>()?;
        let target = parse(target_idx)?;
        let workload = record.get(workload_idx).unwrap_or_default().to_string();
        let entry = grouped.entry(workload).or_default();
        entry.0.push(row);
        entry.1.push(target);
    }

    let envs = grouped
        .into_iter()
        .enumerate()
        .map(|(env_id, (workload, (x, y)))| {
            EnvData::new(env_id, workload, feature_names.clone(), x, y)
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(dataset = label, envs = envs.len(), options = feature_names.len(), "loaded csv");
    WorkloadDataset::new(label, envs)
}

fn parse_cell(raw: &str) -> Option<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(1.0),
        "false" => Some(0.0),
        other => other.parse().ok(),
    }
}
