use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;
use walkdir::WalkDir;
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_data::{DatasetCatalog, ARTIFICIAL_LABEL};
use wlu_exp::{from_yaml_slice, ExperimentType, TestScope};

/// Train sizes swept by the full presets, relative to the option count.
pub const FULL_SWEEP: [f64; 7] = [0.125, 0.25, 0.5, 0.75, 1.0, 2.0, 3.0];

/// Experiment the runs are filed under unless the config names another.
pub const DEFAULT_EXPERIMENT: &str = "wlu";

/// Experiment preset selected by the subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Prediction accuracy sweep over every train size.
    Rq1,
    /// Single large-train-size run used for model insights.
    Rq23,
    /// Sweep driven entirely by flags and the config file.
    Custom,
}

impl Preset {
    pub fn default_reps(self) -> usize {
        match self {
            Preset::Rq1 => 30,
            Preset::Rq23 => 1,
            Preset::Custom => 3,
        }
    }

    pub fn default_train_sizes(self) -> Vec<f64> {
        match self {
            Preset::Rq23 => vec![3.0],
            Preset::Rq1 | Preset::Custom => FULL_SWEEP.to_vec(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preset::Rq1 => "rq1",
            Preset::Rq23 => "rq23",
            Preset::Custom => "full-run",
        }
    }
}

/// Optional YAML file overriding the preset defaults. Flags still win.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub experiment: Option<String>,
    #[serde(default)]
    pub experiment_types: Option<Vec<ExperimentType>>,
    #[serde(default)]
    pub datasets: Option<Vec<String>>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub train_sizes: Option<Vec<f64>>,
    #[serde(default)]
    pub reps: Option<usize>,
    #[serde(default)]
    pub rep_offset: Option<u64>,
    #[serde(default)]
    pub test_scope: Option<TestScope>,
    #[serde(default)]
    pub catalog: Option<DatasetCatalog>,
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, WluError> {
        let bytes = fs::read(path).map_err(|err| {
            WluError::Config(
                ErrorInfo::new("config_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        from_yaml_slice(&bytes)
    }
}

/// Repetition seeds: `offset..offset + custom` when a count is given,
/// otherwise `0..default`.
pub fn get_rep_ids(default_n_reps: usize, custom_n_reps: Option<usize>, rep_offset: u64) -> Vec<u64> {
    match custom_n_reps.filter(|n| *n > 0) {
        Some(n) => (rep_offset..rep_offset + n as u64).collect(),
        None => (0..default_n_reps as u64).collect(),
    }
}

/// Dataset labels found as `<label>.csv` directly inside `dir`, sorted.
pub fn discover_datasets(dir: &Path) -> Result<Vec<String>, WluError> {
    let mut labels = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| {
            WluError::Data(
                ErrorInfo::new("data_dir_scan", err.to_string())
                    .with_context("path", dir.display().to_string()),
            )
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            labels.push(stem.to_string());
        }
    }
    labels.sort();
    Ok(labels)
}

/// Flag values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub reps: Option<usize>,
    pub rep_offset: Option<u64>,
    pub training_set_size: Option<f64>,
    pub data_dir: Option<PathBuf>,
    pub datasets: Vec<String>,
    pub models: Vec<String>,
    pub experiment_types: Vec<ExperimentType>,
    pub full_test: bool,
    pub debug: bool,
}

/// Everything a replication needs, with flags, config and preset merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRun {
    pub label: String,
    pub experiment: String,
    pub experiment_types: Vec<ExperimentType>,
    pub dataset_labels: Vec<String>,
    pub catalog: DatasetCatalog,
    pub model_labels: Vec<String>,
    pub train_sizes: Vec<f64>,
    pub rnds: Vec<u64>,
    pub test_scope: TestScope,
}

/// Merges flags over the config file over the preset defaults.
///
/// Debug runs shrink to one repetition on the smallest full-size split and
/// fall back to the artificial dataset.
pub fn resolve(preset: Preset, config: ExperimentConfig, overrides: &Overrides) -> Result<ResolvedRun, WluError> {
    let mut train_sizes = match overrides.training_set_size {
        Some(size) => vec![size],
        None => config.train_sizes.unwrap_or_else(|| preset.default_train_sizes()),
    };
    let mut default_reps = preset.default_reps();
    if overrides.debug {
        default_reps = 1;
        if overrides.training_set_size.is_none() {
            train_sizes = vec![1.0];
        }
    }
    let rnds = get_rep_ids(
        default_reps,
        overrides.reps.or(config.reps),
        overrides.rep_offset.or(config.rep_offset).unwrap_or(0),
    );

    let data_dir = overrides.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let dataset_labels = if !overrides.datasets.is_empty() {
        overrides.datasets.clone()
    } else if let Some(labels) = config.datasets {
        labels
    } else if let Some(catalog) = &config.catalog {
        catalog.sources.keys().cloned().collect()
    } else if overrides.debug || overrides.data_dir.is_none() {
        vec![ARTIFICIAL_LABEL.to_string()]
    } else {
        discover_datasets(&data_dir)?
    };
    if dataset_labels.is_empty() {
        return Err(WluError::Config(
            ErrorInfo::new("datasets_empty", "no datasets selected")
                .with_context("data_dir", data_dir.display().to_string())
                .with_hint("pass --datasets or put <label>.csv files into --data-dir"),
        ));
    }
    let catalog = match config.catalog {
        Some(catalog) => catalog,
        None => DatasetCatalog::from_dir(&data_dir, &dataset_labels),
    };

    let model_labels = if overrides.models.is_empty() {
        config.models.unwrap_or_default()
    } else {
        overrides.models.clone()
    };
    let experiment_types = if !overrides.experiment_types.is_empty() {
        overrides.experiment_types.clone()
    } else {
        config
            .experiment_types
            .unwrap_or_else(|| vec![ExperimentType::Multitask])
    };
    let test_scope = if overrides.full_test {
        TestScope::Full
    } else {
        config.test_scope.unwrap_or_default()
    };

    let resolved = ResolvedRun {
        label: preset.label().to_string(),
        experiment: config.experiment.unwrap_or_else(|| DEFAULT_EXPERIMENT.to_string()),
        experiment_types,
        dataset_labels,
        catalog,
        model_labels,
        train_sizes,
        rnds,
        test_scope,
    };
    info!(
        preset = resolved.label,
        datasets = ?resolved.dataset_labels,
        train_sizes = ?resolved.train_sizes,
        rnds = ?resolved.rnds,
        "experiment resolved"
    );
    Ok(resolved)
}
