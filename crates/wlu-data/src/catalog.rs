//! Resolves dataset labels to loaded datasets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::WorkloadDataset;

use crate::artificial::ArtificialSpec;
use crate::loader::{load_csv, CsvLayout};

/// Label reserved for the generated dataset.
pub const ARTIFICIAL_LABEL: &str = "artificial";

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatasetSource {
    /// Long-format measurement file.
    Csv {
        path: PathBuf,
        #[serde(flatten)]
        layout: CsvLayout,
    },
    /// Generated workloads.
    Artificial(ArtificialSpec),
}

impl DatasetSource {
    /// Loads the dataset under the given label.
    pub fn load(&self, label: &str) -> Result<WorkloadDataset, WluError> {
        match self {
            DatasetSource::Csv { path, layout } => load_csv(label, path, layout),
            DatasetSource::Artificial(spec) => spec.generate(label),
        }
    }
}

/// Label to source mapping, ordered by label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DatasetCatalog {
    #[serde(default)]
    pub sources: BTreeMap<String, DatasetSource>,
}

impl DatasetCatalog {
    /// Catalog resolving each label to `<root>/<label>.csv`, except the
    /// artificial label which maps to the default generator.
    pub fn from_dir(root: &Path, labels: &[String]) -> Self {
        let sources = labels
            .iter()
            .map(|label| {
                let source = if label == ARTIFICIAL_LABEL {
                    DatasetSource::Artificial(ArtificialSpec::default())
                } else {
                    DatasetSource::Csv {
                        path: root.join(format!("{label}.csv")),
                        layout: CsvLayout::default(),
                    }
                };
                (label.clone(), source)
            })
            .collect();
        Self { sources }
    }

    /// Loads the requested labels; unknown labels are a configuration error.
    pub fn load(&self, labels: &[String]) -> Result<BTreeMap<String, WorkloadDataset>, WluError> {
        let mut datasets = BTreeMap::new();
        for label in labels {
            let source = self.sources.get(label).ok_or_else(|| {
                WluError::Config(
                    ErrorInfo::new("dataset_unknown", "no source registered for dataset")
                        .with_context("dataset", label.clone())
                        .with_hint(format!(
                            "known datasets: {}",
                            self.sources.keys().cloned().collect::<Vec<_>>().join(", ")
                        )),
                )
            })?;
            let dataset = source.load(label)?;
            info!(dataset = %label, envs = dataset.n_envs(), "dataset ready");
            datasets.insert(label.clone(), dataset);
        }
        Ok(datasets)
    }
}
