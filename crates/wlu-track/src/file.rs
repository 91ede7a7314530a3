//! Directory backed tracking endpoint.
//!
//! Layout: `<root>/<experiment>/experiment.json` and
//! `<root>/<experiment>/<run_id>/{run.json, params.json, metrics.json,
//! dicts/, artifacts/}`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use walkdir::WalkDir;
use wlu_core::errors::{ErrorInfo, WluError};

use crate::backend::{unknown_run, Metrics, Params, TrackingBackend};
use crate::records::{ExperimentRecord, RunRecord, RunStatus};

const RUN_FILE: &str = "run.json";
const PARAMS_FILE: &str = "params.json";
const METRICS_FILE: &str = "metrics.json";
const DICT_DIR: &str = "dicts";
const ARTIFACT_DIR: &str = "artifacts";

fn io_error(code: &str, path: &Path, err: impl ToString) -> WluError {
    WluError::Tracking(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), WluError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|err| io_error("tracking_encode", path, err))?;
    fs::write(path, bytes).map_err(|err| io_error("tracking_write", path, err))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, WluError> {
    let bytes = fs::read(path).map_err(|err| io_error("tracking_read", path, err))?;
    serde_json::from_slice(&bytes).map_err(|err| io_error("tracking_decode", path, err))
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, WluError> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

/// Backend persisting runs under a local directory.
#[derive(Debug)]
pub struct FileTracker {
    root: PathBuf,
    index: Mutex<BTreeMap<String, PathBuf>>,
}

impl FileTracker {
    /// Opens (creating if needed) the tracking directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, WluError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| io_error("tracking_root", &root, err))?;
        Ok(Self {
            root,
            index: Mutex::new(BTreeMap::new()),
        })
    }

    /// Tracking directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf, WluError> {
        if let Some(dir) = self.index.lock().get(run_id) {
            return Ok(dir.clone());
        }
        // Runs written by another process are found by scanning.
        let found = WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
            .find(|entry| entry.file_type().is_dir() && entry.file_name() == run_id)
            .map(|entry| entry.into_path())
            .ok_or_else(|| unknown_run(run_id))?;
        self.index.lock().insert(run_id.to_string(), found.clone());
        Ok(found)
    }

    fn update_run(&self, run_id: &str, f: impl FnOnce(&mut RunRecord)) -> Result<(), WluError> {
        let path = self.run_dir(run_id)?.join(RUN_FILE);
        let mut record: RunRecord = read_json(&path)?;
        f(&mut record);
        write_json(&path, &record)
    }

    /// Every run under the tracking directory, ordered by start time.
    pub fn all_runs(&self) -> Result<Vec<RunRecord>, WluError> {
        let mut runs = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() == RUN_FILE)
        {
            runs.push(read_json::<RunRecord>(entry.path())?);
        }
        runs.sort_by(|a, b| {
            a.started_at()
                .cmp(&b.started_at())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        Ok(runs)
    }

    /// Parameters logged on a run.
    pub fn params(&self, run_id: &str) -> Result<Params, WluError> {
        read_json_or_default(&self.run_dir(run_id)?.join(PARAMS_FILE))
    }

    /// Metrics logged on a run.
    pub fn metrics(&self, run_id: &str) -> Result<Metrics, WluError> {
        read_json_or_default(&self.run_dir(run_id)?.join(METRICS_FILE))
    }

    /// Paths of the files logged on a run, sorted.
    pub fn artifacts(&self, run_id: &str) -> Result<Vec<PathBuf>, WluError> {
        let dir = self.run_dir(run_id)?.join(ARTIFACT_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl TrackingBackend for FileTracker {
    fn endpoint(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn set_experiment(&self, name: &str) -> Result<ExperimentRecord, WluError> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).map_err(|err| io_error("tracking_experiment", &dir, err))?;
        let path = dir.join("experiment.json");
        if path.exists() {
            return read_json(&path);
        }
        let record = ExperimentRecord::new(name);
        write_json(&path, &record)?;
        Ok(record)
    }

    fn create_run(
        &self,
        experiment: &str,
        name: &str,
        parent: Option<&str>,
    ) -> Result<RunRecord, WluError> {
        if let Some(parent) = parent {
            self.run_dir(parent)?;
        }
        let run_id = Uuid::new_v4().simple().to_string();
        let dir = self.root.join(experiment).join(&run_id);
        fs::create_dir_all(&dir).map_err(|err| io_error("tracking_run_dir", &dir, err))?;
        let record = RunRecord::start(&run_id, experiment, name, parent.map(str::to_string));
        write_json(&dir.join(RUN_FILE), &record)?;
        self.index.lock().insert(run_id, dir);
        Ok(record)
    }

    fn resume_run(&self, run_id: &str) -> Result<RunRecord, WluError> {
        read_json(&self.run_dir(run_id)?.join(RUN_FILE))
    }

    fn release_run(&self, run_id: &str) -> Result<(), WluError> {
        self.run_dir(run_id).map(|_| ())
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<(), WluError> {
        self.update_run(run_id, |record| record.complete(status))
    }

    fn log_params(&self, run_id: &str, params: &Params) -> Result<(), WluError> {
        let path = self.run_dir(run_id)?.join(PARAMS_FILE);
        let mut stored: Params = read_json_or_default(&path)?;
        stored.extend(params.clone());
        write_json(&path, &stored)
    }

    fn log_metrics(&self, run_id: &str, metrics: &Metrics) -> Result<(), WluError> {
        let path = self.run_dir(run_id)?.join(METRICS_FILE);
        let mut stored: Metrics = read_json_or_default(&path)?;
        stored.extend(metrics.clone());
        write_json(&path, &stored)
    }

    fn log_dict(&self, run_id: &str, name: &str, payload: &Value) -> Result<(), WluError> {
        let dir = self.run_dir(run_id)?.join(DICT_DIR);
        fs::create_dir_all(&dir).map_err(|err| io_error("tracking_dict_dir", &dir, err))?;
        write_json(&dir.join(name), payload)
    }

    fn log_artifact(&self, run_id: &str, path: &Path) -> Result<(), WluError> {
        let dir = self.run_dir(run_id)?.join(ARTIFACT_DIR);
        fs::create_dir_all(&dir).map_err(|err| io_error("tracking_artifact_dir", &dir, err))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| io_error("tracking_artifact_name", path, "artifact path has no file name"))?;
        let target = dir.join(file_name);
        fs::copy(path, &target).map_err(|err| io_error("tracking_artifact_copy", path, err))?;
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord, WluError> {
        read_json(&self.run_dir(run_id)?.join(RUN_FILE))
    }

    fn child_runs(&self, parent: &str) -> Result<Vec<RunRecord>, WluError> {
        let experiment_dir = self
            .run_dir(parent)?
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| unknown_run(parent))?;
        let mut runs = Vec::new();
        for entry in WalkDir::new(&experiment_dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() == RUN_FILE)
        {
            let record: RunRecord = read_json(entry.path())?;
            if record.parent_run_id() == Some(parent) {
                runs.push(record);
            }
        }
        runs.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.run_id().cmp(b.run_id())));
        Ok(runs)
    }

    fn load_dict(&self, run_id: &str, name: &str) -> Result<Value, WluError> {
        read_json(&self.run_dir(run_id)?.join(DICT_DIR).join(name))
    }
}
