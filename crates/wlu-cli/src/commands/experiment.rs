use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tracing::{error, info};
use wlu_exp::{summarize, Executor, ExperimentType, Replication};
use wlu_models::select_models;
use wlu_track::{connect, Pacing, TrackingSession};

use super::write_summary;
use crate::config::{resolve, ExperimentConfig, Overrides, Preset};

#[derive(Args, Debug, Clone)]
pub struct ExperimentArgs {
    /// Worker threads; tasks run one after another when omitted or 0.
    #[arg(long)]
    pub jobs: Option<usize>,
    /// Number of repetitions, replacing the preset default.
    #[arg(long)]
    pub reps: Option<usize>,
    /// First repetition seed when `--reps` is given.
    #[arg(long = "rep-offset")]
    pub rep_offset: Option<u64>,
    /// Disables the train size sweep and uses this size only.
    #[arg(long = "training-set-size")]
    pub training_set_size: Option<f64>,
    /// Directory holding `<dataset>.csv` measurement files.
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,
    /// Directory runs, params and artifacts are tracked in.
    #[arg(long = "tracking-dir", default_value = "wlu-runs")]
    pub tracking_dir: PathBuf,
    /// Comma separated dataset labels.
    #[arg(long, value_delimiter = ',')]
    pub datasets: Vec<String>,
    /// Comma separated model labels; all builtin models when empty.
    #[arg(long, value_delimiter = ',')]
    pub models: Vec<String>,
    /// Comma separated experiment types (multitask, holdout).
    #[arg(long = "experiment-types", value_delimiter = ',')]
    pub experiment_types: Vec<ExperimentType>,
    /// Score multitask runs on every row instead of the shared test split.
    #[arg(long = "full-test")]
    pub full_test: bool,
    /// YAML experiment config.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Destination of the summary CSV.
    #[arg(long = "summary-out", default_value = "summary.csv")]
    pub summary_out: PathBuf,
    /// Skip the delay inserted before tracking calls.
    #[arg(long = "no-pacing")]
    pub no_pacing: bool,
}

impl ExperimentArgs {
    fn overrides(&self, debug: bool) -> Overrides {
        Overrides {
            reps: self.reps,
            rep_offset: self.rep_offset,
            training_set_size: self.training_set_size,
            data_dir: self.data_dir.clone(),
            datasets: self.datasets.clone(),
            models: self.models.clone(),
            experiment_types: self.experiment_types.clone(),
            full_test: self.full_test,
            debug,
        }
    }
}

pub fn run(preset: Preset, args: &ExperimentArgs, debug: bool) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    let resolved = resolve(preset, config, &args.overrides(debug))?;
    let datasets = resolved.catalog.load(&resolved.dataset_labels)?;
    let models = select_models(&resolved.model_labels)?;
    info!(models = ?models.keys().collect::<Vec<_>>(), "models selected");

    let backend = connect(&args.tracking_dir.to_string_lossy())?;
    let mut session = TrackingSession::new(backend, resolved.experiment.as_str())?;
    if args.no_pacing {
        session = session.with_pacing(Pacing::none());
    }

    let replication = Replication::new(
        resolved.experiment_types,
        models,
        datasets,
        resolved.train_sizes,
        resolved.rnds,
        &resolved.label,
    )
    .with_test_scope(resolved.test_scope);
    let executor = Executor::new(args.jobs);

    match replication.run(&session, &executor) {
        Ok(report) => {
            println!("parent run: {}", report.parent_run_id);
            write_summary(&args.summary_out, &summarize(&report.outcomes)?)
        }
        Err(failure) => {
            match &failure.parent_run_id {
                Some(parent) => println!("parent run: {parent}"),
                None => println!("parent run: not opened"),
            }
            error!(completed = failure.completed.len(), error = %failure.error, "replication failed");
            Err(failure.into())
        }
    }
}
