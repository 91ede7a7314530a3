use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tracing::info;
use wlu_exp::summarize_parent;
use wlu_track::FileTracker;

use super::write_summary;

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Tracking directory the replication logged into.
    #[arg(long = "tracking-dir", default_value = "wlu-runs")]
    pub tracking_dir: PathBuf,
    /// Parent run id printed by the experiment command.
    #[arg(long = "parent-run")]
    pub parent_run: String,
    /// Destination of the summary CSV.
    #[arg(long, default_value = "summary.csv")]
    pub out: PathBuf,
}

pub fn run(args: &SummarizeArgs) -> Result<(), Box<dyn Error>> {
    let tracker = FileTracker::open(&args.tracking_dir)?;
    let summary = summarize_parent(&tracker, &args.parent_run)?;
    info!(parent_run_id = %args.parent_run, groups = summary.len(), "summary rebuilt");
    write_summary(&args.out, &summary)
}
