use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    experiment::{self, ExperimentArgs},
    summarize::{self, SummarizeArgs},
};
use config::Preset;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "wlu", about = "Workload uncertainty experiment runner")]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: tracing::Level,
    /// Quick single-repetition run with debug logging.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accuracy sweep over every train size, 30 repetitions by default.
    Rq1(ExperimentArgs),
    /// One repetition at train size 3.0 for model insights.
    Rq23(ExperimentArgs),
    /// Sweep configured through flags and an optional YAML config.
    CustomExperiment(ExperimentArgs),
    /// Rebuild the summary table of a finished replication.
    Summarize(SummarizeArgs),
}

fn init_tracing(level: tracing::Level, debug: bool) {
    let level = if debug { tracing::Level::DEBUG } else { level };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.debug);
    match cli.command {
        Command::Rq1(args) => experiment::run(Preset::Rq1, &args, cli.debug),
        Command::Rq23(args) => experiment::run(Preset::Rq23, &args, cli.debug),
        Command::CustomExperiment(args) => experiment::run(Preset::Custom, &args, cli.debug),
        Command::Summarize(args) => summarize::run(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use wlu_exp::ExperimentType;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn experiment_flags_parse() {
        let cli = Cli::try_parse_from([
            "wlu",
            "custom-experiment",
            "--jobs",
            "4",
            "--reps",
            "2",
            "--rep-offset",
            "10",
            "--datasets",
            "x264,lrzip",
            "--experiment-types",
            "multitask,holdout",
            "--debug",
        ])
        .expect("parse");
        assert!(cli.debug);
        let Command::CustomExperiment(args) = cli.command else {
            panic!("expected custom-experiment");
        };
        assert_eq!(args.jobs, Some(4));
        assert_eq!(args.reps, Some(2));
        assert_eq!(args.rep_offset, Some(10));
        assert_eq!(args.datasets, vec!["x264".to_string(), "lrzip".to_string()]);
        assert_eq!(
            args.experiment_types,
            vec![ExperimentType::Multitask, ExperimentType::Holdout]
        );
    }

    #[test]
    fn summarize_requires_a_parent_run() {
        assert!(Cli::try_parse_from(["wlu", "summarize"]).is_err());
        let cli = Cli::try_parse_from(["wlu", "summarize", "--parent-run", "abc"]).expect("parse");
        assert!(matches!(cli.command, Command::Summarize(args) if args.parent_run == "abc"));
    }

    #[test]
    fn rq23_runs_end_to_end_on_artificial_data() {
        let tracking = tempfile::tempdir().expect("tracking dir");
        let out = tracking.path().join("summary.csv");
        let cli = Cli::try_parse_from([
            "wlu",
            "rq23",
            "--models",
            "cpooling-dummy,no-pooling-lin",
            "--no-pacing",
            "--tracking-dir",
            tracking.path().to_str().expect("utf8 path"),
            "--summary-out",
            out.to_str().expect("utf8 path"),
        ])
        .expect("parse");
        let Command::Rq23(args) = cli.command else {
            panic!("expected rq23");
        };
        experiment::run(Preset::Rq23, &args, false).expect("replication");
        let written = std::fs::read_to_string(&out).expect("summary");
        assert!(written.starts_with("model,subject_system"));
        assert_eq!(written.lines().count(), 3);
    }
}
