//! Experiment orchestration: deterministic task planning, sequential or
//! pooled execution under a parent tracking run, and result assembly.

mod assembler;
mod executor;
mod hash;
mod planner;
mod replication;
mod serde;
mod summary;
mod task;

pub use assembler::{
    assemble, mean_scores, TaskOutcome, TempArtifact, FEATURE_NAMES_ARTIFACT, METADATA_ARTIFACT,
    SCORES_ARTIFACT,
};
pub use executor::{
    execute_task, CancellationToken, ExecutionFailure, ExecutionReport, Executor, Progress,
};
pub use hash::stable_hash_string;
pub use planner::{plan, plan_digest, plan_with_scope, TaskFamilies, TestScope};
pub use replication::{date_time_uuid, Replication};
pub use summary::{summarize, summarize_parent, summarize_tables, SUMMARY_SCORES};
pub use task::{format_rel_size, ExperimentType, Task};

pub use crate::serde::{from_yaml_slice, to_canonical_json_bytes, to_canonical_value};
