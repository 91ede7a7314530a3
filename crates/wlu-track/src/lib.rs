//! Run tracker bridge: one parent run per replication, one nested child run
//! per task, addressed by explicit run ids through a [`TrackingSession`].

mod backend;
mod file;
mod memory;
mod pacing;
mod records;
mod session;

pub use backend::{connect, Metrics, Params, TrackingBackend};
pub use file::FileTracker;
pub use memory::{MemoryTracker, RunSnapshot, TrackingEvent};
pub use pacing::Pacing;
pub use records::{ExperimentRecord, RunRecord, RunStatus};
pub use session::{RunGuard, TrackingSession};
