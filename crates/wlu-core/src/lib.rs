#![deny(missing_docs)]
#![doc = "Core traits, data model and error taxonomy for workload uncertainty experiments."]

pub mod data;
pub mod errors;
pub mod model;
pub mod provenance;
pub mod rng;
pub mod table;

pub use data::{relative_to_rows, EnvData, Split, WorkloadDataset};
pub use errors::{ErrorInfo, WluError};
pub use model::{Evaluation, EvaluationContext, Model, PoolingCategory, Predictions};
pub use provenance::{RunProvenance, PROVENANCE_SCHEMA};
pub use rng::{derive_substream_seed, environment_seeds, RngHandle};
pub use table::Table;
