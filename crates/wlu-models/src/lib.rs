#![deny(missing_docs)]
#![doc = "Reference performance-prediction models for workload experiments."]

pub mod linalg;
mod partial;
mod pooling;
pub mod preprocess;
pub mod regressor;
mod registry;
pub mod scoring;

pub use partial::PartialPoolingModel;
pub use pooling::{CompletePoolingModel, NoPoolingModel};
pub use registry::{builtin_models, select_models};
pub use regressor::{Lasso, LeastSquares, MeanRegressor, Regressor};
pub use scoring::{score_predictions, ScoredEvaluation, SCORE_COLUMNS};
