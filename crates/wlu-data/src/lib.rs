//! Dataset providers turning measurement files into workload datasets.

mod artificial;
mod catalog;
mod loader;

pub use artificial::ArtificialSpec;
pub use catalog::{DatasetCatalog, DatasetSource, ARTIFICIAL_LABEL};
pub use loader::{load_csv, CsvLayout};
