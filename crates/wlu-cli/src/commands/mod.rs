pub mod experiment;
pub mod summarize;

use std::error::Error;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use wlu_core::Table;

/// Writes the summary CSV to `path` and echoes it to stdout.
pub fn write_summary(path: &Path, summary: &Table) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    summary.write_csv(File::create(path)?)?;
    summary.write_csv(io::stdout().lock())?;
    println!("summary written to {}", path.display());
    Ok(())
}
