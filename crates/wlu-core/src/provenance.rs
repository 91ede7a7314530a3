//! Provenance recorded on the parent run of a replication.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Layout version of the task metadata dict and score tables.
pub const PROVENANCE_SCHEMA: u32 = 1;

/// What is needed to tell two replications apart after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProvenance {
    /// Layout version, [`PROVENANCE_SCHEMA`] for new runs.
    pub schema: u32,
    /// Digest of the planning inputs.
    pub plan_digest: String,
    /// Repetition seeds driving every split.
    pub seeds: Vec<u64>,
    /// RFC 3339 start time.
    pub created_at: String,
    /// Crate name to version.
    #[serde(default)]
    pub crate_versions: BTreeMap<String, String>,
}

impl RunProvenance {
    /// Provenance under the current schema with no crate versions.
    pub fn new(plan_digest: String, seeds: Vec<u64>, created_at: String) -> Self {
        Self {
            schema: PROVENANCE_SCHEMA,
            plan_digest,
            seeds,
            created_at,
            crate_versions: BTreeMap::new(),
        }
    }

    /// Records the version of one crate.
    pub fn with_crate(mut self, name: &str, version: &str) -> Self {
        self.crate_versions.insert(name.to_string(), version.to_string());
        self
    }
}
