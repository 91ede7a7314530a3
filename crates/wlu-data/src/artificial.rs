//! Synthetic workloads with known per-environment influences.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::{derive_substream_seed, EnvData, WorkloadDataset};

/// Parameters of a generated dataset.
///
/// Options are binary. Each environment's influences are a shared base
/// vector plus an environment specific deviation of scale `env_spread`, so
/// pooling strategies have something to disagree about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtificialSpec {
    #[serde(default = "ArtificialSpec::default_envs")]
    pub n_envs: usize,
    #[serde(default = "ArtificialSpec::default_options")]
    pub n_options: usize,
    #[serde(default = "ArtificialSpec::default_rows")]
    pub n_rows: usize,
    #[serde(default = "ArtificialSpec::default_noise")]
    pub noise_std: f64,
    #[serde(default = "ArtificialSpec::default_spread")]
    pub env_spread: f64,
    #[serde(default)]
    pub seed: u64,
}

impl ArtificialSpec {
    fn default_envs() -> usize {
        4
    }

    fn default_options() -> usize {
        8
    }

    fn default_rows() -> usize {
        64
    }

    fn default_noise() -> f64 {
        1.0
    }

    fn default_spread() -> f64 {
        0.5
    }

    /// Generates the dataset; identical specs yield identical tables.
    pub fn generate(&self, label: &str) -> Result<WorkloadDataset, WluError> {
        if self.n_envs == 0 || self.n_options == 0 || self.n_rows == 0 {
            return Err(WluError::Config(
                ErrorInfo::new("artificial_shape", "artificial dataset needs envs, options and rows")
                    .with_context("n_envs", self.n_envs.to_string())
                    .with_context("n_options", self.n_options.to_string())
                    .with_context("n_rows", self.n_rows.to_string()),
            ));
        }
        let noise = Normal::new(0.0, self.noise_std).map_err(|err| {
            WluError::Config(
                ErrorInfo::new("artificial_noise", err.to_string())
                    .with_context("noise_std", self.noise_std.to_string()),
            )
        })?;
        let spread = Normal::new(0.0, self.env_spread).map_err(|err| {
            WluError::Config(
                ErrorInfo::new("artificial_spread", err.to_string())
                    .with_context("env_spread", self.env_spread.to_string()),
            )
        })?;

        let mut base_rng = StdRng::seed_from_u64(derive_substream_seed(self.seed, u64::MAX));
        let base: Vec<f64> = (0..self.n_options)
            .map(|_| base_rng.gen_range(-5.0..5.0))
            .collect();
        let feature_names: Vec<String> =
            (0..self.n_options).map(|idx| format!("option_{idx}")).collect();

        let envs = (0..self.n_envs)
            .map(|env_id| {
                let mut rng = StdRng::seed_from_u64(derive_substream_seed(self.seed, env_id as u64));
                let intercept = 50.0 + 10.0 * env_id as f64;
                let influences: Vec<f64> = base
                    .iter()
                    .map(|beta| beta + spread.sample(&mut rng))
                    .collect();
                let mut x = Vec::with_capacity(self.n_rows);
                let mut y = Vec::with_capacity(self.n_rows);
                for _ in 0..self.n_rows {
                    let row: Vec<f64> = (0..self.n_options)
                        .map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 })
                        .collect();
                    let signal: f64 = row.iter().zip(&influences).map(|(a, b)| a * b).sum();
                    y.push(intercept + signal + noise.sample(&mut rng));
                    x.push(row);
                }
                EnvData::new(env_id, format!("env_{env_id}"), feature_names.clone(), x, y)
            })
            .collect::<Result<Vec<_>, _>>()?;
        WorkloadDataset::new(label, envs)
    }
}

impl Default for ArtificialSpec {
    fn default() -> Self {
        Self {
            n_envs: Self::default_envs(),
            n_options: Self::default_options(),
            n_rows: Self::default_rows(),
            noise_std: Self::default_noise(),
            env_spread: Self::default_spread(),
            seed: 0,
        }
    }
}
