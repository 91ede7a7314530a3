//! Seeding policy: repetition ids are master seeds, every other stream is
//! derived from them.

use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use siphasher::sip::SipHasher13;

/// Exclusive upper bound for per-environment split seeds.
pub const ENV_SEED_BOUND: u32 = 1 << 30;

/// Generator seeded from a repetition id.
///
/// Environment split seeds and family shuffles both draw from a handle
/// seeded with the same repetition id, so a repetition reproduces its splits
/// and its task order.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Handle seeded with `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next split seed in `[0, ENV_SEED_BOUND)`.
    pub fn split_seed(&mut self) -> u32 {
        self.rng.gen_range(0..ENV_SEED_BOUND)
    }

    /// Shuffles `items` in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

/// One split seed per environment; the i-th seed always belongs to the i-th
/// environment whatever the environment count.
pub fn environment_seeds(repetition: u64, n_envs: usize) -> Vec<u32> {
    let mut rng = RngHandle::from_seed(repetition);
    (0..n_envs).map(|_| rng.split_seed()).collect()
}

/// SipHash-1-3 of `(master_seed, substream)` under zero keys.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}
