//! Deterministic seeded randomness.
//!
//! A single master seed is expanded into independent named streams via
//! BLAKE3, so the slippage draws and the price-walk draws never interleave:
//! adding orders to a run does not perturb the simulated price path, and
//! replay runs are bit-reproducible under a fixed seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Derives independent, reproducible RNG streams from one master seed.
#[derive(Debug, Clone)]
pub struct SeedTree {
    master_seed: u64,
}

impl SeedTree {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive the sub-seed for a named stream. Derivation is hash-based, so
    /// the result does not depend on which streams were derived before it.
    pub fn stream_seed(&self, label: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(label.as_bytes());
        let hash = hasher.finalize();
        u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap())
    }

    /// Create a seeded StdRng for a named stream.
    pub fn stream(&self, label: &str) -> StdRng {
        StdRng::seed_from_u64(self.stream_seed(label))
    }
}

/// Draw from the standard normal distribution via the Box–Muller transform.
pub fn standard_normal(rng: &mut impl Rng) -> f64 {
    // Open interval keeps ln(u1) finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
