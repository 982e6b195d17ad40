//! Deterministic RNG utilities for reproducible tests.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Generate a deterministic `Vec<f32>` of length `dim` from a seed.
pub fn deterministic_vec(dim: usize, seed: u64) -> Vec<f32> {
    use rand::Rng;
    let mut rng = seeded_rng(seed);
    (0..dim).map(|_| rng.r#gen::<f32>()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
