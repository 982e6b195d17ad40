//! Shared test fixtures and utilities for the marionette crates.
//!
//! Provides the canonical humanoid bind pose, prepared-skeleton builders,
//! and deterministic RNG setup.

pub mod rig;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use rig::{bind_transform, canonical_bind_pose, canonical_skeleton, prepared_skeleton};
pub use rng::{deterministic_vec, seeded_rng};
