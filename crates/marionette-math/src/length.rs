//! Distance values stored squared, with the square root taken on demand.

use nalgebra::Vector3;

/// A non-negative distance kept in squared form.
///
/// Segment lengths are compared far more often than they are read, so the
/// square root is deferred until [`SquaredLength::length`] is called.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct SquaredLength(f32);

impl SquaredLength {
    pub const ZERO: Self = Self(0.0);

    /// Squared distance between two points.
    pub fn between(a: &Vector3<f32>, b: &Vector3<f32>) -> Self {
        Self((b - a).norm_squared())
    }

    /// Squared magnitude of a vector.
    pub fn of(v: &Vector3<f32>) -> Self {
        Self(v.norm_squared())
    }

    pub const fn from_squared(sq: f32) -> Self {
        Self(sq)
    }

    pub const fn squared(self) -> f32 {
        self.0
    }

    pub fn length(self) -> f32 {
        self.0.sqrt()
    }

    pub fn is_zero(self) -> bool {
        self.0 <= f32::EPSILON
    }
}
