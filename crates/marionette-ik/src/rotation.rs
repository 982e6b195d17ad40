//! Quaternion blending and decomposition helpers shared by the solvers.

use marionette_math::prelude::*;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Weights below this are treated as zero, weights above `1 -` this as one.
pub(crate) const WEIGHT_EPSILON: f32 = 1.0e-4;

/// Normalized lerp along the shortest arc.
///
/// The raw quaternion lerp takes the long way around when the inputs sit in
/// opposite hemispheres; flip `to` first so partial weights always blend
/// through the small rotation.
#[must_use]
pub fn blend_rotation(
    from: &UnitQuaternion<f32>,
    to: &UnitQuaternion<f32>,
    t: f32,
) -> UnitQuaternion<f32> {
    if t <= WEIGHT_EPSILON {
        return *from;
    }
    if t >= 1.0 - WEIGHT_EPSILON {
        return *to;
    }
    let mut target = *to;
    if from.coords.dot(&to.coords) < 0.0 {
        target = UnitQuaternion::new_unchecked(-to.into_inner());
    }
    from.nlerp(&target, t)
}

/// Twist component of `rotation` about `axis` (swing-twist decomposition).
///
/// `axis` need not be unit length; a degenerate axis or a pure 90-degree
/// swing yields the identity twist.
#[must_use]
pub fn twist_about(rotation: &UnitQuaternion<f32>, axis: &Vector3<f32>) -> UnitQuaternion<f32> {
    let mut a = *axis;
    if !safe_normalize(&mut a) {
        return UnitQuaternion::identity();
    }
    let q = rotation.quaternion();
    let proj = q.i * a.x + q.j * a.y + q.k * a.z;
    let twist = Quaternion::new(q.w, a.x * proj, a.y * proj, a.z * proj);
    if twist.norm_squared() <= VECTOR_EPSILON {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::from_quaternion(twist)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
