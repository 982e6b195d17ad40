//! Small vector helpers shared by the basis and limit code.

use nalgebra::Vector3;

/// Squared-norm threshold below which a vector counts as zero.
pub const VECTOR_EPSILON: f32 = 1.0e-7;

/// Normalize `v` in place.
///
/// Returns `false` and leaves `v` untouched when its norm is effectively
/// zero, so callers can fall back to a previous or default direction.
pub fn safe_normalize(v: &mut Vector3<f32>) -> bool {
    let sq = v.norm_squared();
    if sq <= VECTOR_EPSILON {
        return false;
    }
    *v /= sq.sqrt();
    true
}

/// Normalized copy of `v`, or `fallback` when `v` is effectively zero.
#[must_use]
pub fn normalized_or(v: Vector3<f32>, fallback: Vector3<f32>) -> Vector3<f32> {
    let mut out = v;
    if safe_normalize(&mut out) { out } else { fallback }
}

/// Linear blend of two directions, renormalized.
///
/// Returns `None` when the blend collapses to zero (exactly opposed inputs
/// at `t = 0.5`), so callers keep their previous direction.
#[must_use]
pub fn lerp_dir(from: &Vector3<f32>, to: &Vector3<f32>, t: f32) -> Option<Vector3<f32>> {
    let mut v = from.lerp(to, t);
    if safe_normalize(&mut v) { Some(v) } else { None }
}

/// Component of `v` perpendicular to the unit vector `axis`.
#[must_use]
pub fn project_onto_plane(v: &Vector3<f32>, axis: &Vector3<f32>) -> Vector3<f32> {
    v - axis * v.dot(axis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn safe_normalize_unit_result() {
        let mut v = Vector3::new(3.0, 4.0, 0.0);
        assert!(safe_normalize(&mut v));
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.x, 0.6, epsilon = 1e-6);
    }

    #[test]
    fn safe_normalize_rejects_zero() {
        let mut v = Vector3::new(0.0, 0.0, 0.0);
        assert!(!safe_normalize(&mut v));
        assert_eq!(v, Vector3::zeros());
    }

    #[test]
    fn normalized_or_falls_back() {
        let out = normalized_or(Vector3::zeros(), Vector3::y());
        assert_eq!(out, Vector3::y());
    }

    #[test]
    fn lerp_dir_midpoint_is_unit() {
        let a = Vector3::x();
        let b = Vector3::y();
        let mid = lerp_dir(&a, &b, 0.5).unwrap();
        assert_relative_eq!(mid.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn lerp_dir_opposed_midpoint_is_none() {
        let a = Vector3::x();
        let b = -Vector3::x();
        assert!(lerp_dir(&a, &b, 0.5).is_none());
    }

    #[test]
    fn plane_projection_is_perpendicular() {
        let axis = Vector3::new(1.0, 2.0, -0.5).normalize();
        let v = Vector3::new(0.3, -0.9, 0.6);
        let out = project_onto_plane(&v, &axis);
        assert_relative_eq!(out.dot(&axis), 0.0, epsilon = 1e-6);
        assert_relative_eq!((v - out).cross(&axis).norm(), 0.0, epsilon = 1e-6);
    }
}
