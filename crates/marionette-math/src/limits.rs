//! Square-cone direction limiters.
//!
//! A unit direction is clamped so its off-axis components stay inside
//! independent per-quadrant sine bounds, then the primary component is
//! recomputed to restore unit length. Bounds are sines of the limit angles,
//! precomputed once per settings change.

use nalgebra::Vector3;

use crate::vector::VECTOR_EPSILON;

/// Clamp `dir` into the cone around +Y.
///
/// `sin_x_neg`/`sin_x_pos` bound the X component (e.g. roll-left/right),
/// `sin_z_neg`/`sin_z_pos` the Z component (e.g. pitch-back/forward).
/// Returns whether clamping occurred. A non-positive Y (target outside the
/// hemisphere) is folded back in by recomputing Y from the clamped
/// off-axis components.
pub fn limit_square_xz(
    dir: &mut Vector3<f32>,
    sin_x_neg: f32,
    sin_x_pos: f32,
    sin_z_neg: f32,
    sin_z_pos: f32,
) -> bool {
    let (mut x, limited_x) = clamp_component(dir.x, sin_x_neg, sin_x_pos);
    let (mut z, limited_z) = clamp_component(dir.z, sin_z_neg, sin_z_pos);
    let behind = dir.y <= 0.0;
    if !(limited_x || limited_z || behind) {
        return false;
    }
    dir.y = restore_primary(&mut x, &mut z);
    dir.x = x;
    dir.z = z;
    true
}

/// Clamp `dir` into the cone around +Z.
///
/// `sin_x_neg`/`sin_x_pos` bound the X component (yaw), `sin_y_neg`/
/// `sin_y_pos` the Y component (pitch). Returns whether clamping occurred.
pub fn limit_square_xy(
    dir: &mut Vector3<f32>,
    sin_x_neg: f32,
    sin_x_pos: f32,
    sin_y_neg: f32,
    sin_y_pos: f32,
) -> bool {
    let (mut x, limited_x) = clamp_component(dir.x, sin_x_neg, sin_x_pos);
    let (mut y, limited_y) = clamp_component(dir.y, sin_y_neg, sin_y_pos);
    let behind = dir.z <= 0.0;
    if !(limited_x || limited_y || behind) {
        return false;
    }
    dir.z = restore_primary(&mut x, &mut y);
    dir.x = x;
    dir.y = y;
    true
}

/// Trace-cone gate for aiming directions around +Z.
///
/// Returns `true` when `dir` already lies inside the half-aperture, leaving
/// it untouched so a finer limiter can run. Outside the cone the direction
/// collapses onto the cone edge (bearing preserved, +Z when the bearing is
/// degenerate) and `false` is returned.
pub fn clamp_to_trace_cone(dir: &mut Vector3<f32>, cos_half: f32, sin_half: f32) -> bool {
    if dir.z >= cos_half {
        return true;
    }
    let bearing_sq = dir.x * dir.x + dir.y * dir.y;
    if bearing_sq > VECTOR_EPSILON {
        let scale = sin_half / bearing_sq.sqrt();
        dir.x *= scale;
        dir.y *= scale;
        dir.z = cos_half;
    } else {
        *dir = Vector3::z();
    }
    false
}

fn clamp_component(value: f32, sin_neg: f32, sin_pos: f32) -> (f32, bool) {
    if value < -sin_neg {
        (-sin_neg, true)
    } else if value > sin_pos {
        (sin_pos, true)
    } else {
        (value, false)
    }
}

/// Primary component that restores unit length for clamped off-axis
/// components; scales them onto the unit circle when they already exceed it.
fn restore_primary(a: &mut f32, b: &mut f32) -> f32 {
    let off_sq = *a * *a + *b * *b;
    if off_sq >= 1.0 {
        let inv = 1.0 / off_sq.sqrt();
        *a *= inv;
        *b *= inv;
        0.0
    } else {
        (1.0 - off_sq).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sin_deg(deg: f32) -> f32 {
        deg.to_radians().sin()
    }

    // ---- limit_square_xz ----

    #[test]
    fn inside_cone_is_untouched() {
        let mut dir = Vector3::new(0.1, 0.99, 0.1).normalize();
        let before = dir;
        let limited = limit_square_xz(&mut dir, sin_deg(30.0), sin_deg(30.0), sin_deg(30.0), sin_deg(30.0));
        assert!(!limited);
        assert_eq!(dir, before);
    }

    #[test]
    fn x_overflow_is_clamped_to_bound() {
        let s = sin_deg(20.0);
        let mut dir = Vector3::new(0.8, 0.6, 0.0);
        let limited = limit_square_xz(&mut dir, s, s, s, s);
        assert!(limited);
        assert_relative_eq!(dir.x, s, epsilon = 1e-6);
        assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-6);
        assert!(dir.y > 0.0);
    }

    #[test]
    fn asymmetric_bounds_apply_per_quadrant() {
        let up = sin_deg(10.0);
        let down = sin_deg(45.0);
        // Leaning to -Z beyond the narrow bound but inside the wide one.
        let mut dir = Vector3::new(0.0, 0.8, -0.6);
        let limited = limit_square_xz(&mut dir, up, up, down, down);
        assert!(!limited || dir.z >= -down - 1e-6);

        let mut dir2 = Vector3::new(0.0, 0.8, 0.6);
        let limited2 = limit_square_xz(&mut dir2, up, up, down, up);
        assert!(limited2);
        assert_relative_eq!(dir2.z, up, epsilon = 1e-6);
    }

    #[test]
    fn angular_deviation_never_exceeds_limit() {
        // Sweep directions; the result must stay within the cone and unit
        // length for every input.
        let theta = 25.0_f32;
        let s = sin_deg(theta);
        let mut k = 0;
        for ix in -4..=4 {
            for iy in -2..=4 {
                for iz in -4..=4 {
                    let v = Vector3::new(ix as f32, iy as f32 * 0.5 + 0.1, iz as f32);
                    if v.norm_squared() < 1e-6 {
                        continue;
                    }
                    let mut dir = v.normalize();
                    limit_square_xz(&mut dir, s, s, s, s);
                    assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-5);
                    assert!(dir.x.abs() <= s + 1e-5);
                    assert!(dir.z.abs() <= s + 1e-5);
                    assert!(dir.y >= 0.0);
                    k += 1;
                }
            }
        }
        assert!(k > 0);
    }

    #[test]
    fn behind_hemisphere_is_folded_back() {
        let s = sin_deg(30.0);
        let mut dir = Vector3::new(0.3, -0.9, 0.3).normalize();
        let limited = limit_square_xz(&mut dir, s, s, s, s);
        assert!(limited);
        assert!(dir.y >= 0.0);
        assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-5);
    }

    // ---- limit_square_xy ----

    #[test]
    fn xy_limiter_restores_unit_z() {
        let s = sin_deg(40.0);
        let mut dir = Vector3::new(0.9, 0.1, 0.2);
        let limited = limit_square_xy(&mut dir, s, s, s, s);
        assert!(limited);
        assert_relative_eq!(dir.x, s, epsilon = 1e-6);
        assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-6);
        assert!(dir.z > 0.0);
    }

    #[test]
    fn xy_limiter_passes_centered_direction() {
        let mut dir = Vector3::new(0.05, -0.05, 0.99).normalize();
        let before = dir;
        let limited = limit_square_xy(&mut dir, sin_deg(15.0), sin_deg(15.0), sin_deg(15.0), sin_deg(15.0));
        assert!(!limited);
        assert_eq!(dir, before);
    }

    #[test]
    fn oversized_off_axis_lands_on_unit_circle_edge() {
        // Both components clamped to large sines whose squares exceed 1.
        let s = sin_deg(80.0);
        let mut dir = Vector3::new(1.0, 1.0, -0.2).normalize();
        limit_square_xy(&mut dir, s, s, s, s);
        assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-5);
        assert!(dir.z >= 0.0);
    }

    // ---- clamp_to_trace_cone ----

    #[test]
    fn trace_cone_passes_inside_directions() {
        let half = 55.0_f32.to_radians();
        let mut dir = Vector3::new(0.2, 0.1, 0.97).normalize();
        let before = dir;
        assert!(clamp_to_trace_cone(&mut dir, half.cos(), half.sin()));
        assert_eq!(dir, before);
    }

    #[test]
    fn trace_cone_collapses_outside_directions_to_edge() {
        let half = 55.0_f32.to_radians();
        let mut dir = Vector3::new(0.8, 0.0, -0.6);
        assert!(!clamp_to_trace_cone(&mut dir, half.cos(), half.sin()));
        assert_relative_eq!(dir.z, half.cos(), epsilon = 1e-6);
        assert_relative_eq!(dir.x, half.sin(), epsilon = 1e-6);
        assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn trace_cone_degenerate_bearing_snaps_forward() {
        let half = 55.0_f32.to_radians();
        let mut dir = Vector3::new(0.0, 0.0, -1.0);
        assert!(!clamp_to_trace_cone(&mut dir, half.cos(), half.sin()));
        assert_eq!(dir, Vector3::z());
    }
}
