//! Orthonormal basis construction and quaternion conversion.
//!
//! Bases are plain `Matrix3<f32>` with columns X/Y/Z. Constructors return
//! `None` on degenerate input (near-zero or parallel directions) instead of
//! producing NaN; callers keep their previous or default basis.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use crate::vector::safe_normalize;

/// Which basis column a direction maps to, and with which sign.
///
/// `YMinus` means "this direction is the bone's local -Y", i.e. the basis
/// applied to (0,-1,0) reproduces the direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasisHint {
    XPlus,
    XMinus,
    YPlus,
    YMinus,
    ZPlus,
    ZMinus,
}

impl BasisHint {
    /// Column index and sign of the hinted axis.
    #[must_use]
    pub const fn column_and_sign(self) -> (usize, f32) {
        match self {
            Self::XPlus => (0, 1.0),
            Self::XMinus => (0, -1.0),
            Self::YPlus => (1, 1.0),
            Self::YMinus => (1, -1.0),
            Self::ZPlus => (2, 1.0),
            Self::ZMinus => (2, -1.0),
        }
    }
}

/// Build an orthonormal basis whose hinted column is parallel to `dir`.
///
/// The remaining columns are completed with minimal twist against
/// `reference` (the canonical root basis during rig preparation; pass
/// identity for a world-frame completion). Returns `None` for a near-zero
/// `dir` or when `dir` is parallel to the completion hint.
#[must_use]
pub fn compute_basis_from(
    reference: &Matrix3<f32>,
    dir: &Vector3<f32>,
    hint: BasisHint,
) -> Option<Matrix3<f32>> {
    let (_, sign) = hint.column_and_sign();
    let axis = dir * sign;
    let ref_x = Vector3::from(reference.column(0));
    let ref_y = Vector3::from(reference.column(1));
    match hint {
        BasisHint::XPlus | BasisHint::XMinus => basis_lock_x(&axis, &ref_y),
        BasisHint::YPlus | BasisHint::YMinus => basis_lock_y(&ref_x, &axis),
        BasisHint::ZPlus | BasisHint::ZMinus => basis_lock_z_from_x(&ref_x, &axis),
    }
}

/// Basis with Y locked to `y_dir` and X re-orthonormalized toward `x_hint`.
#[must_use]
pub fn basis_lock_y(x_hint: &Vector3<f32>, y_dir: &Vector3<f32>) -> Option<Matrix3<f32>> {
    let mut y = *y_dir;
    if !safe_normalize(&mut y) {
        return None;
    }
    let z = normalize_cross(x_hint, &y)?;
    let x = y.cross(&z);
    Some(Matrix3::from_columns(&[x, y, z]))
}

/// Basis with Z locked to `z_dir` and X re-orthonormalized toward `x_hint`.
#[must_use]
pub fn basis_lock_z_from_x(x_hint: &Vector3<f32>, z_dir: &Vector3<f32>) -> Option<Matrix3<f32>> {
    let mut z = *z_dir;
    if !safe_normalize(&mut z) {
        return None;
    }
    let y = normalize_cross(&z, x_hint)?;
    let x = y.cross(&z);
    Some(Matrix3::from_columns(&[x, y, z]))
}

/// Basis with Z locked to `z_dir` and Y re-orthonormalized toward `y_hint`.
#[must_use]
pub fn basis_lock_z_from_y(y_hint: &Vector3<f32>, z_dir: &Vector3<f32>) -> Option<Matrix3<f32>> {
    let mut z = *z_dir;
    if !safe_normalize(&mut z) {
        return None;
    }
    let x = normalize_cross(y_hint, &z)?;
    let y = z.cross(&x);
    Some(Matrix3::from_columns(&[x, y, z]))
}

/// Basis from an exact X with Y re-orthonormalized toward `y_hint`.
#[must_use]
pub fn basis_lock_x(x_dir: &Vector3<f32>, y_hint: &Vector3<f32>) -> Option<Matrix3<f32>> {
    let mut x = *x_dir;
    if !safe_normalize(&mut x) {
        return None;
    }
    let z = normalize_cross(&x, y_hint)?;
    let y = z.cross(&x);
    Some(Matrix3::from_columns(&[x, y, z]))
}

/// Convert an orthonormal basis to a unit quaternion.
#[must_use]
pub fn basis_to_quat(basis: &Matrix3<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*basis))
}

/// Convert a unit quaternion to its basis matrix.
#[must_use]
pub fn quat_to_basis(quat: &UnitQuaternion<f32>) -> Matrix3<f32> {
    quat.to_rotation_matrix().into_inner()
}

/// `basis * (point - sub) + add`.
///
/// Re-derives a child's world position after its parent's rotation changed:
/// `sub` is the parent's default position, `add` the parent's new world
/// position, `basis` the parent's rotation delta.
#[must_use]
pub fn reproject_point(
    basis: &Matrix3<f32>,
    point: &Vector3<f32>,
    sub: &Vector3<f32>,
    add: &Vector3<f32>,
) -> Vector3<f32> {
    basis * (point - sub) + add
}

fn normalize_cross(a: &Vector3<f32>, b: &Vector3<f32>) -> Option<Vector3<f32>> {
    let mut c = a.cross(b);
    if safe_normalize(&mut c) { Some(c) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_orthonormal(m: &Matrix3<f32>) {
        let x = m.column(0);
        let y = m.column(1);
        let z = m.column(2);
        assert_relative_eq!(x.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(y.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(z.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(x.dot(&y), 0.0, epsilon = 1e-5);
        assert_relative_eq!(y.dot(&z), 0.0, epsilon = 1e-5);
        assert_relative_eq!(z.dot(&x), 0.0, epsilon = 1e-5);
        // Right-handed.
        let cross = Vector3::from(x).cross(&Vector3::from(y));
        assert_relative_eq!(cross.dot(&z), 1.0, epsilon = 1e-5);
    }

    // ---- compute_basis_from ----

    #[test]
    fn hinted_column_is_parallel_to_direction() {
        let reference = Matrix3::identity();
        let dir = Vector3::new(0.3, -0.8, 0.52);
        for hint in [
            BasisHint::XPlus,
            BasisHint::XMinus,
            BasisHint::YPlus,
            BasisHint::YMinus,
            BasisHint::ZPlus,
            BasisHint::ZMinus,
        ] {
            let basis = compute_basis_from(&reference, &dir, hint).unwrap();
            assert_orthonormal(&basis);
            let (column, sign) = hint.column_and_sign();
            let col = Vector3::from(basis.column(column)) * sign;
            let unit = dir.normalize();
            assert_relative_eq!(col.dot(&unit), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn identity_like_directions() {
        let reference = Matrix3::identity();
        let basis = compute_basis_from(&reference, &Vector3::y(), BasisHint::YPlus).unwrap();
        assert_relative_eq!(basis, Matrix3::identity(), epsilon = 1e-6);
    }

    #[test]
    fn degenerate_direction_is_none() {
        let reference = Matrix3::identity();
        assert!(compute_basis_from(&reference, &Vector3::zeros(), BasisHint::YPlus).is_none());
        assert!(
            compute_basis_from(&reference, &Vector3::new(1e-6, 0.0, 0.0), BasisHint::XPlus)
                .is_none()
        );
        // Parallel to the completion hint.
        assert!(compute_basis_from(&reference, &Vector3::x(), BasisHint::YPlus).is_none());
    }

    #[test]
    fn rotated_reference_twists_completion() {
        // Same direction, reference rotated 90 degrees about Y: the hinted
        // column is unchanged but the completion follows the reference.
        let rot = quat_to_basis(&UnitQuaternion::from_axis_angle(
            &Vector3::y_axis(),
            std::f32::consts::FRAC_PI_2,
        ));
        let basis = compute_basis_from(&rot, &Vector3::y(), BasisHint::YPlus).unwrap();
        assert_orthonormal(&basis);
        assert_relative_eq!(Vector3::from(basis.column(1)), Vector3::y(), epsilon = 1e-5);
        assert_relative_eq!(
            Vector3::from(basis.column(0)).dot(&Vector3::from(rot.column(0))),
            1.0,
            epsilon = 1e-5
        );
    }

    // ---- locked-axis variants ----

    #[test]
    fn lock_y_keeps_y_exact() {
        let y = Vector3::new(0.1, 0.9, 0.2);
        let basis = basis_lock_y(&Vector3::x(), &y).unwrap();
        assert_orthonormal(&basis);
        assert_relative_eq!(
            Vector3::from(basis.column(1)).dot(&y.normalize()),
            1.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn lock_z_from_y_keeps_z_exact() {
        let z = Vector3::new(0.2, -0.1, 0.95);
        let basis = basis_lock_z_from_y(&Vector3::y(), &z).unwrap();
        assert_orthonormal(&basis);
        assert_relative_eq!(
            Vector3::from(basis.column(2)).dot(&z.normalize()),
            1.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn lock_with_parallel_hint_is_none() {
        let y = Vector3::y();
        assert!(basis_lock_y(&Vector3::y(), &y).is_none());
        assert!(basis_lock_z_from_x(&Vector3::z(), &Vector3::z()).is_none());
    }

    #[test]
    fn lock_x_keeps_x_exact() {
        let x = Vector3::new(-0.9, 0.1, 0.1);
        let basis = basis_lock_x(&x, &Vector3::y()).unwrap();
        assert_orthonormal(&basis);
        assert_relative_eq!(
            Vector3::from(basis.column(0)).dot(&x.normalize()),
            1.0,
            epsilon = 1e-5
        );
    }

    // ---- quaternion round trip ----

    #[test]
    fn quat_basis_round_trip() {
        let q = UnitQuaternion::from_euler_angles(0.3, -0.7, 1.2);
        let recovered = basis_to_quat(&quat_to_basis(&q));
        assert!(q.angle_to(&recovered) < 1e-5);
    }

    #[test]
    fn basis_quat_round_trip() {
        let basis = compute_basis_from(
            &Matrix3::identity(),
            &Vector3::new(0.5, 0.5, -0.2),
            BasisHint::ZPlus,
        )
        .unwrap();
        let recovered = quat_to_basis(&basis_to_quat(&basis));
        assert_relative_eq!(basis, recovered, epsilon = 1e-5);
    }

    // ---- reproject_point ----

    #[test]
    fn reproject_identity_translates() {
        let p = Vector3::new(1.0, 2.0, 3.0);
        let out = reproject_point(
            &Matrix3::identity(),
            &p,
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 5.0, 0.0),
        );
        assert_relative_eq!(out, Vector3::new(0.0, 7.0, 3.0), epsilon = 1e-6);
    }

    #[test]
    fn reproject_rotates_offset() {
        // 90 degrees about Y maps +Z offsets onto +X.
        let rot = quat_to_basis(&UnitQuaternion::from_axis_angle(
            &Vector3::y_axis(),
            std::f32::consts::FRAC_PI_2,
        ));
        let out = reproject_point(&rot, &Vector3::z(), &Vector3::zeros(), &Vector3::zeros());
        assert_relative_eq!(out, Vector3::x(), epsilon = 1e-5);
    }
}
