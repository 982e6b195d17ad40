// Geometry primitives shared by the solver crates.

pub mod basis;
pub mod length;
pub mod limits;
pub mod vector;

pub mod prelude {
    pub use crate::basis::{
        BasisHint, basis_lock_x, basis_lock_y, basis_lock_z_from_x, basis_lock_z_from_y,
        basis_to_quat, compute_basis_from, quat_to_basis, reproject_point,
    };
    pub use crate::length::SquaredLength;
    pub use crate::limits::{clamp_to_trace_cone, limit_square_xy, limit_square_xz};
    pub use crate::vector::{
        VECTOR_EPSILON, lerp_dir, normalized_or, project_onto_plane, safe_normalize,
    };
}
