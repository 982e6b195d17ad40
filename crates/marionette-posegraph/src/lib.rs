//! Confidence-weighted pose-graph relaxation.
//!
//! The external pose source delivers fifteen tracked joints per person,
//! each with a confidence score. This crate calibrates pairwise distance
//! constraints from a bind pose once, then relaxes each frame's noisy
//! sample onto that skeleton with bounded Gauss-Seidel sweeps. Corrected
//! output carries fixed trusted confidences, since a relaxed joint is more
//! reliable than whatever score the source attached to it.

pub mod config;
pub mod joint;
pub mod optimizer;

pub use optimizer::PoseGraphOptimizer;

pub mod prelude {
    pub use crate::config::{ConstraintSpec, PoseGraphConfig, default_full_mesh};
    pub use crate::joint::{JointSample, TrackedJoint};
    pub use crate::optimizer::{PoseGraphOptimizer, SolveReport};
}
