//! Full-body IK solvers and the per-frame orchestrator.
//!
//! [`FullBodySolver`](solver::FullBodySolver) binds a prepared skeleton to
//! the sub-solvers and runs them in pipeline order each frame: torso, then
//! legs, arms, head, and fingers. Each sub-solver reads the live pose
//! through the rig's world caches and writes solved state back into them,
//! so later stages always see the upstream results.

pub mod body;
pub mod finger;
pub mod head;
pub mod limb;
pub mod rotation;
pub mod solver;

pub use solver::FullBodySolver;

pub mod prelude {
    pub use crate::body::BodySolver;
    pub use crate::finger::FingerSolver;
    pub use crate::head::{
        BuiltinEyes, EyeContext, EyeOffsets, EyeSolver, HeadSolveMode, HeadSolver,
    };
    pub use crate::limb::LimbSolver;
    pub use crate::rotation::{blend_rotation, twist_about};
    pub use crate::solver::FullBodySolver;
}
