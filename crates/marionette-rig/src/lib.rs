//! Skeletal rig model for the marionette solvers.
//!
//! The rig is a fixed-size arena: every supported joint and IK target has a
//! stable [`BoneLocation`] / [`EffectorLocation`] slot whether or not the
//! bound character has that bone. [`Skeleton::prepare`] captures a bind
//! snapshot, resolves live parents past absent bones, and derives the
//! per-bone axis frames the solvers work in; per-frame world state flows
//! through explicit read-once/write-once caches and is flushed back with
//! [`Skeleton::write_back`].

pub mod bone;
pub mod constants;
pub mod effector;
pub mod location;
pub mod skeleton;
pub mod transform;

pub use location::{BoneLocation, EffectorLocation, FingerKind, Side};
pub use skeleton::Skeleton;
pub use transform::SkeletonPose;

pub mod prelude {
    pub use crate::bone::{Bone, LocalAxisFrom, axis_preset};
    pub use crate::constants::{BodyAngles, CosSin, HeadAngles, LimbAngles, ShoulderAxis, SolveConstants};
    pub use crate::effector::{EYES_DEFAULT_DISTANCE, Effector};
    pub use crate::location::{BoneLocation, EffectorLocation, FINGER_JOINTS, FingerKind, Side};
    pub use crate::skeleton::Skeleton;
    pub use crate::transform::{CacheState, FrameCache, SkeletonPose};
}
