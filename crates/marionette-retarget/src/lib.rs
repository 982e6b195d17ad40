//! Tracked-pose ingestion for the marionette solvers.
//!
//! Wire frames from an external pose tracker come in through [`frame`],
//! run through the pose-graph optimizer, and land on the IK solver's
//! effectors via [`map`]. [`eyes`] carries the production eye rig for
//! tracked faces.

pub mod eyes;
pub mod frame;
pub mod map;

pub use map::Retargeter;

pub mod prelude {
    pub use crate::eyes::TrackedEyes;
    pub use crate::frame::{FaceAngles, Keypoint, KeypointId, PersonSample, PoseFrame};
    pub use crate::map::{RetargetConfig, Retargeter};
}
