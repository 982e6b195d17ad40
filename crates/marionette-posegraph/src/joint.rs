//! Tracked-joint identifiers and per-joint samples.
//!
//! The fifteen core joints follow the external pose source's point layout,
//! so `index()` doubles as the wire index for the first fifteen keypoints.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One of the fifteen core joints the optimizer relaxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedJoint {
    Head,
    UpperChest,
    RightShoulder,
    RightLowerArm,
    RightHand,
    LeftShoulder,
    LeftLowerArm,
    LeftHand,
    Hips,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
}

impl TrackedJoint {
    pub const COUNT: usize = 15;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Head,
        Self::UpperChest,
        Self::RightShoulder,
        Self::RightLowerArm,
        Self::RightHand,
        Self::LeftShoulder,
        Self::LeftLowerArm,
        Self::LeftHand,
        Self::Hips,
        Self::RightUpperLeg,
        Self::RightLowerLeg,
        Self::RightFoot,
        Self::LeftUpperLeg,
        Self::LeftLowerLeg,
        Self::LeftFoot,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Head => "Head",
            Self::UpperChest => "UpperChest",
            Self::RightShoulder => "RightShoulder",
            Self::RightLowerArm => "RightLowerArm",
            Self::RightHand => "RightHand",
            Self::LeftShoulder => "LeftShoulder",
            Self::LeftLowerArm => "LeftLowerArm",
            Self::LeftHand => "LeftHand",
            Self::Hips => "Hips",
            Self::RightUpperLeg => "RightUpperLeg",
            Self::RightLowerLeg => "RightLowerLeg",
            Self::RightFoot => "RightFoot",
            Self::LeftUpperLeg => "LeftUpperLeg",
            Self::LeftLowerLeg => "LeftLowerLeg",
            Self::LeftFoot => "LeftFoot",
        }
    }

    /// Head, chest, and arm joints; the pelvis and legs count as lower body.
    #[must_use]
    pub const fn is_upper_body(self) -> bool {
        (self as usize) < Self::Hips as usize
    }
}

/// One joint observation from the pose source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointSample {
    pub position: Vector3<f32>,
    /// In 0..=1; zero means the sample position is meaningless.
    pub confidence: f32,
}

impl JointSample {
    #[must_use]
    pub const fn new(position: Vector3<f32>, confidence: f32) -> Self {
        Self {
            position,
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
