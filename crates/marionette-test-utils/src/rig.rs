//! Canonical humanoid fixtures shared by the solver test suites.
//!
//! The character stands upright at the origin facing +Z with the left side
//! at negative X. Arm segments are sized so the left arm doubles as the
//! textbook two-bone scenario: shoulder roots 0.4 apart, upper arm 0.3,
//! lower arm 0.25. Spine3 and Spine4 are deliberately absent so live-parent
//! resolution always has something to skip.

use marionette_core::config::SolverSettings;
use marionette_rig::prelude::*;
use nalgebra::{Isometry3, UnitQuaternion, Vector3};

/// Identity-rotation bind transform at the given position.
pub fn bind_transform(x: f32, y: f32, z: f32) -> Isometry3<f32> {
    Isometry3::from_parts(Vector3::new(x, y, z).into(), UnitQuaternion::identity())
}

/// Forward fan offset of each finger chain from the wrist line.
fn finger_fan(finger: FingerKind) -> f32 {
    match finger {
        FingerKind::Thumb => 0.04,
        FingerKind::Index => 0.02,
        FingerKind::Middle => 0.0,
        FingerKind::Ring => -0.02,
        FingerKind::Little => -0.04,
    }
}

/// Full canonical bind pose: every supported bone present except Spine3 and
/// Spine4.
pub fn canonical_bind_pose() -> SkeletonPose {
    let mut pose = SkeletonPose::new();
    pose.set(BoneLocation::Hips, bind_transform(0.0, 0.98, 0.0));
    pose.set(BoneLocation::Spine, bind_transform(0.0, 1.08, 0.0));
    pose.set(BoneLocation::Spine2, bind_transform(0.0, 1.2, 0.0));
    pose.set(BoneLocation::Neck, bind_transform(0.0, 1.45, 0.0));
    pose.set(BoneLocation::Head, bind_transform(0.0, 1.55, 0.0));
    for side in Side::BOTH {
        let s = side.sign();
        pose.set(BoneLocation::Eye(side), bind_transform(s * 0.033, 1.62, 0.09));
        pose.set(BoneLocation::Shoulder(side), bind_transform(s * 0.06, 1.42, 0.0));
        pose.set(BoneLocation::Arm(side), bind_transform(s * 0.2, 1.4, 0.0));
        pose.set(BoneLocation::Elbow(side), bind_transform(s * 0.5, 1.4, 0.0));
        pose.set(BoneLocation::Wrist(side), bind_transform(s * 0.75, 1.4, 0.0));
        pose.set(BoneLocation::Leg(side), bind_transform(s * 0.09, 0.92, 0.0));
        pose.set(BoneLocation::Knee(side), bind_transform(s * 0.09, 0.5, 0.02));
        pose.set(BoneLocation::Foot(side), bind_transform(s * 0.09, 0.06, 0.0));
        for finger in FingerKind::ALL {
            let z = finger_fan(finger);
            for (joint, x) in [(0, 0.79), (1, 0.83), (2, 0.86)] {
                pose.set(
                    BoneLocation::HandFinger {
                        side,
                        finger,
                        joint,
                    },
                    bind_transform(s * x, 1.4, z),
                );
            }
        }
    }
    pose
}

/// Skeleton prepared against `bind` with visible eyes.
pub fn prepared_skeleton(bind: &SkeletonPose, settings: &SolverSettings) -> Skeleton {
    let mut skeleton = Skeleton::new();
    skeleton
        .prepare(bind, settings, false)
        .expect("fixture bind pose prepares");
    skeleton.post_prepare();
    skeleton
}

/// Canonical skeleton plus its bind pose, prepared with default settings.
pub fn canonical_skeleton() -> (Skeleton, SkeletonPose) {
    let bind = canonical_bind_pose();
    let skeleton = prepared_skeleton(&bind, &SolverSettings::default());
    (skeleton, bind)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pose_prepares() {
        let (skeleton, _) = canonical_skeleton();
        assert!(skeleton.bone(BoneLocation::Hips).present);
        assert!(!skeleton.bone(BoneLocation::Spine3).present);
        assert_eq!(
            skeleton.bone(BoneLocation::Neck).live_parent,
            Some(BoneLocation::Spine2)
        );
    }

    #[test]
    fn arm_segments_match_two_bone_scenario() {
        let (skeleton, _) = canonical_skeleton();
        let upper = skeleton
            .bone(BoneLocation::Elbow(Side::Left))
            .default_local_length
            .length();
        let lower = skeleton
            .bone(BoneLocation::Wrist(Side::Left))
            .default_local_length
            .length();
        assert!((upper - 0.3).abs() < 1e-6);
        assert!((lower - 0.25).abs() < 1e-6);
    }

    #[test]
    fn all_finger_joints_are_present() {
        let pose = canonical_bind_pose();
        for side in Side::BOTH {
            for finger in FingerKind::ALL {
                for joint in 0..FINGER_JOINTS {
                    assert!(pose.is_present(BoneLocation::HandFinger {
                        side,
                        finger,
                        joint,
                    }));
                }
            }
        }
    }
}
