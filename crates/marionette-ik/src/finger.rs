//! Finger chain follow-through.
//!
//! Each finger solves on its own under the current hand rotation: the chain
//! swings toward the tip target bearing, then a single curl parameter bends
//! the joints about the hand's curl axis until the tip distance matches the
//! target. Chain reach shrinks monotonically as the parameter grows, so a
//! bounded bisection finds it.

use std::f32::consts::{FRAC_PI_2, PI};

use marionette_core::types::SolveMode;
use marionette_math::prelude::*;
use marionette_rig::prelude::*;
use nalgebra::{Unit, UnitQuaternion, Vector3};

use crate::rotation::{WEIGHT_EPSILON, blend_rotation};

/// Share of the curl parameter each joint takes, proximal to distal.
const CURL_FRACTIONS: [f32; FINGER_JOINTS] = [1.0, 1.0, 0.5];

/// Per-joint bend cap.
const MAX_JOINT_CURL: f32 = FRAC_PI_2;

const CURL_ITERATIONS: usize = 24;

/// Current hand frame shared by the five fingers of one side.
struct HandFrame {
    side: Side,
    delta: UnitQuaternion<f32>,
    default_position: Vector3<f32>,
    position: Vector3<f32>,
}

/// Solves all finger chains after the arms have placed the wrists.
#[derive(Default)]
pub struct FingerSolver;

impl FingerSolver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    pub fn solve(&self, skeleton: &mut Skeleton, pose: &SkeletonPose, mode: SolveMode) {
        for side in Side::BOTH {
            if !skeleton.bone(BoneLocation::Wrist(side)).present {
                continue;
            }
            let rotation = skeleton.world_rotation(BoneLocation::Wrist(side), pose);
            let position = skeleton.world_position(BoneLocation::Wrist(side), pose);
            let wrist = skeleton.bone(BoneLocation::Wrist(side));
            let hand = HandFrame {
                side,
                delta: rotation * wrist.default_rotation.inverse(),
                default_position: wrist.default_position,
                position,
            };
            for finger in FingerKind::ALL {
                solve_finger(skeleton, mode, &hand, finger);
            }
        }
    }
}

fn solve_finger(skeleton: &mut Skeleton, mode: SolveMode, hand: &HandFrame, finger: FingerKind) {
    let joint = |j: usize| BoneLocation::HandFinger {
        side: hand.side,
        finger,
        joint: j,
    };
    if !skeleton.bone(joint(0)).present || !skeleton.bone(joint(1)).present {
        return;
    }
    let effector_loc = EffectorLocation::FingerTip {
        side: hand.side,
        finger,
    };
    let weight = skeleton.effector(effector_loc).effective_position_weight();
    if weight <= WEIGHT_EPSILON {
        follow_hand(skeleton, hand, finger, mode);
        return;
    }

    // The chain is always two segments: proximal to middle and middle to
    // tip. The tip point is the terminal bone, or the extrapolated ride
    // position when the rig stops at two joints.
    let proximal = skeleton.bone(joint(0)).default_position;
    let middle = skeleton.bone(joint(1)).default_position;
    let end = skeleton.effector(effector_loc).default_position;
    let segment0 = middle - proximal;
    let segment1 = end - middle;
    let reach = segment0.norm() + segment1.norm();
    if reach < VECTOR_EPSILON {
        follow_hand(skeleton, hand, finger, mode);
        return;
    }

    let base = hand.position + hand.delta * (proximal - hand.default_position);
    let target = skeleton.effector_mut(effector_loc).world_position();
    let mut bearing = target - base;
    let distance = bearing.norm().min(reach);
    let mut straight = hand.delta * (end - proximal);
    if !safe_normalize(&mut bearing) || !safe_normalize(&mut straight) {
        follow_hand(skeleton, hand, finger, mode);
        return;
    }

    let axis_vector =
        skeleton.bone(joint(0)).local_axis_basis.column(2).into_owned() * -hand.side.sign();
    let Some(curl_axis) = Unit::try_new(axis_vector, VECTOR_EPSILON) else {
        follow_hand(skeleton, hand, finger, mode);
        return;
    };

    let mut lo = 0.0_f32;
    let mut hi = PI;
    for _ in 0..CURL_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if curled_span(&segment0, &segment1, &curl_axis, mid).norm() > distance {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let curl = 0.5 * (lo + hi);

    let swing = UnitQuaternion::rotation_between(&straight, &bearing).unwrap_or_else(|| {
        let flip_axis = Unit::new_normalize(hand.delta * curl_axis.into_inner());
        UnitQuaternion::from_axis_angle(&flip_axis, PI)
    });

    let mut cumulative = 0.0_f32;
    for j in 0..FINGER_JOINTS {
        let loc = joint(j);
        if !skeleton.bone(loc).present {
            continue;
        }
        cumulative += joint_curl(curl, j);
        let bend = UnitQuaternion::from_axis_angle(&curl_axis, cumulative);
        let solved = swing * hand.delta * bend * skeleton.bone(loc).default_rotation;
        let rotation = if weight < 1.0 - WEIGHT_EPSILON {
            let follow = hand.delta * skeleton.bone(loc).default_rotation;
            blend_rotation(&follow, &solved, weight)
        } else {
            solved
        };
        skeleton.set_world_rotation(loc, rotation);
    }
}

/// Disabled or degenerate chain: in reset mode the joints ride the hand at
/// their bind alignment, in continuous mode they keep the previous frame.
fn follow_hand(skeleton: &mut Skeleton, hand: &HandFrame, finger: FingerKind, mode: SolveMode) {
    if mode.is_continuous() {
        return;
    }
    for j in 0..FINGER_JOINTS {
        let loc = BoneLocation::HandFinger {
            side: hand.side,
            finger,
            joint: j,
        };
        if !skeleton.bone(loc).present {
            continue;
        }
        let rotation = hand.delta * skeleton.bone(loc).default_rotation;
        skeleton.set_world_rotation(loc, rotation);
    }
}

fn joint_curl(curl: f32, joint: usize) -> f32 {
    (curl * CURL_FRACTIONS[joint]).min(MAX_JOINT_CURL)
}

/// Base-to-tip span of the chain curled by `curl`, in the bind frame.
fn curled_span(
    segment0: &Vector3<f32>,
    segment1: &Vector3<f32>,
    axis: &Unit<Vector3<f32>>,
    curl: f32,
) -> Vector3<f32> {
    let first = joint_curl(curl, 0);
    let second = first + joint_curl(curl, 1);
    UnitQuaternion::from_axis_angle(axis, first) * segment0
        + UnitQuaternion::from_axis_angle(axis, second) * segment1
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
