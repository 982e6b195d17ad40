//! Maps corrected tracker joints onto the solver's effector targets.
//!
//! A [`Retargeter`] is calibrated once against the rig's bind pose, then
//! applied per frame: the person's core keypoints run through the pose
//! graph, and the corrected joints land on the matching effectors as
//! positions, rotations, enable flags, and weights.

use marionette_core::error::{MarionetteError, RetargetError};
use marionette_ik::FullBodySolver;
use marionette_math::prelude::*;
use marionette_posegraph::config::PoseGraphConfig;
use marionette_posegraph::joint::{JointSample, TrackedJoint};
use marionette_posegraph::optimizer::{PoseGraphOptimizer, SolveReport};
use marionette_rig::effector::EYES_DEFAULT_DISTANCE;
use marionette_rig::{BoneLocation, EffectorLocation, Side, SkeletonPose};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::frame::{FaceAngles, KeypointId, PersonSample, PoseFrame};

/// Tunables for the tracker-to-rig mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetargetConfig {
    /// Uniform scale from tracker units to rig units.
    pub scale: f32,
    /// Flip the person across X, swapping left and right limbs.
    pub mirror: bool,
    /// Keypoints below this source confidence leave their effector disabled.
    pub enable_confidence: f32,
    pub graph: PoseGraphConfig,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            mirror: false,
            enable_confidence: 0.25,
            graph: PoseGraphConfig::default(),
        }
    }
}

/// Per-person pipeline stage between the tracker and the IK solver.
///
/// Holds the pose-graph optimizer calibrated from the bind pose and the
/// bind forearm axes used to derive hand rotations.
pub struct Retargeter {
    config: RetargetConfig,
    optimizer: PoseGraphOptimizer,
    bind_forearms: [Vector3<f32>; 2],
}

impl Retargeter {
    /// Calibrates the pose graph from the rig's bind pose.
    ///
    /// # Errors
    ///
    /// Returns [`MarionetteError`] for a non-positive scale, a bind pose
    /// missing one of the fifteen tracked joints, or an unusable
    /// constraint list.
    pub fn new(bind: &SkeletonPose, config: RetargetConfig) -> Result<Self, MarionetteError> {
        if !config.scale.is_finite() || config.scale <= 0.0 {
            return Err(RetargetError::InvalidScale(config.scale).into());
        }
        let bind_positions = tracked_bind_positions(bind)?;
        let optimizer = PoseGraphOptimizer::new(&bind_positions, config.graph.clone())?;
        let bind_forearms = Side::BOTH.map(|side| {
            let (lower, hand) = forearm_joints(side);
            normalized_or(
                bind_positions[hand.index()] - bind_positions[lower.index()],
                Vector3::new(side.sign(), 0.0, 0.0),
            )
        });
        Ok(Self {
            config,
            optimizer,
            bind_forearms,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RetargetConfig {
        &self.config
    }

    /// Corrected core joints for one person, with the optimizer report.
    #[must_use]
    pub fn correct(
        &self,
        person: &PersonSample,
    ) -> ([JointSample; TrackedJoint::COUNT], SolveReport) {
        let mut joints = self.sampled_joints(person);
        let report = self.optimizer.optimize(&mut joints);
        (joints, report)
    }

    /// Runs the pose graph over one person and writes effector targets,
    /// enable flags, and weights into the solver.
    ///
    /// Enable gating reads the source confidences so a barely-seen keypoint
    /// disables its effector even after the graph reseeds its position;
    /// weights carry the corrected confidences through unchanged.
    pub fn apply(&self, person: &PersonSample, solver: &mut FullBodySolver) -> SolveReport {
        let staged = self.sampled_joints(person);
        let mut joints = staged;
        let report = self.optimizer.optimize(&mut joints);

        let gate = self.config.enable_confidence;
        let placements = [
            (EffectorLocation::Hips, TrackedJoint::Hips),
            (EffectorLocation::Head, TrackedJoint::Head),
            (EffectorLocation::Wrist(Side::Right), TrackedJoint::RightHand),
            (EffectorLocation::Wrist(Side::Left), TrackedJoint::LeftHand),
            (
                EffectorLocation::Elbow(Side::Right),
                TrackedJoint::RightLowerArm,
            ),
            (
                EffectorLocation::Elbow(Side::Left),
                TrackedJoint::LeftLowerArm,
            ),
            (
                EffectorLocation::Knee(Side::Right),
                TrackedJoint::RightLowerLeg,
            ),
            (
                EffectorLocation::Knee(Side::Left),
                TrackedJoint::LeftLowerLeg,
            ),
            (EffectorLocation::Foot(Side::Right), TrackedJoint::RightFoot),
            (EffectorLocation::Foot(Side::Left), TrackedJoint::LeftFoot),
        ];
        for (loc, joint) in placements {
            let corrected = joints[joint.index()];
            let enabled = staged[joint.index()].confidence >= gate;
            let bend = matches!(loc, EffectorLocation::Elbow(_) | EffectorLocation::Knee(_));
            let effector = solver.effector_mut(loc);
            effector.position_enabled = enabled;
            if enabled {
                effector.set_target_position(corrected.position);
                effector.position_weight = corrected.confidence;
                if bend {
                    effector.pull = corrected.confidence;
                }
            } else if bend {
                effector.pull = 0.0;
            }
        }

        self.apply_hand_rotations(&staged, &joints, solver);
        self.apply_head_rotation(person, &staged, &joints, solver);
        self.apply_eyes_target(person, solver);
        report
    }

    /// Applies the first person in the frame.
    ///
    /// # Errors
    ///
    /// [`RetargetError::EmptyFrame`] when the frame holds no people.
    pub fn apply_frame(
        &self,
        frame: &PoseFrame,
        solver: &mut FullBodySolver,
    ) -> Result<SolveReport, RetargetError> {
        let person = frame.people.first().ok_or(RetargetError::EmptyFrame)?;
        Ok(self.apply(person, solver))
    }

    /// Person keypoints as pose-graph samples in rig space: scaled,
    /// optionally mirrored, missing points at zero confidence.
    fn sampled_joints(&self, person: &PersonSample) -> [JointSample; TrackedJoint::COUNT] {
        let mut joints = [JointSample::new(Vector3::zeros(), 0.0); TrackedJoint::COUNT];
        for point in &person.keypoints {
            let Some(joint) = point.id.tracked() else {
                continue;
            };
            joints[joint.index()] =
                JointSample::new(point.position() * self.config.scale, point.confidence);
        }
        if self.config.mirror {
            mirror_joints(&mut joints);
        }
        joints
    }

    fn apply_hand_rotations(
        &self,
        staged: &[JointSample; TrackedJoint::COUNT],
        joints: &[JointSample; TrackedJoint::COUNT],
        solver: &mut FullBodySolver,
    ) {
        let gate = self.config.enable_confidence;
        for side in Side::BOTH {
            let (lower, hand) = forearm_joints(side);
            let loc = EffectorLocation::Wrist(side);
            let confident = staged[hand.index()].confidence >= gate
                && staged[lower.index()].confidence >= gate;
            let delta = if confident {
                forearm_delta(
                    &self.bind_forearms[side.index()],
                    joints[lower.index()].position,
                    joints[hand.index()].position,
                )
            } else {
                None
            };
            if let Some(delta) = delta {
                let default_rotation = solver.skeleton().effector(loc).default_rotation;
                let effector = solver.effector_mut(loc);
                effector.rotation_enabled = true;
                effector.set_target_rotation(delta * default_rotation);
                effector.rotation_weight = joints[hand.index()].confidence;
            } else {
                solver.effector_mut(loc).rotation_enabled = false;
            }
        }
    }

    fn apply_head_rotation(
        &self,
        person: &PersonSample,
        staged: &[JointSample; TrackedJoint::COUNT],
        joints: &[JointSample; TrackedJoint::COUNT],
        solver: &mut FullBodySolver,
    ) {
        let head = TrackedJoint::Head.index();
        if staged[head].confidence < self.config.enable_confidence {
            solver.effector_mut(EffectorLocation::Head).rotation_enabled = false;
            return;
        }
        let face = self.oriented_face(person.face);
        let default_rotation = solver
            .skeleton()
            .effector(EffectorLocation::Head)
            .default_rotation;
        let effector = solver.effector_mut(EffectorLocation::Head);
        effector.rotation_enabled = true;
        effector.set_target_rotation(face_rotation(&face) * default_rotation);
        effector.rotation_weight = joints[head].confidence;
    }

    /// Eye keypoints become a gaze target pushed forward along the face
    /// direction, so the eyes track where the person is looking rather
    /// than the person's own face.
    fn apply_eyes_target(&self, person: &PersonSample, solver: &mut FullBodySolver) {
        let left = person.keypoint(KeypointId::LeftEye);
        let right = person.keypoint(KeypointId::RightEye);
        let (Some(left), Some(right)) = (left, right) else {
            solver.effector_mut(EffectorLocation::Eyes).position_enabled = false;
            return;
        };
        let confidence = (left.confidence + right.confidence) * 0.5;
        if confidence < self.config.enable_confidence {
            solver.effector_mut(EffectorLocation::Eyes).position_enabled = false;
            return;
        }
        let mut midpoint = (left.position() + right.position()) * 0.5 * self.config.scale;
        if self.config.mirror {
            midpoint.x = -midpoint.x;
        }
        let forward = face_rotation(&self.oriented_face(person.face)) * Vector3::z();
        let effector = solver.effector_mut(EffectorLocation::Eyes);
        effector.position_enabled = true;
        effector.set_target_position(midpoint + forward * EYES_DEFAULT_DISTANCE);
        effector.position_weight = confidence;
    }

    /// Face angles with the mirror flip folded in.
    fn oriented_face(&self, mut face: FaceAngles) -> FaceAngles {
        if self.config.mirror {
            face.yaw = -face.yaw;
            face.roll = -face.roll;
        }
        face
    }
}

/// Bind positions of the fifteen tracked joints, pulled from the rig.
fn tracked_bind_positions(
    bind: &SkeletonPose,
) -> Result<[Vector3<f32>; TrackedJoint::COUNT], RetargetError> {
    let mut positions = [Vector3::zeros(); TrackedJoint::COUNT];
    for joint in TrackedJoint::ALL {
        let position = match core_bone(joint) {
            Some(loc) => bind.position(loc),
            None => chest_bind_position(bind),
        };
        positions[joint.index()] = position.ok_or(RetargetError::MissingKeypoint(joint.name()))?;
    }
    Ok(positions)
}

/// Rig bone carrying each tracked joint. The chest resolves separately
/// because rigs expose varying spine depth.
const fn core_bone(joint: TrackedJoint) -> Option<BoneLocation> {
    match joint {
        TrackedJoint::Head => Some(BoneLocation::Head),
        TrackedJoint::UpperChest => None,
        TrackedJoint::RightShoulder => Some(BoneLocation::Arm(Side::Right)),
        TrackedJoint::RightLowerArm => Some(BoneLocation::Elbow(Side::Right)),
        TrackedJoint::RightHand => Some(BoneLocation::Wrist(Side::Right)),
        TrackedJoint::LeftShoulder => Some(BoneLocation::Arm(Side::Left)),
        TrackedJoint::LeftLowerArm => Some(BoneLocation::Elbow(Side::Left)),
        TrackedJoint::LeftHand => Some(BoneLocation::Wrist(Side::Left)),
        TrackedJoint::Hips => Some(BoneLocation::Hips),
        TrackedJoint::RightUpperLeg => Some(BoneLocation::Leg(Side::Right)),
        TrackedJoint::RightLowerLeg => Some(BoneLocation::Knee(Side::Right)),
        TrackedJoint::RightFoot => Some(BoneLocation::Foot(Side::Right)),
        TrackedJoint::LeftUpperLeg => Some(BoneLocation::Leg(Side::Left)),
        TrackedJoint::LeftLowerLeg => Some(BoneLocation::Knee(Side::Left)),
        TrackedJoint::LeftFoot => Some(BoneLocation::Foot(Side::Left)),
    }
}

/// Highest present spine bone stands in for the upper chest.
fn chest_bind_position(bind: &SkeletonPose) -> Option<Vector3<f32>> {
    [
        BoneLocation::Spine4,
        BoneLocation::Spine3,
        BoneLocation::Spine2,
        BoneLocation::Spine,
    ]
    .into_iter()
    .find_map(|loc| bind.position(loc))
}

const fn forearm_joints(side: Side) -> (TrackedJoint, TrackedJoint) {
    match side {
        Side::Left => (TrackedJoint::LeftLowerArm, TrackedJoint::LeftHand),
        Side::Right => (TrackedJoint::RightLowerArm, TrackedJoint::RightHand),
    }
}

/// World delta carrying the bind forearm axis onto the live one.
fn forearm_delta(
    bind_axis: &Vector3<f32>,
    lower: Vector3<f32>,
    hand: Vector3<f32>,
) -> Option<UnitQuaternion<f32>> {
    let live = (hand - lower).try_normalize(VECTOR_EPSILON)?;
    UnitQuaternion::rotation_between(bind_axis, &live)
}

/// World rotation for the reported face angles: yaw, then pitch, then roll.
fn face_rotation(face: &FaceAngles) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), face.yaw.to_radians())
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), face.pitch.to_radians())
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), face.roll.to_radians())
}

/// Flips samples across X and hands each side's joints to the other
/// side's slots, so the person's right arm drives the rig's left.
fn mirror_joints(joints: &mut [JointSample; TrackedJoint::COUNT]) {
    for sample in joints.iter_mut() {
        sample.position.x = -sample.position.x;
    }
    const SWAPS: [(TrackedJoint, TrackedJoint); 6] = [
        (TrackedJoint::RightShoulder, TrackedJoint::LeftShoulder),
        (TrackedJoint::RightLowerArm, TrackedJoint::LeftLowerArm),
        (TrackedJoint::RightHand, TrackedJoint::LeftHand),
        (TrackedJoint::RightUpperLeg, TrackedJoint::LeftUpperLeg),
        (TrackedJoint::RightLowerLeg, TrackedJoint::LeftLowerLeg),
        (TrackedJoint::RightFoot, TrackedJoint::LeftFoot),
    ];
    for (right, left) in SWAPS {
        joints.swap(right.index(), left.index());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
