//! Per-bone default pose, derived frames, and per-frame world caches.

use marionette_math::basis::basis_to_quat;
use marionette_math::prelude::{BasisHint, SquaredLength};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::location::{BoneLocation, FINGER_JOINTS, Side};
use crate::transform::FrameCache;

/// Which neighbour supplies the direction a bone's local axis is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalAxisFrom {
    None,
    Parent,
    Child,
}

/// Local-axis derivation rule per location: which neighbour direction feeds
/// the basis and which column it becomes. Heads and eyes keep their default
/// rotation frame.
#[must_use]
pub const fn axis_preset(loc: BoneLocation) -> (LocalAxisFrom, Option<BasisHint>) {
    const fn lateral(side: Side) -> BasisHint {
        match side {
            Side::Left => BasisHint::XMinus,
            Side::Right => BasisHint::XPlus,
        }
    }
    match loc {
        BoneLocation::Hips
        | BoneLocation::Spine
        | BoneLocation::Spine2
        | BoneLocation::Spine3
        | BoneLocation::Spine4
        | BoneLocation::Neck => (LocalAxisFrom::Child, Some(BasisHint::YPlus)),
        BoneLocation::Head | BoneLocation::Eye(_) => (LocalAxisFrom::None, None),
        BoneLocation::Leg(_) | BoneLocation::Knee(_) => {
            (LocalAxisFrom::Child, Some(BasisHint::YMinus))
        }
        BoneLocation::Foot(_) => (LocalAxisFrom::Parent, Some(BasisHint::YMinus)),
        BoneLocation::Shoulder(side) | BoneLocation::Arm(side) | BoneLocation::Elbow(side) => {
            (LocalAxisFrom::Child, Some(lateral(side)))
        }
        BoneLocation::ArmRoll(side) | BoneLocation::ElbowRoll(side) | BoneLocation::Wrist(side) => {
            (LocalAxisFrom::Parent, Some(lateral(side)))
        }
        BoneLocation::HandFinger { side, joint, .. } => {
            if joint + 1 == FINGER_JOINTS {
                (LocalAxisFrom::Parent, Some(lateral(side)))
            } else {
                (LocalAxisFrom::Child, Some(lateral(side)))
            }
        }
    }
}

/// One skeletal joint slot in the arena.
///
/// Defaults are captured at `prepare` from the bind pose; the frame caches
/// carry the live world state within one solve pass.
#[derive(Clone, Debug)]
pub struct Bone {
    pub location: BoneLocation,
    pub present: bool,
    /// Nearest present ancestor, resolved past absent bones.
    pub live_parent: Option<BoneLocation>,
    pub axis_from: LocalAxisFrom,
    pub axis_hint: Option<BasisHint>,
    pub writeback_world_position: bool,

    pub default_position: Vector3<f32>,
    pub default_rotation: UnitQuaternion<f32>,
    pub default_basis: Matrix3<f32>,
    /// Offset from the live parent at bind, in world frame.
    pub default_local_translate: Vector3<f32>,
    pub default_local_direction: Vector3<f32>,
    pub default_local_length: SquaredLength,

    /// Bind-frame axis basis (lateral/along/forward columns).
    pub local_axis_basis: Matrix3<f32>,
    pub local_axis_basis_inv: Matrix3<f32>,
    pub world_to_bone_basis: Matrix3<f32>,
    pub bone_to_world_basis: Matrix3<f32>,
    pub world_to_bone_rotation: UnitQuaternion<f32>,
    pub bone_to_world_rotation: UnitQuaternion<f32>,
    pub world_to_base_basis: Matrix3<f32>,
    pub base_to_world_basis: Matrix3<f32>,
    pub world_to_base_rotation: UnitQuaternion<f32>,
    pub base_to_world_rotation: UnitQuaternion<f32>,
    pub base_to_bone_basis: Matrix3<f32>,
    pub bone_to_base_basis: Matrix3<f32>,

    pub world_position: FrameCache<Vector3<f32>>,
    pub world_rotation: FrameCache<UnitQuaternion<f32>>,
}

impl Bone {
    #[must_use]
    pub fn new(location: BoneLocation) -> Self {
        let (axis_from, axis_hint) = axis_preset(location);
        Self {
            location,
            present: false,
            live_parent: None,
            axis_from,
            axis_hint,
            writeback_world_position: false,
            default_position: Vector3::zeros(),
            default_rotation: UnitQuaternion::identity(),
            default_basis: Matrix3::identity(),
            default_local_translate: Vector3::zeros(),
            default_local_direction: Vector3::zeros(),
            default_local_length: SquaredLength::ZERO,
            local_axis_basis: Matrix3::identity(),
            local_axis_basis_inv: Matrix3::identity(),
            world_to_bone_basis: Matrix3::identity(),
            bone_to_world_basis: Matrix3::identity(),
            world_to_bone_rotation: UnitQuaternion::identity(),
            bone_to_world_rotation: UnitQuaternion::identity(),
            world_to_base_basis: Matrix3::identity(),
            base_to_world_basis: Matrix3::identity(),
            world_to_base_rotation: UnitQuaternion::identity(),
            base_to_world_rotation: UnitQuaternion::identity(),
            base_to_bone_basis: Matrix3::identity(),
            bone_to_base_basis: Matrix3::identity(),
            world_position: FrameCache::new(Vector3::zeros()),
            world_rotation: FrameCache::new(UnitQuaternion::identity()),
        }
    }

    /// Root-aligned rotation for a given world rotation of this bone.
    #[must_use]
    pub fn base_rotation(&self, world: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        world * self.world_to_base_rotation
    }

    /// World rotation implied by a solved axis basis.
    #[must_use]
    pub fn world_rotation_from_axis_basis(&self, axis_basis: &Matrix3<f32>) -> UnitQuaternion<f32> {
        basis_to_quat(&(axis_basis * self.bone_to_world_basis))
    }

    /// World rotation implied by a solved base basis.
    #[must_use]
    pub fn world_rotation_from_base_basis(&self, base_basis: &Matrix3<f32>) -> UnitQuaternion<f32> {
        basis_to_quat(&(base_basis * self.base_to_world_basis))
    }
}
