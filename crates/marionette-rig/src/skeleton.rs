//! Skeleton arena: bind capture, axis derivation, live caches, write-back.

use marionette_core::config::SolverSettings;
use marionette_core::error::RigError;
use marionette_core::types::{ShoulderAxisMode, SyncDisplacementMode};
use marionette_math::prelude::{
    BasisHint, SquaredLength, basis_lock_y, basis_to_quat, compute_basis_from, quat_to_basis,
    reproject_point, safe_normalize,
};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::bone::{Bone, LocalAxisFrom};
use crate::constants::{ShoulderAxis, SolveConstants};
use crate::effector::{EYES_DEFAULT_DISTANCE, Effector};
use crate::location::{BoneLocation, EffectorLocation, FINGER_JOINTS, Side};
use crate::transform::SkeletonPose;

/// Bone and effector arena plus the solve-session constants.
///
/// `prepare` captures the bind pose and derives every per-bone frame,
/// `post_prepare` finalizes the change-of-basis matrices and effector
/// defaults, and `prepare_update` resets the per-frame caches. Solvers read
/// and write world state exclusively through the cache accessors so each
/// transform is pulled from the live pose at most once per frame.
pub struct Skeleton {
    bones: [Bone; BoneLocation::COUNT],
    effectors: [Effector; EffectorLocation::COUNT],
    constants: SolveConstants,
    hidden_eyes: bool,
    synced_once: bool,
}

impl Skeleton {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bones: BoneLocation::all().map(Bone::new),
            effectors: EffectorLocation::all().map(Effector::new),
            constants: SolveConstants::new(&SolverSettings::default()),
            hidden_eyes: false,
            synced_once: false,
        }
    }

    #[must_use]
    pub fn bone(&self, loc: BoneLocation) -> &Bone {
        &self.bones[loc.index()]
    }

    #[must_use]
    pub fn bone_mut(&mut self, loc: BoneLocation) -> &mut Bone {
        &mut self.bones[loc.index()]
    }

    #[must_use]
    pub fn effector(&self, loc: EffectorLocation) -> &Effector {
        &self.effectors[loc.index()]
    }

    #[must_use]
    pub fn effector_mut(&mut self, loc: EffectorLocation) -> &mut Effector {
        &mut self.effectors[loc.index()]
    }

    #[must_use]
    pub fn constants(&self) -> &SolveConstants {
        &self.constants
    }

    #[must_use]
    pub fn hidden_eyes(&self) -> bool {
        self.hidden_eyes
    }

    /// Capture the bind pose: presence, live parents, default frames, local
    /// axis bases, and write-back flags. Idempotent for the same inputs.
    ///
    /// `post_prepare` must run afterwards to finalize the derived matrices.
    pub fn prepare(
        &mut self,
        bind: &SkeletonPose,
        settings: &SolverSettings,
        hidden_eyes: bool,
    ) -> Result<(), RigError> {
        if bind.present_count() == 0 {
            return Err(RigError::EmptyBindPose);
        }
        for loc in BoneLocation::all() {
            if let Some(iso) = bind.get(loc) {
                let finite = iso.translation.vector.iter().all(|v| v.is_finite())
                    && iso.rotation.coords.iter().all(|v| v.is_finite());
                if !finite {
                    return Err(RigError::NonFiniteBindTransform(loc.name()));
                }
            }
        }
        if !bind.is_present(BoneLocation::Hips) {
            return Err(RigError::MissingMandatoryBone(BoneLocation::Hips.name()));
        }

        self.hidden_eyes = hidden_eyes;
        self.synced_once = false;
        self.constants = SolveConstants::new(settings);
        let (root_position, root_basis) = derive_root(bind);
        self.constants.set_root(root_position, root_basis);

        for loc in BoneLocation::all() {
            let mut bone = Bone::new(loc);
            if let Some(iso) = bind.get(loc) {
                bone.present = true;
                bone.default_position = iso.translation.vector;
                bone.default_rotation = iso.rotation;
                bone.default_basis = quat_to_basis(&iso.rotation);
                bone.live_parent = resolve_live_parent(bind, loc);
                if let Some(parent) = bone.live_parent {
                    let parent_position = bind.position(parent).unwrap_or_default();
                    let translate = bone.default_position - parent_position;
                    bone.default_local_translate = translate;
                    bone.default_local_length = SquaredLength::of(&translate);
                    let mut direction = translate;
                    if safe_normalize(&mut direction) {
                        bone.default_local_direction = direction;
                    }
                }
                bone.world_to_base_basis = bone.default_basis.transpose() * root_basis;
                bone.base_to_world_basis = bone.world_to_base_basis.transpose();
                bone.world_to_base_rotation = basis_to_quat(&bone.world_to_base_basis);
                bone.base_to_world_rotation = bone.world_to_base_rotation.inverse();
            }
            self.bones[loc.index()] = bone;
        }

        self.check_limb_segments()?;

        self.bones[BoneLocation::Hips.index()].writeback_world_position =
            self.bones[BoneLocation::Hips.index()].present;
        let spine = &self.bones[BoneLocation::Spine.index()];
        let spine_writeback = spine.present && spine.live_parent == Some(BoneLocation::Hips);
        self.bones[BoneLocation::Spine.index()].writeback_world_position = spine_writeback;
        for side in Side::BOTH {
            let eye = &mut self.bones[BoneLocation::Eye(side).index()];
            eye.writeback_world_position = eye.present && hidden_eyes;
        }

        self.constants.shoulder_axis = self.resolve_shoulder_axis(settings.shoulder_axis);
        self.compute_local_axes();
        Ok(())
    }

    /// Finalize the per-bone change-of-basis matrices and the effector
    /// defaults. Split from `prepare` because the axis pass fills parent
    /// bases from child passes, so every basis must exist first.
    pub fn post_prepare(&mut self) {
        self.finalize_bone_frames();
        self.compute_effector_defaults();
    }

    /// Reset all per-frame world caches to unread.
    pub fn prepare_update(&mut self) {
        for bone in &mut self.bones {
            bone.world_position.reset();
            bone.world_rotation.reset();
        }
        for effector in &mut self.effectors {
            effector.prepare_update();
        }
    }

    /// Re-measure segment lengths and directions from the live pose, then
    /// rebuild the dependent default positions, axis bases, and effector
    /// defaults. `FirstFrame` only syncs once per `prepare`.
    pub fn sync_displacement(&mut self, pose: &SkeletonPose, mode: SyncDisplacementMode) {
        match mode {
            SyncDisplacementMode::Disable => return,
            SyncDisplacementMode::FirstFrame if self.synced_once => return,
            _ => {}
        }
        self.synced_once = true;

        for loc in BoneLocation::all() {
            let idx = loc.index();
            if !self.bones[idx].present {
                continue;
            }
            let Some(parent_loc) = self.bones[idx].live_parent else {
                continue;
            };
            let (Some(position), Some(parent_position), Some(parent_rotation)) = (
                pose.position(loc),
                pose.position(parent_loc),
                pose.rotation(parent_loc),
            ) else {
                continue;
            };
            let translate = position - parent_position;
            let length = SquaredLength::of(&translate);
            let mut local = parent_rotation.inverse() * translate;
            let parent_default_basis = self.bones[parent_loc.index()].default_basis;
            let bone = &mut self.bones[idx];
            bone.default_local_length = length;
            if safe_normalize(&mut local) {
                let direction = parent_default_basis * local;
                bone.default_local_direction = direction;
                bone.default_local_translate = direction * length.length();
            } else {
                bone.default_local_direction = Vector3::zeros();
                bone.default_local_translate = Vector3::zeros();
            }
        }

        // Parents precede children in index order, so one pass settles the
        // chained defaults.
        for loc in BoneLocation::all() {
            if loc == BoneLocation::Hips {
                continue;
            }
            let idx = loc.index();
            if !self.bones[idx].present {
                continue;
            }
            let Some(parent_loc) = self.bones[idx].live_parent else {
                continue;
            };
            let parent_default = self.bones[parent_loc.index()].default_position;
            let bone = &mut self.bones[idx];
            bone.default_position = parent_default + bone.default_local_translate;
        }

        self.compute_local_axes();
        self.finalize_bone_frames();
        self.compute_effector_defaults();
    }

    /// Live world position, pulled from the pose at most once per frame.
    pub fn world_position(&mut self, loc: BoneLocation, pose: &SkeletonPose) -> Vector3<f32> {
        let bone = &mut self.bones[loc.index()];
        let source = if bone.present {
            pose.position(loc)
        } else {
            None
        };
        bone.world_position.read_or(source)
    }

    /// Live world rotation, pulled from the pose at most once per frame.
    pub fn world_rotation(
        &mut self,
        loc: BoneLocation,
        pose: &SkeletonPose,
    ) -> UnitQuaternion<f32> {
        let bone = &mut self.bones[loc.index()];
        let source = if bone.present {
            pose.rotation(loc)
        } else {
            None
        };
        bone.world_rotation.read_or(source)
    }

    pub fn set_world_position(&mut self, loc: BoneLocation, position: Vector3<f32>) {
        self.bones[loc.index()].world_position.write(position);
    }

    pub fn set_world_rotation(&mut self, loc: BoneLocation, rotation: UnitQuaternion<f32>) {
        self.bones[loc.index()].world_rotation.write(rotation);
    }

    /// Pin the current world rotation and re-derive the world position this
    /// bone must take under its parent's new rotation. Marks the bone for
    /// position write-back until the next `prepare`.
    pub fn forcefix_world_rotation(&mut self, loc: BoneLocation, pose: &SkeletonPose) {
        if !self.bones[loc.index()].present {
            return;
        }
        let rotation = self.world_rotation(loc, pose);
        self.set_world_rotation(loc, rotation);

        let Some(parent_loc) = self.bones[loc.index()].live_parent else {
            return;
        };
        let parent_world_rotation = self.world_rotation(parent_loc, pose);
        let parent_world_position = self.world_position(parent_loc, pose);
        let parent_default_rotation = self.bones[parent_loc.index()].default_rotation;
        let parent_default_position = self.bones[parent_loc.index()].default_position;
        let delta = quat_to_basis(&(parent_world_rotation * parent_default_rotation.inverse()));
        let default_position = self.bones[loc.index()].default_position;
        let fixed = reproject_point(
            &delta,
            &default_position,
            &parent_default_position,
            &parent_world_position,
        );
        let bone = &mut self.bones[loc.index()];
        bone.world_position.write(fixed);
        bone.writeback_world_position = true;
    }

    /// Flush solved state into the caller's pose. Rotations flush for every
    /// written present bone; positions only for write-back-flagged bones.
    pub fn write_back(&self, pose: &mut SkeletonPose) {
        for loc in BoneLocation::all() {
            let bone = &self.bones[loc.index()];
            if !bone.present {
                continue;
            }
            if bone.world_rotation.is_written() {
                pose.set_rotation(loc, bone.world_rotation.peek());
            }
            if bone.world_position.is_written() && bone.writeback_world_position {
                pose.set_position(loc, bone.world_position.peek());
            }
        }
    }

    /// Where this effector sits when it rigidly follows the live skeleton.
    /// The zero-pull reference position for pull blending.
    pub fn bone_world_position(
        &mut self,
        loc: EffectorLocation,
        pose: &SkeletonPose,
    ) -> Vector3<f32> {
        match loc {
            EffectorLocation::Eyes => {
                let head_present = self.bones[BoneLocation::Head.index()].present;
                let eyes_present = self.bones[BoneLocation::Eye(Side::Left).index()].present
                    && self.bones[BoneLocation::Eye(Side::Right).index()].present;
                if !self.hidden_eyes && head_present && eyes_present {
                    let left = self.world_position(BoneLocation::Eye(Side::Left), pose);
                    let right = self.world_position(BoneLocation::Eye(Side::Right), pose);
                    return (left + right) * 0.5;
                }
                if head_present {
                    let mut current = self.world_position(BoneLocation::Head, pose);
                    let head = &self.bones[BoneLocation::Head.index()];
                    if head.live_parent == Some(BoneLocation::Neck) {
                        let neck = &self.bones[BoneLocation::Neck.index()];
                        let neck_to_head_y =
                            (head.default_position.y - neck.default_position.y).max(0.0);
                        let neck_to_base = neck.world_to_base_rotation;
                        let neck_rotation = self.world_rotation(BoneLocation::Neck, pose);
                        let parent_base = quat_to_basis(&(neck_rotation * neck_to_base));
                        current += Vector3::from(parent_base.column(1)) * neck_to_head_y;
                        current += Vector3::from(parent_base.column(2)) * neck_to_head_y;
                    }
                    return current;
                }
            }
            EffectorLocation::FingerTip { side, finger }
                if self.effectors[loc.index()].simulate_finger_tip =>
            {
                let mid = BoneLocation::HandFinger {
                    side,
                    finger,
                    joint: FINGER_JOINTS - 2,
                };
                let base = BoneLocation::HandFinger {
                    side,
                    finger,
                    joint: FINGER_JOINTS - 3,
                };
                if self.bones[mid.index()].present && self.bones[base.index()].present {
                    let mid_position = self.world_position(mid, pose);
                    let base_position = self.world_position(base, pose);
                    return mid_position + (mid_position - base_position);
                }
            }
            _ => {
                if let Some(bone_loc) = loc.bound_bone() {
                    if self.bones[bone_loc.index()].present {
                        return self.world_position(bone_loc, pose);
                    }
                }
            }
        }
        self.effectors[loc.index()].world_position()
    }

    // -----------------------------------------------------------------------------
    // prepare internals
    // -----------------------------------------------------------------------------

    fn check_limb_segments(&self) -> Result<(), RigError> {
        for side in Side::BOTH {
            let chains = [
                (BoneLocation::Leg(side), BoneLocation::Knee(side)),
                (BoneLocation::Knee(side), BoneLocation::Foot(side)),
                (BoneLocation::Arm(side), BoneLocation::Elbow(side)),
                (BoneLocation::Elbow(side), BoneLocation::Wrist(side)),
            ];
            for (parent, child) in chains {
                let parent_bone = &self.bones[parent.index()];
                let child_bone = &self.bones[child.index()];
                if !parent_bone.present || !child_bone.present {
                    continue;
                }
                let span = child_bone.default_position - parent_bone.default_position;
                if SquaredLength::of(&span).is_zero() {
                    return Err(RigError::ZeroLengthSegment {
                        parent: parent.name(),
                        child: child.name(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Pick the shoulder secondary axis once per rig. `Auto` compares the
    /// arm direction against the shoulder direction and the shoulder-to-neck
    /// direction and keeps the more orthogonal one.
    fn resolve_shoulder_axis(&self, mode: ShoulderAxisMode) -> ShoulderAxis {
        match mode {
            ShoulderAxisMode::AlongNeck => ShoulderAxis::AlongNeck,
            ShoulderAxisMode::AlongSpine => ShoulderAxis::AlongSpine,
            ShoulderAxisMode::Auto => {
                let neck = &self.bones[BoneLocation::Neck.index()];
                if !neck.present {
                    return ShoulderAxis::AlongSpine;
                }
                for side in Side::BOTH {
                    let shoulder = &self.bones[BoneLocation::Shoulder(side).index()];
                    let arm = &self.bones[BoneLocation::Arm(side).index()];
                    if !shoulder.present
                        || !arm.present
                        || shoulder.live_parent.is_none()
                        || arm.live_parent != Some(BoneLocation::Shoulder(side))
                    {
                        continue;
                    }
                    let arm_dir = arm.default_local_direction;
                    let to_spine = shoulder.default_local_direction;
                    let mut to_neck = neck.default_position - shoulder.default_position;
                    if !safe_normalize(&mut to_neck) {
                        return ShoulderAxis::AlongSpine;
                    }
                    let spine_theta = arm_dir.dot(&to_spine).abs();
                    let neck_theta = arm_dir.dot(&to_neck).abs();
                    return if spine_theta < neck_theta {
                        ShoulderAxis::AlongSpine
                    } else {
                        ShoulderAxis::AlongNeck
                    };
                }
                ShoulderAxis::AlongSpine
            }
        }
    }

    /// Derive every bone's local axis basis from the bind directions.
    ///
    /// Parent-from bones build their own basis from their direction out of
    /// the live parent; child-from parents receive a basis from the child's
    /// pass. Index order guarantees grandparent bases exist when the spine
    /// chain consumes them.
    fn compute_local_axes(&mut self) {
        let root_basis = self.constants.root_basis;
        let root_x = Vector3::from(root_basis.column(0));

        for loc in BoneLocation::all() {
            let idx = loc.index();
            let bone = &self.bones[idx];
            if !bone.present {
                continue;
            }
            let Some(parent_loc) = bone.live_parent else {
                continue;
            };
            let parent_idx = parent_loc.index();
            let axis_from = bone.axis_from;
            let hint = bone.axis_hint;
            let dir = bone.default_local_direction;
            let parent_axis_from = self.bones[parent_idx].axis_from;
            if axis_from != LocalAxisFrom::Parent && parent_axis_from != LocalAxisFrom::Child {
                continue;
            }
            if dir == Vector3::zeros() {
                continue;
            }

            if axis_from == LocalAxisFrom::Parent {
                if let Some(hint) = hint {
                    if let Some(basis) = compute_basis_from(&root_basis, &dir, hint) {
                        self.bones[idx].local_axis_basis = basis;
                    }
                }
            }

            if parent_axis_from == LocalAxisFrom::Child {
                if let BoneLocation::Shoulder(_) = parent_loc {
                    self.compute_shoulder_axis_basis(parent_idx, &dir);
                } else if parent_loc.is_spine() && !loc.is_spine() && loc != BoneLocation::Neck {
                    // Spine parents only follow spine or neck children.
                } else if parent_loc == BoneLocation::Hips && !loc.is_spine() {
                    // Hips only follows a spine child.
                } else if parent_loc == BoneLocation::Hips {
                    if let Some(basis) = basis_lock_y(&root_x, &dir) {
                        self.bones[parent_idx].local_axis_basis = basis;
                    }
                } else if parent_loc.is_spine() || parent_loc == BoneLocation::Neck {
                    if let Some(grandparent_loc) = self.bones[parent_idx].live_parent {
                        let dir_x = Vector3::from(
                            self.bones[grandparent_loc.index()].local_axis_basis.column(0),
                        );
                        if let Some(basis) = basis_lock_y(&dir_x, &dir) {
                            self.bones[parent_idx].local_axis_basis = basis;
                        }
                    }
                } else {
                    let parent_hint = self.bones[parent_idx].axis_hint;
                    if axis_from == LocalAxisFrom::Parent && hint == parent_hint {
                        self.bones[parent_idx].local_axis_basis = self.bones[idx].local_axis_basis;
                    } else if let Some(parent_hint) = parent_hint {
                        if let Some(basis) = compute_basis_from(&root_basis, &dir, parent_hint) {
                            self.bones[parent_idx].local_axis_basis = basis;
                        }
                    }
                }
            }
        }
    }

    /// Shoulder lateral axis comes from the arm direction; the secondary
    /// axis follows the resolved shoulder-axis choice.
    fn compute_shoulder_axis_basis(&mut self, shoulder_idx: usize, arm_dir: &Vector3<f32>) {
        let shoulder_hint = self.bones[shoulder_idx].axis_hint;
        let x_dir = if shoulder_hint == Some(BasisHint::XMinus) {
            -arm_dir
        } else {
            *arm_dir
        };
        let neck = &self.bones[BoneLocation::Neck.index()];
        let shoulder = &self.bones[shoulder_idx];
        let y_seed = if self.constants.shoulder_axis == ShoulderAxis::AlongNeck && neck.present {
            neck.default_position - shoulder.default_position
        } else {
            shoulder.default_local_direction
        };
        let mut z_dir = x_dir.cross(&y_seed);
        let mut y_dir = z_dir.cross(&x_dir);
        if safe_normalize(&mut y_dir) && safe_normalize(&mut z_dir) {
            self.bones[shoulder_idx].local_axis_basis = Matrix3::from_columns(&[x_dir, y_dir, z_dir]);
        }
    }

    fn finalize_bone_frames(&mut self) {
        for bone in &mut self.bones {
            if bone.axis_from != LocalAxisFrom::None {
                bone.local_axis_basis_inv = bone.local_axis_basis.transpose();
                bone.world_to_bone_basis = bone.default_basis.transpose() * bone.local_axis_basis;
                bone.bone_to_world_basis = bone.world_to_bone_basis.transpose();
                bone.world_to_bone_rotation = basis_to_quat(&bone.world_to_bone_basis);
                bone.bone_to_world_rotation = bone.world_to_bone_rotation.inverse();
            } else {
                bone.local_axis_basis = Matrix3::identity();
                bone.local_axis_basis_inv = Matrix3::identity();
                bone.world_to_bone_basis = bone.default_basis.transpose();
                bone.bone_to_world_basis = bone.default_basis;
                bone.world_to_bone_rotation = bone.default_rotation.inverse();
                bone.bone_to_world_rotation = bone.default_rotation;
            }
            bone.base_to_bone_basis =
                bone.world_to_base_basis.transpose() * bone.world_to_bone_basis;
            bone.bone_to_base_basis = bone.base_to_bone_basis.transpose();
        }
    }

    /// Default transforms for every effector, parents first so child
    /// effectors inherit the parent rotation before type overrides.
    fn compute_effector_defaults(&mut self) {
        let root_position = self.constants.root_position;
        let root_rotation = self.constants.root_rotation;
        let root_basis = self.constants.root_basis;

        for loc in EffectorLocation::all() {
            let mut default_rotation = match loc.parent() {
                Some(parent) => self.effectors[parent.index()].default_rotation,
                None => UnitQuaternion::identity(),
            };
            let mut default_position = Vector3::zeros();
            let mut simulate_finger_tip = false;

            match loc {
                EffectorLocation::Root => {
                    default_position = root_position;
                    default_rotation = root_rotation;
                }
                EffectorLocation::Hips => {
                    let left = &self.bones[BoneLocation::Leg(Side::Left).index()];
                    let right = &self.bones[BoneLocation::Leg(Side::Right).index()];
                    if left.present && right.present {
                        default_position = (left.default_position + right.default_position) * 0.5;
                    } else {
                        default_position = self.bones[BoneLocation::Hips.index()].default_position;
                    }
                }
                EffectorLocation::Eyes => {
                    let head = &self.bones[BoneLocation::Head.index()];
                    let left = &self.bones[BoneLocation::Eye(Side::Left).index()];
                    let right = &self.bones[BoneLocation::Eye(Side::Right).index()];
                    if !self.hidden_eyes && head.present && left.present && right.present {
                        default_position = (left.default_position + right.default_position) * 0.5;
                    } else if head.present {
                        default_position = head.default_position;
                        if head.live_parent == Some(BoneLocation::Neck) {
                            let neck = &self.bones[BoneLocation::Neck.index()];
                            let neck_to_head_y =
                                (head.default_position.y - neck.default_position.y).max(0.0);
                            default_position +=
                                Vector3::from(root_basis.column(1)) * neck_to_head_y;
                            default_position +=
                                Vector3::from(root_basis.column(2)) * neck_to_head_y;
                        }
                    }
                }
                EffectorLocation::FingerTip { side, finger } => {
                    let tip = BoneLocation::HandFinger {
                        side,
                        finger,
                        joint: FINGER_JOINTS - 1,
                    };
                    let tip_bone = &self.bones[tip.index()];
                    if tip_bone.present {
                        default_position = tip_bone.default_position;
                    } else {
                        let mid = BoneLocation::HandFinger {
                            side,
                            finger,
                            joint: FINGER_JOINTS - 2,
                        };
                        let base = BoneLocation::HandFinger {
                            side,
                            finger,
                            joint: FINGER_JOINTS - 3,
                        };
                        let mid_position = self.bones[mid.index()].default_position;
                        let base_position = self.bones[base.index()].default_position;
                        default_position = mid_position + (mid_position - base_position);
                        simulate_finger_tip = true;
                    }
                }
                _ => {
                    if let Some(bone_loc) = loc.bound_bone() {
                        let bone = &self.bones[bone_loc.index()];
                        default_position = bone.default_position;
                        let wrist_or_foot = matches!(
                            loc,
                            EffectorLocation::Wrist(_) | EffectorLocation::Foot(_)
                        );
                        if wrist_or_foot && bone.axis_from != LocalAxisFrom::None {
                            default_rotation = basis_to_quat(&bone.local_axis_basis);
                        }
                    }
                }
            }

            let mut default_target = default_position;
            if loc == EffectorLocation::Eyes {
                default_target += Vector3::from(root_basis.column(2)) * EYES_DEFAULT_DISTANCE;
            }

            let effector = &mut self.effectors[loc.index()];
            effector.default_position = default_position;
            effector.default_rotation = default_rotation;
            effector.default_target_position = default_target;
            effector.simulate_finger_tip = simulate_finger_tip;
            effector.prepare_update();
        }
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical root frame from the bind pose: lateral axis from the leg (or
/// shoulder) spread, up locked to world up, origin under the leg midpoint.
fn derive_root(bind: &SkeletonPose) -> (Vector3<f32>, Matrix3<f32>) {
    let legs = lateral_pair(bind, BoneLocation::Leg(Side::Left), BoneLocation::Leg(Side::Right));
    let shoulders = lateral_pair(
        bind,
        BoneLocation::Shoulder(Side::Left),
        BoneLocation::Shoulder(Side::Right),
    );

    let mut basis = Matrix3::identity();
    if let Some((left, right)) = legs.or(shoulders) {
        let mut lateral = right - left;
        if safe_normalize(&mut lateral) {
            if let Some(locked) = basis_lock_y(&lateral, &Vector3::y()) {
                basis = locked;
            }
        }
    }

    let position = if let Some((left, right)) = legs {
        let mid = (left + right) * 0.5;
        Vector3::new(mid.x, 0.0, mid.z)
    } else if let Some(hips) = bind.position(BoneLocation::Hips) {
        Vector3::new(hips.x, 0.0, hips.z)
    } else {
        Vector3::zeros()
    };

    (position, basis)
}

fn lateral_pair(
    bind: &SkeletonPose,
    left: BoneLocation,
    right: BoneLocation,
) -> Option<(Vector3<f32>, Vector3<f32>)> {
    match (bind.position(left), bind.position(right)) {
        (Some(l), Some(r)) => Some((l, r)),
        _ => None,
    }
}

fn resolve_live_parent(bind: &SkeletonPose, loc: BoneLocation) -> Option<BoneLocation> {
    let mut cursor = loc.parent();
    while let Some(parent) = cursor {
        if bind.is_present(parent) {
            return Some(parent);
        }
        cursor = parent.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::FingerKind;
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;

    fn iso(x: f32, y: f32, z: f32) -> Isometry3<f32> {
        Isometry3::from_parts(Vector3::new(x, y, z).into(), UnitQuaternion::identity())
    }

    /// Canonical test humanoid: Y up, facing +Z, left side at negative X.
    /// Spine3/Spine4, roll bones, and the left index finger tip are absent.
    fn humanoid_bind() -> SkeletonPose {
        let mut pose = SkeletonPose::new();
        pose.set(BoneLocation::Hips, iso(0.0, 0.98, 0.0));
        pose.set(BoneLocation::Spine, iso(0.0, 1.08, 0.0));
        pose.set(BoneLocation::Spine2, iso(0.0, 1.2, 0.0));
        pose.set(BoneLocation::Neck, iso(0.0, 1.45, 0.0));
        pose.set(BoneLocation::Head, iso(0.0, 1.55, 0.0));
        for side in Side::BOTH {
            let s = side.sign();
            pose.set(BoneLocation::Eye(side), iso(s * 0.033, 1.62, 0.09));
            pose.set(BoneLocation::Shoulder(side), iso(s * 0.06, 1.42, 0.0));
            pose.set(BoneLocation::Arm(side), iso(s * 0.2, 1.4, 0.0));
            pose.set(BoneLocation::Elbow(side), iso(s * 0.5, 1.4, 0.0));
            pose.set(BoneLocation::Wrist(side), iso(s * 0.75, 1.4, 0.0));
            pose.set(BoneLocation::Leg(side), iso(s * 0.09, 0.92, 0.0));
            pose.set(BoneLocation::Knee(side), iso(s * 0.09, 0.5, 0.02));
            pose.set(BoneLocation::Foot(side), iso(s * 0.09, 0.06, 0.0));
        }
        for (joint, x) in [(0, -0.79), (1, -0.83)] {
            pose.set(
                BoneLocation::HandFinger {
                    side: Side::Left,
                    finger: FingerKind::Index,
                    joint,
                },
                iso(x, 1.4, 0.01),
            );
        }
        pose
    }

    fn prepared() -> Skeleton {
        let mut skeleton = Skeleton::new();
        skeleton
            .prepare(&humanoid_bind(), &SolverSettings::default(), false)
            .unwrap();
        skeleton.post_prepare();
        skeleton
    }

    // ---- prepare validation ----

    #[test]
    fn prepare_rejects_empty_bind() {
        let mut skeleton = Skeleton::new();
        let err = skeleton
            .prepare(&SkeletonPose::new(), &SolverSettings::default(), false)
            .unwrap_err();
        assert!(matches!(err, RigError::EmptyBindPose));
    }

    #[test]
    fn prepare_rejects_missing_hips() {
        let mut bind = humanoid_bind();
        bind.clear(BoneLocation::Hips);
        let mut skeleton = Skeleton::new();
        let err = skeleton
            .prepare(&bind, &SolverSettings::default(), false)
            .unwrap_err();
        assert!(matches!(err, RigError::MissingMandatoryBone("hips")));
    }

    #[test]
    fn prepare_rejects_non_finite_transform() {
        let mut bind = humanoid_bind();
        bind.set(BoneLocation::Head, iso(f32::NAN, 1.55, 0.0));
        let mut skeleton = Skeleton::new();
        let err = skeleton
            .prepare(&bind, &SolverSettings::default(), false)
            .unwrap_err();
        assert!(matches!(err, RigError::NonFiniteBindTransform("head")));
    }

    #[test]
    fn prepare_rejects_zero_length_limb_segment() {
        let mut bind = humanoid_bind();
        bind.set(BoneLocation::Knee(Side::Left), iso(-0.09, 0.92, 0.0));
        let mut skeleton = Skeleton::new();
        let err = skeleton
            .prepare(&bind, &SolverSettings::default(), false)
            .unwrap_err();
        assert!(matches!(
            err,
            RigError::ZeroLengthSegment {
                parent: "left_leg",
                child: "left_knee",
            }
        ));
    }

    // ---- bind capture ----

    #[test]
    fn live_parent_skips_absent_spine_links() {
        let skeleton = prepared();
        assert_eq!(
            skeleton.bone(BoneLocation::Neck).live_parent,
            Some(BoneLocation::Spine2)
        );
        assert_eq!(
            skeleton.bone(BoneLocation::Elbow(Side::Left)).live_parent,
            Some(BoneLocation::Arm(Side::Left))
        );
        assert_eq!(skeleton.bone(BoneLocation::Hips).live_parent, None);
    }

    #[test]
    fn local_decomposition_reassembles_default_position() {
        let skeleton = prepared();
        for loc in BoneLocation::all() {
            let bone = skeleton.bone(loc);
            let Some(parent) = bone.live_parent else {
                continue;
            };
            let parent_position = skeleton.bone(parent).default_position;
            let rebuilt = parent_position
                + bone.default_local_direction * bone.default_local_length.length();
            assert_relative_eq!(rebuilt, bone.default_position, epsilon = 1e-5);
        }
    }

    #[test]
    fn root_frame_derives_from_legs() {
        let skeleton = prepared();
        let constants = skeleton.constants();
        assert_relative_eq!(constants.root_basis, Matrix3::identity(), epsilon = 1e-5);
        assert_relative_eq!(constants.root_position, Vector3::zeros(), epsilon = 1e-5);
    }

    #[test]
    fn prepare_is_idempotent() {
        let mut skeleton = prepared();
        let before = skeleton.bone(BoneLocation::Neck).clone();
        skeleton
            .prepare(&humanoid_bind(), &SolverSettings::default(), false)
            .unwrap();
        skeleton.post_prepare();
        let after = skeleton.bone(BoneLocation::Neck);
        assert_relative_eq!(before.default_position, after.default_position, epsilon = 1e-6);
        assert_relative_eq!(before.local_axis_basis, after.local_axis_basis, epsilon = 1e-6);
        assert_eq!(before.live_parent, after.live_parent);
    }

    // ---- axis derivation ----

    #[test]
    fn spine_chain_axes_are_identity_for_upright_bind() {
        let skeleton = prepared();
        for loc in [BoneLocation::Hips, BoneLocation::Spine, BoneLocation::Spine2] {
            assert_relative_eq!(
                skeleton.bone(loc).local_axis_basis,
                Matrix3::identity(),
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn knee_axis_copies_foot_axis() {
        let skeleton = prepared();
        for side in Side::BOTH {
            assert_relative_eq!(
                skeleton.bone(BoneLocation::Knee(side)).local_axis_basis,
                skeleton.bone(BoneLocation::Foot(side)).local_axis_basis,
                epsilon = 1e-6
            );
            assert_relative_eq!(
                skeleton.bone(BoneLocation::Elbow(side)).local_axis_basis,
                skeleton.bone(BoneLocation::Wrist(side)).local_axis_basis,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn wrist_axis_points_along_arm() {
        let skeleton = prepared();
        let left = skeleton.bone(BoneLocation::Wrist(Side::Left));
        let right = skeleton.bone(BoneLocation::Wrist(Side::Right));
        // Lateral column is +X on both sides; the hint flips the left arm.
        assert_relative_eq!(
            Vector3::from(left.local_axis_basis.column(0)),
            Vector3::x(),
            epsilon = 1e-5
        );
        assert_relative_eq!(
            Vector3::from(right.local_axis_basis.column(0)),
            Vector3::x(),
            epsilon = 1e-5
        );
    }

    #[test]
    fn shoulder_axis_resolves_to_spine_for_upright_bind() {
        let skeleton = prepared();
        assert_eq!(skeleton.constants().shoulder_axis, ShoulderAxis::AlongSpine);
    }

    #[test]
    fn change_of_basis_round_trips() {
        let skeleton = prepared();
        for loc in [
            BoneLocation::Neck,
            BoneLocation::Knee(Side::Right),
            BoneLocation::Wrist(Side::Left),
        ] {
            let bone = skeleton.bone(loc);
            assert_relative_eq!(
                bone.world_to_bone_basis * bone.bone_to_world_basis,
                Matrix3::identity(),
                epsilon = 1e-5
            );
            assert_relative_eq!(
                bone.world_to_base_basis * bone.base_to_world_basis,
                Matrix3::identity(),
                epsilon = 1e-5
            );
        }
    }

    // ---- write-back flags ----

    #[test]
    fn writeback_flags_follow_presence_rules() {
        let skeleton = prepared();
        assert!(skeleton.bone(BoneLocation::Hips).writeback_world_position);
        assert!(skeleton.bone(BoneLocation::Spine).writeback_world_position);
        assert!(!skeleton.bone(BoneLocation::Eye(Side::Left)).writeback_world_position);

        let mut hidden = Skeleton::new();
        hidden
            .prepare(&humanoid_bind(), &SolverSettings::default(), true)
            .unwrap();
        hidden.post_prepare();
        assert!(hidden.bone(BoneLocation::Eye(Side::Left)).writeback_world_position);
        assert!(hidden.bone(BoneLocation::Eye(Side::Right)).writeback_world_position);
    }

    // ---- world caches ----

    #[test]
    fn world_cache_reads_once_and_write_suppresses_source() {
        let mut skeleton = prepared();
        skeleton.prepare_update();
        let mut pose = humanoid_bind();

        let first = skeleton.world_position(BoneLocation::Head, &pose);
        assert_relative_eq!(first, Vector3::new(0.0, 1.55, 0.0), epsilon = 1e-6);

        // Later pose edits are invisible within the same frame.
        pose.set_position(BoneLocation::Head, Vector3::new(9.0, 9.0, 9.0));
        let second = skeleton.world_position(BoneLocation::Head, &pose);
        assert_relative_eq!(second, first, epsilon = 1e-6);

        skeleton.set_world_position(BoneLocation::Head, Vector3::new(1.0, 2.0, 3.0));
        let written = skeleton.world_position(BoneLocation::Head, &pose);
        assert_relative_eq!(written, Vector3::new(1.0, 2.0, 3.0), epsilon = 1e-6);
    }

    #[test]
    fn write_back_flushes_rotation_always_position_only_when_flagged() {
        let mut skeleton = prepared();
        skeleton.prepare_update();
        let mut pose = humanoid_bind();

        let turned = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.4);
        skeleton.set_world_rotation(BoneLocation::Knee(Side::Left), turned);
        skeleton.set_world_position(BoneLocation::Knee(Side::Left), Vector3::new(5.0, 5.0, 5.0));
        skeleton.set_world_position(BoneLocation::Hips, Vector3::new(0.0, 0.9, 0.1));
        skeleton.write_back(&mut pose);

        assert_relative_eq!(
            pose.rotation(BoneLocation::Knee(Side::Left)).unwrap().angle(),
            0.4,
            epsilon = 1e-5
        );
        // Knee carries no write-back flag, so its position is untouched.
        assert_relative_eq!(
            pose.position(BoneLocation::Knee(Side::Left)).unwrap(),
            Vector3::new(-0.09, 0.5, 0.02),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            pose.position(BoneLocation::Hips).unwrap(),
            Vector3::new(0.0, 0.9, 0.1),
            epsilon = 1e-6
        );
    }

    #[test]
    fn forcefix_reprojects_position_under_parent_rotation() {
        let mut skeleton = prepared();
        skeleton.prepare_update();
        let pose = humanoid_bind();

        // Rotate the left knee 90 degrees about X and fix up the foot.
        let bend = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::FRAC_PI_2);
        skeleton.set_world_rotation(BoneLocation::Knee(Side::Left), bend);
        skeleton.forcefix_world_rotation(BoneLocation::Foot(Side::Left), &pose);

        let foot = skeleton.bone(BoneLocation::Foot(Side::Left));
        assert!(foot.world_position.is_written());
        assert!(foot.writeback_world_position);
        // Knee at (-0.09, 0.5, 0.02); knee->foot offset (0, -0.44, -0.02)
        // rotates to (0, 0.02, -0.44).
        let fixed = foot.world_position.peek();
        assert_relative_eq!(fixed, Vector3::new(-0.09, 0.52, -0.42), epsilon = 1e-4);
    }

    // ---- sync displacement ----

    #[test]
    fn sync_displacement_remeasures_lengths_from_live_pose() {
        let mut skeleton = prepared();
        skeleton.prepare_update();

        // The live character grew: feet moved further from the knees.
        let mut live = humanoid_bind();
        for side in Side::BOTH {
            live.set_position(
                BoneLocation::Foot(side),
                Vector3::new(side.sign() * 0.09, -0.04, 0.0),
            );
        }
        skeleton.sync_displacement(&live, SyncDisplacementMode::EveryFrame);

        let foot = skeleton.bone(BoneLocation::Foot(Side::Left));
        let expected =
            (Vector3::<f32>::new(-0.09, -0.04, 0.0) - Vector3::new(-0.09, 0.5, 0.02)).norm();
        assert_relative_eq!(foot.default_local_length.length(), expected, epsilon = 1e-5);
        // Chained defaults moved with the re-measured segment.
        assert_relative_eq!(
            foot.default_position,
            Vector3::new(-0.09, -0.04, 0.0),
            epsilon = 1e-4
        );
    }

    #[test]
    fn sync_displacement_first_frame_only_runs_once() {
        let mut skeleton = prepared();
        skeleton.prepare_update();

        let mut live = humanoid_bind();
        live.set_position(BoneLocation::Foot(Side::Left), Vector3::new(-0.09, -0.04, 0.0));
        skeleton.sync_displacement(&live, SyncDisplacementMode::FirstFrame);
        let synced = skeleton
            .bone(BoneLocation::Foot(Side::Left))
            .default_local_length
            .length();

        live.set_position(BoneLocation::Foot(Side::Left), Vector3::new(-0.09, -0.5, 0.0));
        skeleton.sync_displacement(&live, SyncDisplacementMode::FirstFrame);
        let after = skeleton
            .bone(BoneLocation::Foot(Side::Left))
            .default_local_length
            .length();
        assert_relative_eq!(synced, after, epsilon = 1e-6);

        skeleton.sync_displacement(&live, SyncDisplacementMode::Disable);
        assert_relative_eq!(
            skeleton
                .bone(BoneLocation::Foot(Side::Left))
                .default_local_length
                .length(),
            after,
            epsilon = 1e-6
        );
    }

    // ---- effector defaults ----

    #[test]
    fn hips_effector_defaults_to_leg_midpoint() {
        let skeleton = prepared();
        assert_relative_eq!(
            skeleton.effector(EffectorLocation::Hips).default_position,
            Vector3::new(0.0, 0.92, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn eyes_effector_defaults_to_eye_midpoint_pushed_forward() {
        let skeleton = prepared();
        let eyes = skeleton.effector(EffectorLocation::Eyes);
        assert_relative_eq!(
            eyes.default_position,
            Vector3::new(0.0, 1.62, 0.09),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            eyes.default_target_position,
            Vector3::new(0.0, 1.62, 0.09 + EYES_DEFAULT_DISTANCE),
            epsilon = 1e-6
        );
    }

    #[test]
    fn hidden_eyes_fall_back_to_head_offsets() {
        let mut skeleton = Skeleton::new();
        skeleton
            .prepare(&humanoid_bind(), &SolverSettings::default(), true)
            .unwrap();
        skeleton.post_prepare();
        let eyes = skeleton.effector(EffectorLocation::Eyes);
        // head + (up + forward) * max(0, head.y - neck.y)
        assert_relative_eq!(
            eyes.default_position,
            Vector3::new(0.0, 1.65, 0.1),
            epsilon = 1e-5
        );
    }

    #[test]
    fn absent_finger_tip_is_extrapolated() {
        let skeleton = prepared();
        let tip = skeleton.effector(EffectorLocation::FingerTip {
            side: Side::Left,
            finger: FingerKind::Index,
        });
        assert!(tip.simulate_finger_tip);
        // mid + (mid - base) = (-0.83) + (-0.83 - -0.79) = -0.87
        assert_relative_eq!(
            tip.default_position,
            Vector3::new(-0.87, 1.4, 0.01),
            epsilon = 1e-5
        );
    }

    #[test]
    fn wrist_effector_rotation_comes_from_local_axis() {
        let skeleton = prepared();
        let wrist = skeleton.effector(EffectorLocation::Wrist(Side::Left));
        let bone = skeleton.bone(BoneLocation::Wrist(Side::Left));
        assert_relative_eq!(
            wrist.default_rotation.angle_to(&basis_to_quat(&bone.local_axis_basis)),
            0.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn bone_world_position_follows_live_skeleton() {
        let mut skeleton = prepared();
        skeleton.prepare_update();
        let mut pose = humanoid_bind();
        pose.set_position(BoneLocation::Wrist(Side::Right), Vector3::new(0.6, 1.1, 0.2));

        let reference = skeleton.bone_world_position(EffectorLocation::Wrist(Side::Right), &pose);
        assert_relative_eq!(reference, Vector3::new(0.6, 1.1, 0.2), epsilon = 1e-6);

        // Simulated finger tip extrapolates from the live mid and base joints.
        let tip = skeleton.bone_world_position(
            EffectorLocation::FingerTip {
                side: Side::Left,
                finger: FingerKind::Index,
            },
            &pose,
        );
        assert_relative_eq!(tip, Vector3::new(-0.87, 1.4, 0.01), epsilon = 1e-5);
    }
}
