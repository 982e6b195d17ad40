//! Neck, head, and eye solving.
//!
//! The stage runs in one of three shapes picked from the effector weights:
//! with no positional demand the head follows its parent, plus the optional
//! head rotation effector under a square-cone limit; a head position target
//! aims the neck column directly; an eyes target walks demand through neck,
//! head, and eyeballs in sequence, each link taking its configured share of
//! the gaze inside its own cone.

use marionette_core::config::SolverSettings;
use marionette_core::types::SolveMode;
use marionette_math::prelude::*;
use marionette_rig::prelude::*;
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::rotation::{WEIGHT_EPSILON, blend_rotation};

/// Which shape the head stage takes this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadSolveMode {
    /// No positional demand; only the head rotation effector may apply.
    Neutral,
    /// The head effector position aims the neck; eyes stay passive.
    HeadPositionDriven,
    /// The eyes effector steers neck, head, and eyeballs in sequence.
    EyeTracking,
}

impl HeadSolveMode {
    #[must_use]
    pub fn classify(head_position_weight: f32, eyes_position_weight: f32) -> Self {
        if head_position_weight <= WEIGHT_EPSILON && eyes_position_weight <= WEIGHT_EPSILON {
            Self::Neutral
        } else if eyes_position_weight <= WEIGHT_EPSILON {
            Self::HeadPositionDriven
        } else {
            Self::EyeTracking
        }
    }
}

/// Head-to-eye rotation offsets captured from the bind pose.
#[derive(Clone, Copy)]
pub struct EyeOffsets {
    pub head_to_left: UnitQuaternion<f32>,
    pub head_to_right: UnitQuaternion<f32>,
}

impl Default for EyeOffsets {
    fn default() -> Self {
        Self {
            head_to_left: UnitQuaternion::identity(),
            head_to_right: UnitQuaternion::identity(),
        }
    }
}

/// Everything an eye strategy needs from the solved neck and head.
pub struct EyeContext {
    pub neck_basis: Matrix3<f32>,
    pub head_basis: Matrix3<f32>,
    pub head_base_basis: Matrix3<f32>,
    pub head_prev: UnitQuaternion<f32>,
    pub left_prev: UnitQuaternion<f32>,
    pub right_prev: UnitQuaternion<f32>,
    pub reset: bool,
    pub weight: f32,
}

/// Strategy for the eyeballs once neck and head are solved.
///
/// The built-in strategy aims each eye at the eyes effector; external
/// drivers replace it to place the eyes from their own data.
pub trait EyeSolver {
    /// Runs after the rig is prepared or re-measured. May adjust the
    /// captured head-to-eye offsets.
    fn prepare(&mut self, _skeleton: &Skeleton, _offsets: &mut EyeOffsets) {}

    fn solve(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        settings: &SolverSettings,
        context: &EyeContext,
    );

    /// Returns the eyes to their bind alignment under the current head.
    fn reset(&mut self, skeleton: &mut Skeleton, pose: &SkeletonPose, offsets: &EyeOffsets);
}

/// Aims both eyes at the eyes effector inside their yaw/pitch cone, with
/// the leading eye turning slower than the trailing one.
#[derive(Default)]
pub struct BuiltinEyes;

impl EyeSolver for BuiltinEyes {
    fn solve(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        settings: &SolverSettings,
        context: &EyeContext,
    ) {
        if !skeleton.bone(BoneLocation::Head).present {
            return;
        }
        let left_present = skeleton.bone(BoneLocation::Eye(Side::Left)).present;
        let right_present = skeleton.bone(BoneLocation::Eye(Side::Right)).present;
        if !left_present && !right_present {
            return;
        }
        let angles = skeleton.constants().head;

        let neck_position = skeleton.world_position(BoneLocation::Neck, pose);
        let neck_default = skeleton.bone(BoneLocation::Neck).default_position;
        let head_default = skeleton.bone(BoneLocation::Head).default_position;
        let head_position = reproject_point(
            &context.neck_basis,
            &head_default,
            &neck_default,
            &neck_position,
        );
        let eyes_default = skeleton.effector(EffectorLocation::Eyes).default_position;
        let eyes_position = reproject_point(
            &context.head_basis,
            &eyes_default,
            &head_default,
            &head_position,
        );

        let target = skeleton.effector_mut(EffectorLocation::Eyes).world_position();
        let mut eyes_dir = context.head_base_basis.transpose() * (target - eyes_position);
        safe_normalize(&mut eyes_dir);

        if context.reset && context.weight < 1.0 - WEIGHT_EPSILON {
            let mut damped = Vector3::z().lerp(&eyes_dir, context.weight);
            if safe_normalize(&mut damped) {
                eyes_dir = damped;
            }
        }

        limit_square_xy(
            &mut eyes_dir,
            angles.eyes_yaw.sin,
            angles.eyes_yaw.sin,
            angles.eyes_pitch.sin,
            angles.eyes_pitch.sin,
        );

        eyes_dir.x *= settings.head.eyes_yaw_rate;
        eyes_dir.y *= settings.head.eyes_pitch_rate;
        let mut left_dir = eyes_dir;
        let mut right_dir = eyes_dir;
        if eyes_dir.x >= 0.0 {
            left_dir.x *= settings.head.eyes_yaw_inner_rate;
            right_dir.x *= settings.head.eyes_yaw_outer_rate;
        } else {
            left_dir.x *= settings.head.eyes_yaw_outer_rate;
            right_dir.x *= settings.head.eyes_yaw_inner_rate;
        }
        safe_normalize(&mut left_dir);
        safe_normalize(&mut right_dir);

        let head_world = skeleton.world_rotation(BoneLocation::Head, pose);
        let x_hint = context.head_basis.column(0).into_owned();
        let pairs = [
            (Side::Left, left_dir, context.left_prev),
            (Side::Right, right_dir, context.right_prev),
        ];
        for (side, local_dir, prev) in pairs {
            let loc = BoneLocation::Eye(side);
            if !skeleton.bone(loc).present {
                continue;
            }
            let world_dir = context.head_base_basis * local_dir;
            let Some(basis) = basis_lock_z_from_x(&x_hint, &world_dir) else {
                continue;
            };
            let rotation = skeleton.bone(loc).world_rotation_from_base_basis(&basis);
            let rotation = if !context.reset && context.weight < 1.0 - WEIGHT_EPSILON {
                let from = head_world * context.head_prev.inverse() * prev;
                blend_rotation(&from, &rotation, context.weight)
            } else {
                rotation
            };
            skeleton.set_world_rotation(loc, rotation);
        }
    }

    fn reset(&mut self, skeleton: &mut Skeleton, pose: &SkeletonPose, offsets: &EyeOffsets) {
        if !skeleton.bone(BoneLocation::Head).present {
            return;
        }
        let head_world = skeleton.world_rotation(BoneLocation::Head, pose);
        if skeleton.bone(BoneLocation::Eye(Side::Left)).present {
            skeleton.set_world_rotation(
                BoneLocation::Eye(Side::Left),
                head_world * offsets.head_to_left,
            );
        }
        if skeleton.bone(BoneLocation::Eye(Side::Right)).present {
            skeleton.set_world_rotation(
                BoneLocation::Eye(Side::Right),
                head_world * offsets.head_to_right,
            );
        }
    }
}

/// Solves neck, head, and eyes after the torso pass.
pub struct HeadSolver {
    eyes: Box<dyn EyeSolver>,
    offsets: EyeOffsets,
    effector_to_bone: UnitQuaternion<f32>,
}

impl HeadSolver {
    #[must_use]
    pub fn new(eyes: Box<dyn EyeSolver>) -> Self {
        Self {
            eyes,
            offsets: EyeOffsets::default(),
            effector_to_bone: UnitQuaternion::identity(),
        }
    }

    /// Captures the effector and eye offsets from the bind pose. Rerun
    /// whenever displacement sync re-measures the rig.
    pub fn prepare(&mut self, skeleton: &Skeleton) {
        let head = skeleton.bone(BoneLocation::Head);
        self.effector_to_bone = skeleton
            .effector(EffectorLocation::Head)
            .default_rotation
            .inverse()
            * head.default_rotation;
        let head_inverse = head.default_rotation.inverse();
        self.offsets = EyeOffsets::default();
        let left = skeleton.bone(BoneLocation::Eye(Side::Left));
        if left.present {
            self.offsets.head_to_left = head_inverse * left.default_rotation;
        }
        let right = skeleton.bone(BoneLocation::Eye(Side::Right));
        if right.present {
            self.offsets.head_to_right = head_inverse * right.default_rotation;
        }
        self.eyes.prepare(skeleton, &mut self.offsets);
    }

    pub fn solve(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        mode: SolveMode,
        settings: &SolverSettings,
    ) {
        if !skeleton.bone(BoneLocation::Neck).present || !skeleton.bone(BoneLocation::Head).present
        {
            return;
        }
        let Some(parent_loc) = skeleton.bone(BoneLocation::Neck).live_parent else {
            return;
        };
        let reset = !mode.is_continuous();
        let head_weight = skeleton
            .effector(EffectorLocation::Head)
            .effective_position_weight();
        let eyes_weight = skeleton
            .effector(EffectorLocation::Eyes)
            .effective_position_weight();

        match HeadSolveMode::classify(head_weight, eyes_weight) {
            HeadSolveMode::Neutral => self.solve_neutral(skeleton, pose, reset, parent_loc),
            _ => self.solve_aiming(skeleton, pose, settings, reset, parent_loc),
        }
    }

    fn solve_neutral(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        reset: bool,
        parent_loc: BoneLocation,
    ) {
        let parent_world = skeleton.world_rotation(parent_loc, pose);
        let parent_base = parent_world * skeleton.bone(parent_loc).world_to_base_rotation;
        if reset {
            let neck = parent_base * skeleton.bone(BoneLocation::Neck).base_to_world_rotation;
            skeleton.set_world_rotation(BoneLocation::Neck, neck);
        }
        let rotation_weight = skeleton
            .effector(EffectorLocation::Head)
            .effective_rotation_weight();
        if rotation_weight > WEIGHT_EPSILON {
            let raw = skeleton.effector_mut(EffectorLocation::Head).world_rotation();
            let to = raw * self.effector_to_bone;
            let rotation = if rotation_weight < 1.0 - WEIGHT_EPSILON {
                let from = if reset {
                    parent_base * skeleton.bone(BoneLocation::Head).base_to_world_rotation
                } else {
                    skeleton.world_rotation(BoneLocation::Head, pose)
                };
                blend_rotation(&from, &to, rotation_weight)
            } else {
                to
            };
            skeleton.set_world_rotation(BoneLocation::Head, rotation);
            limit_head_rotation(skeleton, pose);
        } else if reset {
            let head = parent_base * skeleton.bone(BoneLocation::Head).base_to_world_rotation;
            skeleton.set_world_rotation(BoneLocation::Head, head);
        }
        if reset {
            self.eyes.reset(skeleton, pose, &self.offsets);
        }
    }

    fn solve_aiming(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        settings: &SolverSettings,
        reset: bool,
        parent_loc: BoneLocation,
    ) {
        let angles = skeleton.constants().head;
        let head_weight = skeleton
            .effector(EffectorLocation::Head)
            .effective_position_weight();
        let eyes_weight = skeleton
            .effector(EffectorLocation::Eyes)
            .effective_position_weight();

        let parent_world = skeleton.world_rotation(parent_loc, pose);
        let parent_basis =
            quat_to_basis(&(parent_world * skeleton.bone(parent_loc).default_rotation.inverse()));
        let root_basis = skeleton.constants().root_basis;
        let root_basis_inv = skeleton.constants().root_basis_inv;
        let parent_base_basis = parent_basis * root_basis;
        let parent_base_rotation = parent_world * skeleton.bone(parent_loc).world_to_base_rotation;

        let mut neck_prev = UnitQuaternion::identity();
        let mut head_prev = UnitQuaternion::identity();
        let mut left_prev = UnitQuaternion::identity();
        let mut right_prev = UnitQuaternion::identity();
        if !reset {
            neck_prev = skeleton.world_rotation(BoneLocation::Neck, pose);
            head_prev = skeleton.world_rotation(BoneLocation::Head, pose);
            if skeleton.bone(BoneLocation::Eye(Side::Left)).present {
                left_prev = skeleton.world_rotation(BoneLocation::Eye(Side::Left), pose);
            }
            if skeleton.bone(BoneLocation::Eye(Side::Right)).present {
                right_prev = skeleton.world_rotation(BoneLocation::Eye(Side::Right), pose);
            }
        }

        // Neck aims its column at the head effector position.
        if head_weight > WEIGHT_EPSILON {
            let neck_bone_basis = parent_basis * skeleton.bone(BoneLocation::Neck).local_axis_basis;
            let neck_position = skeleton.world_position(BoneLocation::Neck, pose);
            let mut y_dir =
                skeleton.effector_mut(EffectorLocation::Head).world_position() - neck_position;
            if safe_normalize(&mut y_dir) {
                let mut local_dir = neck_bone_basis.transpose() * y_dir;
                if limit_square_xz(
                    &mut local_dir,
                    angles.neck_roll.sin,
                    angles.neck_roll.sin,
                    angles.neck_pitch_down.sin,
                    angles.neck_pitch_up.sin,
                ) {
                    y_dir = neck_bone_basis * local_dir;
                }
                let x_hint = parent_base_basis.column(0).into_owned();
                if let Some(basis) = basis_lock_y(&x_hint, &y_dir) {
                    let aimed = skeleton
                        .bone(BoneLocation::Neck)
                        .world_rotation_from_axis_basis(&basis);
                    let rotation = if head_weight < 1.0 - WEIGHT_EPSILON {
                        let from = if reset {
                            parent_base_rotation
                                * skeleton.bone(BoneLocation::Neck).base_to_world_rotation
                        } else {
                            neck_prev
                        };
                        blend_rotation(&from, &aimed, head_weight)
                    } else {
                        aimed
                    };
                    skeleton.set_world_rotation(BoneLocation::Neck, rotation);
                }
            }
        } else if reset {
            let neck = parent_base_rotation * skeleton.bone(BoneLocation::Neck).base_to_world_rotation;
            skeleton.set_world_rotation(BoneLocation::Neck, neck);
        }

        if eyes_weight <= WEIGHT_EPSILON {
            let rotation_weight = skeleton
                .effector(EffectorLocation::Head)
                .effective_rotation_weight();
            if rotation_weight > WEIGHT_EPSILON {
                let raw = skeleton.effector_mut(EffectorLocation::Head).world_rotation();
                let to = raw * self.effector_to_bone;
                let rotation = if rotation_weight < 1.0 - WEIGHT_EPSILON {
                    let neck_world = skeleton.world_rotation(BoneLocation::Neck, pose);
                    let from = if reset {
                        neck_world
                            * skeleton.bone(BoneLocation::Neck).world_to_base_rotation
                            * skeleton.bone(BoneLocation::Head).base_to_world_rotation
                    } else {
                        neck_world * neck_prev.inverse() * head_prev
                    };
                    blend_rotation(&from, &to, rotation_weight)
                } else {
                    to
                };
                skeleton.set_world_rotation(BoneLocation::Head, rotation);
            } else if reset {
                let neck_world = skeleton.world_rotation(BoneLocation::Neck, pose);
                let head = neck_world
                    * skeleton.bone(BoneLocation::Neck).world_to_base_rotation
                    * skeleton.bone(BoneLocation::Head).base_to_world_rotation;
                skeleton.set_world_rotation(BoneLocation::Head, head);
            }
            limit_head_rotation(skeleton, pose);
            if reset {
                self.eyes.reset(skeleton, pose, &self.offsets);
            }
            return;
        }

        // Gaze walks through neck and head, each taking its share.
        let parent_position = skeleton.world_position(parent_loc, pose);
        let parent_default_position = skeleton.bone(parent_loc).default_position;
        let eyes_effector_default = skeleton.effector(EffectorLocation::Eyes).default_position;
        let eyes_target = skeleton.effector_mut(EffectorLocation::Eyes).world_position();

        let eyes_position = reproject_point(
            &parent_basis,
            &eyes_effector_default,
            &parent_default_position,
            &parent_position,
        );
        let eyes_dir = eyes_target - eyes_position;

        let mut neck_base_basis = parent_base_basis;
        {
            let mut local_dir = parent_base_basis.transpose() * eyes_dir;
            local_dir.y *= settings.head.eyes_to_neck_pitch_rate;
            safe_normalize(&mut local_dir);
            if clamp_to_trace_cone(
                &mut local_dir,
                angles.eyes_trace_half.cos,
                angles.eyes_trace_half.sin,
            ) {
                // In range the neck contributes pitch only.
                local_dir.y = local_dir
                    .y
                    .clamp(-angles.neck_pitch_down.sin, angles.neck_pitch_up.sin);
                local_dir.x = 0.0;
                local_dir.z = (1.0 - local_dir.y * local_dir.y).sqrt();
            }
            let aimed_dir = parent_base_basis * local_dir;
            let x_hint = parent_base_basis.column(0).into_owned();
            if let Some(basis) = basis_lock_z_from_x(&x_hint, &aimed_dir) {
                neck_base_basis = basis;
            }
            let aimed = skeleton
                .bone(BoneLocation::Neck)
                .world_rotation_from_base_basis(&neck_base_basis);
            if eyes_weight < 1.0 - WEIGHT_EPSILON {
                let current = skeleton.world_rotation(BoneLocation::Neck, pose);
                let rotation = blend_rotation(&current, &aimed, eyes_weight);
                skeleton.set_world_rotation(BoneLocation::Neck, rotation);
                neck_base_basis = quat_to_basis(
                    &(rotation * skeleton.bone(BoneLocation::Neck).world_to_base_rotation),
                );
            } else {
                skeleton.set_world_rotation(BoneLocation::Neck, aimed);
            }
        }

        let neck_basis = neck_base_basis * root_basis_inv;
        let neck_position = skeleton.world_position(BoneLocation::Neck, pose);
        let neck_default_position = skeleton.bone(BoneLocation::Neck).default_position;
        let eyes_position = reproject_point(
            &neck_basis,
            &eyes_effector_default,
            &neck_default_position,
            &neck_position,
        );
        let eyes_dir = eyes_target - eyes_position;

        let mut head_base_basis = neck_base_basis;
        {
            let mut local_dir = neck_base_basis.transpose() * eyes_dir;
            local_dir.x *= settings.head.eyes_to_head_yaw_rate;
            local_dir.y *= settings.head.eyes_to_head_pitch_rate;
            safe_normalize(&mut local_dir);
            if clamp_to_trace_cone(
                &mut local_dir,
                angles.eyes_trace_half.cos,
                angles.eyes_trace_half.sin,
            ) {
                limit_square_xy(
                    &mut local_dir,
                    angles.head_yaw.sin,
                    angles.head_yaw.sin,
                    angles.head_pitch_down.sin,
                    angles.head_pitch_up.sin,
                );
            }
            let aimed_dir = neck_base_basis * local_dir;
            let x_hint = neck_base_basis.column(0).into_owned();
            if let Some(basis) = basis_lock_z_from_x(&x_hint, &aimed_dir) {
                head_base_basis = basis;
            }
            let aimed = skeleton
                .bone(BoneLocation::Head)
                .world_rotation_from_base_basis(&head_base_basis);
            if eyes_weight < 1.0 - WEIGHT_EPSILON {
                let neck_world = skeleton.world_rotation(BoneLocation::Neck, pose);
                let from = neck_world * neck_prev.inverse() * head_prev;
                let rotation = blend_rotation(&from, &aimed, eyes_weight);
                skeleton.set_world_rotation(BoneLocation::Head, rotation);
                head_base_basis = quat_to_basis(
                    &(rotation * skeleton.bone(BoneLocation::Head).world_to_base_rotation),
                );
            } else {
                skeleton.set_world_rotation(BoneLocation::Head, aimed);
            }
        }

        let head_basis = head_base_basis * root_basis_inv;
        let context = EyeContext {
            neck_basis,
            head_basis,
            head_base_basis,
            head_prev,
            left_prev,
            right_prev,
            reset,
            weight: eyes_weight,
        };
        self.eyes.solve(skeleton, pose, settings, &context);
    }
}

/// Clamps the head's base orientation relative to the neck into the yaw,
/// pitch, and roll cones.
fn limit_head_rotation(skeleton: &mut Skeleton, pose: &SkeletonPose) {
    let angles = skeleton.constants().head;
    let head_base = skeleton.world_rotation(BoneLocation::Head, pose)
        * skeleton.bone(BoneLocation::Head).world_to_base_rotation;
    let neck_base = skeleton.world_rotation(BoneLocation::Neck, pose)
        * skeleton.bone(BoneLocation::Neck).world_to_base_rotation;
    let local = neck_base.inverse() * head_base;
    let basis = quat_to_basis(&local);
    let mut dir_y = basis.column(1).into_owned();
    let mut dir_z = basis.column(2).into_owned();
    let mut limited = limit_square_xz(
        &mut dir_y,
        angles.head_roll.sin,
        angles.head_roll.sin,
        angles.head_pitch_up.sin,
        angles.head_pitch_down.sin,
    );
    limited |= limit_square_xy(
        &mut dir_z,
        angles.head_yaw.sin,
        angles.head_yaw.sin,
        angles.head_pitch_down.sin,
        angles.head_pitch_up.sin,
    );
    if limited {
        if let Some(fixed) = basis_lock_z_from_y(&dir_y, &dir_z) {
            let rotation = neck_base
                * basis_to_quat(&fixed)
                * skeleton.bone(BoneLocation::Head).base_to_world_rotation;
            skeleton.set_world_rotation(BoneLocation::Head, rotation);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
