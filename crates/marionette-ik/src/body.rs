//! Torso solving: hips placement, spine chain aim, and shoulder assists.
//!
//! The lower stage translates the hips toward the hips effector. The upper
//! stage gathers demand from the head and eyes effectors plus the arm and
//! wrist pulls, splits it between a center-leg translate and a spine
//! translate, then re-aims the hips and every spine link around a shared
//! lateral axis with square-cone limits, and finally recenters the chest on
//! its target with a post translate. The shoulder stage redirects each
//! clavicle toward its arm effector inside a lateral cone, feeding the
//! moved arm root to the limb pass.

use marionette_core::config::{BodySettings, SolverSettings};
use marionette_core::types::SolveMode;
use marionette_math::prelude::*;
use marionette_rig::prelude::*;
use nalgebra::Vector3;

use crate::rotation::{WEIGHT_EPSILON, blend_rotation};

const SPINE_CHAIN: [BoneLocation; 4] = [
    BoneLocation::Spine,
    BoneLocation::Spine2,
    BoneLocation::Spine3,
    BoneLocation::Spine4,
];

fn spine_link_enabled(body: &BodySettings, loc: BoneLocation) -> bool {
    match loc {
        BoneLocation::Spine => body.upper_solve_spine_enabled,
        BoneLocation::Spine2 => body.upper_solve_spine2_enabled,
        BoneLocation::Spine3 => body.upper_solve_spine3_enabled,
        BoneLocation::Spine4 => body.upper_solve_spine4_enabled,
        _ => false,
    }
}

/// Solves the torso before the limbs run.
///
/// Stateful across frames: the lateral-axis blend coefficient and the
/// continuous-mode stabilizers carry over so an unchanged demand settles
/// instead of oscillating.
pub struct BodySolver {
    dir_x_blend: Option<f32>,
    previous_center_translate: Vector3<f32>,
    previous_post_translate: Vector3<f32>,
    previous_center_dir_y: Option<Vector3<f32>>,
}

impl BodySolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir_x_blend: None,
            previous_center_translate: Vector3::zeros(),
            previous_post_translate: Vector3::zeros(),
            previous_center_dir_y: None,
        }
    }

    pub fn solve(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        mode: SolveMode,
        settings: &SolverSettings,
    ) {
        let hips_delta = solve_lower(skeleton, pose, settings);
        self.solve_upper(skeleton, pose, mode, settings, hips_delta);
        apply_hips_rotation_target(skeleton, pose);
        if settings.body.shoulder_solve_enabled {
            for side in Side::BOTH {
                solve_shoulder(skeleton, pose, settings, side);
            }
        }
    }

    fn solve_upper(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        mode: SolveMode,
        settings: &SolverSettings,
        hips_delta: Vector3<f32>,
    ) {
        let body = &settings.body;
        if !body.upper_solve_enabled || !skeleton.bone(BoneLocation::Neck).present {
            return;
        }
        let chain: Vec<BoneLocation> = SPINE_CHAIN
            .into_iter()
            .filter(|loc| skeleton.bone(*loc).present)
            .collect();
        let angles = skeleton.constants().body;

        // Character frame from the hips pose before this stage rotates it.
        let hips_rotation = skeleton.world_rotation(BoneLocation::Hips, pose);
        let char_basis = quat_to_basis(
            &(hips_rotation * skeleton.bone(BoneLocation::Hips).world_to_base_rotation),
        );
        let char_inv = char_basis.transpose();

        let hips_position = skeleton.world_position(BoneLocation::Hips, pose);
        let neck_follow = skeleton.world_position(BoneLocation::Neck, pose)
            + hips_delta * body.upper_body_movingfix_rate;
        let left_leg = leg_anchor(skeleton, pose, Side::Left, hips_position);
        let right_leg = leg_anchor(skeleton, pose, Side::Right, hips_position);
        let center_leg = (left_leg + right_leg) * 0.5 + hips_delta;

        let head_weight = skeleton
            .effector(EffectorLocation::Head)
            .effective_position_weight();
        let eyes_weight = skeleton
            .effector(EffectorLocation::Eyes)
            .effective_position_weight();

        let mut head_demand = Vector3::zeros();
        if head_weight > WEIGHT_EPSILON {
            let follow = skeleton.bone_world_position(EffectorLocation::Head, pose)
                + hips_delta * body.upper_head_movingfix_rate;
            let target = skeleton.effector_mut(EffectorLocation::Head).world_position();
            head_demand = (target - follow) * head_weight;
        }

        // The eyes demand is the chest displacement that would swing the
        // neck-forward axis onto the clamped gaze direction.
        let mut eyes_demand = Vector3::zeros();
        if eyes_weight > WEIGHT_EPSILON {
            let target = skeleton.effector_mut(EffectorLocation::Eyes).world_position();
            let mut aim = char_inv * (target - neck_follow);
            if safe_normalize(&mut aim) {
                aim.x *= body.upper_eyes_yaw_rate;
                aim.y *= if aim.y >= 0.0 {
                    body.upper_eyes_pitch_up_rate
                } else {
                    body.upper_eyes_pitch_down_rate
                };
                if safe_normalize(&mut aim) {
                    if clamp_to_trace_cone(
                        &mut aim,
                        angles.upper_eyes_trace_half.cos,
                        angles.upper_eyes_trace_half.sin,
                    ) {
                        limit_square_xy(
                            &mut aim,
                            angles.upper_eyes_yaw.sin,
                            angles.upper_eyes_yaw.sin,
                            angles.upper_eyes_pitch_down.sin,
                            angles.upper_eyes_pitch_up.sin,
                        );
                    }
                    let chest_length = (skeleton.bone(BoneLocation::Neck).default_position
                        - default_center_leg(skeleton))
                    .norm();
                    eyes_demand = (char_basis * (aim - Vector3::z())) * chest_length * eyes_weight;
                }
            }
        }

        let mut pull_sum = Vector3::zeros();
        let mut pull_count = 0.0_f32;
        for side in Side::BOTH {
            for loc in [EffectorLocation::Wrist(side), EffectorLocation::Arm(side)] {
                let strength = skeleton.effector(loc).effective_pull()
                    * skeleton.effector(loc).effective_position_weight();
                if strength <= WEIGHT_EPSILON {
                    continue;
                }
                let follow = skeleton.bone_world_position(loc, pose)
                    + hips_delta * body.upper_body_movingfix_rate;
                let target = skeleton.effector_mut(loc).world_position();
                pull_sum += (target - follow) * strength;
                pull_count += 1.0;
            }
        }

        let has_demand =
            head_weight > WEIGHT_EPSILON || eyes_weight > WEIGHT_EPSILON || pull_count > 0.0;
        if !body.force_solve_enabled && !has_demand {
            return;
        }

        let pull_average = if pull_count > 0.0 {
            pull_sum / pull_count
        } else {
            Vector3::zeros()
        };
        let center_raw = (head_demand * body.upper_neck_to_center_leg_rate
            + eyes_demand * body.upper_eyes_to_center_leg_rate)
            * body.upper_center_leg_translate_rate;
        let center_translate = if mode.is_continuous() {
            let mut value = center_raw.lerp(
                &self.previous_center_translate,
                body.upper_continuous_pre_translate_stable_rate,
            );
            value += (center_raw - value) * body.upper_continuous_pre_translate_rate;
            value
        } else {
            center_raw
        };
        self.previous_center_translate = center_translate;

        let spine_translate = (head_demand * body.upper_neck_to_spine_rate
            + eyes_demand * body.upper_eyes_to_spine_rate
            + pull_average)
            * body.upper_spine_translate_rate;

        let hips_target = hips_position + center_translate;
        let center_new = center_leg + center_translate;
        let neck_now = neck_follow + center_translate;
        let neck_target = neck_now + spine_translate;

        // Lateral axis: leg line blended toward the shoulder line by a
        // coefficient that settles toward its target rate over the frames.
        let legs_lateral = normalized_or(right_leg - left_leg, char_basis.column(0).into_owned());
        let shoulders_lateral = arm_lateral(skeleton, pose).unwrap_or(legs_lateral);
        let coefficient = self
            .dir_x_blend
            .get_or_insert(body.spine_dir_x_leg_to_arm_rate);
        *coefficient +=
            (body.spine_dir_x_leg_to_arm_to_rate - *coefficient) * body.spine_dir_x_leg_to_arm_rate;
        let blend = *coefficient;
        let mut dir_x = lerp_dir(&legs_lateral, &shoulders_lateral, blend).unwrap_or(legs_lateral);
        if body.upper_dir_x_limit_enabled {
            let mut local = char_inv * dir_x;
            if clamp_lateral_tilt(&mut local, angles.upper_dir_x_limit_y.sin) {
                dir_x = char_basis * local;
            }
        }

        let dir_y_current = normalized_or(neck_now - center_new, char_basis.column(1).into_owned());
        let dir_y_goal_raw = normalized_or(neck_target - center_new, dir_y_current);
        let dir_y_rate = if mode.is_continuous() {
            body.upper_continuous_spine_dir_y_lerp_rate
        } else {
            body.spine_dir_y_lerp_rate
        };
        let dir_y_goal =
            lerp_dir(&dir_y_current, &dir_y_goal_raw, dir_y_rate).unwrap_or(dir_y_current);

        let center_fraction =
            (body.upper_center_leg_rotate_rate * body.upper_center_leg_lerp_rate).clamp(0.0, 1.0);
        let mut dir_y_hips =
            lerp_dir(&dir_y_current, &dir_y_goal, center_fraction).unwrap_or(dir_y_current);
        if mode.is_continuous() && body.upper_continuous_center_leg_rotation_stable_rate > 0.0 {
            if let Some(previous) = self.previous_center_dir_y {
                dir_y_hips = lerp_dir(
                    &dir_y_hips,
                    &previous,
                    body.upper_continuous_center_leg_rotation_stable_rate,
                )
                .unwrap_or(dir_y_hips);
            }
        }
        self.previous_center_dir_y = Some(dir_y_hips);

        let hips_default_rotation = skeleton.bone(BoneLocation::Hips).default_rotation;
        let mut hips_rotation_new = hips_rotation;
        let mut hips_base_basis = char_basis;
        if body.upper_solve_hips_enabled {
            if let Some(basis) = basis_lock_y(&dir_x, &dir_y_hips) {
                hips_rotation_new = skeleton
                    .bone(BoneLocation::Hips)
                    .world_rotation_from_base_basis(&basis);
                hips_base_basis = basis;
                skeleton.set_world_rotation(BoneLocation::Hips, hips_rotation_new);
            }
        }

        // Each spine link aims a little further toward the goal than its
        // parent, positions rebuilt by forward kinematics from the hips.
        let mut placed: Vec<(BoneLocation, Vector3<f32>)> = Vec::with_capacity(6);
        placed.push((BoneLocation::Hips, hips_target));
        let mut parent_loc = BoneLocation::Hips;
        let mut parent_position = hips_target;
        let mut parent_delta = hips_rotation_new * hips_default_rotation.inverse();
        let mut reference_basis = hips_base_basis;
        let count = chain.len() as f32;
        for (index, loc) in chain.iter().copied().enumerate() {
            let fraction = ((center_fraction
                + (1.0 - center_fraction)
                    * body.upper_spine_rotate_rate
                    * ((index + 1) as f32 / count))
                * body.upper_spine_lerp_rate)
                .clamp(0.0, 1.0);
            let mut dir_y_link =
                lerp_dir(&dir_y_current, &dir_y_goal, fraction).unwrap_or(dir_y_current);
            if body.spine_limit_enabled {
                let limit_basis = if body.spine_accurate_limit_enabled {
                    reference_basis
                } else {
                    hips_base_basis
                };
                let mut local = limit_basis.transpose() * dir_y_link;
                if limit_square_xz(
                    &mut local,
                    angles.spine_y.sin,
                    angles.spine_y.sin,
                    angles.spine_x.sin,
                    angles.spine_x.sin,
                ) {
                    dir_y_link = limit_basis * local;
                }
            }

            let default_position = skeleton.bone(loc).default_position;
            let parent_default_position = skeleton.bone(parent_loc).default_position;
            let position = reproject_point(
                &quat_to_basis(&parent_delta),
                &default_position,
                &parent_default_position,
                &parent_position,
            );
            skeleton.set_world_position(loc, position);
            placed.push((loc, position));

            let mut rotation_new = skeleton.world_rotation(loc, pose);
            if spine_link_enabled(body, loc) {
                if let Some(basis) = basis_lock_y(&dir_x, &dir_y_link) {
                    rotation_new = skeleton.bone(loc).world_rotation_from_base_basis(&basis);
                    skeleton.set_world_rotation(loc, rotation_new);
                    reference_basis = basis;
                }
            }

            parent_delta = rotation_new * skeleton.bone(loc).default_rotation.inverse();
            parent_loc = loc;
            parent_position = position;
        }

        // Neck rides the last solved link.
        let neck_default_position = skeleton.bone(BoneLocation::Neck).default_position;
        let parent_default_position = skeleton.bone(parent_loc).default_position;
        let neck_position = reproject_point(
            &quat_to_basis(&parent_delta),
            &neck_default_position,
            &parent_default_position,
            &parent_position,
        );
        placed.push((BoneLocation::Neck, neck_position));

        let mut post = (neck_target - neck_position) * body.upper_post_translate_rate;
        if mode.is_continuous() {
            post = post.lerp(
                &self.previous_post_translate,
                body.upper_continuous_post_translate_stable_rate,
            );
        }
        self.previous_post_translate = post;
        for (loc, position) in placed {
            skeleton.set_world_position(loc, position + post);
        }
    }
}

impl Default for BodySolver {
    fn default() -> Self {
        Self::new()
    }
}

fn solve_lower(
    skeleton: &mut Skeleton,
    pose: &SkeletonPose,
    settings: &SolverSettings,
) -> Vector3<f32> {
    if !settings.body.lower_solve_enabled {
        return Vector3::zeros();
    }
    let weight = skeleton
        .effector(EffectorLocation::Hips)
        .effective_position_weight();
    if weight <= WEIGHT_EPSILON {
        return Vector3::zeros();
    }
    let pull = skeleton.effector(EffectorLocation::Hips).effective_pull();
    let live = skeleton.world_position(BoneLocation::Hips, pose);
    let raw = skeleton.effector_mut(EffectorLocation::Hips).world_position();
    let target = live.lerp(&raw, pull);
    let position = live.lerp(&target, weight);
    skeleton.set_world_position(BoneLocation::Hips, position);
    position - live
}

/// Applied after the upper chain so an explicit hips rotation target wins
/// over the solved aim.
fn apply_hips_rotation_target(skeleton: &mut Skeleton, pose: &SkeletonPose) {
    let weight = skeleton
        .effector(EffectorLocation::Hips)
        .effective_rotation_weight();
    if weight <= WEIGHT_EPSILON {
        return;
    }
    let bone_default = skeleton.bone(BoneLocation::Hips).default_rotation;
    let effector_default = skeleton.effector(EffectorLocation::Hips).default_rotation;
    let raw = skeleton.effector_mut(EffectorLocation::Hips).world_rotation();
    let to = raw * (effector_default.inverse() * bone_default);
    let from = skeleton.world_rotation(BoneLocation::Hips, pose);
    skeleton.set_world_rotation(BoneLocation::Hips, blend_rotation(&from, &to, weight));
}

fn solve_shoulder(
    skeleton: &mut Skeleton,
    pose: &SkeletonPose,
    settings: &SolverSettings,
    side: Side,
) {
    let shoulder_loc = BoneLocation::Shoulder(side);
    let arm_loc = BoneLocation::Arm(side);
    if !skeleton.bone(shoulder_loc).present || !skeleton.bone(arm_loc).present {
        return;
    }
    let effector_loc = EffectorLocation::Arm(side);
    let strength = skeleton.effector(effector_loc).effective_pull()
        * skeleton.effector(effector_loc).effective_position_weight();
    if strength <= WEIGHT_EPSILON {
        return;
    }
    let Some(parent_loc) = skeleton.bone(shoulder_loc).live_parent else {
        return;
    };

    let parent_rotation = skeleton.world_rotation(parent_loc, pose);
    let parent_position = skeleton.world_position(parent_loc, pose);
    let parent_default_position = skeleton.bone(parent_loc).default_position;
    let delta = parent_rotation * skeleton.bone(parent_loc).default_rotation.inverse();
    let delta_basis = quat_to_basis(&delta);

    let shoulder_default_position = skeleton.bone(shoulder_loc).default_position;
    let arm_default_position = skeleton.bone(arm_loc).default_position;
    let shoulder_position = reproject_point(
        &delta_basis,
        &shoulder_default_position,
        &parent_default_position,
        &parent_position,
    );
    let arm_follow = reproject_point(
        &delta_basis,
        &arm_default_position,
        &parent_default_position,
        &parent_position,
    );

    let mut dir_current = arm_follow - shoulder_position;
    if !safe_normalize(&mut dir_current) {
        return;
    }
    let target = skeleton.effector_mut(effector_loc).world_position();
    let mut dir_target = target - shoulder_position;
    if !safe_normalize(&mut dir_target) {
        return;
    }
    let bending = (strength * settings.body.shoulder_solve_bending_rate).clamp(0.0, 1.0);
    let mut dir_new = lerp_dir(&dir_current, &dir_target, bending).unwrap_or(dir_current);

    let reference = delta_basis * skeleton.bone(shoulder_loc).local_axis_basis;
    if settings.body.shoulder_limit_enabled {
        let angles = skeleton.constants().body;
        // Outward along the clavicle is the cone axis for either side.
        let sign = side.sign();
        let local = reference.transpose() * dir_new;
        let mut cone = Vector3::new(local.y, local.z, local.x * sign);
        limit_square_xy(
            &mut cone,
            angles.shoulder_y_minus.sin,
            angles.shoulder_y_plus.sin,
            angles.shoulder_z.sin,
            angles.shoulder_z.sin,
        );
        dir_new = reference * Vector3::new(cone.z * sign, cone.x, cone.y);
    }

    if let Some(hint) = skeleton.bone(shoulder_loc).axis_hint {
        if let Some(basis) = compute_basis_from(&reference, &dir_new, hint) {
            let rotation = skeleton
                .bone(shoulder_loc)
                .world_rotation_from_axis_basis(&basis);
            skeleton.set_world_rotation(shoulder_loc, rotation);
        }
    }
    skeleton.set_world_position(shoulder_loc, shoulder_position);

    // The limb pass picks the arm root up from here.
    let reach = (arm_default_position - shoulder_default_position).norm();
    skeleton.set_world_position(arm_loc, shoulder_position + dir_new * reach);
}

fn leg_anchor(
    skeleton: &mut Skeleton,
    pose: &SkeletonPose,
    side: Side,
    fallback: Vector3<f32>,
) -> Vector3<f32> {
    let loc = BoneLocation::Leg(side);
    if skeleton.bone(loc).present {
        skeleton.world_position(loc, pose)
    } else {
        fallback
    }
}

fn default_center_leg(skeleton: &Skeleton) -> Vector3<f32> {
    let left = skeleton.bone(BoneLocation::Leg(Side::Left));
    let right = skeleton.bone(BoneLocation::Leg(Side::Right));
    if left.present && right.present {
        (left.default_position + right.default_position) * 0.5
    } else {
        skeleton.bone(BoneLocation::Hips).default_position
    }
}

fn arm_lateral(skeleton: &mut Skeleton, pose: &SkeletonPose) -> Option<Vector3<f32>> {
    if !skeleton.bone(BoneLocation::Arm(Side::Left)).present
        || !skeleton.bone(BoneLocation::Arm(Side::Right)).present
    {
        return None;
    }
    let left = skeleton.world_position(BoneLocation::Arm(Side::Left), pose);
    let right = skeleton.world_position(BoneLocation::Arm(Side::Right), pose);
    let mut lateral = right - left;
    safe_normalize(&mut lateral).then_some(lateral)
}

/// Clamp the Y component of a lateral axis, rescaling the XZ bearing to
/// keep unit length. Returns whether clamping occurred.
fn clamp_lateral_tilt(local: &mut Vector3<f32>, sin_limit: f32) -> bool {
    if local.y.abs() <= sin_limit {
        return false;
    }
    let flat = (local.x * local.x + local.z * local.z).sqrt();
    let rest = (1.0 - sin_limit * sin_limit).sqrt();
    if flat > VECTOR_EPSILON {
        local.x *= rest / flat;
        local.z *= rest / flat;
    } else {
        local.x = rest;
        local.z = 0.0;
    }
    local.y = sin_limit * local.y.signum();
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marionette_test_utils::canonical_skeleton;
    use nalgebra::UnitQuaternion;

    fn solve_once(skeleton: &mut Skeleton, pose: &SkeletonPose, settings: &SolverSettings) {
        let mut solver = BodySolver::new();
        solver.solve(skeleton, pose, SolveMode::Reset, settings);
    }

    fn zero_limb_pulls(skeleton: &mut Skeleton) {
        for side in Side::BOTH {
            skeleton.effector_mut(EffectorLocation::Wrist(side)).pull = 0.0;
            skeleton.effector_mut(EffectorLocation::Foot(side)).pull = 0.0;
        }
    }

    // ---- lower ----

    #[test]
    fn hips_effector_translates_the_root() {
        let (mut skeleton, pose) = canonical_skeleton();
        let settings = SolverSettings::default();
        zero_limb_pulls(&mut skeleton);
        let target = Vector3::new(0.1, 0.98, 0.0);
        let hips = skeleton.effector_mut(EffectorLocation::Hips);
        hips.position_enabled = true;
        hips.set_target_position(target);
        solve_once(&mut skeleton, &pose, &settings);
        let solved = skeleton.world_position(BoneLocation::Hips, &pose);
        assert_relative_eq!(solved.x, target.x, epsilon = 1.0e-4);
        assert_relative_eq!(solved.y, target.y, epsilon = 1.0e-4);
    }

    #[test]
    fn hips_rotation_target_is_applied() {
        let (mut skeleton, pose) = canonical_skeleton();
        let settings = SolverSettings::default();
        let target = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.5);
        let hips = skeleton.effector_mut(EffectorLocation::Hips);
        hips.rotation_enabled = true;
        hips.set_target_rotation(target);
        solve_once(&mut skeleton, &pose, &settings);
        let solved = skeleton.world_rotation(BoneLocation::Hips, &pose);
        assert!(
            solved.angle_to(&target) < 1.0e-3,
            "hips rotation {solved} should match the target {target}"
        );
    }

    // ---- upper ----

    #[test]
    fn upper_solve_stays_put_without_demand() {
        let (mut skeleton, pose) = canonical_skeleton();
        let settings = SolverSettings::default();
        solve_once(&mut skeleton, &pose, &settings);
        let hips_rotation = skeleton.world_rotation(BoneLocation::Hips, &pose);
        assert!(
            hips_rotation.angle() < 1.0e-3,
            "an undisturbed bind pose should keep identity rotations"
        );
        let hips = skeleton.world_position(BoneLocation::Hips, &pose);
        assert_relative_eq!(hips.y, 0.98, epsilon = 1.0e-3);
        let neck = skeleton.world_position(BoneLocation::Neck, &pose);
        assert_relative_eq!(neck.y, 1.45, epsilon = 1.0e-3);
    }

    #[test]
    fn wrist_pull_bends_the_spine_toward_the_target() {
        let (mut skeleton, pose) = canonical_skeleton();
        let settings = SolverSettings::default();
        skeleton
            .effector_mut(EffectorLocation::Wrist(Side::Left))
            .set_target_position(Vector3::new(-0.2, 1.4, 0.5));
        solve_once(&mut skeleton, &pose, &settings);
        let neck = skeleton.world_position(BoneLocation::Neck, &pose);
        assert!(
            neck.z > 0.05,
            "the chest should lean toward the wrist target, neck z = {}",
            neck.z
        );
        let spine = skeleton.world_rotation(BoneLocation::Spine, &pose);
        assert!(spine.angle() > 0.01, "spine links should re-aim");
    }

    #[test]
    fn disabled_spine_link_keeps_its_source_rotation() {
        let (mut skeleton, pose) = canonical_skeleton();
        let mut settings = SolverSettings::default();
        settings.body.upper_solve_spine2_enabled = false;
        skeleton
            .effector_mut(EffectorLocation::Wrist(Side::Left))
            .set_target_position(Vector3::new(-0.2, 1.4, 0.5));
        solve_once(&mut skeleton, &pose, &settings);
        let spine = skeleton.world_rotation(BoneLocation::Spine, &pose);
        assert!(spine.angle() > 0.01, "the enabled link still re-aims");
        let spine2 = skeleton.world_rotation(BoneLocation::Spine2, &pose);
        assert!(
            spine2.angle() < 1.0e-4,
            "a disabled link keeps its source rotation, angle {}",
            spine2.angle()
        );
    }

    #[test]
    fn spine_limit_bounds_segment_lean() {
        let (mut skeleton, pose) = canonical_skeleton();
        let settings = SolverSettings::default();
        let head = skeleton.effector_mut(EffectorLocation::Head);
        head.position_enabled = true;
        head.set_target_position(Vector3::new(0.0, 1.85, -0.8));
        solve_once(&mut skeleton, &pose, &settings);
        let angles = skeleton.constants().body;
        let hips_rotation = skeleton.world_rotation(BoneLocation::Hips, &pose);
        let hips_base = quat_to_basis(
            &(hips_rotation * skeleton.bone(BoneLocation::Hips).world_to_base_rotation),
        );
        for loc in [BoneLocation::Spine, BoneLocation::Spine2] {
            let rotation = skeleton.world_rotation(loc, &pose);
            let base =
                quat_to_basis(&(rotation * skeleton.bone(loc).world_to_base_rotation));
            let local = hips_base.transpose() * base.column(1).into_owned();
            assert!(
                local.x.abs() <= angles.spine_y.sin + 1.0e-3,
                "{loc:?} lateral lean {} exceeds the limit",
                local.x
            );
            assert!(
                local.z.abs() <= angles.spine_x.sin + 1.0e-3,
                "{loc:?} sagittal lean {} exceeds the limit",
                local.z
            );
        }
    }

    #[test]
    fn continuous_mode_damps_the_first_translate() {
        let head_target = Vector3::new(0.0, 1.55, 0.49);
        let hips_z = |mode: SolveMode| {
            let (mut skeleton, pose) = canonical_skeleton();
            let settings = SolverSettings::default();
            let head = skeleton.effector_mut(EffectorLocation::Head);
            head.position_enabled = true;
            head.set_target_position(head_target);
            let mut solver = BodySolver::new();
            solver.solve(&mut skeleton, &pose, mode, &settings);
            skeleton.world_position(BoneLocation::Hips, &pose).z
        };
        let reset = hips_z(SolveMode::Reset);
        let continuous = hips_z(SolveMode::Continuous);
        assert!(reset > 0.01, "the head demand should drag the hips forward");
        assert!(
            continuous < reset - 1.0e-3,
            "continuous mode should damp the first-frame translate ({continuous} vs {reset})"
        );
    }

    // ---- shoulders ----

    #[test]
    fn shoulder_solve_pulls_the_arm_root() {
        let (mut skeleton, pose) = canonical_skeleton();
        let settings = SolverSettings::default();
        let target = Vector3::new(-0.25, 1.7, 0.1);
        let arm = skeleton.effector_mut(EffectorLocation::Arm(Side::Left));
        arm.position_enabled = true;
        // Arm effectors preset to weight zero; engaging one needs both.
        arm.position_weight = 1.0;
        arm.set_target_position(target);
        let bind_arm = skeleton.bone(BoneLocation::Arm(Side::Left)).default_position;
        solve_once(&mut skeleton, &pose, &settings);
        let solved_arm = skeleton.world_position(BoneLocation::Arm(Side::Left), &pose);
        assert!(
            (solved_arm - target).norm() < (bind_arm - target).norm(),
            "the arm root should move toward the target"
        );
        let shoulder = skeleton.world_rotation(BoneLocation::Shoulder(Side::Left), &pose);
        assert!(shoulder.angle() > 1.0e-3, "the clavicle should re-aim");
    }

    #[test]
    fn shoulder_limit_caps_the_droop() {
        let (mut skeleton, pose) = canonical_skeleton();
        let mut settings = SolverSettings::default();
        settings.body.upper_solve_enabled = false;
        let arm = skeleton.effector_mut(EffectorLocation::Arm(Side::Left));
        arm.position_enabled = true;
        arm.position_weight = 1.0;
        // Far below the clavicle line, deeper than the one-degree droop allows.
        arm.set_target_position(Vector3::new(-0.2, 0.4, 0.0));
        solve_once(&mut skeleton, &pose, &settings);
        let shoulder_position = skeleton.world_position(BoneLocation::Shoulder(Side::Left), &pose);
        let arm_position = skeleton.world_position(BoneLocation::Arm(Side::Left), &pose);
        let solved_dir = (arm_position - shoulder_position).normalize();
        let local = skeleton
            .bone(BoneLocation::Shoulder(Side::Left))
            .local_axis_basis
            .transpose()
            * solved_dir;
        let droop = skeleton.constants().body.shoulder_y_minus.sin;
        assert!(
            local.y >= -droop - 1.0e-3,
            "the clavicle droop {} should stop at the cone edge",
            local.y
        );
    }
}
