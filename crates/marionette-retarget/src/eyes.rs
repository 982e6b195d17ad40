//! Production eye rig for tracked people.
//!
//! Unlike the built-in strategy, which only rotates the eyeballs, this one
//! anchors each eyeball to a measured offset under the head and drives both
//! its rotation and a small lateral slide, the way a camera-tracked face
//! reads: the eyes lead the gaze while the head catches up.

use marionette_core::config::SolverSettings;
use marionette_ik::prelude::{EyeContext, EyeOffsets, EyeSolver};
use marionette_math::prelude::*;
use marionette_rig::prelude::*;
use nalgebra::Vector3;

/// Measured eyeball anchor under the head, in root space. Lateral sign
/// follows the side.
const EYE_LATERAL_OFFSET: f32 = 0.018531;
const EYE_VERTICAL_OFFSET: f32 = 0.048524;
const EYE_FORWARD_OFFSET: f32 = 0.027682;

/// Gaze cone half-angles, tighter vertically than the generic defaults.
const HORIZONTAL_LIMIT_DEGREES: f32 = 40.0;
const VERTICAL_LIMIT_DEGREES: f32 = 4.5;

/// Calibrated response rates for a tracked face.
const GAZE_YAW_RATE: f32 = 0.796;
const GAZE_PITCH_RATE: f32 = 0.28;
const GAZE_YAW_INNER_RATE: f32 = 0.065;
const GAZE_YAW_OUTER_RATE: f32 = 0.096;
/// Lateral eyeball slide per unit of yawed gaze.
const EYEBALL_SHIFT_RATE: f32 = 0.0063;

const WEIGHT_EPSILON: f32 = 1.0e-4;

/// Eye strategy calibrated for tracker-driven characters.
///
/// Use through [`FullBodySolver::with_eye_solver`], which hides the eye
/// bones from the effector defaults and flushes the solved eyeball
/// positions back into the pose.
///
/// [`FullBodySolver::with_eye_solver`]: marionette_ik::FullBodySolver::with_eye_solver
pub struct TrackedEyes {
    horizontal_limit: f32,
    vertical_limit: f32,
    anchors: [Vector3<f32>; 2],
}

impl TrackedEyes {
    #[must_use]
    pub fn new() -> Self {
        Self {
            horizontal_limit: HORIZONTAL_LIMIT_DEGREES.to_radians().sin(),
            vertical_limit: VERTICAL_LIMIT_DEGREES.to_radians().sin(),
            anchors: [Vector3::zeros(); 2],
        }
    }
}

impl Default for TrackedEyes {
    fn default() -> Self {
        Self::new()
    }
}

impl EyeSolver for TrackedEyes {
    fn prepare(&mut self, skeleton: &Skeleton, _offsets: &mut EyeOffsets) {
        let head = skeleton.bone(BoneLocation::Head);
        if !head.present {
            return;
        }
        let root_basis = skeleton.constants().root_basis;
        for side in Side::BOTH {
            let local = Vector3::new(
                EYE_LATERAL_OFFSET * side.sign(),
                EYE_VERTICAL_OFFSET,
                EYE_FORWARD_OFFSET,
            );
            self.anchors[side.index()] = head.default_position + root_basis * local;
        }
    }

    fn solve(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        _settings: &SolverSettings,
        context: &EyeContext,
    ) {
        if !skeleton.bone(BoneLocation::Neck).present || !skeleton.bone(BoneLocation::Head).present
        {
            return;
        }
        let left_present = skeleton.bone(BoneLocation::Eye(Side::Left)).present;
        let right_present = skeleton.bone(BoneLocation::Eye(Side::Right)).present;
        if !left_present && !right_present {
            return;
        }

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

        let mut gaze = context.head_base_basis.transpose() * (target - eyes_position);
        if !safe_normalize(&mut gaze) {
            gaze = Vector3::z();
        }
        if context.weight < 1.0 - WEIGHT_EPSILON {
            let mut damped = Vector3::z().lerp(&gaze, context.weight);
            if safe_normalize(&mut damped) {
                gaze = damped;
            }
        }
        limit_square_xy(
            &mut gaze,
            self.horizontal_limit,
            self.horizontal_limit,
            self.vertical_limit,
            self.vertical_limit,
        );

        let yawed = (gaze.x * GAZE_YAW_RATE).clamp(-self.horizontal_limit, self.horizontal_limit);
        gaze.x *= GAZE_YAW_RATE;
        gaze.y *= GAZE_PITCH_RATE;
        let mut left_dir = gaze;
        let mut right_dir = gaze;
        if gaze.x >= 0.0 {
            left_dir.x *= GAZE_YAW_INNER_RATE;
            right_dir.x *= GAZE_YAW_OUTER_RATE;
        } else {
            left_dir.x *= GAZE_YAW_OUTER_RATE;
            right_dir.x *= GAZE_YAW_INNER_RATE;
        }
        safe_normalize(&mut left_dir);
        safe_normalize(&mut right_dir);

        let x_hint = context.head_basis.column(0).into_owned();
        let root_basis_inv = skeleton.constants().root_basis_inv;
        let lateral =
            Vector3::from(context.head_base_basis.column(0)) * (EYEBALL_SHIFT_RATE * yawed);

        let pairs = [(Side::Left, left_dir), (Side::Right, right_dir)];
        for (side, local_dir) in pairs {
            let loc = BoneLocation::Eye(side);
            if !skeleton.bone(loc).present {
                continue;
            }
            let world_dir = context.head_base_basis * local_dir;
            let Some(base_basis) = basis_lock_z_from_x(&x_hint, &world_dir) else {
                continue;
            };
            let anchor_default = self.anchors[side.index()];
            let anchor = reproject_point(
                &context.head_basis,
                &anchor_default,
                &head_default,
                &head_position,
            ) + lateral;
            let eye_basis = base_basis * root_basis_inv;
            let eye_default = skeleton.bone(loc).default_position;
            let position = reproject_point(&eye_basis, &eye_default, &anchor_default, &anchor);
            let rotation = skeleton.bone(loc).world_rotation_from_base_basis(&base_basis);
            skeleton.set_world_position(loc, position);
            skeleton.set_world_rotation(loc, rotation);
        }
    }

    /// Parks both eyeballs at their bind offsets under the live head,
    /// positions included.
    fn reset(&mut self, skeleton: &mut Skeleton, pose: &SkeletonPose, offsets: &EyeOffsets) {
        if !skeleton.bone(BoneLocation::Neck).present || !skeleton.bone(BoneLocation::Head).present
        {
            return;
        }
        let neck_position = skeleton.world_position(BoneLocation::Neck, pose);
        let neck_default = skeleton.bone(BoneLocation::Neck).default_position;
        let head_default = skeleton.bone(BoneLocation::Head).default_position;
        let neck_delta = skeleton.world_rotation(BoneLocation::Neck, pose)
            * skeleton.bone(BoneLocation::Neck).default_rotation.inverse();
        let head_position = reproject_point(
            &quat_to_basis(&neck_delta),
            &head_default,
            &neck_default,
            &neck_position,
        );
        let head_rotation = skeleton.world_rotation(BoneLocation::Head, pose);
        let head_basis = quat_to_basis(
            &(head_rotation * skeleton.bone(BoneLocation::Head).default_rotation.inverse()),
        );

        let sides = [
            (Side::Left, offsets.head_to_left),
            (Side::Right, offsets.head_to_right),
        ];
        for (side, offset) in sides {
            let loc = BoneLocation::Eye(side);
            if !skeleton.bone(loc).present {
                continue;
            }
            let eye_default = skeleton.bone(loc).default_position;
            let position =
                reproject_point(&head_basis, &eye_default, &head_default, &head_position);
            skeleton.set_world_position(loc, position);
            skeleton.set_world_rotation(loc, head_rotation * offset);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marionette_core::types::SolveMode;
    use marionette_ik::FullBodySolver;
    use marionette_test_utils::canonical_bind_pose;

    fn tracked_solver() -> (FullBodySolver, SkeletonPose) {
        let bind = canonical_bind_pose();
        let solver = FullBodySolver::with_eye_solver(
            &bind,
            SolverSettings::default(),
            Box::new(TrackedEyes::new()),
        )
        .expect("canonical bind should prepare");
        (solver, bind)
    }

    // ---- resting behavior ----

    #[test]
    fn straight_ahead_gaze_is_a_fixed_point() {
        let (mut solver, mut pose) = tracked_solver();
        let eyes = solver.effector_mut(EffectorLocation::Eyes);
        eyes.position_enabled = true;
        // The resting gaze target for a hidden-eyes rig, one meter out.
        eyes.set_target_position(Vector3::new(0.0, 1.65, 1.1));
        solver.solve(&mut pose, SolveMode::Reset);

        let left = pose
            .position(BoneLocation::Eye(Side::Left))
            .expect("hidden eyes write positions back");
        let right = pose
            .position(BoneLocation::Eye(Side::Right))
            .expect("hidden eyes write positions back");
        assert_relative_eq!(left, Vector3::new(-0.033, 1.62, 0.09), epsilon = 1e-4);
        assert_relative_eq!(right, Vector3::new(0.033, 1.62, 0.09), epsilon = 1e-4);

        let rotation = pose.rotation(BoneLocation::Eye(Side::Left)).unwrap();
        assert!(rotation.angle() < 1e-3, "gaze dead ahead leaves bind alignment");
    }

    #[test]
    fn untargeted_solve_parks_the_eyes_at_bind() {
        let (mut solver, mut pose) = tracked_solver();
        solver.solve(&mut pose, SolveMode::Reset);

        let left = pose
            .position(BoneLocation::Eye(Side::Left))
            .expect("reset still writes eye positions");
        assert_relative_eq!(left, Vector3::new(-0.033, 1.62, 0.09), epsilon = 1e-4);
        let rotation = pose.rotation(BoneLocation::Eye(Side::Right)).unwrap();
        assert!(rotation.angle() < 1e-3);
    }

    // ---- lateral gaze ----

    #[test]
    fn lateral_gaze_turns_the_trailing_eye_further() {
        let (mut solver, mut pose) = tracked_solver();
        let eyes = solver.effector_mut(EffectorLocation::Eyes);
        eyes.position_enabled = true;
        eyes.set_target_position(Vector3::new(0.6, 1.65, 1.1));
        solver.solve(&mut pose, SolveMode::Reset);

        let head = pose.rotation(BoneLocation::Head).unwrap();
        let left = head.inverse() * pose.rotation(BoneLocation::Eye(Side::Left)).unwrap();
        let right = head.inverse() * pose.rotation(BoneLocation::Eye(Side::Right)).unwrap();
        assert!(
            left.angle() > 1.0e-3,
            "leading eye should still turn, got {}",
            left.angle()
        );
        assert!(
            right.angle() > left.angle(),
            "trailing eye turns further: right {} vs left {}",
            right.angle(),
            left.angle()
        );

        let midpoint = (pose.position(BoneLocation::Eye(Side::Left)).unwrap()
            + pose.position(BoneLocation::Eye(Side::Right)).unwrap())
            * 0.5;
        assert!(
            midpoint.x > 1.0e-3,
            "eyeballs slide toward the gaze side, got {}",
            midpoint.x
        );
    }
}
