//! Solve-session constants derived from settings and the bind pose.

use marionette_core::config::{BodySettings, HeadSettings, LimbSettings, SolverSettings};
use marionette_core::types::ShoulderAxisMode;
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Cosine/sine pair of a configured limit angle, computed once per settings
/// change instead of per frame.
#[derive(Clone, Copy, Debug)]
pub struct CosSin {
    pub cos: f32,
    pub sin: f32,
}

impl CosSin {
    pub const ZERO: Self = Self {
        cos: 1.0,
        sin: 0.0,
    };

    #[must_use]
    pub fn from_degrees(degrees: f32) -> Self {
        let radians = degrees.to_radians();
        Self {
            cos: radians.cos(),
            sin: radians.sin(),
        }
    }

    /// Half-aperture pair for a full trace angle.
    #[must_use]
    pub fn half_of_degrees(degrees: f32) -> Self {
        Self::from_degrees(degrees * 0.5)
    }
}

/// Shoulder secondary axis after per-rig auto resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShoulderAxis {
    AlongSpine,
    AlongNeck,
}

#[derive(Clone, Copy, Debug)]
pub struct HeadAngles {
    pub neck_pitch_up: CosSin,
    pub neck_pitch_down: CosSin,
    pub neck_roll: CosSin,
    pub head_yaw: CosSin,
    pub head_pitch_up: CosSin,
    pub head_pitch_down: CosSin,
    pub head_roll: CosSin,
    pub eyes_yaw: CosSin,
    pub eyes_pitch: CosSin,
    pub eyes_trace_half: CosSin,
}

impl HeadAngles {
    #[must_use]
    pub fn from_settings(head: &HeadSettings) -> Self {
        Self {
            neck_pitch_up: CosSin::from_degrees(head.neck_limit_pitch_up),
            neck_pitch_down: CosSin::from_degrees(head.neck_limit_pitch_down),
            neck_roll: CosSin::from_degrees(head.neck_limit_roll),
            head_yaw: CosSin::from_degrees(head.head_limit_yaw),
            head_pitch_up: CosSin::from_degrees(head.head_limit_pitch_up),
            head_pitch_down: CosSin::from_degrees(head.head_limit_pitch_down),
            head_roll: CosSin::from_degrees(head.head_limit_roll),
            eyes_yaw: CosSin::from_degrees(head.eyes_limit_yaw),
            eyes_pitch: CosSin::from_degrees(head.eyes_limit_pitch),
            eyes_trace_half: CosSin::half_of_degrees(head.eyes_trace_angle),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BodyAngles {
    pub spine_x: CosSin,
    pub spine_y: CosSin,
    pub shoulder_y_plus: CosSin,
    pub shoulder_y_minus: CosSin,
    pub shoulder_z: CosSin,
    pub upper_dir_x_limit_y: CosSin,
    pub upper_eyes_yaw: CosSin,
    pub upper_eyes_pitch_up: CosSin,
    pub upper_eyes_pitch_down: CosSin,
    pub upper_eyes_trace_half: CosSin,
}

impl BodyAngles {
    #[must_use]
    pub fn from_settings(body: &BodySettings) -> Self {
        Self {
            spine_x: CosSin::from_degrees(body.spine_limit_angle_x),
            spine_y: CosSin::from_degrees(body.spine_limit_angle_y),
            shoulder_y_plus: CosSin::from_degrees(body.shoulder_limit_angle_y_plus),
            shoulder_y_minus: CosSin::from_degrees(body.shoulder_limit_angle_y_minus),
            shoulder_z: CosSin::from_degrees(body.shoulder_limit_angle_z),
            upper_dir_x_limit_y: CosSin::from_degrees(body.upper_dir_x_limit_angle_y),
            upper_eyes_yaw: CosSin::from_degrees(body.upper_eyes_limit_yaw),
            upper_eyes_pitch_up: CosSin::from_degrees(body.upper_eyes_limit_pitch_up),
            upper_eyes_pitch_down: CosSin::from_degrees(body.upper_eyes_limit_pitch_down),
            upper_eyes_trace_half: CosSin::half_of_degrees(body.upper_eyes_trace_angle),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LimbAngles {
    pub prefix_leg_upper: CosSin,
    pub prefix_knee_upper: CosSin,
    pub elbow_front_inner: CosSin,
    pub elbow_back_inner: CosSin,
    pub wrist_limit: CosSin,
    pub foot_yaw: CosSin,
    pub foot_pitch_up: CosSin,
    pub foot_pitch_down: CosSin,
    pub foot_roll: CosSin,

    pub automatic_knee_base: f32,
    pub automatic_elbow_base: f32,
    pub automatic_elbow_lower: f32,
    pub automatic_elbow_upper: f32,
    pub automatic_elbow_back_upper: f32,
    pub automatic_elbow_back_lower: f32,
    pub presolve_knee_lerp_cos: f32,
    pub presolve_elbow_lerp_cos: f32,
    pub back_begin: f32,
    pub back_core_begin: f32,
    pub back_core_end: f32,
    pub back_end: f32,
    pub back_core_upper: f32,
    pub back_core_lower: f32,
}

impl LimbAngles {
    #[must_use]
    pub fn from_settings(limb: &LimbSettings) -> Self {
        Self {
            prefix_leg_upper: CosSin::from_degrees(limb.prefix_leg_upper_limit_angle),
            prefix_knee_upper: CosSin::from_degrees(limb.prefix_knee_upper_limit_angle),
            elbow_front_inner: CosSin::from_degrees(limb.elbow_front_inner_limit_angle),
            elbow_back_inner: CosSin::from_degrees(limb.elbow_back_inner_limit_angle),
            wrist_limit: CosSin::from_degrees(limb.wrist_limit_angle),
            foot_yaw: CosSin::from_degrees(limb.foot_limit_yaw),
            foot_pitch_up: CosSin::from_degrees(limb.foot_limit_pitch_up),
            foot_pitch_down: CosSin::from_degrees(limb.foot_limit_pitch_down),
            foot_roll: CosSin::from_degrees(limb.foot_limit_roll),
            automatic_knee_base: limb.automatic_knee_base_angle.to_radians(),
            automatic_elbow_base: limb.automatic_elbow_base_angle.to_radians(),
            automatic_elbow_lower: limb.automatic_elbow_lower_angle.to_radians(),
            automatic_elbow_upper: limb.automatic_elbow_upper_angle.to_radians(),
            automatic_elbow_back_upper: limb.automatic_elbow_back_upper_angle.to_radians(),
            automatic_elbow_back_lower: limb.automatic_elbow_back_lower_angle.to_radians(),
            presolve_knee_lerp_cos: limb.presolve_knee_lerp_angle.to_radians().cos(),
            presolve_elbow_lerp_cos: limb.presolve_elbow_lerp_angle.to_radians().cos(),
            back_begin: limb.arm_effector_back_begin_angle.to_radians(),
            back_core_begin: limb.arm_effector_back_core_begin_angle.to_radians(),
            back_core_end: limb.arm_effector_back_core_end_angle.to_radians(),
            back_end: limb.arm_effector_back_end_angle.to_radians(),
            back_core_upper: limb.arm_effector_back_core_upper_angle.to_radians(),
            back_core_lower: limb.arm_effector_back_core_lower_angle.to_radians(),
        }
    }
}

/// Constants shared by every solver within a session: canonical root pose
/// and every precomputed limit angle. Rebuilt by `Skeleton::prepare` and
/// whenever settings change.
#[derive(Clone, Debug)]
pub struct SolveConstants {
    pub root_position: Vector3<f32>,
    pub root_rotation: UnitQuaternion<f32>,
    pub root_basis: Matrix3<f32>,
    pub root_basis_inv: Matrix3<f32>,
    pub shoulder_axis: ShoulderAxis,
    pub head: HeadAngles,
    pub body: BodyAngles,
    pub limb: LimbAngles,
}

impl SolveConstants {
    #[must_use]
    pub fn new(settings: &SolverSettings) -> Self {
        Self {
            root_position: Vector3::zeros(),
            root_rotation: UnitQuaternion::identity(),
            root_basis: Matrix3::identity(),
            root_basis_inv: Matrix3::identity(),
            shoulder_axis: match settings.shoulder_axis {
                ShoulderAxisMode::AlongNeck => ShoulderAxis::AlongNeck,
                _ => ShoulderAxis::AlongSpine,
            },
            head: HeadAngles::from_settings(&settings.head),
            body: BodyAngles::from_settings(&settings.body),
            limb: LimbAngles::from_settings(&settings.limb),
        }
    }

    pub fn set_root(&mut self, position: Vector3<f32>, basis: Matrix3<f32>) {
        self.root_position = position;
        self.root_basis = basis;
        self.root_basis_inv = basis.transpose();
        self.root_rotation = marionette_math::basis::basis_to_quat(&basis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cos_sin_matches_trig() {
        let pair = CosSin::from_degrees(30.0);
        assert_relative_eq!(pair.sin, 0.5, epsilon = 1e-6);
        assert_relative_eq!(pair.cos, 0.866_025_4, epsilon = 1e-6);
        let half = CosSin::half_of_degrees(110.0);
        assert_relative_eq!(half.sin, 55.0_f32.to_radians().sin(), epsilon = 1e-6);
    }

    #[test]
    fn constants_build_from_default_settings() {
        let settings = SolverSettings::default();
        let constants = SolveConstants::new(&settings);
        assert_eq!(constants.shoulder_axis, ShoulderAxis::AlongSpine);
        assert_relative_eq!(constants.root_basis, Matrix3::identity(), epsilon = 1e-6);
        // Neck pitch defaults are asymmetric.
        assert!(constants.head.neck_pitch_up.sin > 0.0);
        assert!(constants.head.neck_pitch_down.sin > constants.head.neck_pitch_up.sin);
    }

    #[test]
    fn set_root_keeps_inverse_consistent() {
        let settings = SolverSettings::default();
        let mut constants = SolveConstants::new(&settings);
        let basis = marionette_math::basis::quat_to_basis(&UnitQuaternion::from_axis_angle(
            &Vector3::y_axis(),
            0.5,
        ));
        constants.set_root(Vector3::new(1.0, 0.0, 2.0), basis);
        assert_relative_eq!(
            constants.root_basis * constants.root_basis_inv,
            Matrix3::identity(),
            epsilon = 1e-5
        );
    }
}
