//! Solver tuning settings.
//!
//! A flat record of limit angles (degrees), blend rates ([0,1]) and enable
//! flags, grouped by sub-solver. Read-only during a solve pass, externally
//! mutable between passes. Loadable from TOML; every field has a default so
//! a partial file (or an empty one) is valid.

use crate::error::ConfigError;
use crate::types::{ShoulderAxisMode, SyncDisplacementMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}

const fn default_false() -> bool {
    false
}

// Body solver.
const fn default_shoulder_solve_bending_rate() -> f32 {
    0.25
}
const fn default_shoulder_limit_angle_y_plus() -> f32 {
    30.0
}
const fn default_shoulder_limit_angle_y_minus() -> f32 {
    1.0
}
const fn default_shoulder_limit_angle_z() -> f32 {
    30.0
}
const fn default_spine_dir_x_leg_to_arm_rate() -> f32 {
    0.5
}
const fn default_spine_dir_x_leg_to_arm_to_rate() -> f32 {
    1.0
}
const fn default_spine_dir_y_lerp_rate() -> f32 {
    0.5
}
const fn default_upper_body_movingfix_rate() -> f32 {
    1.0
}
const fn default_upper_head_movingfix_rate() -> f32 {
    0.8
}
const fn default_upper_center_leg_translate_rate() -> f32 {
    0.5
}
const fn default_upper_spine_translate_rate() -> f32 {
    0.65
}
const fn default_upper_center_leg_rotate_rate() -> f32 {
    0.6
}
const fn default_upper_spine_rotate_rate() -> f32 {
    0.9
}
const fn default_upper_post_translate_rate() -> f32 {
    1.0
}
const fn default_upper_center_leg_lerp_rate() -> f32 {
    1.0
}
const fn default_upper_spine_lerp_rate() -> f32 {
    1.0
}
const fn default_upper_dir_x_limit_angle_y() -> f32 {
    50.0
}
const fn default_spine_limit_angle_x() -> f32 {
    40.0
}
const fn default_spine_limit_angle_y() -> f32 {
    25.0
}
const fn default_upper_continuous_pre_translate_rate() -> f32 {
    0.2
}
const fn default_upper_continuous_pre_translate_stable_rate() -> f32 {
    0.65
}
const fn default_upper_continuous_center_leg_rotation_stable_rate() -> f32 {
    0.0
}
const fn default_upper_continuous_post_translate_stable_rate() -> f32 {
    0.01
}
const fn default_upper_continuous_spine_dir_y_lerp_rate() -> f32 {
    0.5
}
const fn default_upper_neck_to_center_leg_rate() -> f32 {
    0.6
}
const fn default_upper_neck_to_spine_rate() -> f32 {
    0.9
}
const fn default_upper_eyes_to_center_leg_rate() -> f32 {
    0.2
}
const fn default_upper_eyes_to_spine_rate() -> f32 {
    0.5
}
const fn default_upper_eyes_yaw_rate() -> f32 {
    0.8
}
const fn default_upper_eyes_pitch_up_rate() -> f32 {
    0.25
}
const fn default_upper_eyes_pitch_down_rate() -> f32 {
    0.5
}
const fn default_upper_eyes_limit_yaw() -> f32 {
    80.0
}
const fn default_upper_eyes_limit_pitch_up() -> f32 {
    10.0
}
const fn default_upper_eyes_limit_pitch_down() -> f32 {
    45.0
}
const fn default_upper_eyes_trace_angle() -> f32 {
    165.0
}

// Limb solver.
const fn default_automatic_knee_base_angle() -> f32 {
    0.0
}
const fn default_automatic_elbow_base_angle() -> f32 {
    30.0
}
const fn default_automatic_elbow_lower_angle() -> f32 {
    90.0
}
const fn default_automatic_elbow_upper_angle() -> f32 {
    90.0
}
const fn default_automatic_elbow_back_upper_angle() -> f32 {
    180.0
}
const fn default_automatic_elbow_back_lower_angle() -> f32 {
    330.0
}
const fn default_presolve_knee_rate() -> f32 {
    1.0
}
const fn default_presolve_knee_lerp_angle() -> f32 {
    10.0
}
const fn default_presolve_knee_lerp_length_rate() -> f32 {
    0.1
}
const fn default_presolve_elbow_rate() -> f32 {
    1.0
}
const fn default_presolve_elbow_lerp_angle() -> f32 {
    10.0
}
const fn default_presolve_elbow_lerp_length_rate() -> f32 {
    0.1
}
const fn default_prefix_leg_upper_limit_angle() -> f32 {
    60.0
}
const fn default_prefix_knee_upper_limit_angle() -> f32 {
    45.0
}
const fn default_leg_effector_min_length_rate() -> f32 {
    0.5
}
const fn default_leg_effector_max_length_rate() -> f32 {
    0.9999
}
const fn default_arm_effector_max_length_rate() -> f32 {
    0.9999
}
const fn default_arm_effector_back_begin_angle() -> f32 {
    -5.0
}
const fn default_arm_effector_back_core_begin_angle() -> f32 {
    -10.0
}
const fn default_arm_effector_back_core_end_angle() -> f32 {
    -30.0
}
const fn default_arm_effector_back_end_angle() -> f32 {
    -50.0
}
const fn default_arm_effector_back_core_upper_angle() -> f32 {
    8.0
}
const fn default_arm_effector_back_core_lower_angle() -> f32 {
    -20.0
}
const fn default_elbow_front_inner_limit_angle() -> f32 {
    5.0
}
const fn default_elbow_back_inner_limit_angle() -> f32 {
    10.0
}
const fn default_wrist_limit_angle() -> f32 {
    90.0
}
const fn default_foot_limit_yaw() -> f32 {
    45.0
}
const fn default_foot_limit_pitch_up() -> f32 {
    30.0
}
const fn default_foot_limit_pitch_down() -> f32 {
    60.0
}
const fn default_foot_limit_roll() -> f32 {
    20.0
}

// Head solver.
const fn default_neck_limit_pitch_up() -> f32 {
    15.0
}
const fn default_neck_limit_pitch_down() -> f32 {
    30.0
}
const fn default_neck_limit_roll() -> f32 {
    5.0
}
const fn default_eyes_to_neck_pitch_rate() -> f32 {
    0.4
}
const fn default_head_limit_yaw() -> f32 {
    60.0
}
const fn default_head_limit_pitch_up() -> f32 {
    15.0
}
const fn default_head_limit_pitch_down() -> f32 {
    15.0
}
const fn default_head_limit_roll() -> f32 {
    5.0
}
const fn default_eyes_to_head_yaw_rate() -> f32 {
    0.8
}
const fn default_eyes_to_head_pitch_rate() -> f32 {
    0.5
}
const fn default_eyes_trace_angle() -> f32 {
    110.0
}
const fn default_eyes_limit_yaw() -> f32 {
    40.0
}
const fn default_eyes_limit_pitch() -> f32 {
    12.0
}
const fn default_eyes_yaw_rate() -> f32 {
    0.8
}
const fn default_eyes_pitch_rate() -> f32 {
    0.5
}
const fn default_eyes_yaw_inner_rate() -> f32 {
    0.6
}
const fn default_eyes_yaw_outer_rate() -> f32 {
    0.9
}

// ---------------------------------------------------------------------------
// BodySettings
// ---------------------------------------------------------------------------

/// Hips/spine/shoulder solve tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodySettings {
    /// Solve even when no body effector is active, to keep the chain
    /// bind-consistent under a moved parent.
    #[serde(default = "default_true")]
    pub force_solve_enabled: bool,
    #[serde(default = "default_true")]
    pub upper_solve_enabled: bool,
    #[serde(default = "default_true")]
    pub lower_solve_enabled: bool,
    #[serde(default = "default_true")]
    pub shoulder_solve_enabled: bool,
    /// Fraction of the arm-effector pull converted into shoulder bend.
    #[serde(default = "default_shoulder_solve_bending_rate")]
    pub shoulder_solve_bending_rate: f32,
    #[serde(default = "default_true")]
    pub shoulder_limit_enabled: bool,
    #[serde(default = "default_shoulder_limit_angle_y_plus")]
    pub shoulder_limit_angle_y_plus: f32,
    #[serde(default = "default_shoulder_limit_angle_y_minus")]
    pub shoulder_limit_angle_y_minus: f32,
    #[serde(default = "default_shoulder_limit_angle_z")]
    pub shoulder_limit_angle_z: f32,
    #[serde(default = "default_true")]
    pub upper_solve_hips_enabled: bool,
    #[serde(default = "default_true")]
    pub upper_solve_spine_enabled: bool,
    #[serde(default = "default_true")]
    pub upper_solve_spine2_enabled: bool,
    #[serde(default = "default_true")]
    pub upper_solve_spine3_enabled: bool,
    #[serde(default = "default_true")]
    pub upper_solve_spine4_enabled: bool,
    /// Blend of the lateral reference axis from the leg line toward the
    /// shoulder line (and the blend target cap).
    #[serde(default = "default_spine_dir_x_leg_to_arm_rate")]
    pub spine_dir_x_leg_to_arm_rate: f32,
    #[serde(default = "default_spine_dir_x_leg_to_arm_to_rate")]
    pub spine_dir_x_leg_to_arm_to_rate: f32,
    #[serde(default = "default_spine_dir_y_lerp_rate")]
    pub spine_dir_y_lerp_rate: f32,
    #[serde(default = "default_upper_body_movingfix_rate")]
    pub upper_body_movingfix_rate: f32,
    #[serde(default = "default_upper_head_movingfix_rate")]
    pub upper_head_movingfix_rate: f32,
    #[serde(default = "default_upper_center_leg_translate_rate")]
    pub upper_center_leg_translate_rate: f32,
    #[serde(default = "default_upper_spine_translate_rate")]
    pub upper_spine_translate_rate: f32,
    #[serde(default = "default_upper_center_leg_rotate_rate")]
    pub upper_center_leg_rotate_rate: f32,
    #[serde(default = "default_upper_spine_rotate_rate")]
    pub upper_spine_rotate_rate: f32,
    #[serde(default = "default_upper_post_translate_rate")]
    pub upper_post_translate_rate: f32,
    #[serde(default = "default_upper_center_leg_lerp_rate")]
    pub upper_center_leg_lerp_rate: f32,
    #[serde(default = "default_upper_spine_lerp_rate")]
    pub upper_spine_lerp_rate: f32,
    #[serde(default = "default_true")]
    pub upper_dir_x_limit_enabled: bool,
    #[serde(default = "default_upper_dir_x_limit_angle_y")]
    pub upper_dir_x_limit_angle_y: f32,
    #[serde(default = "default_true")]
    pub spine_limit_enabled: bool,
    /// Re-limit after each spine segment instead of once for the chain.
    #[serde(default = "default_false")]
    pub spine_accurate_limit_enabled: bool,
    #[serde(default = "default_spine_limit_angle_x")]
    pub spine_limit_angle_x: f32,
    #[serde(default = "default_spine_limit_angle_y")]
    pub spine_limit_angle_y: f32,
    #[serde(default = "default_upper_continuous_pre_translate_rate")]
    pub upper_continuous_pre_translate_rate: f32,
    #[serde(default = "default_upper_continuous_pre_translate_stable_rate")]
    pub upper_continuous_pre_translate_stable_rate: f32,
    #[serde(default = "default_upper_continuous_center_leg_rotation_stable_rate")]
    pub upper_continuous_center_leg_rotation_stable_rate: f32,
    #[serde(default = "default_upper_continuous_post_translate_stable_rate")]
    pub upper_continuous_post_translate_stable_rate: f32,
    #[serde(default = "default_upper_continuous_spine_dir_y_lerp_rate")]
    pub upper_continuous_spine_dir_y_lerp_rate: f32,
    /// Split of head-effector translation demand between the center-leg
    /// line and the spine chain.
    #[serde(default = "default_upper_neck_to_center_leg_rate")]
    pub upper_neck_to_center_leg_rate: f32,
    #[serde(default = "default_upper_neck_to_spine_rate")]
    pub upper_neck_to_spine_rate: f32,
    #[serde(default = "default_upper_eyes_to_center_leg_rate")]
    pub upper_eyes_to_center_leg_rate: f32,
    #[serde(default = "default_upper_eyes_to_spine_rate")]
    pub upper_eyes_to_spine_rate: f32,
    #[serde(default = "default_upper_eyes_yaw_rate")]
    pub upper_eyes_yaw_rate: f32,
    #[serde(default = "default_upper_eyes_pitch_up_rate")]
    pub upper_eyes_pitch_up_rate: f32,
    #[serde(default = "default_upper_eyes_pitch_down_rate")]
    pub upper_eyes_pitch_down_rate: f32,
    #[serde(default = "default_upper_eyes_limit_yaw")]
    pub upper_eyes_limit_yaw: f32,
    #[serde(default = "default_upper_eyes_limit_pitch_up")]
    pub upper_eyes_limit_pitch_up: f32,
    #[serde(default = "default_upper_eyes_limit_pitch_down")]
    pub upper_eyes_limit_pitch_down: f32,
    #[serde(default = "default_upper_eyes_trace_angle")]
    pub upper_eyes_trace_angle: f32,
}

impl Default for BodySettings {
    fn default() -> Self {
        Self {
            force_solve_enabled: true,
            upper_solve_enabled: true,
            lower_solve_enabled: true,
            shoulder_solve_enabled: true,
            shoulder_solve_bending_rate: default_shoulder_solve_bending_rate(),
            shoulder_limit_enabled: true,
            shoulder_limit_angle_y_plus: default_shoulder_limit_angle_y_plus(),
            shoulder_limit_angle_y_minus: default_shoulder_limit_angle_y_minus(),
            shoulder_limit_angle_z: default_shoulder_limit_angle_z(),
            upper_solve_hips_enabled: true,
            upper_solve_spine_enabled: true,
            upper_solve_spine2_enabled: true,
            upper_solve_spine3_enabled: true,
            upper_solve_spine4_enabled: true,
            spine_dir_x_leg_to_arm_rate: default_spine_dir_x_leg_to_arm_rate(),
            spine_dir_x_leg_to_arm_to_rate: default_spine_dir_x_leg_to_arm_to_rate(),
            spine_dir_y_lerp_rate: default_spine_dir_y_lerp_rate(),
            upper_body_movingfix_rate: default_upper_body_movingfix_rate(),
            upper_head_movingfix_rate: default_upper_head_movingfix_rate(),
            upper_center_leg_translate_rate: default_upper_center_leg_translate_rate(),
            upper_spine_translate_rate: default_upper_spine_translate_rate(),
            upper_center_leg_rotate_rate: default_upper_center_leg_rotate_rate(),
            upper_spine_rotate_rate: default_upper_spine_rotate_rate(),
            upper_post_translate_rate: default_upper_post_translate_rate(),
            upper_center_leg_lerp_rate: default_upper_center_leg_lerp_rate(),
            upper_spine_lerp_rate: default_upper_spine_lerp_rate(),
            upper_dir_x_limit_enabled: true,
            upper_dir_x_limit_angle_y: default_upper_dir_x_limit_angle_y(),
            spine_limit_enabled: true,
            spine_accurate_limit_enabled: false,
            spine_limit_angle_x: default_spine_limit_angle_x(),
            spine_limit_angle_y: default_spine_limit_angle_y(),
            upper_continuous_pre_translate_rate: default_upper_continuous_pre_translate_rate(),
            upper_continuous_pre_translate_stable_rate:
                default_upper_continuous_pre_translate_stable_rate(),
            upper_continuous_center_leg_rotation_stable_rate:
                default_upper_continuous_center_leg_rotation_stable_rate(),
            upper_continuous_post_translate_stable_rate:
                default_upper_continuous_post_translate_stable_rate(),
            upper_continuous_spine_dir_y_lerp_rate:
                default_upper_continuous_spine_dir_y_lerp_rate(),
            upper_neck_to_center_leg_rate: default_upper_neck_to_center_leg_rate(),
            upper_neck_to_spine_rate: default_upper_neck_to_spine_rate(),
            upper_eyes_to_center_leg_rate: default_upper_eyes_to_center_leg_rate(),
            upper_eyes_to_spine_rate: default_upper_eyes_to_spine_rate(),
            upper_eyes_yaw_rate: default_upper_eyes_yaw_rate(),
            upper_eyes_pitch_up_rate: default_upper_eyes_pitch_up_rate(),
            upper_eyes_pitch_down_rate: default_upper_eyes_pitch_down_rate(),
            upper_eyes_limit_yaw: default_upper_eyes_limit_yaw(),
            upper_eyes_limit_pitch_up: default_upper_eyes_limit_pitch_up(),
            upper_eyes_limit_pitch_down: default_upper_eyes_limit_pitch_down(),
            upper_eyes_trace_angle: default_upper_eyes_trace_angle(),
        }
    }
}

// ---------------------------------------------------------------------------
// LimbSettings
// ---------------------------------------------------------------------------

/// Arm/leg two-bone solve tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimbSettings {
    #[serde(default = "default_true")]
    pub leg_always_solve_enabled: bool,
    #[serde(default = "default_false")]
    pub arm_always_solve_enabled: bool,
    /// Base rotation of the knee/elbow bend plane around the limb axis,
    /// applied when the bind pose gives no usable bend direction.
    #[serde(default = "default_automatic_knee_base_angle")]
    pub automatic_knee_base_angle: f32,
    #[serde(default = "default_automatic_elbow_base_angle")]
    pub automatic_elbow_base_angle: f32,
    /// Elbow posture keys: pole angle by target elevation, front and back.
    #[serde(default = "default_automatic_elbow_lower_angle")]
    pub automatic_elbow_lower_angle: f32,
    #[serde(default = "default_automatic_elbow_upper_angle")]
    pub automatic_elbow_upper_angle: f32,
    #[serde(default = "default_automatic_elbow_back_upper_angle")]
    pub automatic_elbow_back_upper_angle: f32,
    #[serde(default = "default_automatic_elbow_back_lower_angle")]
    pub automatic_elbow_back_lower_angle: f32,
    #[serde(default = "default_true")]
    pub presolve_knee_enabled: bool,
    #[serde(default = "default_true")]
    pub presolve_elbow_enabled: bool,
    #[serde(default = "default_presolve_knee_rate")]
    pub presolve_knee_rate: f32,
    #[serde(default = "default_presolve_knee_lerp_angle")]
    pub presolve_knee_lerp_angle: f32,
    #[serde(default = "default_presolve_knee_lerp_length_rate")]
    pub presolve_knee_lerp_length_rate: f32,
    #[serde(default = "default_presolve_elbow_rate")]
    pub presolve_elbow_rate: f32,
    #[serde(default = "default_presolve_elbow_lerp_angle")]
    pub presolve_elbow_lerp_angle: f32,
    #[serde(default = "default_presolve_elbow_lerp_length_rate")]
    pub presolve_elbow_lerp_length_rate: f32,
    /// Clamp leg targets into a cone under the hip before solving.
    #[serde(default = "default_true")]
    pub prefix_leg_effector_enabled: bool,
    #[serde(default = "default_prefix_leg_upper_limit_angle")]
    pub prefix_leg_upper_limit_angle: f32,
    #[serde(default = "default_prefix_knee_upper_limit_angle")]
    pub prefix_knee_upper_limit_angle: f32,
    #[serde(default = "default_leg_effector_min_length_rate")]
    pub leg_effector_min_length_rate: f32,
    #[serde(default = "default_leg_effector_max_length_rate")]
    pub leg_effector_max_length_rate: f32,
    #[serde(default = "default_arm_effector_max_length_rate")]
    pub arm_effector_max_length_rate: f32,
    /// Behind-the-back region keys (degrees, descending): the pole swings
    /// smoothly between begin/core/end as the target crosses the back.
    #[serde(default = "default_arm_effector_back_begin_angle")]
    pub arm_effector_back_begin_angle: f32,
    #[serde(default = "default_arm_effector_back_core_begin_angle")]
    pub arm_effector_back_core_begin_angle: f32,
    #[serde(default = "default_arm_effector_back_core_end_angle")]
    pub arm_effector_back_core_end_angle: f32,
    #[serde(default = "default_arm_effector_back_end_angle")]
    pub arm_effector_back_end_angle: f32,
    #[serde(default = "default_arm_effector_back_core_upper_angle")]
    pub arm_effector_back_core_upper_angle: f32,
    #[serde(default = "default_arm_effector_back_core_lower_angle")]
    pub arm_effector_back_core_lower_angle: f32,
    #[serde(default = "default_elbow_front_inner_limit_angle")]
    pub elbow_front_inner_limit_angle: f32,
    #[serde(default = "default_elbow_back_inner_limit_angle")]
    pub elbow_back_inner_limit_angle: f32,
    #[serde(default = "default_true")]
    pub wrist_limit_enabled: bool,
    #[serde(default = "default_wrist_limit_angle")]
    pub wrist_limit_angle: f32,
    #[serde(default = "default_foot_limit_yaw")]
    pub foot_limit_yaw: f32,
    #[serde(default = "default_foot_limit_pitch_up")]
    pub foot_limit_pitch_up: f32,
    #[serde(default = "default_foot_limit_pitch_down")]
    pub foot_limit_pitch_down: f32,
    #[serde(default = "default_foot_limit_roll")]
    pub foot_limit_roll: f32,
    /// Re-derive the forearm basis from the solved elbow axis to remove
    /// residual scissor between the two segments.
    #[serde(default = "default_true")]
    pub arm_basis_forcefix_enabled: bool,
}

impl Default for LimbSettings {
    fn default() -> Self {
        Self {
            leg_always_solve_enabled: true,
            arm_always_solve_enabled: false,
            automatic_knee_base_angle: default_automatic_knee_base_angle(),
            automatic_elbow_base_angle: default_automatic_elbow_base_angle(),
            automatic_elbow_lower_angle: default_automatic_elbow_lower_angle(),
            automatic_elbow_upper_angle: default_automatic_elbow_upper_angle(),
            automatic_elbow_back_upper_angle: default_automatic_elbow_back_upper_angle(),
            automatic_elbow_back_lower_angle: default_automatic_elbow_back_lower_angle(),
            presolve_knee_enabled: true,
            presolve_elbow_enabled: true,
            presolve_knee_rate: default_presolve_knee_rate(),
            presolve_knee_lerp_angle: default_presolve_knee_lerp_angle(),
            presolve_knee_lerp_length_rate: default_presolve_knee_lerp_length_rate(),
            presolve_elbow_rate: default_presolve_elbow_rate(),
            presolve_elbow_lerp_angle: default_presolve_elbow_lerp_angle(),
            presolve_elbow_lerp_length_rate: default_presolve_elbow_lerp_length_rate(),
            prefix_leg_effector_enabled: true,
            prefix_leg_upper_limit_angle: default_prefix_leg_upper_limit_angle(),
            prefix_knee_upper_limit_angle: default_prefix_knee_upper_limit_angle(),
            leg_effector_min_length_rate: default_leg_effector_min_length_rate(),
            leg_effector_max_length_rate: default_leg_effector_max_length_rate(),
            arm_effector_max_length_rate: default_arm_effector_max_length_rate(),
            arm_effector_back_begin_angle: default_arm_effector_back_begin_angle(),
            arm_effector_back_core_begin_angle: default_arm_effector_back_core_begin_angle(),
            arm_effector_back_core_end_angle: default_arm_effector_back_core_end_angle(),
            arm_effector_back_end_angle: default_arm_effector_back_end_angle(),
            arm_effector_back_core_upper_angle: default_arm_effector_back_core_upper_angle(),
            arm_effector_back_core_lower_angle: default_arm_effector_back_core_lower_angle(),
            elbow_front_inner_limit_angle: default_elbow_front_inner_limit_angle(),
            elbow_back_inner_limit_angle: default_elbow_back_inner_limit_angle(),
            wrist_limit_enabled: true,
            wrist_limit_angle: default_wrist_limit_angle(),
            foot_limit_yaw: default_foot_limit_yaw(),
            foot_limit_pitch_up: default_foot_limit_pitch_up(),
            foot_limit_pitch_down: default_foot_limit_pitch_down(),
            foot_limit_roll: default_foot_limit_roll(),
            arm_basis_forcefix_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// HeadSettings
// ---------------------------------------------------------------------------

/// Neck/head/eye aiming tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadSettings {
    #[serde(default = "default_neck_limit_pitch_up")]
    pub neck_limit_pitch_up: f32,
    #[serde(default = "default_neck_limit_pitch_down")]
    pub neck_limit_pitch_down: f32,
    #[serde(default = "default_neck_limit_roll")]
    pub neck_limit_roll: f32,
    /// Fraction of the eyes-target pitch absorbed by the neck.
    #[serde(default = "default_eyes_to_neck_pitch_rate")]
    pub eyes_to_neck_pitch_rate: f32,
    #[serde(default = "default_head_limit_yaw")]
    pub head_limit_yaw: f32,
    #[serde(default = "default_head_limit_pitch_up")]
    pub head_limit_pitch_up: f32,
    #[serde(default = "default_head_limit_pitch_down")]
    pub head_limit_pitch_down: f32,
    #[serde(default = "default_head_limit_roll")]
    pub head_limit_roll: f32,
    #[serde(default = "default_eyes_to_head_yaw_rate")]
    pub eyes_to_head_yaw_rate: f32,
    #[serde(default = "default_eyes_to_head_pitch_rate")]
    pub eyes_to_head_pitch_rate: f32,
    /// Full aperture (degrees, 90..180) of the aiming cone; targets beyond
    /// it collapse to the cone edge.
    #[serde(default = "default_eyes_trace_angle")]
    pub eyes_trace_angle: f32,
    #[serde(default = "default_eyes_limit_yaw")]
    pub eyes_limit_yaw: f32,
    #[serde(default = "default_eyes_limit_pitch")]
    pub eyes_limit_pitch: f32,
    #[serde(default = "default_eyes_yaw_rate")]
    pub eyes_yaw_rate: f32,
    #[serde(default = "default_eyes_pitch_rate")]
    pub eyes_pitch_rate: f32,
    /// Yaw asymmetry: eyes rotate further toward the nose than away.
    #[serde(default = "default_eyes_yaw_inner_rate")]
    pub eyes_yaw_inner_rate: f32,
    #[serde(default = "default_eyes_yaw_outer_rate")]
    pub eyes_yaw_outer_rate: f32,
}

impl Default for HeadSettings {
    fn default() -> Self {
        Self {
            neck_limit_pitch_up: default_neck_limit_pitch_up(),
            neck_limit_pitch_down: default_neck_limit_pitch_down(),
            neck_limit_roll: default_neck_limit_roll(),
            eyes_to_neck_pitch_rate: default_eyes_to_neck_pitch_rate(),
            head_limit_yaw: default_head_limit_yaw(),
            head_limit_pitch_up: default_head_limit_pitch_up(),
            head_limit_pitch_down: default_head_limit_pitch_down(),
            head_limit_roll: default_head_limit_roll(),
            eyes_to_head_yaw_rate: default_eyes_to_head_yaw_rate(),
            eyes_to_head_pitch_rate: default_eyes_to_head_pitch_rate(),
            eyes_trace_angle: default_eyes_trace_angle(),
            eyes_limit_yaw: default_eyes_limit_yaw(),
            eyes_limit_pitch: default_eyes_limit_pitch(),
            eyes_yaw_rate: default_eyes_yaw_rate(),
            eyes_pitch_rate: default_eyes_pitch_rate(),
            eyes_yaw_inner_rate: default_eyes_yaw_inner_rate(),
            eyes_yaw_outer_rate: default_eyes_yaw_outer_rate(),
        }
    }
}

// ---------------------------------------------------------------------------
// SolverSettings
// ---------------------------------------------------------------------------

/// Complete solver tuning record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default)]
    pub sync_displacement: SyncDisplacementMode,
    #[serde(default)]
    pub shoulder_axis: ShoulderAxisMode,
    #[serde(default = "default_true")]
    pub roll_bones_enabled: bool,
    #[serde(default)]
    pub body: BodySettings,
    #[serde(default)]
    pub limb: LimbSettings,
    #[serde(default)]
    pub head: HeadSettings,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            sync_displacement: SyncDisplacementMode::default(),
            shoulder_axis: ShoulderAxisMode::default(),
            roll_bones_enabled: true,
            body: BodySettings::default(),
            limb: LimbSettings::default(),
            head: HeadSettings::default(),
        }
    }
}

impl SolverSettings {
    /// Load settings from a TOML file and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on IO failure, parse failure, or any field
    /// outside its documented range.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse settings from TOML text and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on parse failure or out-of-range fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.body;
        check_rate("shoulder_solve_bending_rate", b.shoulder_solve_bending_rate)?;
        check_cone("shoulder_limit_angle_y_plus", b.shoulder_limit_angle_y_plus)?;
        check_cone("shoulder_limit_angle_y_minus", b.shoulder_limit_angle_y_minus)?;
        check_cone("shoulder_limit_angle_z", b.shoulder_limit_angle_z)?;
        check_rate("spine_dir_x_leg_to_arm_rate", b.spine_dir_x_leg_to_arm_rate)?;
        check_rate(
            "spine_dir_x_leg_to_arm_to_rate",
            b.spine_dir_x_leg_to_arm_to_rate,
        )?;
        check_rate("spine_dir_y_lerp_rate", b.spine_dir_y_lerp_rate)?;
        check_rate("upper_body_movingfix_rate", b.upper_body_movingfix_rate)?;
        check_rate("upper_head_movingfix_rate", b.upper_head_movingfix_rate)?;
        check_rate(
            "upper_center_leg_translate_rate",
            b.upper_center_leg_translate_rate,
        )?;
        check_rate("upper_spine_translate_rate", b.upper_spine_translate_rate)?;
        check_rate("upper_center_leg_rotate_rate", b.upper_center_leg_rotate_rate)?;
        check_rate("upper_spine_rotate_rate", b.upper_spine_rotate_rate)?;
        check_rate("upper_post_translate_rate", b.upper_post_translate_rate)?;
        check_rate("upper_center_leg_lerp_rate", b.upper_center_leg_lerp_rate)?;
        check_rate("upper_spine_lerp_rate", b.upper_spine_lerp_rate)?;
        check_cone("upper_dir_x_limit_angle_y", b.upper_dir_x_limit_angle_y)?;
        check_cone("spine_limit_angle_x", b.spine_limit_angle_x)?;
        check_cone("spine_limit_angle_y", b.spine_limit_angle_y)?;
        check_rate(
            "upper_continuous_pre_translate_rate",
            b.upper_continuous_pre_translate_rate,
        )?;
        check_rate(
            "upper_continuous_pre_translate_stable_rate",
            b.upper_continuous_pre_translate_stable_rate,
        )?;
        check_rate(
            "upper_continuous_center_leg_rotation_stable_rate",
            b.upper_continuous_center_leg_rotation_stable_rate,
        )?;
        check_rate(
            "upper_continuous_post_translate_stable_rate",
            b.upper_continuous_post_translate_stable_rate,
        )?;
        check_rate(
            "upper_continuous_spine_dir_y_lerp_rate",
            b.upper_continuous_spine_dir_y_lerp_rate,
        )?;
        check_rate("upper_neck_to_center_leg_rate", b.upper_neck_to_center_leg_rate)?;
        check_rate("upper_neck_to_spine_rate", b.upper_neck_to_spine_rate)?;
        check_rate("upper_eyes_to_center_leg_rate", b.upper_eyes_to_center_leg_rate)?;
        check_rate("upper_eyes_to_spine_rate", b.upper_eyes_to_spine_rate)?;
        check_rate("upper_eyes_yaw_rate", b.upper_eyes_yaw_rate)?;
        check_rate("upper_eyes_pitch_up_rate", b.upper_eyes_pitch_up_rate)?;
        check_rate("upper_eyes_pitch_down_rate", b.upper_eyes_pitch_down_rate)?;
        check_cone("upper_eyes_limit_yaw", b.upper_eyes_limit_yaw)?;
        check_cone("upper_eyes_limit_pitch_up", b.upper_eyes_limit_pitch_up)?;
        check_cone("upper_eyes_limit_pitch_down", b.upper_eyes_limit_pitch_down)?;
        check_angle("upper_eyes_trace_angle", b.upper_eyes_trace_angle, 90.0, 180.0)?;

        let l = &self.limb;
        check_angle(
            "automatic_knee_base_angle",
            l.automatic_knee_base_angle,
            -360.0,
            360.0,
        )?;
        check_angle(
            "automatic_elbow_base_angle",
            l.automatic_elbow_base_angle,
            -360.0,
            360.0,
        )?;
        check_angle(
            "automatic_elbow_lower_angle",
            l.automatic_elbow_lower_angle,
            -360.0,
            360.0,
        )?;
        check_angle(
            "automatic_elbow_upper_angle",
            l.automatic_elbow_upper_angle,
            -360.0,
            360.0,
        )?;
        check_angle(
            "automatic_elbow_back_upper_angle",
            l.automatic_elbow_back_upper_angle,
            -360.0,
            360.0,
        )?;
        check_angle(
            "automatic_elbow_back_lower_angle",
            l.automatic_elbow_back_lower_angle,
            -360.0,
            360.0,
        )?;
        check_rate("presolve_knee_rate", l.presolve_knee_rate)?;
        check_angle("presolve_knee_lerp_angle", l.presolve_knee_lerp_angle, 0.0, 90.0)?;
        check_rate(
            "presolve_knee_lerp_length_rate",
            l.presolve_knee_lerp_length_rate,
        )?;
        check_rate("presolve_elbow_rate", l.presolve_elbow_rate)?;
        check_angle(
            "presolve_elbow_lerp_angle",
            l.presolve_elbow_lerp_angle,
            0.0,
            90.0,
        )?;
        check_rate(
            "presolve_elbow_lerp_length_rate",
            l.presolve_elbow_lerp_length_rate,
        )?;
        check_cone("prefix_leg_upper_limit_angle", l.prefix_leg_upper_limit_angle)?;
        check_cone("prefix_knee_upper_limit_angle", l.prefix_knee_upper_limit_angle)?;
        check_rate("leg_effector_min_length_rate", l.leg_effector_min_length_rate)?;
        check_rate("leg_effector_max_length_rate", l.leg_effector_max_length_rate)?;
        if l.leg_effector_min_length_rate > l.leg_effector_max_length_rate {
            return Err(ConfigError::InvertedBounds {
                field: "leg_effector_length_rate",
                min: l.leg_effector_min_length_rate,
                max: l.leg_effector_max_length_rate,
            });
        }
        check_rate("arm_effector_max_length_rate", l.arm_effector_max_length_rate)?;
        check_angle(
            "arm_effector_back_begin_angle",
            l.arm_effector_back_begin_angle,
            -90.0,
            45.0,
        )?;
        check_angle(
            "arm_effector_back_core_begin_angle",
            l.arm_effector_back_core_begin_angle,
            -90.0,
            45.0,
        )?;
        check_angle(
            "arm_effector_back_core_end_angle",
            l.arm_effector_back_core_end_angle,
            -180.0,
            45.0,
        )?;
        check_angle(
            "arm_effector_back_end_angle",
            l.arm_effector_back_end_angle,
            -180.0,
            45.0,
        )?;
        if l.arm_effector_back_core_begin_angle > l.arm_effector_back_begin_angle {
            return Err(ConfigError::InvertedBounds {
                field: "arm_effector_back_begin",
                min: l.arm_effector_back_core_begin_angle,
                max: l.arm_effector_back_begin_angle,
            });
        }
        if l.arm_effector_back_end_angle > l.arm_effector_back_core_end_angle {
            return Err(ConfigError::InvertedBounds {
                field: "arm_effector_back_end",
                min: l.arm_effector_back_end_angle,
                max: l.arm_effector_back_core_end_angle,
            });
        }
        check_angle(
            "arm_effector_back_core_upper_angle",
            l.arm_effector_back_core_upper_angle,
            -90.0,
            90.0,
        )?;
        check_angle(
            "arm_effector_back_core_lower_angle",
            l.arm_effector_back_core_lower_angle,
            -90.0,
            90.0,
        )?;
        check_angle(
            "elbow_front_inner_limit_angle",
            l.elbow_front_inner_limit_angle,
            0.0,
            90.0,
        )?;
        check_angle(
            "elbow_back_inner_limit_angle",
            l.elbow_back_inner_limit_angle,
            0.0,
            90.0,
        )?;
        check_angle("wrist_limit_angle", l.wrist_limit_angle, 0.0, 180.0)?;
        check_cone("foot_limit_yaw", l.foot_limit_yaw)?;
        check_cone("foot_limit_pitch_up", l.foot_limit_pitch_up)?;
        check_cone("foot_limit_pitch_down", l.foot_limit_pitch_down)?;
        check_cone("foot_limit_roll", l.foot_limit_roll)?;

        let h = &self.head;
        check_cone("neck_limit_pitch_up", h.neck_limit_pitch_up)?;
        check_cone("neck_limit_pitch_down", h.neck_limit_pitch_down)?;
        check_cone("neck_limit_roll", h.neck_limit_roll)?;
        check_rate("eyes_to_neck_pitch_rate", h.eyes_to_neck_pitch_rate)?;
        check_cone("head_limit_yaw", h.head_limit_yaw)?;
        check_cone("head_limit_pitch_up", h.head_limit_pitch_up)?;
        check_cone("head_limit_pitch_down", h.head_limit_pitch_down)?;
        check_cone("head_limit_roll", h.head_limit_roll)?;
        check_rate("eyes_to_head_yaw_rate", h.eyes_to_head_yaw_rate)?;
        check_rate("eyes_to_head_pitch_rate", h.eyes_to_head_pitch_rate)?;
        check_angle("eyes_trace_angle", h.eyes_trace_angle, 90.0, 180.0)?;
        check_cone("eyes_limit_yaw", h.eyes_limit_yaw)?;
        check_cone("eyes_limit_pitch", h.eyes_limit_pitch)?;
        check_rate("eyes_yaw_rate", h.eyes_yaw_rate)?;
        check_rate("eyes_pitch_rate", h.eyes_pitch_rate)?;
        check_rate("eyes_yaw_inner_rate", h.eyes_yaw_inner_rate)?;
        check_rate("eyes_yaw_outer_rate", h.eyes_yaw_outer_rate)?;

        Ok(())
    }
}

/// Cone half-angles stay strictly inside a quarter turn.
const MAX_CONE_ANGLE: f32 = 89.99;

fn check_cone(field: &'static str, value: f32) -> Result<(), ConfigError> {
    check_angle(field, value, 0.0, MAX_CONE_ANGLE)
}

fn check_angle(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite { field });
    }
    if value < min || value > max {
        return Err(ConfigError::AngleOutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_rate(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite { field });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::RateOutOfRange { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- defaults ----

    #[test]
    fn default_settings_validate() {
        let settings = SolverSettings::default();
        settings.validate().unwrap();
    }

    #[test]
    fn default_top_level_fields() {
        let settings = SolverSettings::default();
        assert_eq!(settings.sync_displacement, SyncDisplacementMode::Disable);
        assert_eq!(settings.shoulder_axis, ShoulderAxisMode::Auto);
        assert!(settings.roll_bones_enabled);
    }

    #[test]
    fn default_body_rates() {
        let b = BodySettings::default();
        assert!((b.shoulder_solve_bending_rate - 0.25).abs() < f32::EPSILON);
        assert!((b.upper_body_movingfix_rate - 1.0).abs() < f32::EPSILON);
        assert!((b.upper_eyes_trace_angle - 165.0).abs() < f32::EPSILON);
        assert!(b.force_solve_enabled);
        assert!(!b.spine_accurate_limit_enabled);
    }

    #[test]
    fn default_limb_angles() {
        let l = LimbSettings::default();
        assert!((l.automatic_elbow_base_angle - 30.0).abs() < f32::EPSILON);
        assert!((l.leg_effector_max_length_rate - 0.9999).abs() < f32::EPSILON);
        assert!(l.leg_effector_min_length_rate <= l.leg_effector_max_length_rate);
        assert!(l.arm_effector_back_core_begin_angle <= l.arm_effector_back_begin_angle);
        assert!(l.arm_effector_back_end_angle <= l.arm_effector_back_core_end_angle);
    }

    #[test]
    fn default_head_angles() {
        let h = HeadSettings::default();
        assert!((h.neck_limit_pitch_down - 30.0).abs() < f32::EPSILON);
        assert!((h.eyes_trace_angle - 110.0).abs() < f32::EPSILON);
        assert!(h.eyes_yaw_inner_rate < h.eyes_yaw_outer_rate);
    }

    // ---- TOML loading ----

    #[test]
    fn empty_toml_gives_defaults() {
        let settings = SolverSettings::from_toml_str("").unwrap();
        assert!((settings.head.eyes_limit_yaw - 40.0).abs() < f32::EPSILON);
        assert!(settings.body.upper_solve_enabled);
    }

    #[test]
    fn partial_toml_overrides_one_field() {
        let text = "[head]\nneck_limit_roll = 10.0\n";
        let settings = SolverSettings::from_toml_str(text).unwrap();
        assert!((settings.head.neck_limit_roll - 10.0).abs() < f32::EPSILON);
        // Untouched sibling keeps its default.
        assert!((settings.head.neck_limit_pitch_up - 15.0).abs() < f32::EPSILON);
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let mut settings = SolverSettings::default();
        settings.limb.presolve_knee_rate = 0.75;
        let text = toml::to_string(&settings).unwrap();
        let reparsed = SolverSettings::from_toml_str(&text).unwrap();
        assert!((reparsed.limb.presolve_knee_rate - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_toml_is_rejected() {
        let result = SolverSettings::from_toml_str("head = 3");
        assert!(result.is_err());
    }

    // ---- validation ----

    #[test]
    fn cone_angle_over_ninety_is_rejected() {
        let mut settings = SolverSettings::default();
        settings.head.neck_limit_roll = 95.0;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::AngleOutOfRange { field, .. }
            if field == "neck_limit_roll"));
    }

    #[test]
    fn negative_rate_is_rejected() {
        let mut settings = SolverSettings::default();
        settings.body.upper_spine_lerp_rate = -0.1;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::RateOutOfRange { field, .. }
            if field == "upper_spine_lerp_rate"));
    }

    #[test]
    fn trace_angle_below_ninety_is_rejected() {
        let mut settings = SolverSettings::default();
        settings.head.eyes_trace_angle = 45.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn inverted_leg_length_bounds_are_rejected() {
        let mut settings = SolverSettings::default();
        settings.limb.leg_effector_min_length_rate = 0.9;
        settings.limb.leg_effector_max_length_rate = 0.5;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvertedBounds { .. }));
    }

    #[test]
    fn non_finite_angle_is_rejected() {
        let mut settings = SolverSettings::default();
        settings.limb.wrist_limit_angle = f32::NAN;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::NonFinite { field } if field == "wrist_limit_angle"));
    }

    #[test]
    fn back_angle_ordering_is_enforced() {
        let mut settings = SolverSettings::default();
        settings.limb.arm_effector_back_core_begin_angle = 10.0;
        settings.limb.arm_effector_back_begin_angle = -5.0;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvertedBounds { field, .. }
            if field == "arm_effector_back_begin"));
    }
}
