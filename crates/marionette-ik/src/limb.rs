//! Two-bone limb solving for arms and legs.
//!
//! Each limb is a root/mid/end chain (arm/elbow/wrist, leg/knee/foot) driven
//! by the end effector. The law of cosines places the mid joint on a bend
//! plane chosen by the automatic pole: a base direction in the character
//! frame rotated by posture-keyed angles, blended toward the back-area pole
//! when a hand crosses behind the torso, biased toward the previous frame's
//! pole near full extension, and overridden by the bend effector's pull.
//! End rotations follow the solved forearm or shin unless the effector
//! supplies a rotation, then pass a square-cone limiter; roll bones receive
//! a fraction of the relative twist when nothing was limited.

use marionette_core::config::SolverSettings;
use marionette_core::types::SolveMode;
use marionette_math::prelude::*;
use marionette_rig::prelude::*;
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::rotation::{WEIGHT_EPSILON, blend_rotation, twist_about};

/// Fraction of the relative twist distributed onto a roll bone.
const ROLL_BONE_TWIST_RATE: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LimbKind {
    Arm,
    Leg,
}

#[derive(Clone, Copy)]
struct Chain {
    kind: LimbKind,
    side: Side,
    root: BoneLocation,
    mid: BoneLocation,
    end: BoneLocation,
    end_effector: EffectorLocation,
    bend_effector: EffectorLocation,
}

impl Chain {
    const fn arm(side: Side) -> Self {
        Self {
            kind: LimbKind::Arm,
            side,
            root: BoneLocation::Arm(side),
            mid: BoneLocation::Elbow(side),
            end: BoneLocation::Wrist(side),
            end_effector: EffectorLocation::Wrist(side),
            bend_effector: EffectorLocation::Elbow(side),
        }
    }

    const fn leg(side: Side) -> Self {
        Self {
            kind: LimbKind::Leg,
            side,
            root: BoneLocation::Leg(side),
            mid: BoneLocation::Knee(side),
            end: BoneLocation::Foot(side),
            end_effector: EffectorLocation::Foot(side),
            bend_effector: EffectorLocation::Knee(side),
        }
    }
}

/// Per-limb pole memory for the presolve bias.
#[derive(Clone, Copy, Default)]
struct BendState {
    previous: Option<Vector3<f32>>,
}

const fn state_slot(kind: LimbKind, side: Side) -> usize {
    let base = match kind {
        LimbKind::Arm => 0,
        LimbKind::Leg => 2,
    };
    base + side.index()
}

/// Solves all four limb chains against the already-solved torso.
pub struct LimbSolver {
    states: [BendState; 4],
}

impl LimbSolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: [BendState::default(); 4],
        }
    }

    pub fn solve_legs(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        mode: SolveMode,
        settings: &SolverSettings,
    ) {
        for side in Side::BOTH {
            self.solve_chain(skeleton, pose, mode, settings, Chain::leg(side));
        }
    }

    pub fn solve_arms(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        mode: SolveMode,
        settings: &SolverSettings,
    ) {
        for side in Side::BOTH {
            self.solve_chain(skeleton, pose, mode, settings, Chain::arm(side));
        }
    }

    fn solve_chain(
        &mut self,
        skeleton: &mut Skeleton,
        pose: &SkeletonPose,
        mode: SolveMode,
        settings: &SolverSettings,
        chain: Chain,
    ) {
        if !skeleton.bone(chain.root).present
            || !skeleton.bone(chain.mid).present
            || !skeleton.bone(chain.end).present
        {
            return;
        }

        let weight = skeleton.effector(chain.end_effector).effective_position_weight();
        let always = match chain.kind {
            LimbKind::Arm => settings.limb.arm_always_solve_enabled,
            LimbKind::Leg => settings.limb.leg_always_solve_enabled,
        };
        if weight <= WEIGHT_EPSILON && !always {
            return;
        }

        // Segment lengths come from the bind positions of the chain joints,
        // not the live parents, so interposed roll bones do not shorten them.
        let upper_len = (skeleton.bone(chain.mid).default_position
            - skeleton.bone(chain.root).default_position)
            .norm();
        let lower_len = (skeleton.bone(chain.end).default_position
            - skeleton.bone(chain.mid).default_position)
            .norm();
        let total_len = upper_len + lower_len;
        if upper_len <= VECTOR_EPSILON || lower_len <= VECTOR_EPSILON {
            return;
        }

        let angles = skeleton.constants().limb;

        // Character frame carried by the solved hips.
        let hips_to_base = skeleton.bone(BoneLocation::Hips).world_to_base_rotation;
        let hips_rotation = skeleton.world_rotation(BoneLocation::Hips, pose);
        let char_basis = quat_to_basis(&(hips_rotation * hips_to_base));
        let char_inv = char_basis.transpose();

        let root_pos = skeleton.world_position(chain.root, pose);

        // Destination: followed position blended toward the free target by
        // the effector's pull.
        let follow = skeleton.bone_world_position(chain.end_effector, pose);
        let mut target = if weight > WEIGHT_EPSILON {
            let pull = skeleton.effector(chain.end_effector).effective_pull();
            let raw = skeleton.effector_mut(chain.end_effector).world_position();
            follow.lerp(&raw, pull)
        } else {
            follow
        };

        if chain.kind == LimbKind::Leg && settings.limb.prefix_leg_effector_enabled {
            clamp_into_lower_cone(
                &char_basis,
                &char_inv,
                &root_pos,
                &mut target,
                angles.prefix_leg_upper,
            );
        }

        // Reach clamp.
        let to_target = target - root_pos;
        let raw_dist = to_target.norm();
        if raw_dist <= VECTOR_EPSILON {
            return;
        }
        let axis = to_target / raw_dist;
        let (min_rate, max_rate) = match chain.kind {
            LimbKind::Arm => (0.0, settings.limb.arm_effector_max_length_rate),
            LimbKind::Leg => (
                settings.limb.leg_effector_min_length_rate,
                settings.limb.leg_effector_max_length_rate,
            ),
        };
        let dist = raw_dist.clamp(total_len * min_rate, total_len * max_rate);
        let target = root_pos + axis * dist;

        let root_cos = two_bone_root_cosine(upper_len, lower_len, dist);
        let local_target = char_inv * (target - root_pos);

        // Automatic pole in the character frame.
        let mut bend_dir = bend_frame(chain.kind, &char_basis, &axis).map(|(u, v)| {
            let height = (local_target.y / dist).clamp(-1.0, 1.0);
            let angle = automatic_bend_angle(&angles, chain.kind, height);
            let mut dir = u * angle.cos() + v * angle.sin();
            if chain.kind == LimbKind::Arm {
                let outward = local_target.x * chain.side.sign();
                let azimuth = local_target.z.atan2(outward);
                let back = back_area_weight(&angles, azimuth);
                if back > 0.0 {
                    let back_angle = back_bend_angle(&angles, height.asin());
                    let back_dir = u * back_angle.cos() + v * back_angle.sin();
                    if let Some(blend) = lerp_dir(&dir, &back_dir, back) {
                        dir = blend;
                    }
                }
            }
            dir
        });

        // Bend effector pull overrides the automatic pole.
        let bend_weight = skeleton.effector(chain.bend_effector).effective_position_weight();
        if bend_weight > WEIGHT_EPSILON {
            let bend_follow = skeleton.bone_world_position(chain.bend_effector, pose);
            let bend_pull = skeleton.effector(chain.bend_effector).effective_pull();
            let raw = skeleton.effector_mut(chain.bend_effector).world_position();
            let mut bend_target = bend_follow.lerp(&raw, bend_pull);
            if chain.kind == LimbKind::Leg && settings.limb.prefix_leg_effector_enabled {
                clamp_into_lower_cone(
                    &char_basis,
                    &char_inv,
                    &root_pos,
                    &mut bend_target,
                    angles.prefix_knee_upper,
                );
            }
            let mut desired = project_onto_plane(&(bend_target - root_pos), &axis);
            if safe_normalize(&mut desired) {
                bend_dir = match bend_dir {
                    Some(current) => lerp_dir(&current, &desired, bend_weight).or(Some(desired)),
                    None => Some(desired),
                };
            }
        }

        let state = &mut self.states[state_slot(chain.kind, chain.side)];

        // Presolve: near extension or compression the pole eases toward the
        // previous frame's solved pole instead of snapping.
        let (presolve_enabled, presolve_rate, presolve_cos, presolve_len_rate) = match chain.kind {
            LimbKind::Arm => (
                settings.limb.presolve_elbow_enabled,
                settings.limb.presolve_elbow_rate,
                angles.presolve_elbow_lerp_cos,
                settings.limb.presolve_elbow_lerp_length_rate,
            ),
            LimbKind::Leg => (
                settings.limb.presolve_knee_enabled,
                settings.limb.presolve_knee_rate,
                angles.presolve_knee_lerp_cos,
                settings.limb.presolve_knee_lerp_length_rate,
            ),
        };
        if presolve_enabled {
            if let (Some(current), Some(previous)) = (bend_dir, state.previous) {
                let blend = presolve_blend(
                    presolve_rate,
                    presolve_cos,
                    presolve_len_rate,
                    root_cos,
                    dist,
                    total_len,
                );
                if blend > 0.0 {
                    if let Some(dir) = lerp_dir(&current, &previous, blend) {
                        bend_dir = Some(dir);
                    }
                }
            }
        }

        let bend_dir = flatten_bend(bend_dir, state.previous, &axis)
            .unwrap_or_else(|| fallback_perpendicular(&char_basis, &axis));
        state.previous = Some(bend_dir);

        // Joint positions.
        let root_sin = (1.0 - root_cos * root_cos).max(0.0).sqrt();
        let mid_pos = root_pos + (axis * root_cos + bend_dir * root_sin) * upper_len;
        let mut end_pos = target;

        let mut limited = false;
        if chain.kind == LimbKind::Arm {
            limited = limit_elbow_inner(
                &char_basis,
                &char_inv,
                chain.side,
                &angles,
                &mid_pos,
                &mut end_pos,
                lower_len,
            );
        }

        // Rotation frames. The from-rotations feed the weight blend and are
        // captured before any cache write.
        let parent = skeleton.bone(chain.root).live_parent;
        let (parent_rotation, parent_default) = match parent {
            Some(loc) => (
                skeleton.world_rotation(loc, pose),
                skeleton.bone(loc).default_rotation,
            ),
            None => (UnitQuaternion::identity(), UnitQuaternion::identity()),
        };
        let parent_delta = parent_rotation * parent_default.inverse();

        let root_default = skeleton.bone(chain.root).default_rotation;
        let mid_default = skeleton.bone(chain.mid).default_rotation;
        let end_default = skeleton.bone(chain.end).default_rotation;
        let (root_from, mid_from, end_from) = if mode.is_continuous() {
            (
                skeleton.world_rotation(chain.root, pose),
                skeleton.world_rotation(chain.mid, pose),
                skeleton.world_rotation(chain.end, pose),
            )
        } else {
            (
                parent_delta * root_default,
                parent_delta * mid_default,
                parent_delta * end_default,
            )
        };

        let dir_upper = normalized_or(mid_pos - root_pos, axis);
        let dir_lower = normalized_or(end_pos - mid_pos, axis);

        let root_reference = quat_to_basis(&parent_delta) * skeleton.bone(chain.root).local_axis_basis;
        let root_basis = skeleton
            .bone(chain.root)
            .axis_hint
            .and_then(|hint| compute_basis_from(&root_reference, &dir_upper, hint));
        let root_solved = match root_basis {
            Some(basis) => skeleton.bone(chain.root).world_rotation_from_axis_basis(&basis),
            None => root_from,
        };

        // The forearm/shin basis is completed from the solved upper segment
        // rather than the carried bind twist when forcefix applies.
        let forcefix = match chain.kind {
            LimbKind::Arm => settings.limb.arm_basis_forcefix_enabled,
            LimbKind::Leg => true,
        };
        let mid_reference = match (forcefix, root_basis) {
            (true, Some(basis)) => basis,
            _ => {
                quat_to_basis(&(root_solved * root_default.inverse()))
                    * skeleton.bone(chain.mid).local_axis_basis
            }
        };
        let mid_solved = match skeleton
            .bone(chain.mid)
            .axis_hint
            .and_then(|hint| compute_basis_from(&mid_reference, &dir_lower, hint))
        {
            Some(basis) => skeleton.bone(chain.mid).world_rotation_from_axis_basis(&basis),
            None => mid_from,
        };

        let full = weight >= 1.0 - WEIGHT_EPSILON || (weight <= WEIGHT_EPSILON && always);
        let (root_final, mid_final) = if full {
            (root_solved, mid_solved)
        } else {
            (
                blend_rotation(&root_from, &root_solved, weight),
                blend_rotation(&mid_from, &mid_solved, weight),
            )
        };

        // End bone follows the solved mid segment, steered toward the free
        // target rotation when one is supplied, then cone-limited against
        // the mid bone's base frame.
        let mut end_rotation = mid_final * mid_from.inverse() * end_from;
        let rotation_weight = skeleton.effector(chain.end_effector).effective_rotation_weight();
        if rotation_weight > WEIGHT_EPSILON {
            let effector_default = skeleton.effector(chain.end_effector).default_rotation;
            let raw = skeleton.effector_mut(chain.end_effector).world_rotation();
            let to = raw * (effector_default.inverse() * end_default);
            end_rotation = blend_rotation(&end_rotation, &to, rotation_weight);
        }

        let limit_enabled = match chain.kind {
            LimbKind::Arm => settings.limb.wrist_limit_enabled,
            LimbKind::Leg => true,
        };
        if limit_enabled {
            let (roll, pitch_up, pitch_down, yaw) = match chain.kind {
                LimbKind::Arm => (
                    angles.wrist_limit,
                    angles.wrist_limit,
                    angles.wrist_limit,
                    angles.wrist_limit,
                ),
                LimbKind::Leg => (
                    angles.foot_roll,
                    angles.foot_pitch_up,
                    angles.foot_pitch_down,
                    angles.foot_yaw,
                ),
            };
            let mid_base = mid_final * skeleton.bone(chain.mid).world_to_base_rotation;
            let local = mid_base.inverse()
                * (end_rotation * skeleton.bone(chain.end).world_to_base_rotation);
            let local_basis = quat_to_basis(&local);
            let mut dir_y = local_basis.column(1).into_owned();
            let mut dir_z = local_basis.column(2).into_owned();
            let limited_y = limit_square_xz(&mut dir_y, roll.sin, roll.sin, pitch_up.sin, pitch_down.sin);
            let limited_z = limit_square_xy(&mut dir_z, yaw.sin, yaw.sin, pitch_down.sin, pitch_up.sin);
            if limited_y || limited_z {
                if let Some(fixed) = basis_lock_z_from_y(&dir_y, &dir_z) {
                    end_rotation = mid_base
                        * basis_to_quat(&fixed)
                        * skeleton.bone(chain.end).base_to_world_rotation;
                    limited = true;
                }
            }
        }

        skeleton.set_world_rotation(chain.root, root_final);
        skeleton.set_world_rotation(chain.mid, mid_final);
        skeleton.set_world_rotation(chain.end, end_rotation);
        if full {
            skeleton.set_world_position(chain.mid, mid_pos);
            skeleton.set_world_position(chain.end, end_pos);
        }

        if settings.roll_bones_enabled && chain.kind == LimbKind::Arm {
            solve_roll_bone(
                skeleton,
                mode,
                BoneLocation::ArmRoll(chain.side),
                &root_final,
                &mid_final,
                &root_default,
                &dir_upper,
                limited,
            );
            solve_roll_bone(
                skeleton,
                mode,
                BoneLocation::ElbowRoll(chain.side),
                &mid_final,
                &end_rotation,
                &mid_default,
                &dir_lower,
                limited,
            );
        }
    }
}

impl Default for LimbSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine of the root interior angle for segment lengths `a`/`b` at reach
/// `dist`, clamped into [-1, 1] so out-of-range targets fully extend or
/// fully fold the chain.
fn two_bone_root_cosine(a: f32, b: f32, dist: f32) -> f32 {
    ((a * a + dist * dist - b * b) / (2.0 * a * dist)).clamp(-1.0, 1.0)
}

/// Bend-plane frame perpendicular to `axis`: `u` is the zero-angle pole,
/// `v` the quarter-turn direction. Positive angles swing an arm's elbow
/// toward the character's back; the leg frame starts at character forward.
fn bend_frame(
    kind: LimbKind,
    char_basis: &Matrix3<f32>,
    axis: &Vector3<f32>,
) -> Option<(Vector3<f32>, Vector3<f32>)> {
    let down = -char_basis.column(1).into_owned();
    let forward = char_basis.column(2).into_owned();
    let (primary, secondary) = match kind {
        LimbKind::Arm => (down, -forward),
        LimbKind::Leg => (forward, down),
    };
    let mut u = project_onto_plane(&primary, axis);
    if !safe_normalize(&mut u) {
        u = project_onto_plane(&secondary, axis);
        if !safe_normalize(&mut u) {
            return None;
        }
    }
    let mut v = axis.cross(&u);
    if !safe_normalize(&mut v) {
        return None;
    }
    let orient = match kind {
        LimbKind::Arm => -forward,
        LimbKind::Leg => char_basis.column(0).into_owned(),
    };
    if v.dot(&orient) < 0.0 {
        v = -v;
    }
    Some((u, v))
}

/// Automatic pole angle keyed on target elevation. `height` is the sine of
/// the target's elevation in the character frame.
fn automatic_bend_angle(angles: &LimbAngles, kind: LimbKind, height: f32) -> f32 {
    match kind {
        LimbKind::Leg => angles.automatic_knee_base,
        LimbKind::Arm => {
            if height >= 0.0 {
                lerp(angles.automatic_elbow_base, angles.automatic_elbow_upper, height)
            } else {
                lerp(angles.automatic_elbow_base, angles.automatic_elbow_lower, -height)
            }
        }
    }
}

/// Smoothstepped weight of the back-area pole for a hand azimuth, measured
/// from the outward lateral direction (positive toward the front). The keys
/// are negative angles behind the torso; outside [end, begin] the normal
/// pole applies.
fn back_area_weight(angles: &LimbAngles, azimuth: f32) -> f32 {
    if azimuth >= angles.back_begin || azimuth <= angles.back_end {
        return 0.0;
    }
    if azimuth <= angles.back_core_begin && azimuth >= angles.back_core_end {
        return 1.0;
    }
    if azimuth > angles.back_core_begin {
        smoothstep((angles.back_begin - azimuth) / (angles.back_begin - angles.back_core_begin))
    } else {
        smoothstep((azimuth - angles.back_end) / (angles.back_core_end - angles.back_end))
    }
}

/// Back-area pole angle split by target elevation.
fn back_bend_angle(angles: &LimbAngles, elevation: f32) -> f32 {
    if elevation >= angles.back_core_upper {
        return angles.automatic_elbow_back_upper;
    }
    if elevation <= angles.back_core_lower {
        return angles.automatic_elbow_back_lower;
    }
    let t = (elevation - angles.back_core_lower)
        / (angles.back_core_upper - angles.back_core_lower);
    lerp(angles.automatic_elbow_back_lower, angles.automatic_elbow_back_upper, t)
}

/// Blend factor toward the previous pole. Ramps in as the root interior
/// angle closes past `lerp_cos` (both extension and compression drive the
/// cosine toward one) or as the reach ratio enters the final
/// `length_rate` span.
fn presolve_blend(
    rate: f32,
    lerp_cos: f32,
    length_rate: f32,
    root_cos: f32,
    dist: f32,
    total_len: f32,
) -> f32 {
    let mut near = 0.0_f32;
    if lerp_cos < 1.0 && root_cos >= lerp_cos {
        near = (root_cos - lerp_cos) / (1.0 - lerp_cos);
    }
    if length_rate > 0.0 && total_len > 0.0 {
        let ratio = dist / total_len;
        let begin = 1.0 - length_rate;
        if ratio >= begin {
            near = near.max(((ratio - begin) / length_rate).min(1.0));
        }
    }
    (near.min(1.0) * rate).clamp(0.0, 1.0)
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Project the pole onto the plane perpendicular to `axis`, falling back to
/// the previous frame's pole when the projection collapses.
fn flatten_bend(
    bend: Option<Vector3<f32>>,
    previous: Option<Vector3<f32>>,
    axis: &Vector3<f32>,
) -> Option<Vector3<f32>> {
    let flatten = |dir: Vector3<f32>| {
        let mut flat = project_onto_plane(&dir, axis);
        if safe_normalize(&mut flat) { Some(flat) } else { None }
    };
    bend.and_then(flatten).or_else(|| previous.and_then(flatten))
}

/// Any unit direction perpendicular to `axis`, preferring the character's
/// forward, then up, then lateral.
fn fallback_perpendicular(char_basis: &Matrix3<f32>, axis: &Vector3<f32>) -> Vector3<f32> {
    for column in [2usize, 1, 0] {
        let mut candidate = project_onto_plane(&char_basis.column(column).into_owned(), axis);
        if safe_normalize(&mut candidate) {
            return candidate;
        }
    }
    Vector3::z()
}

/// Clamp `target` into the square cone that opens downward from `origin` in
/// the character frame. Returns whether clamping occurred.
fn clamp_into_lower_cone(
    char_basis: &Matrix3<f32>,
    char_inv: &Matrix3<f32>,
    origin: &Vector3<f32>,
    target: &mut Vector3<f32>,
    limit: CosSin,
) -> bool {
    let local = char_inv * (*target - origin);
    let dist = local.norm();
    if dist <= VECTOR_EPSILON {
        return false;
    }
    let mut dir = local / dist;
    dir.y = -dir.y;
    if limit_square_xz(&mut dir, limit.sin, limit.sin, limit.sin, limit.sin) {
        dir.y = -dir.y;
        *target = origin + char_basis * (dir * dist);
        true
    } else {
        false
    }
}

/// Keep the forearm from crossing the chest plane: its inward lateral
/// component is clamped to the front or back inner bound and the end joint
/// re-placed along the corrected direction.
fn limit_elbow_inner(
    char_basis: &Matrix3<f32>,
    char_inv: &Matrix3<f32>,
    side: Side,
    angles: &LimbAngles,
    mid_pos: &Vector3<f32>,
    end_pos: &mut Vector3<f32>,
    lower_len: f32,
) -> bool {
    let mut forearm = *end_pos - mid_pos;
    if !safe_normalize(&mut forearm) {
        return false;
    }
    let mut local = char_inv * forearm;
    let inward_sign = -side.sign();
    let inward = local.x * inward_sign;
    let bound = if local.z >= 0.0 {
        angles.elbow_front_inner.sin
    } else {
        angles.elbow_back_inner.sin
    };
    if inward <= bound {
        return false;
    }
    local.x = bound * inward_sign;
    let rest = (1.0 - bound * bound).max(0.0).sqrt();
    let yz = (local.y * local.y + local.z * local.z).sqrt();
    if yz > VECTOR_EPSILON {
        let scale = rest / yz;
        local.y *= scale;
        local.z *= scale;
    } else {
        local.y = 0.0;
        local.z = rest;
    }
    *end_pos = mid_pos + (char_basis * local) * lower_len;
    true
}

/// Distribute a fraction of the parent-to-child twist onto a roll bone.
/// When the chain was limited the roll bone follows its parent instead in
/// reset mode and is left untouched in continuous mode.
#[allow(clippy::too_many_arguments)]
fn solve_roll_bone(
    skeleton: &mut Skeleton,
    mode: SolveMode,
    loc: BoneLocation,
    parent_rotation: &UnitQuaternion<f32>,
    child_rotation: &UnitQuaternion<f32>,
    parent_default: &UnitQuaternion<f32>,
    segment_dir: &Vector3<f32>,
    limited: bool,
) {
    if !skeleton.bone(loc).present {
        return;
    }
    let offset = parent_default.inverse() * skeleton.bone(loc).default_rotation;
    if limited {
        if !mode.is_continuous() {
            skeleton.set_world_rotation(loc, parent_rotation * offset);
        }
        return;
    }
    let relative = parent_rotation.inverse() * child_rotation;
    let local_axis = parent_rotation.inverse() * segment_dir;
    let twist = twist_about(&relative, &local_axis);
    let partial = twist.powf(ROLL_BONE_TWIST_RATE);
    skeleton.set_world_rotation(loc, parent_rotation * partial * offset);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
