//! Gauss-Seidel relaxation over calibrated distance constraints.
//!
//! Each sweep walks the constraint list once and corrects every violated
//! edge locally, splitting the correction between the two endpoints in
//! inverse proportion to their confidence. A high-confidence joint barely
//! moves while a doubtful one absorbs most of the correction, which is how
//! one noisy sample gets pulled back onto the skeleton without disturbing
//! the joints the source saw clearly.

use marionette_core::error::PoseGraphError;
use marionette_math::prelude::*;
use nalgebra::Vector3;

use crate::config::PoseGraphConfig;
use crate::joint::{JointSample, TrackedJoint};

/// Bind distances shorter than this cannot calibrate a constraint.
const MIN_CONSTRAINT_LENGTH: f32 = 1.0e-3;

/// The two posture segments checked against world up, lower joint first.
const POSTURE_SEGMENTS: [(TrackedJoint, TrackedJoint); 2] = [
    (TrackedJoint::UpperChest, TrackedJoint::Head),
    (TrackedJoint::Hips, TrackedJoint::UpperChest),
];

#[derive(Debug)]
struct Constraint {
    from: usize,
    to: usize,
    distance: f32,
    /// Unit direction from `from` to `to` at bind; the correction axis when
    /// the live pair is coincident, and the seeding axis for bad samples.
    bind_direction: Vector3<f32>,
}

/// What a call to [`PoseGraphOptimizer::optimize`] did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveReport {
    /// Sweeps actually run, at most the configured cap.
    pub iterations: usize,
    /// Total squared beyond-slack distance error after the last sweep.
    pub residual: f32,
}

/// Relaxes noisy tracked-joint samples onto the calibrated skeleton.
#[derive(Debug)]
pub struct PoseGraphOptimizer {
    config: PoseGraphConfig,
    constraints: Vec<Constraint>,
}

impl PoseGraphOptimizer {
    /// Calibrate the configured constraint list against a bind pose.
    ///
    /// # Errors
    ///
    /// Returns [`PoseGraphError`] for a non-finite bind position, an empty
    /// constraint list, a self edge, or a pair of joints bound closer than
    /// the minimum constraint length.
    pub fn new(
        bind_positions: &[Vector3<f32>; TrackedJoint::COUNT],
        config: PoseGraphConfig,
    ) -> Result<Self, PoseGraphError> {
        for joint in TrackedJoint::ALL {
            let position = bind_positions[joint.index()];
            if !position.x.is_finite() || !position.y.is_finite() || !position.z.is_finite() {
                return Err(PoseGraphError::NonFiniteBind {
                    joint: joint.name(),
                });
            }
        }
        if config.constraints.is_empty() {
            return Err(PoseGraphError::EmptyConstraints);
        }

        let mut constraints = Vec::with_capacity(config.constraints.len());
        for (index, edge) in config.constraints.iter().enumerate() {
            if edge.from == edge.to {
                return Err(PoseGraphError::SelfConstraint { index });
            }
            let from = edge.from.index();
            let to = edge.to.index();
            let delta = bind_positions[to] - bind_positions[from];
            let distance = delta.norm();
            if distance < MIN_CONSTRAINT_LENGTH {
                return Err(PoseGraphError::DegenerateConstraint {
                    index,
                    min_len: MIN_CONSTRAINT_LENGTH,
                });
            }
            constraints.push(Constraint {
                from,
                to,
                distance,
                bind_direction: delta / distance,
            });
        }

        Ok(Self {
            config,
            constraints,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PoseGraphConfig {
        &self.config
    }

    /// Total squared distance error beyond the slack band.
    #[must_use]
    pub fn residual(&self, joints: &[JointSample; TrackedJoint::COUNT]) -> f32 {
        let mut total = 0.0;
        for constraint in &self.constraints {
            let dist = (joints[constraint.to].position - joints[constraint.from].position).norm();
            let overshoot = ((dist - constraint.distance).abs() - self.config.slack).max(0.0);
            total += overshoot * overshoot;
        }
        total
    }

    /// Seed bad samples, sweep until the residual threshold or the
    /// iteration cap, then stamp the trusted output confidences.
    pub fn optimize(&self, joints: &mut [JointSample; TrackedJoint::COUNT]) -> SolveReport {
        self.seed_low_confidence(joints);

        let mut report = SolveReport {
            iterations: 0,
            residual: self.residual(joints),
        };
        while report.iterations < self.config.max_iterations {
            if report.residual <= self.config.residual_threshold {
                break;
            }
            self.step(joints);
            report.iterations += 1;
            report.residual = self.residual(joints);
        }

        for joint in TrackedJoint::ALL {
            joints[joint.index()].confidence = if joint.is_upper_body() {
                self.config.trusted_upper_confidence
            } else {
                self.config.trusted_lower_confidence
            };
        }
        report
    }

    /// One posture pass followed by one relaxation sweep.
    ///
    /// Exposed so callers needing a wall-clock bound can drive the sweeps
    /// themselves; confidences are left alone here.
    pub fn step(&self, joints: &mut [JointSample; TrackedJoint::COUNT]) {
        self.posture_pass(joints);
        self.relax_constraints(joints);
    }

    /// Joints the source barely saw restart from the position its most
    /// confident constraint partner implies, keeping the bind direction.
    fn seed_low_confidence(&self, joints: &mut [JointSample; TrackedJoint::COUNT]) {
        let gate = self.config.initial_guess_confidence;
        for joint in TrackedJoint::ALL {
            let index = joint.index();
            if joints[index].confidence >= gate {
                continue;
            }
            for constraint in &self.constraints {
                if constraint.from == index && joints[constraint.to].confidence >= gate {
                    joints[index].position = joints[constraint.to].position
                        - constraint.bind_direction * constraint.distance;
                    break;
                }
                if constraint.to == index && joints[constraint.from].confidence >= gate {
                    joints[index].position = joints[constraint.from].position
                        + constraint.bind_direction * constraint.distance;
                    break;
                }
            }
        }
    }

    /// Nudge the head-chest and chest-pelvis segments toward world up when
    /// they lean further than the posture threshold. Only the upper joint
    /// moves, and the segment keeps its length.
    fn posture_pass(&self, joints: &mut [JointSample; TrackedJoint::COUNT]) {
        let threshold_cos = self.config.posture_threshold_angle.to_radians().cos();
        for (lower, upper) in POSTURE_SEGMENTS {
            let base = joints[lower.index()].position;
            let segment = joints[upper.index()].position - base;
            let length = segment.norm();
            if length <= VECTOR_EPSILON {
                continue;
            }
            let dir = segment / length;
            if dir.y >= threshold_cos {
                continue;
            }
            if let Some(nudged) = lerp_dir(&dir, &Vector3::y(), self.config.posture_rate) {
                joints[upper.index()].position = base + nudged * length;
            }
        }
    }

    fn relax_constraints(&self, joints: &mut [JointSample; TrackedJoint::COUNT]) {
        for constraint in &self.constraints {
            let delta = joints[constraint.to].position - joints[constraint.from].position;
            let dist = delta.norm();
            let axis = if dist > VECTOR_EPSILON {
                delta / dist
            } else {
                constraint.bind_direction
            };
            let error = dist - constraint.distance;
            let overshoot = error.abs() - self.config.slack;
            if overshoot <= 0.0 {
                continue;
            }
            let correction = axis * (overshoot.copysign(error) * self.config.gain);

            let conf_from = joints[constraint.from].confidence.max(0.0);
            let conf_to = joints[constraint.to].confidence.max(0.0);
            let total = conf_from + conf_to;
            let (share_from, share_to) = if total > f32::EPSILON {
                (conf_to / total, conf_from / total)
            } else {
                (0.5, 0.5)
            };
            joints[constraint.from].position += correction * share_from;
            joints[constraint.to].position -= correction * share_to;
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

    use crate::config::ConstraintSpec;

    fn canonical_joints() -> [Vector3<f32>; TrackedJoint::COUNT] {
        [
            Vector3::new(0.0, 1.55, 0.0),
            Vector3::new(0.0, 1.2, 0.0),
            Vector3::new(0.2, 1.4, 0.0),
            Vector3::new(0.5, 1.4, 0.0),
            Vector3::new(0.75, 1.4, 0.0),
            Vector3::new(-0.2, 1.4, 0.0),
            Vector3::new(-0.5, 1.4, 0.0),
            Vector3::new(-0.75, 1.4, 0.0),
            Vector3::new(0.0, 0.98, 0.0),
            Vector3::new(0.09, 0.92, 0.0),
            Vector3::new(0.09, 0.5, 0.02),
            Vector3::new(0.09, 0.06, 0.0),
            Vector3::new(-0.09, 0.92, 0.0),
            Vector3::new(-0.09, 0.5, 0.02),
            Vector3::new(-0.09, 0.06, 0.0),
        ]
    }

    fn full_confidence(
        positions: [Vector3<f32>; TrackedJoint::COUNT],
    ) -> [JointSample; TrackedJoint::COUNT] {
        positions.map(|position| JointSample::new(position, 1.0))
    }

    fn default_optimizer() -> PoseGraphOptimizer {
        PoseGraphOptimizer::new(&canonical_joints(), PoseGraphConfig::default())
            .expect("canonical bind calibrates")
    }

    // ---- construction ----

    #[test]
    fn empty_constraint_list_is_rejected() {
        let config = PoseGraphConfig {
            constraints: Vec::new(),
            ..PoseGraphConfig::default()
        };
        let err = PoseGraphOptimizer::new(&canonical_joints(), config).unwrap_err();
        assert!(matches!(err, PoseGraphError::EmptyConstraints));
    }

    #[test]
    fn self_edge_is_rejected_with_its_index() {
        let mut config = PoseGraphConfig::default();
        config
            .constraints
            .insert(2, ConstraintSpec::new(TrackedJoint::Head, TrackedJoint::Head));
        let err = PoseGraphOptimizer::new(&canonical_joints(), config).unwrap_err();
        assert!(matches!(err, PoseGraphError::SelfConstraint { index: 2 }));
    }

    #[test]
    fn coincident_bind_pair_is_rejected() {
        let mut bind = canonical_joints();
        bind[TrackedJoint::LeftShoulder.index()] =
            bind[TrackedJoint::RightShoulder.index()];
        let config = PoseGraphConfig {
            constraints: vec![ConstraintSpec::new(
                TrackedJoint::RightShoulder,
                TrackedJoint::LeftShoulder,
            )],
            ..PoseGraphConfig::default()
        };
        let err = PoseGraphOptimizer::new(&bind, config).unwrap_err();
        assert!(matches!(
            err,
            PoseGraphError::DegenerateConstraint { index: 0, .. }
        ));
    }

    #[test]
    fn non_finite_bind_is_rejected() {
        let mut bind = canonical_joints();
        bind[TrackedJoint::RightFoot.index()].y = f32::NAN;
        let err = PoseGraphOptimizer::new(&bind, PoseGraphConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PoseGraphError::NonFiniteBind { joint: "RightFoot" }
        ));
    }

    // ---- relaxation ----

    #[test]
    fn satisfied_skeleton_is_a_fixed_point() {
        let bind = canonical_joints();
        let optimizer = default_optimizer();
        let mut joints = full_confidence(bind);
        let report = optimizer.optimize(&mut joints);

        assert_eq!(report.iterations, 0, "no sweep should run at the bind");
        assert!(report.residual <= f32::EPSILON);
        for joint in TrackedJoint::ALL {
            assert_eq!(
                joints[joint.index()].position,
                bind[joint.index()],
                "{} moved at the fixed point",
                joint.name()
            );
        }
    }

    #[test]
    fn error_inside_the_slack_band_is_left_alone() {
        let bind = canonical_joints();
        let optimizer = default_optimizer();
        let mut joints = full_confidence(bind);
        joints[TrackedJoint::RightHand.index()].position.x += 0.008;
        let displaced = joints[TrackedJoint::RightHand.index()].position;

        let report = optimizer.optimize(&mut joints);
        assert_eq!(report.iterations, 0);
        assert_eq!(joints[TrackedJoint::RightHand.index()].position, displaced);
    }

    #[test]
    fn zero_confidence_joint_reseeds_from_its_neighbor() {
        let bind = canonical_joints();
        let optimizer = default_optimizer();
        let mut joints = full_confidence(bind);
        let hand = TrackedJoint::LeftHand.index();
        joints[hand].position = Vector3::new(5.0, -2.0, 3.0);
        joints[hand].confidence = 0.0;

        optimizer.optimize(&mut joints);

        assert_relative_eq!(joints[hand].position, bind[hand], epsilon = 1.0e-5);
        let elbow = TrackedJoint::LeftLowerArm.index();
        assert_eq!(
            joints[elbow].position, bind[elbow],
            "trusted neighbor moved for a discarded sample"
        );
    }

    #[test]
    fn doubtful_joint_relaxes_onto_the_constraint() {
        let bind = canonical_joints();
        let optimizer = default_optimizer();
        let mut joints = full_confidence(bind);
        let hand = TrackedJoint::LeftHand.index();
        let elbow = TrackedJoint::LeftLowerArm.index();
        joints[hand].position.x -= 0.3;
        joints[hand].confidence = 0.3;

        let report = optimizer.optimize(&mut joints);
        assert!(report.iterations > 0);

        let solved = (joints[hand].position - joints[elbow].position).norm();
        let slack = optimizer.config().slack;
        assert!(
            (solved - 0.25).abs() <= slack + 1.0e-3,
            "forearm length off: {solved}"
        );
        let drift = (joints[elbow].position - bind[elbow]).norm();
        assert!(drift < 0.08, "trusted elbow drifted {drift}");
    }

    #[test]
    fn identical_inputs_relax_identically() {
        let bind = canonical_joints();
        let optimizer = default_optimizer();
        let make = || {
            let mut joints = full_confidence(bind);
            joints[TrackedJoint::RightHand.index()].position += Vector3::new(0.1, -0.05, 0.08);
            joints[TrackedJoint::RightHand.index()].confidence = 0.4;
            joints[TrackedJoint::LeftFoot.index()].position += Vector3::new(-0.06, 0.1, 0.0);
            joints[TrackedJoint::LeftFoot.index()].confidence = 0.55;
            joints
        };
        let mut first = make();
        let mut second = make();
        let report_a = optimizer.optimize(&mut first);
        let report_b = optimizer.optimize(&mut second);

        assert_eq!(report_a, report_b);
        for joint in TrackedJoint::ALL {
            assert_eq!(
                first[joint.index()].position,
                second[joint.index()].position,
                "{} diverged",
                joint.name()
            );
        }
    }

    #[test]
    fn residual_never_rises_across_sweeps() {
        let optimizer = default_optimizer();
        let mut joints = full_confidence(canonical_joints());
        joints[TrackedJoint::RightHand.index()].position += Vector3::new(0.1, -0.05, 0.08);
        joints[TrackedJoint::RightHand.index()].confidence = 0.0;
        joints[TrackedJoint::LeftFoot.index()].position += Vector3::new(-0.06, 0.1, 0.0);
        joints[TrackedJoint::LeftFoot.index()].confidence = 0.0;

        let mut previous = optimizer.residual(&joints);
        assert!(previous > 0.0);
        for sweep in 0..12 {
            optimizer.step(&mut joints);
            let residual = optimizer.residual(&joints);
            assert!(
                residual <= previous + 1.0e-9,
                "residual rose on sweep {sweep}: {previous} -> {residual}"
            );
            previous = residual;
        }
        assert!(previous < 1.0e-4);
    }

    #[test]
    fn unseedable_low_confidence_keeps_the_sample_positions() {
        let bind = canonical_joints();
        let optimizer = default_optimizer();
        let mut joints = bind.map(|position| JointSample::new(position, 0.1));
        let report = optimizer.optimize(&mut joints);

        assert_eq!(report.iterations, 0);
        for joint in TrackedJoint::ALL {
            assert_eq!(joints[joint.index()].position, bind[joint.index()]);
        }
    }

    // ---- posture ----

    #[test]
    fn leaning_head_segment_is_nudged_upright() {
        let optimizer = default_optimizer();
        let mut joints = full_confidence(canonical_joints());
        let chest = joints[TrackedJoint::UpperChest.index()].position;
        let tilt = 25.0_f32.to_radians();
        joints[TrackedJoint::Head.index()].position =
            chest + Vector3::new(tilt.sin(), tilt.cos(), 0.0) * 0.35;

        optimizer.step(&mut joints);

        let segment = joints[TrackedJoint::Head.index()].position - chest;
        assert_relative_eq!(segment.norm(), 0.35, epsilon = 1.0e-5);
        let lean = (segment.y / segment.norm()).acos().to_degrees();
        assert!(lean < 22.0, "lean barely moved: {lean}");
        assert!(lean > 10.0, "lean overshot the nudge: {lean}");
    }

    #[test]
    fn upright_segments_are_not_touched() {
        let optimizer = default_optimizer();
        let bind = canonical_joints();
        let mut joints = full_confidence(bind);
        let chest = joints[TrackedJoint::UpperChest.index()].position;
        let tilt = 5.0_f32.to_radians();
        joints[TrackedJoint::Head.index()].position =
            chest + Vector3::new(tilt.sin(), tilt.cos(), 0.0) * 0.35;
        let before = joints[TrackedJoint::Head.index()].position;

        optimizer.step(&mut joints);
        assert_eq!(joints[TrackedJoint::Head.index()].position, before);
    }

    // ---- output confidences ----

    #[test]
    fn output_confidences_are_the_trusted_constants() {
        let optimizer = default_optimizer();
        let mut joints = full_confidence(canonical_joints());
        joints[TrackedJoint::LeftHand.index()].confidence = 0.05;
        optimizer.optimize(&mut joints);

        for joint in TrackedJoint::ALL {
            let expected = if joint.is_upper_body() { 0.85 } else { 0.65 };
            assert_eq!(
                joints[joint.index()].confidence,
                expected,
                "{} confidence",
                joint.name()
            );
        }
    }
}
