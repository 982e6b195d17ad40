//! Optimizer tuning knobs and the distance-constraint list.
//!
//! The constraint list is plain data so alternative graph shapes (star from
//! the pelvis, chains only) are a config change, not a code change.

use std::path::Path;

use marionette_core::error::ConfigError;
use serde::{Deserialize, Serialize};

use crate::joint::TrackedJoint;

/// One expected-distance edge between two tracked joints.
///
/// The expected distance itself is calibrated from the bind pose when the
/// optimizer is built; the edge only names the pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub from: TrackedJoint,
    pub to: TrackedJoint,
}

impl ConstraintSpec {
    #[must_use]
    pub const fn new(from: TrackedJoint, to: TrackedJoint) -> Self {
        Self { from, to }
    }
}

/// Tuning for the Gauss-Seidel relaxation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseGraphConfig {
    /// Hard cap on relaxation sweeps per call.
    pub max_iterations: usize,
    /// Terminate once the total squared residual drops below this.
    pub residual_threshold: f32,
    /// Fraction of each constraint violation corrected per sweep.
    pub gain: f32,
    /// Distance error inside this band is left alone, in meters.
    pub slack: f32,
    /// Posture segments tilted further than this from vertical are nudged,
    /// in degrees.
    pub posture_threshold_angle: f32,
    /// Fraction of the way a nudge moves a posture segment toward vertical.
    pub posture_rate: f32,
    /// Confidence written to head, chest, and arm joints on output.
    pub trusted_upper_confidence: f32,
    /// Confidence written to pelvis and leg joints on output.
    pub trusted_lower_confidence: f32,
    /// Samples below this confidence start from a constraint-satisfying
    /// estimate instead of their own position.
    pub initial_guess_confidence: f32,
    pub constraints: Vec<ConstraintSpec>,
}

impl Default for PoseGraphConfig {
    fn default() -> Self {
        Self {
            max_iterations: 32,
            residual_threshold: 1.0e-6,
            gain: 0.5,
            slack: 0.01,
            posture_threshold_angle: 10.0,
            posture_rate: 0.2,
            trusted_upper_confidence: 0.85,
            trusted_lower_confidence: 0.65,
            initial_guess_confidence: 0.2,
            constraints: default_full_mesh(),
        }
    }
}

impl PoseGraphConfig {
    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on IO or parse failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on parse failure.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// The default constraint graph: torso mesh with both symmetry edges and
/// the shoulder-to-opposite-hip cross braces, plus both arm and leg chains.
#[must_use]
pub fn default_full_mesh() -> Vec<ConstraintSpec> {
    use TrackedJoint::*;
    [
        (Head, UpperChest),
        (UpperChest, Hips),
        (UpperChest, RightShoulder),
        (RightShoulder, RightLowerArm),
        (RightLowerArm, RightHand),
        (UpperChest, LeftShoulder),
        (LeftShoulder, LeftLowerArm),
        (LeftLowerArm, LeftHand),
        (RightShoulder, LeftShoulder),
        (RightUpperLeg, LeftUpperLeg),
        (RightShoulder, LeftUpperLeg),
        (LeftShoulder, RightUpperLeg),
        (Hips, RightUpperLeg),
        (RightUpperLeg, RightLowerLeg),
        (RightLowerLeg, RightFoot),
        (Hips, LeftUpperLeg),
        (LeftUpperLeg, LeftLowerLeg),
        (LeftLowerLeg, LeftFoot),
    ]
    .into_iter()
    .map(|(from, to)| ConstraintSpec::new(from, to))
    .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
