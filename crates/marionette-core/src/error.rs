use thiserror::Error;

/// Top-level error type for the marionette workspace.
///
/// Only construction and configuration paths are fallible; the per-frame
/// solve path degrades gracefully (missing bones are skipped, degenerate
/// geometry keeps the previous pose, out-of-range targets are clamped).
#[derive(Debug, Error)]
pub enum MarionetteError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rig error: {0}")]
    Rig(#[from] RigError),

    #[error("Pose graph error: {0}")]
    PoseGraph(#[from] PoseGraphError),

    #[error("Retarget error: {0}")]
    Retarget(#[from] RetargetError),
}

/// Settings validation and loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid angle for {field}: {value} (allowed {min}..={max} degrees)")]
    AngleOutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Invalid rate for {field}: {value} (allowed 0..=1)")]
    RateOutOfRange { field: &'static str, value: f32 },

    #[error("Invalid bounds for {field}: min {min} exceeds max {max}")]
    InvertedBounds {
        field: &'static str,
        min: f32,
        max: f32,
    },

    #[error("Non-finite value for {field}")]
    NonFinite { field: &'static str },
}

/// Bind-pose structural errors reported by rig preparation.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("Bind pose has no present bones")]
    EmptyBindPose,

    #[error("Mandatory bone missing from bind pose: {0}")]
    MissingMandatoryBone(&'static str),

    #[error("Non-finite bind transform for bone: {0}")]
    NonFiniteBindTransform(&'static str),

    #[error("Zero-length mandatory segment: {parent} -> {child}")]
    ZeroLengthSegment {
        parent: &'static str,
        child: &'static str,
    },
}

/// Pose-graph optimizer construction errors.
#[derive(Debug, Error)]
pub enum PoseGraphError {
    #[error("Constraint list is empty")]
    EmptyConstraints,

    #[error("Constraint {index} joins a joint to itself")]
    SelfConstraint { index: usize },

    #[error("Non-finite bind position for joint {joint}")]
    NonFiniteBind { joint: &'static str },

    #[error("Zero-length constraint {index}: bind distance below {min_len}")]
    DegenerateConstraint { index: usize, min_len: f32 },
}

/// Retarget map construction errors.
#[derive(Debug, Error)]
pub enum RetargetError {
    #[error("Pose frame has no people")]
    EmptyFrame,

    #[error("Person sample is missing mandatory keypoint: {0}")]
    MissingKeypoint(&'static str),

    #[error("Invalid position scale: {0} (must be finite and > 0)")]
    InvalidScale(f32),

    #[error("Unknown keypoint id on the wire: {0}")]
    UnknownKeypointId(u8),
}
