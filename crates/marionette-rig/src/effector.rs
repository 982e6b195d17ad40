//! IK target slots with type presets and per-frame target caches.

use nalgebra::{UnitQuaternion, Vector3};

use crate::location::EffectorLocation;
use crate::transform::FrameCache;

/// Forward push of the eyes target from the eye midpoint at bind.
pub const EYES_DEFAULT_DISTANCE: f32 = 1.0;

/// One IK target slot.
///
/// Enable flags, weights, and pull persist across frames and belong to the
/// caller; the per-frame world caches resolve to the caller's target when
/// one is set and to the bind-derived resting target otherwise.
#[derive(Clone, Debug)]
pub struct Effector {
    pub location: EffectorLocation,
    pub position_enabled: bool,
    pub rotation_enabled: bool,
    pub position_weight: f32,
    pub rotation_weight: f32,
    pub pull: f32,

    pub default_position: Vector3<f32>,
    pub default_rotation: UnitQuaternion<f32>,
    /// Resting target when the caller never supplied one. Equal to
    /// `default_position` except for Eyes (pushed forward).
    pub default_target_position: Vector3<f32>,
    /// Terminal finger bone absent; tip extrapolated from its ancestors.
    pub simulate_finger_tip: bool,

    pub target_position: Option<Vector3<f32>>,
    pub target_rotation: Option<UnitQuaternion<f32>>,

    pub world_position: FrameCache<Vector3<f32>>,
    pub world_rotation: FrameCache<UnitQuaternion<f32>>,
}

impl Effector {
    #[must_use]
    pub fn new(location: EffectorLocation) -> Self {
        let mut effector = Self {
            location,
            position_enabled: false,
            rotation_enabled: false,
            position_weight: 1.0,
            rotation_weight: 1.0,
            pull: 0.0,
            default_position: Vector3::zeros(),
            default_rotation: UnitQuaternion::identity(),
            default_target_position: Vector3::zeros(),
            simulate_finger_tip: false,
            target_position: None,
            target_rotation: None,
            world_position: FrameCache::new(Vector3::zeros()),
            world_rotation: FrameCache::new(UnitQuaternion::identity()),
        };
        effector.prefix();
        effector
    }

    /// Reset enable flags, weights, and pull to the type presets.
    pub fn prefix(&mut self) {
        self.position_enabled = preset_position_enabled(self.location);
        self.rotation_enabled = false;
        self.position_weight = preset_position_weight(self.location);
        self.rotation_weight = 1.0;
        self.pull = preset_pull(self.location);
    }

    /// Effective position weight: zero unless position is enabled.
    #[must_use]
    pub fn effective_position_weight(&self) -> f32 {
        if self.position_enabled {
            self.position_weight
        } else {
            0.0
        }
    }

    /// Effective rotation weight: zero unless rotation is both enabled and
    /// meaningful for this effector type.
    #[must_use]
    pub fn effective_rotation_weight(&self) -> f32 {
        if self.rotation_enabled && self.location.rotation_contained() {
            self.rotation_weight
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn effective_pull(&self) -> f32 {
        if self.location.pull_contained() {
            self.pull
        } else {
            0.0
        }
    }

    pub fn set_target_position(&mut self, position: Vector3<f32>) {
        self.target_position = Some(position);
    }

    pub fn set_target_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.target_rotation = Some(rotation);
    }

    pub fn clear_targets(&mut self) {
        self.target_position = None;
        self.target_rotation = None;
    }

    /// Target world position for this frame (caller target, else resting).
    pub fn world_position(&mut self) -> Vector3<f32> {
        let source = self.target_position.or(Some(self.default_target_position));
        self.world_position.read_or(source)
    }

    /// Target world rotation for this frame.
    pub fn world_rotation(&mut self) -> UnitQuaternion<f32> {
        let source = self.target_rotation.or(Some(self.default_rotation));
        self.world_rotation.read_or(source)
    }

    pub fn prepare_update(&mut self) {
        self.world_position.reset();
        self.world_rotation.reset();
    }
}

fn preset_position_enabled(loc: EffectorLocation) -> bool {
    matches!(loc, EffectorLocation::Wrist(_) | EffectorLocation::Foot(_))
}

fn preset_position_weight(loc: EffectorLocation) -> f32 {
    match loc {
        EffectorLocation::Arm(_) => 0.0,
        _ => 1.0,
    }
}

fn preset_pull(loc: EffectorLocation) -> f32 {
    match loc {
        EffectorLocation::Hips
        | EffectorLocation::Eyes
        | EffectorLocation::Arm(_)
        | EffectorLocation::Wrist(_)
        | EffectorLocation::Foot(_) => 1.0,
        _ => 0.0,
    }
}
