//! Per-frame world-state caches and the pose exchange buffer.

use nalgebra::{Isometry3, UnitQuaternion, Vector3};

use crate::location::BoneLocation;

/// Lifecycle of one cached world-state field within a solve frame.
///
/// `Unread` until the first access, `ReadFromSource` after pulling the live
/// value, `Written` once a solver assigned it. A written value suppresses
/// any further source reads until the next `prepare_update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheState {
    #[default]
    Unread,
    ReadFromSource,
    Written,
}

/// One world-state field with its cache state.
#[derive(Clone, Copy, Debug)]
pub struct FrameCache<T> {
    value: T,
    state: CacheState,
}

impl<T: Copy> FrameCache<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            state: CacheState::Unread,
        }
    }

    /// Back to `Unread`, keeping the last value as the stale fallback.
    pub fn reset(&mut self) {
        self.state = CacheState::Unread;
    }

    /// First access of the frame pulls `source` (when present); later
    /// accesses and post-write accesses return the cached value.
    pub fn read_or(&mut self, source: Option<T>) -> T {
        if self.state == CacheState::Unread {
            if let Some(value) = source {
                self.value = value;
            }
            self.state = CacheState::ReadFromSource;
        }
        self.value
    }

    pub fn write(&mut self, value: T) {
        self.value = value;
        self.state = CacheState::Written;
    }

    /// Current value without touching the cache state.
    pub fn peek(&self) -> T {
        self.value
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_written(&self) -> bool {
        self.state == CacheState::Written
    }
}

/// Flat world-transform buffer exchanged with the caller.
///
/// One optional slot per bone location; an absent slot means the rig has no
/// such bone. Used for the bind snapshot, the per-frame live input, and the
/// write-back output.
#[derive(Clone, Debug)]
pub struct SkeletonPose {
    slots: [Option<Isometry3<f32>>; BoneLocation::COUNT],
}

impl SkeletonPose {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [None; BoneLocation::COUNT],
        }
    }

    pub fn set(&mut self, loc: BoneLocation, transform: Isometry3<f32>) {
        self.slots[loc.index()] = Some(transform);
    }

    pub fn clear(&mut self, loc: BoneLocation) {
        self.slots[loc.index()] = None;
    }

    #[must_use]
    pub fn get(&self, loc: BoneLocation) -> Option<&Isometry3<f32>> {
        self.slots[loc.index()].as_ref()
    }

    #[must_use]
    pub fn is_present(&self, loc: BoneLocation) -> bool {
        self.slots[loc.index()].is_some()
    }

    #[must_use]
    pub fn position(&self, loc: BoneLocation) -> Option<Vector3<f32>> {
        self.slots[loc.index()].map(|iso| iso.translation.vector)
    }

    #[must_use]
    pub fn rotation(&self, loc: BoneLocation) -> Option<UnitQuaternion<f32>> {
        self.slots[loc.index()].map(|iso| iso.rotation)
    }

    pub fn set_position(&mut self, loc: BoneLocation, position: Vector3<f32>) {
        let slot = &mut self.slots[loc.index()];
        match slot {
            Some(iso) => iso.translation.vector = position,
            None => {
                *slot = Some(Isometry3::from_parts(
                    position.into(),
                    UnitQuaternion::identity(),
                ));
            }
        }
    }

    pub fn set_rotation(&mut self, loc: BoneLocation, rotation: UnitQuaternion<f32>) {
        let slot = &mut self.slots[loc.index()];
        match slot {
            Some(iso) => iso.rotation = rotation,
            None => {
                *slot = Some(Isometry3::from_parts(Vector3::zeros().into(), rotation));
            }
        }
    }

    #[must_use]
    pub fn present_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for SkeletonPose {
    fn default() -> Self {
        Self::new()
    }
}
