//! Stable arena indices for bones and effectors.
//!
//! Locations are the identity of every rig slot. `index()` maps each
//! location to a fixed array slot so bone and effector storage is a flat
//! arena with no hashing and no allocation per frame.

/// Left/right half of the rig. Left-side bones sit at negative X in bind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    /// Sign of the side's lateral bind direction.
    #[must_use]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    #[must_use]
    pub const fn mirrored(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerKind {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl FingerKind {
    pub const ALL: [Self; 5] = [
        Self::Thumb,
        Self::Index,
        Self::Middle,
        Self::Ring,
        Self::Little,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Thumb => 0,
            Self::Index => 1,
            Self::Middle => 2,
            Self::Ring => 3,
            Self::Little => 4,
        }
    }
}

/// Joints per finger chain.
pub const FINGER_JOINTS: usize = 3;

const HAND_FINGER_BASE: usize = 27;
const HAND_FINGER_COUNT: usize = 2 * 5 * FINGER_JOINTS;

/// Identity of one skeletal joint slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoneLocation {
    Hips,
    Spine,
    Spine2,
    Spine3,
    Spine4,
    Neck,
    Head,
    Eye(Side),
    Leg(Side),
    Knee(Side),
    Foot(Side),
    Shoulder(Side),
    Arm(Side),
    ArmRoll(Side),
    Elbow(Side),
    ElbowRoll(Side),
    Wrist(Side),
    HandFinger {
        side: Side,
        finger: FingerKind,
        joint: usize,
    },
}

impl BoneLocation {
    pub const COUNT: usize = HAND_FINGER_BASE + HAND_FINGER_COUNT;

    /// Flat arena slot. Each location owns exactly one slot below `COUNT`.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Hips => 0,
            Self::Spine => 1,
            Self::Spine2 => 2,
            Self::Spine3 => 3,
            Self::Spine4 => 4,
            Self::Neck => 5,
            Self::Head => 6,
            Self::Eye(side) => 7 + side.index(),
            Self::Leg(side) => 9 + side.index(),
            Self::Knee(side) => 11 + side.index(),
            Self::Foot(side) => 13 + side.index(),
            Self::Shoulder(side) => 15 + side.index(),
            Self::Arm(side) => 17 + side.index(),
            Self::ArmRoll(side) => 19 + side.index(),
            Self::Elbow(side) => 21 + side.index(),
            Self::ElbowRoll(side) => 23 + side.index(),
            Self::Wrist(side) => 25 + side.index(),
            Self::HandFinger {
                side,
                finger,
                joint,
            } => HAND_FINGER_BASE + side.index() * 5 * FINGER_JOINTS + finger.index() * FINGER_JOINTS + joint,
        }
    }

    /// Parent in the idealized hierarchy; the live parent skips absent
    /// intermediates at prepare time.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Hips => None,
            Self::Spine => Some(Self::Hips),
            Self::Spine2 => Some(Self::Spine),
            Self::Spine3 => Some(Self::Spine2),
            Self::Spine4 => Some(Self::Spine3),
            Self::Neck => Some(Self::Spine4),
            Self::Head => Some(Self::Neck),
            Self::Eye(_) => Some(Self::Head),
            Self::Leg(_) => Some(Self::Hips),
            Self::Knee(side) => Some(Self::Leg(side)),
            Self::Foot(side) => Some(Self::Knee(side)),
            Self::Shoulder(_) => Some(Self::Spine4),
            Self::Arm(side) => Some(Self::Shoulder(side)),
            Self::ArmRoll(side) => Some(Self::Arm(side)),
            Self::Elbow(side) => Some(Self::ArmRoll(side)),
            Self::ElbowRoll(side) => Some(Self::Elbow(side)),
            Self::Wrist(side) => Some(Self::ElbowRoll(side)),
            Self::HandFinger {
                side,
                finger,
                joint,
            } => {
                if joint == 0 {
                    Some(Self::Wrist(side))
                } else {
                    Some(Self::HandFinger {
                        side,
                        finger,
                        joint: joint - 1,
                    })
                }
            }
        }
    }

    /// Every location in index order.
    #[must_use]
    pub fn all() -> [Self; Self::COUNT] {
        let mut out = [Self::Hips; Self::COUNT];
        let simple = [
            Self::Hips,
            Self::Spine,
            Self::Spine2,
            Self::Spine3,
            Self::Spine4,
            Self::Neck,
            Self::Head,
        ];
        for loc in simple {
            out[loc.index()] = loc;
        }
        for side in Side::BOTH {
            for loc in [
                Self::Eye(side),
                Self::Leg(side),
                Self::Knee(side),
                Self::Foot(side),
                Self::Shoulder(side),
                Self::Arm(side),
                Self::ArmRoll(side),
                Self::Elbow(side),
                Self::ElbowRoll(side),
                Self::Wrist(side),
            ] {
                out[loc.index()] = loc;
            }
            for finger in FingerKind::ALL {
                for joint in 0..FINGER_JOINTS {
                    let loc = Self::HandFinger {
                        side,
                        finger,
                        joint,
                    };
                    out[loc.index()] = loc;
                }
            }
        }
        out
    }

    /// Human-readable slot name for construction-time errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        BONE_NAMES[self.index()]
    }

    #[must_use]
    pub const fn side(self) -> Option<Side> {
        match self {
            Self::Eye(side)
            | Self::Leg(side)
            | Self::Knee(side)
            | Self::Foot(side)
            | Self::Shoulder(side)
            | Self::Arm(side)
            | Self::ArmRoll(side)
            | Self::Elbow(side)
            | Self::ElbowRoll(side)
            | Self::Wrist(side) => Some(side),
            Self::HandFinger { side, .. } => Some(side),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_spine(self) -> bool {
        matches!(
            self,
            Self::Spine | Self::Spine2 | Self::Spine3 | Self::Spine4
        )
    }
}

const BONE_NAMES: [&str; BoneLocation::COUNT] = [
    "hips",
    "spine",
    "spine2",
    "spine3",
    "spine4",
    "neck",
    "head",
    "left_eye",
    "right_eye",
    "left_leg",
    "right_leg",
    "left_knee",
    "right_knee",
    "left_foot",
    "right_foot",
    "left_shoulder",
    "right_shoulder",
    "left_arm",
    "right_arm",
    "left_arm_roll",
    "right_arm_roll",
    "left_elbow",
    "right_elbow",
    "left_elbow_roll",
    "right_elbow_roll",
    "left_wrist",
    "right_wrist",
    "left_thumb_0",
    "left_thumb_1",
    "left_thumb_2",
    "left_index_0",
    "left_index_1",
    "left_index_2",
    "left_middle_0",
    "left_middle_1",
    "left_middle_2",
    "left_ring_0",
    "left_ring_1",
    "left_ring_2",
    "left_little_0",
    "left_little_1",
    "left_little_2",
    "right_thumb_0",
    "right_thumb_1",
    "right_thumb_2",
    "right_index_0",
    "right_index_1",
    "right_index_2",
    "right_middle_0",
    "right_middle_1",
    "right_middle_2",
    "right_ring_0",
    "right_ring_1",
    "right_ring_2",
    "right_little_0",
    "right_little_1",
    "right_little_2",
];

const FINGER_TIP_BASE: usize = 15;

/// Identity of one IK target slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectorLocation {
    Root,
    Hips,
    Neck,
    Head,
    Eyes,
    Arm(Side),
    Elbow(Side),
    Wrist(Side),
    Knee(Side),
    Foot(Side),
    FingerTip { side: Side, finger: FingerKind },
}

impl EffectorLocation {
    pub const COUNT: usize = FINGER_TIP_BASE + 2 * 5;

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Root => 0,
            Self::Hips => 1,
            Self::Neck => 2,
            Self::Head => 3,
            Self::Eyes => 4,
            Self::Arm(side) => 5 + side.index(),
            Self::Elbow(side) => 7 + side.index(),
            Self::Wrist(side) => 9 + side.index(),
            Self::Knee(side) => 11 + side.index(),
            Self::Foot(side) => 13 + side.index(),
            Self::FingerTip { side, finger } => {
                FINGER_TIP_BASE + side.index() * 5 + finger.index()
            }
        }
    }

    /// Parent in the effector hierarchy; default rotations inherit down it.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Root => None,
            Self::Hips => Some(Self::Root),
            Self::Neck => Some(Self::Hips),
            Self::Head => Some(Self::Neck),
            Self::Eyes => Some(Self::Head),
            Self::Arm(_) => Some(Self::Neck),
            Self::Elbow(side) => Some(Self::Arm(side)),
            Self::Wrist(side) => Some(Self::Elbow(side)),
            Self::Knee(_) => Some(Self::Hips),
            Self::Foot(side) => Some(Self::Knee(side)),
            Self::FingerTip { side, .. } => Some(Self::Wrist(side)),
        }
    }

    /// Bone this effector is anchored to. Midpoint effectors (Hips, Eyes)
    /// also consult their side bones during default derivation.
    #[must_use]
    pub const fn bound_bone(self) -> Option<BoneLocation> {
        match self {
            Self::Root => None,
            Self::Hips => Some(BoneLocation::Hips),
            Self::Neck => Some(BoneLocation::Neck),
            Self::Head | Self::Eyes => Some(BoneLocation::Head),
            Self::Arm(side) => Some(BoneLocation::Arm(side)),
            Self::Elbow(side) => Some(BoneLocation::Elbow(side)),
            Self::Wrist(side) => Some(BoneLocation::Wrist(side)),
            Self::Knee(side) => Some(BoneLocation::Knee(side)),
            Self::Foot(side) => Some(BoneLocation::Foot(side)),
            Self::FingerTip { side, finger } => Some(BoneLocation::HandFinger {
                side,
                finger,
                joint: FINGER_JOINTS - 1,
            }),
        }
    }

    /// Whether a rotation target is meaningful for this effector.
    #[must_use]
    pub const fn rotation_contained(self) -> bool {
        matches!(
            self,
            Self::Hips | Self::Head | Self::Wrist(_) | Self::Foot(_)
        )
    }

    /// Whether pull blending is meaningful for this effector.
    #[must_use]
    pub const fn pull_contained(self) -> bool {
        matches!(
            self,
            Self::Hips
                | Self::Neck
                | Self::Head
                | Self::Eyes
                | Self::Arm(_)
                | Self::Wrist(_)
                | Self::Foot(_)
                | Self::Elbow(_)
                | Self::Knee(_)
        )
    }

    /// Every location in index order.
    #[must_use]
    pub fn all() -> [Self; Self::COUNT] {
        let mut out = [Self::Root; Self::COUNT];
        for loc in [Self::Root, Self::Hips, Self::Neck, Self::Head, Self::Eyes] {
            out[loc.index()] = loc;
        }
        for side in Side::BOTH {
            for loc in [
                Self::Arm(side),
                Self::Elbow(side),
                Self::Wrist(side),
                Self::Knee(side),
                Self::Foot(side),
            ] {
                out[loc.index()] = loc;
            }
            for finger in FingerKind::ALL {
                let loc = Self::FingerTip { side, finger };
                out[loc.index()] = loc;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- bone locations ----

    #[test]
    fn bone_indices_are_a_permutation() {
        let mut seen = [false; BoneLocation::COUNT];
        for loc in BoneLocation::all() {
            let idx = loc.index();
            assert!(idx < BoneLocation::COUNT);
            assert!(!seen[idx], "duplicate index {idx} for {loc:?}");
            seen[idx] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn all_returns_locations_in_index_order() {
        for (i, loc) in BoneLocation::all().iter().enumerate() {
            assert_eq!(loc.index(), i);
        }
        for (i, loc) in EffectorLocation::all().iter().enumerate() {
            assert_eq!(loc.index(), i);
        }
    }

    #[test]
    fn parent_chain_terminates_at_hips() {
        for loc in BoneLocation::all() {
            let mut cursor = loc;
            let mut hops = 0;
            while let Some(parent) = cursor.parent() {
                cursor = parent;
                hops += 1;
                assert!(hops < BoneLocation::COUNT, "cycle at {loc:?}");
            }
            assert_eq!(cursor, BoneLocation::Hips);
        }
    }

    #[test]
    fn parent_has_lower_index_than_child() {
        for loc in BoneLocation::all() {
            if let Some(parent) = loc.parent() {
                assert!(parent.index() < loc.index(), "{loc:?} before {parent:?}");
            }
        }
    }

    #[test]
    fn finger_slots_are_distinct_per_side() {
        let a = BoneLocation::HandFinger {
            side: Side::Left,
            finger: FingerKind::Index,
            joint: 1,
        };
        let b = BoneLocation::HandFinger {
            side: Side::Right,
            finger: FingerKind::Index,
            joint: 1,
        };
        assert_ne!(a.index(), b.index());
        assert_eq!(a.name(), "left_index_1");
        assert_eq!(b.name(), "right_index_1");
    }

    // ---- effector locations ----

    #[test]
    fn effector_indices_are_a_permutation() {
        let mut seen = [false; EffectorLocation::COUNT];
        for loc in EffectorLocation::all() {
            let idx = loc.index();
            assert!(idx < EffectorLocation::COUNT);
            assert!(!seen[idx]);
            seen[idx] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn capability_flags_match_presets() {
        assert!(EffectorLocation::Hips.rotation_contained());
        assert!(EffectorLocation::Wrist(Side::Left).rotation_contained());
        assert!(!EffectorLocation::Eyes.rotation_contained());
        assert!(!EffectorLocation::Root.pull_contained());
        assert!(EffectorLocation::Knee(Side::Right).pull_contained());
        assert!(
            !EffectorLocation::FingerTip {
                side: Side::Left,
                finger: FingerKind::Thumb
            }
            .pull_contained()
        );
    }

    #[test]
    fn finger_tip_binds_terminal_joint() {
        let loc = EffectorLocation::FingerTip {
            side: Side::Right,
            finger: FingerKind::Middle,
        };
        assert_eq!(
            loc.bound_bone(),
            Some(BoneLocation::HandFinger {
                side: Side::Right,
                finger: FingerKind::Middle,
                joint: 2
            })
        );
    }
}
