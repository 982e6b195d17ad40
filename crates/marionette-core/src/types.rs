//! Shared value types exchanged between the rig and the solvers.

use serde::{Deserialize, Serialize};

/// Per-frame solve mode supplied by the caller.
///
/// `Reset` recomputes every rotation from the bind pose and the current
/// parent chain. `Continuous` blends from the previous frame's solved
/// rotations for temporal stability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMode {
    #[default]
    Reset,
    Continuous,
}

impl SolveMode {
    /// True when the solve should blend from the previous frame.
    #[must_use]
    pub const fn is_continuous(self) -> bool {
        matches!(self, Self::Continuous)
    }
}

/// When bone lengths/directions are re-measured from the live pose.
///
/// `FirstFrame` supports rigs that are scaled once after binding;
/// `EveryFrame` supports rigs that resize at runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDisplacementMode {
    #[default]
    Disable,
    FirstFrame,
    EveryFrame,
}

/// How the shoulder local Y axis is chosen.
///
/// `Auto` resolves per rig during preparation by comparing the shoulder
/// bone direction against the spine-up and neck directions; the resolved
/// choice is stored in the rig's derived constants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoulderAxisMode {
    #[default]
    Auto,
    AlongNeck,
    AlongSpine,
}
