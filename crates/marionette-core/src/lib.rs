// marionette-core: Settings, solve-mode types, and errors for the marionette IK workspace.

pub mod config;
pub mod error;
pub mod types;

pub mod prelude {
    pub use crate::config::{BodySettings, HeadSettings, LimbSettings, SolverSettings};
    pub use crate::error::{
        ConfigError, MarionetteError, PoseGraphError, RetargetError, RigError,
    };
    pub use crate::types::{ShoulderAxisMode, SolveMode, SyncDisplacementMode};
}
