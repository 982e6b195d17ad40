//! Full-body solve orchestration.
//!
//! Owns the prepared skeleton and runs the per-frame pipeline over it:
//! cache reset, optional displacement sync, then body, legs, arms, head,
//! and fingers, finishing with the write-back into the caller's pose.

use marionette_core::config::SolverSettings;
use marionette_core::error::MarionetteError;
use marionette_core::types::{SolveMode, SyncDisplacementMode};
use marionette_rig::prelude::*;

use crate::body::BodySolver;
use crate::finger::FingerSolver;
use crate::head::{BuiltinEyes, EyeSolver, HeadSolver};
use crate::limb::LimbSolver;

/// Per-frame full-body solver bound to one prepared rig.
///
/// Construction validates the settings and prepares the skeleton against the
/// bind pose; both are the fatal paths. After that `solve` never fails:
/// absent bones are skipped, degenerate geometry keeps the previous pose,
/// and out-of-range targets are clamped.
pub struct FullBodySolver {
    skeleton: Skeleton,
    settings: SolverSettings,
    body: BodySolver,
    limbs: LimbSolver,
    head: HeadSolver,
    fingers: FingerSolver,
    offsets_synced: bool,
}

impl FullBodySolver {
    /// Prepare a solver with the built-in eye aiming.
    ///
    /// # Errors
    ///
    /// Returns [`MarionetteError`] when the settings are out of range or the
    /// bind pose is structurally unusable.
    pub fn new(bind: &SkeletonPose, settings: SolverSettings) -> Result<Self, MarionetteError> {
        Self::build(bind, settings, Box::new(BuiltinEyes), false)
    }

    /// Prepare a solver with an external eye strategy. The eye bones are
    /// treated as hidden so the eyes effector rides the head instead of the
    /// eyeball midpoint.
    ///
    /// # Errors
    ///
    /// Same failure surface as [`FullBodySolver::new`].
    pub fn with_eye_solver(
        bind: &SkeletonPose,
        settings: SolverSettings,
        eyes: Box<dyn EyeSolver>,
    ) -> Result<Self, MarionetteError> {
        Self::build(bind, settings, eyes, true)
    }

    fn build(
        bind: &SkeletonPose,
        settings: SolverSettings,
        eyes: Box<dyn EyeSolver>,
        hidden_eyes: bool,
    ) -> Result<Self, MarionetteError> {
        settings.validate()?;
        let mut skeleton = Skeleton::new();
        skeleton.prepare(bind, &settings, hidden_eyes)?;
        skeleton.post_prepare();
        let mut head = HeadSolver::new(eyes);
        head.prepare(&skeleton);
        Ok(Self {
            skeleton,
            settings,
            body: BodySolver::new(),
            limbs: LimbSolver::new(),
            head,
            fingers: FingerSolver::new(),
            offsets_synced: false,
        })
    }

    /// Run one frame: read the live pose and effector targets, solve, and
    /// flush the solved rotations (and root translations) back into `pose`.
    pub fn solve(&mut self, pose: &mut SkeletonPose, mode: SolveMode) {
        self.skeleton.prepare_update();
        self.skeleton
            .sync_displacement(pose, self.settings.sync_displacement);
        if self.take_sync_tick() {
            self.head.prepare(&self.skeleton);
        }
        self.body.solve(&mut self.skeleton, pose, mode, &self.settings);
        self.limbs
            .solve_legs(&mut self.skeleton, pose, mode, &self.settings);
        self.limbs
            .solve_arms(&mut self.skeleton, pose, mode, &self.settings);
        self.head
            .solve(&mut self.skeleton, pose, mode, &self.settings);
        self.fingers.solve(&mut self.skeleton, pose, mode);
        self.skeleton.write_back(pose);
    }

    /// Whether this frame's displacement sync re-measured the rig, meaning
    /// the captured head offsets need refreshing.
    fn take_sync_tick(&mut self) -> bool {
        match self.settings.sync_displacement {
            SyncDisplacementMode::Disable => false,
            SyncDisplacementMode::EveryFrame => true,
            SyncDisplacementMode::FirstFrame => !std::mem::replace(&mut self.offsets_synced, true),
        }
    }

    #[must_use]
    pub fn effector(&self, loc: EffectorLocation) -> &Effector {
        self.skeleton.effector(loc)
    }

    pub fn effector_mut(&mut self, loc: EffectorLocation) -> &mut Effector {
        self.skeleton.effector_mut(loc)
    }

    /// Drop every effector target, returning them all to resting defaults.
    pub fn clear_targets(&mut self) {
        for loc in EffectorLocation::all() {
            self.skeleton.effector_mut(loc).clear_targets();
        }
    }

    #[must_use]
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    #[must_use]
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Settings are read-only during a pass but free to change between them.
    pub fn settings_mut(&mut self) -> &mut SolverSettings {
        &mut self.settings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_test_utils::canonical_bind_pose;
    use nalgebra::Vector3;

    // ---- construction ----

    #[test]
    fn empty_bind_pose_is_rejected() {
        let result = FullBodySolver::new(&SkeletonPose::new(), SolverSettings::default());
        assert!(matches!(result, Err(MarionetteError::Rig(_))));
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        let mut settings = SolverSettings::default();
        settings.body.spine_limit_angle_x = 200.0;
        let result = FullBodySolver::new(&canonical_bind_pose(), settings);
        assert!(matches!(result, Err(MarionetteError::Config(_))));
    }

    #[test]
    fn external_eye_strategy_hides_the_eye_bones() {
        #[derive(Default)]
        struct NullEyes;
        impl EyeSolver for NullEyes {
            fn solve(
                &mut self,
                _skeleton: &mut Skeleton,
                _pose: &SkeletonPose,
                _settings: &SolverSettings,
                _context: &crate::head::EyeContext,
            ) {
            }
            fn reset(
                &mut self,
                _skeleton: &mut Skeleton,
                _pose: &SkeletonPose,
                _offsets: &crate::head::EyeOffsets,
            ) {
            }
        }

        let bind = canonical_bind_pose();
        let solver = FullBodySolver::with_eye_solver(
            &bind,
            SolverSettings::default(),
            Box::new(NullEyes),
        )
        .unwrap();
        assert!(solver.skeleton().hidden_eyes());

        let builtin = FullBodySolver::new(&bind, SolverSettings::default()).unwrap();
        assert!(!builtin.skeleton().hidden_eyes());
    }

    // ---- effector plumbing ----

    #[test]
    fn effector_targets_survive_the_accessors() {
        let bind = canonical_bind_pose();
        let mut solver = FullBodySolver::new(&bind, SolverSettings::default()).unwrap();
        let target = Vector3::new(-0.4, 1.2, 0.1);
        let wrist = solver.effector_mut(EffectorLocation::Wrist(Side::Left));
        wrist.set_target_position(target);
        assert_eq!(
            solver
                .effector(EffectorLocation::Wrist(Side::Left))
                .target_position,
            Some(target)
        );

        solver.clear_targets();
        assert_eq!(
            solver
                .effector(EffectorLocation::Wrist(Side::Left))
                .target_position,
            None
        );
    }
}
