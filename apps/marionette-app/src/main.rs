//! Marionette full-body IK CLI.
//!
//! Provides three modes of operation:
//! - `solve`: Drive the canonical rig through a scripted wrist path and
//!   print per-frame convergence
//! - `fit`: Correct a tracked pose frame from JSON and print the result
//! - `info`: Print workspace crate versions and configuration

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use nalgebra::Vector3;

use marionette_core::prelude::*;
use marionette_ik::prelude::*;
use marionette_posegraph::prelude::*;
use marionette_retarget::prelude::*;
use marionette_rig::prelude::*;
use marionette_test_utils::canonical_bind_pose;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Marionette full-body IK toolkit.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the canonical rig's right wrist along a circle and print
    /// per-frame convergence.
    Solve {
        /// Number of frames to solve.
        #[arg(short = 'n', long, default_value_t = 60)]
        frames: u32,

        /// Circle radius in meters.
        #[arg(short, long, default_value_t = 0.15)]
        radius: f32,

        /// Solver settings TOML file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Correct a tracked pose frame from JSON and print the result.
    Fit {
        /// Path to a pose-frame JSON document.
        input: PathBuf,

        /// Index of the person within the frame.
        #[arg(short, long, default_value_t = 0)]
        person: usize,

        /// Uniform tracker-to-rig scale.
        #[arg(short, long, default_value_t = 1.0)]
        scale: f32,

        /// Mirror the person across X.
        #[arg(short, long)]
        mirror: bool,
    },

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run_solve(frames: u32, radius: f32, config: Option<&Path>) {
    let settings = match config {
        Some(path) => SolverSettings::from_file(path).expect("failed to load settings"),
        None => SolverSettings::default(),
    };
    let bind = canonical_bind_pose();
    let mut solver = FullBodySolver::new(&bind, settings).expect("failed to prepare solver");
    let mut pose = bind.clone();

    let center = Vector3::new(0.45, 1.25, 0.2);
    println!(
        "solving {frames} frames, right wrist on a {radius:.2} m circle at ({:.2}, {:.2}, {:.2})",
        center.x, center.y, center.z
    );

    let mut total = 0.0;
    let mut worst: f32 = 0.0;
    for frame in 0..frames {
        let phase = frame as f32 / frames.max(1) as f32 * std::f32::consts::TAU;
        let target = center + Vector3::new(0.0, phase.sin() * radius, phase.cos() * radius);
        solver
            .effector_mut(EffectorLocation::Wrist(Side::Right))
            .set_target_position(target);
        let mode = if frame == 0 {
            SolveMode::Reset
        } else {
            SolveMode::Continuous
        };
        solver.solve(&mut pose, mode);

        let wrist = solver.skeleton().bone(BoneLocation::Wrist(Side::Right));
        let reached = if wrist.world_position.is_written() {
            wrist.world_position.peek()
        } else {
            target
        };
        let distance = (reached - target).norm();
        total += distance;
        worst = worst.max(distance);
        println!(
            "frame {frame:3}: target=({:6.3}, {:6.3}, {:6.3}) distance={distance:.5}",
            target.x, target.y, target.z
        );
    }

    println!();
    println!(
        "frames={frames}, mean_distance={:.5}, worst_distance={worst:.5}",
        total / frames.max(1) as f32
    );
}

fn run_fit(input: &Path, person_index: usize, scale: f32, mirror: bool) {
    let text = std::fs::read_to_string(input).expect("failed to read input");
    let frame: PoseFrame = serde_json::from_str(&text).expect("failed to parse pose frame");
    let Some(person) = frame.people.get(person_index) else {
        eprintln!(
            "frame {} has {} people, no index {person_index}",
            frame.frame_id,
            frame.people.len()
        );
        std::process::exit(2);
    };

    let config = RetargetConfig {
        scale,
        mirror,
        ..RetargetConfig::default()
    };
    let retargeter =
        Retargeter::new(&canonical_bind_pose(), config).expect("failed to calibrate retargeter");
    let (joints, report) = retargeter.correct(person);

    println!(
        "frame {} person {} ({} keypoints)",
        frame.frame_id,
        person.person_id,
        person.keypoints.len()
    );
    for joint in TrackedJoint::ALL {
        let sample = joints[joint.index()];
        println!(
            "  {:<14} ({:7.3}, {:7.3}, {:7.3}) confidence={:.2}",
            joint.name(),
            sample.position.x,
            sample.position.y,
            sample.position.z,
            sample.confidence
        );
    }
    println!();
    println!(
        "iterations={}, residual={:.6}",
        report.iterations, report.residual
    );
}

fn run_info() {
    println!("marionette v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  marionette-core      {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-math      {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-rig       {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-ik        {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-posegraph {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-retarget  {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("edition: 2024");
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Solve {
            frames,
            radius,
            config,
        }) => run_solve(frames, radius, config.as_deref()),
        Some(Commands::Fit {
            input,
            person,
            scale,
            mirror,
        }) => run_fit(&input, person, scale, mirror),
        Some(Commands::Info) => run_info(),
        None => {
            // Default: scripted solve with defaults
            run_solve(60, 0.15, None);
        }
    }
}
