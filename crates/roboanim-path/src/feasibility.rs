//! Nonholonomic feasibility of a sampled trajectory.
//!
//! A differential-drive chassis cannot slide sideways. For every step the
//! displacement is projected on the lateral axis of the body frame held at
//! the start of the step; the resulting lateral speed must stay within the
//! configured tolerance.

use std::fmt;

use roboanim_kinematics::{ForwardAxis, body_frame};
use serde::Serialize;
use tracing::debug;

use crate::error::{PathError, Result, preview_frames};
use crate::trajectory::Trajectory;

/// Lateral speed (m/s) below which a step counts as slip-free even with a zero
/// tolerance. Covers floating point noise in synthesized trajectories.
pub const LATERAL_NOISE_FLOOR: f64 = 1e-9;

/// Inputs to [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeasibilityConfig {
    /// Local axis treated as the chassis front.
    pub axis: ForwardAxis,
    /// Distance between the drive wheels (m).
    pub track_width: f64,
    /// Allowed sideways speed (m/s).
    pub lateral_tolerance: f64,
}

impl FeasibilityConfig {
    /// Check the guard conditions.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-positive track width or a
    /// negative tolerance.
    pub fn validate(&self) -> Result<()> {
        if !(self.track_width > 0.0) {
            return Err(PathError::configuration("track width must be positive"));
        }
        if !(self.lateral_tolerance >= 0.0) {
            return Err(PathError::configuration(
                "sideways tolerance must not be negative",
            ));
        }
        Ok(())
    }
}

/// Outcome of a feasibility pass. Built fresh on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasibilityReport {
    /// Number of steps exceeding the tolerance.
    pub violations: usize,
    /// Frames at the end of each violating step, ascending.
    pub violation_frames: Vec<i32>,
    /// Tolerance used (m/s).
    pub tolerance: f64,
    /// Samples per second.
    pub sample_rate: f64,
    /// First analyzed frame.
    pub frame_start: i32,
    /// Last analyzed frame.
    pub frame_end: i32,
    /// Largest lateral speed seen on any step (m/s).
    pub max_lateral_speed: f64,
}

impl FeasibilityReport {
    /// `true` when no step slips.
    pub fn is_feasible(&self) -> bool {
        self.violations == 0
    }

    /// Turn a failing report into [`PathError::Infeasible`].
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Infeasible`] when any step slips.
    pub fn ensure_feasible(&self) -> Result<()> {
        if self.is_feasible() {
            Ok(())
        } else {
            Err(PathError::infeasible(&self.violation_frames, self.tolerance))
        }
    }
}

impl fmt::Display for FeasibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_feasible() {
            write!(f, "Motion is feasible (no slip violations).")
        } else {
            write!(
                f,
                "This won't work: {} step(s) exceed sideways tolerance > {} (frames {}).",
                self.violations,
                self.tolerance,
                preview_frames(&self.violation_frames)
            )
        }
    }
}

/// Signed lateral speed (m/s) of every step; entry `i` is the step ending at pose `i + 1`.
pub fn lateral_speeds(trajectory: &Trajectory, axis: ForwardAxis) -> Vec<f64> {
    let dt = trajectory.dt();
    trajectory
        .poses()
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (&pair[0].pose, &pair[1].pose);
            let (dx, dy) = prev.displacement_to(curr);
            body_frame(prev.theta, axis).lateral_component(dx, dy) / dt
        })
        .collect()
}

/// Check `trajectory` for sideways slip.
///
/// # Errors
///
/// Returns a configuration error if `config` fails [`FeasibilityConfig::validate`].
pub fn analyze(trajectory: &Trajectory, config: &FeasibilityConfig) -> Result<FeasibilityReport> {
    config.validate()?;

    let threshold = config.lateral_tolerance.max(LATERAL_NOISE_FLOOR);
    let mut violation_frames = Vec::new();
    let mut max_lateral_speed: f64 = 0.0;

    let speeds = lateral_speeds(trajectory, config.axis);
    for (speed, step_end) in speeds.iter().zip(&trajectory.poses()[1..]) {
        max_lateral_speed = max_lateral_speed.max(speed.abs());
        if speed.abs() > threshold {
            violation_frames.push(step_end.frame);
        }
    }

    let report = FeasibilityReport {
        violations: violation_frames.len(),
        violation_frames,
        tolerance: config.lateral_tolerance,
        sample_rate: trajectory.sample_rate(),
        frame_start: trajectory.frame_start(),
        frame_end: trajectory.frame_end(),
        max_lateral_speed,
    };
    debug!(
        violations = report.violations,
        max_lateral_speed = report.max_lateral_speed,
        tolerance = report.tolerance,
        "Feasibility analysis complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roboanim_kinematics::Pose;

    const FPS: f64 = 24.0;

    fn config(axis: ForwardAxis) -> FeasibilityConfig {
        FeasibilityConfig {
            axis,
            track_width: 0.25,
            lateral_tolerance: 0.02,
        }
    }

    /// Ten frames moving in a straight line from the origin to `(x, y)` at yaw 0.
    fn slide_to(x: f64, y: f64) -> Trajectory {
        let poses = (0..10)
            .map(|i| {
                let u = i as f64 / 9.0;
                Pose::new(x * u, y * u, 0.0)
            })
            .collect();
        Trajectory::from_poses(1, FPS, poses).unwrap()
    }

    #[test]
    fn test_driving_forward_is_feasible() {
        let report = analyze(&slide_to(1.0, 0.0), &config(ForwardAxis::PosX)).unwrap();
        assert!(report.is_feasible());
        assert!(report.max_lateral_speed < 1e-9);
        assert_eq!((report.frame_start, report.frame_end), (1, 10));

        // +Y forward at yaw 0 points along world +Y
        let report = analyze(&slide_to(0.0, 1.0), &config(ForwardAxis::PosY)).unwrap();
        assert!(report.is_feasible());
    }

    #[test]
    fn test_sliding_sideways_flags_every_step() {
        let report = analyze(&slide_to(0.0, 1.0), &config(ForwardAxis::PosX)).unwrap();
        assert_eq!(report.violations, 9);
        assert_eq!(report.violation_frames, (2..=10).collect::<Vec<_>>());
        // 1/9 m per frame at 24 fps
        assert!((report.max_lateral_speed - 24.0 / 9.0).abs() < 1e-9);

        let report = analyze(&slide_to(1.0, 0.0), &config(ForwardAxis::PosY)).unwrap();
        assert_eq!(report.violations, 9);
        assert!(report.ensure_feasible().is_err());
    }

    #[test]
    fn test_previous_heading_defines_the_step() {
        // Turn in place then drive: the drive step uses the new heading only
        // once the turn has been completed on the previous frame.
        let poses = vec![
            Pose::new(0.0, 0.0, 0.0),
            Pose::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Pose::new(0.0, 0.1, std::f64::consts::FRAC_PI_2),
        ];
        let traj = Trajectory::from_poses(0, FPS, poses).unwrap();
        assert!(analyze(&traj, &config(ForwardAxis::PosX)).unwrap().is_feasible());

        // Turning and moving sideways in the same step slips.
        let poses = vec![
            Pose::new(0.0, 0.0, 0.0),
            Pose::new(0.0, 0.1, std::f64::consts::FRAC_PI_2),
        ];
        let traj = Trajectory::from_poses(0, FPS, poses).unwrap();
        let report = analyze(&traj, &config(ForwardAxis::PosX)).unwrap();
        assert_eq!(report.violation_frames, vec![1]);
    }

    #[test]
    fn test_tolerance_is_respected() {
        // 0.0005 m sideways per frame = 0.012 m/s, under 0.02
        let poses = (0..5).map(|i| Pose::new(0.1 * i as f64, 0.0005 * i as f64, 0.0)).collect();
        let traj = Trajectory::from_poses(0, FPS, poses).unwrap();
        assert!(analyze(&traj, &config(ForwardAxis::PosX)).unwrap().is_feasible());

        let strict = FeasibilityConfig {
            lateral_tolerance: 0.0,
            ..config(ForwardAxis::PosX)
        };
        assert_eq!(analyze(&traj, &strict).unwrap().violations, 4);
    }

    #[test]
    fn test_guards() {
        let traj = slide_to(1.0, 0.0);
        let bad_track = FeasibilityConfig {
            track_width: 0.0,
            ..config(ForwardAxis::PosX)
        };
        let err = analyze(&traj, &bad_track).unwrap_err();
        assert_eq!(err.to_string(), "track width must be positive");

        let bad_tol = FeasibilityConfig {
            lateral_tolerance: -1.0,
            ..config(ForwardAxis::PosX)
        };
        assert!(matches!(analyze(&traj, &bad_tol), Err(PathError::Configuration(_))));
    }

    #[test]
    fn test_report_display() {
        let report = analyze(&slide_to(0.0, 1.0), &config(ForwardAxis::PosX)).unwrap();
        assert_eq!(
            report.to_string(),
            "This won't work: 9 step(s) exceed sideways tolerance > 0.02 (frames 2, 3, 4, 5, 6, 7, 8, 9, 10)."
        );
    }

    #[test]
    fn test_analysis_does_not_mutate() {
        let traj = slide_to(0.0, 1.0);
        let before = traj.clone();
        let first = analyze(&traj, &config(ForwardAxis::PosX)).unwrap();
        let second = analyze(&traj, &config(ForwardAxis::PosX)).unwrap();
        assert_eq!(traj, before);
        assert_eq!(first, second);
    }
}
