//! Slip-free path reconstruction.
//!
//! [`reconstruct`] rewrites the in-between frames of every waypoint segment
//! that slips, using one of two strategies:
//!
//! - [`Strategy::SmoothCurve`] (S-Ease): a cubic Bezier through the waypoints
//!   with handles along the waypoint headings and curvature clamped to
//!   `2 / track_width`.
//! - [`Strategy::Linear`]: rotate in place, drive straight, rotate in place.
//!
//! Waypoint frames are never touched. After the geometry is sampled with the
//! selected [`SpeedProfile`], every moving in-between frame is turned to face
//! the next sample, so each step is a pure forward (or reverse) displacement
//! in the body frame of the step's first pose.

mod linear;
mod sease;

use std::f64::consts::PI;
use std::fmt;

use roboanim_kinematics::{ForwardAxis, Pose, body_frame};
use tracing::{debug, error, info};

use crate::error::{PathError, Result, preview_frames};
use crate::feasibility::{FeasibilityConfig, FeasibilityReport, analyze};
use crate::profile::{SpeedProfile, Timing};
use crate::trajectory::Trajectory;

/// Displacements shorter than this (m) count as standing still.
pub(crate) const MIN_CHORD: f64 = 1e-12;

/// Heading differences below this (rad) need no turn.
pub(crate) const ANGLE_EPSILON: f64 = 1e-12;

/// Allowed range of the S-Ease handle scale.
pub const TANGENT_SCALE_RANGE: (f64, f64) = (0.05, 2.0);

/// Allowed range of the Linear rotation fraction.
pub const ROTATION_FRACTION_RANGE: (f64, f64) = (0.0, 0.45);

/// Path geometry used to replace slipping segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Smooth Bezier segments with a curvature clamp.
    SmoothCurve {
        /// Handle length as a fraction of the waypoint distance.
        tangent_scale: f64,
    },
    /// Rotate to face, move straight, rotate to the final heading.
    Linear {
        /// Fraction of a segment's frames used by each rotation.
        rotation_fraction: f64,
    },
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::SmoothCurve { .. } => write!(f, "S-Ease"),
            Strategy::Linear { .. } => write!(f, "Linear"),
        }
    }
}

/// Everything [`reconstruct`] needs besides the trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconstructConfig {
    /// Geometry of replacement segments.
    pub strategy: Strategy,
    /// Timing along replacement segments.
    pub speed_profile: SpeedProfile,
    /// Local axis treated as the chassis front.
    pub axis: ForwardAxis,
    /// Distance between the drive wheels (m).
    pub track_width: f64,
    /// Allowed sideways speed (m/s).
    pub lateral_tolerance: f64,
}

impl ReconstructConfig {
    /// The feasibility settings implied by this configuration.
    pub fn feasibility(&self) -> FeasibilityConfig {
        FeasibilityConfig {
            axis: self.axis,
            track_width: self.track_width,
            lateral_tolerance: self.lateral_tolerance,
        }
    }

    /// Largest curvature (1/m) a segment may have: the inverse of half the track.
    pub fn max_curvature(&self) -> f64 {
        2.0 / self.track_width
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for bad geometry or out-of-range strategy parameters.
    pub fn validate(&self) -> Result<()> {
        self.feasibility().validate()?;
        match self.strategy {
            Strategy::SmoothCurve { tangent_scale } => {
                let (lo, hi) = TANGENT_SCALE_RANGE;
                if !(lo..=hi).contains(&tangent_scale) {
                    return Err(PathError::configuration(format!(
                        "tangent scale must be between {lo} and {hi}"
                    )));
                }
            }
            Strategy::Linear { rotation_fraction } => {
                let (lo, hi) = ROTATION_FRACTION_RANGE;
                if !(lo..=hi).contains(&rotation_fraction) {
                    return Err(PathError::configuration(format!(
                        "rotation fraction must be between {lo} and {hi}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Result of [`reconstruct`].
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The feasible trajectory.
    pub trajectory: Trajectory,
    /// Frames covered by the trajectory (and baked by the caller).
    pub frames_baked: usize,
    /// Waypoint segments that were rewritten.
    pub segments_rewritten: usize,
    /// Largest curvature (1/m) of any synthesized curve; 0 for straight lines.
    pub max_curvature: f64,
    /// Feasibility of the input.
    pub before: FeasibilityReport,
    /// Feasibility of the output. Always clean.
    pub after: FeasibilityReport,
}

impl Reconstruction {
    /// `true` when any frame was rewritten.
    pub fn changed(&self) -> bool {
        self.segments_rewritten > 0
    }
}

/// Frame counts of the three phases of a segment: turn, travel, turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Phases {
    pub start_turn: i32,
    pub travel: i32,
    pub end_turn: i32,
}

/// Split the `end - start` steps of a segment into turn, travel and turn phases.
///
/// Each needed turn gets `floor(fraction * steps)` frames, at least one. The
/// closing turn gives frames back first (down to an instant turn on the
/// waypoint frame) so that travel keeps at least one step.
pub(crate) fn split_phases(
    start: i32,
    end: i32,
    turn_at_start: bool,
    turn_at_end: bool,
    fraction: f64,
) -> Result<Phases> {
    let steps = end - start;
    let share = (fraction * f64::from(steps)).floor() as i32;
    let start_turn = if turn_at_start { share.max(1) } else { 0 };
    let mut end_turn = if turn_at_end { share.max(1) } else { 0 };
    if steps - start_turn - end_turn < 1 {
        end_turn = (steps - start_turn - 1).max(0);
    }
    let travel = steps - start_turn - end_turn;
    if travel < 1 {
        return Err(PathError::configuration(format!(
            "waypoints at frames {start} and {end} are too close to turn and drive between"
        )));
    }
    Ok(Phases {
        start_turn,
        travel,
        end_turn,
    })
}

/// `angle` shifted by whole turns to lie within π of `reference`.
pub(crate) fn unwrap_near(reference: f64, angle: f64) -> f64 {
    reference + Pose::normalize_angle(angle - reference)
}

/// Heading closest to `prev` that drives along `(dx, dy)`, forwards or in reverse.
pub(crate) fn heading_along(prev: f64, dx: f64, dy: f64, axis: ForwardAxis) -> f64 {
    let forward = axis.yaw_for_direction(dx, dy);
    let ahead = unwrap_near(prev, forward);
    let behind = unwrap_near(prev, forward + PI);
    if (ahead - prev).abs() <= (behind - prev).abs() {
        ahead
    } else {
        behind
    }
}

/// Turn in place from `start` to `end` over the frames strictly between `a` and `b`.
pub(crate) fn rotate_in_place(a: i32, start: Pose, b: i32, end: Pose, timing: &Timing) -> Vec<Pose> {
    let turn = end.theta - start.theta;
    (a + 1..b)
        .map(|frame| {
            let s = timing.progress(a, b, frame);
            Pose::new(start.x, start.y, start.theta + turn * s)
        })
        .collect()
}

/// Point every moving in-between frame along its step to the next sample.
///
/// The first step leaves the waypoint on the waypoint's own heading, so the
/// first in-between position is projected onto that heading's line.
fn align_to_chords(start: &Pose, interior: &mut [Pose], end: &Pose, axis: ForwardAxis) {
    let Some(first) = interior.first_mut() else {
        return;
    };
    let frame = body_frame(start.theta, axis);
    let (dx, dy) = start.displacement_to(first);
    let along = frame.forward_component(dx, dy);
    first.x = start.x + along * frame.forward.0;
    first.y = start.y + along * frame.forward.1;

    for k in 0..interior.len() {
        let next = interior.get(k + 1).copied().unwrap_or(*end);
        let current = &mut interior[k];
        let (dx, dy) = current.displacement_to(&next);
        if dx.hypot(dy) > MIN_CHORD {
            current.theta = heading_along(current.theta, dx, dy, axis);
        }
    }
}

/// Waypoint frames inside the trajectory, sorted, with both range ends included.
pub fn segment_bounds(trajectory: &Trajectory, waypoints: &[i32]) -> Vec<i32> {
    let range = trajectory.frame_range();
    let mut bounds: Vec<i32> = waypoints
        .iter()
        .copied()
        .filter(|f| range.contains(f))
        .chain([*range.start(), *range.end()])
        .collect();
    bounds.sort_unstable();
    bounds.dedup();
    bounds
}

/// Replace every slipping waypoint segment of `trajectory` with a feasible one.
///
/// A trajectory that is already feasible is returned unchanged. Segments that
/// do not slip are kept as they are.
///
/// # Errors
///
/// - [`PathError::Configuration`] for bad configuration, or for a slipping
///   segment whose waypoints are only one frame apart.
/// - [`PathError::InvariantFailure`] if the rebuilt trajectory still slips.
pub fn reconstruct(
    trajectory: &Trajectory,
    waypoints: &[i32],
    config: &ReconstructConfig,
) -> Result<Reconstruction> {
    config.validate()?;
    let feasibility = config.feasibility();
    let before = analyze(trajectory, &feasibility)?;
    if before.is_feasible() {
        info!("Trajectory is already feasible; nothing to reconstruct");
        return Ok(Reconstruction {
            trajectory: trajectory.clone(),
            frames_baked: trajectory.len(),
            segments_rewritten: 0,
            max_curvature: 0.0,
            after: before.clone(),
            before,
        });
    }

    let f0 = trajectory.frame_start();
    let timing = Timing::new(config.speed_profile, f0, trajectory.frame_end());
    let index = |frame: i32| (frame - f0) as usize;
    let mut poses = trajectory.plain_poses();
    let mut segments_rewritten = 0;
    let mut max_curvature: f64 = 0.0;

    for pair in segment_bounds(trajectory, waypoints).windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if !before.violation_frames.iter().any(|&v| v > a && v <= b) {
            continue;
        }
        if b - a < 2 {
            return Err(PathError::configuration(format!(
                "waypoints at frames {a} and {b} are one frame apart and the step between them slides sideways"
            )));
        }

        let (start, end) = (poses[index(a)], poses[index(b)]);
        let mut interior = match config.strategy {
            Strategy::SmoothCurve { tangent_scale } => {
                let segment = sease::smooth_segment(
                    (a, start),
                    (b, end),
                    tangent_scale,
                    config.max_curvature(),
                    config.axis,
                    &timing,
                )?;
                max_curvature = max_curvature.max(segment.max_curvature);
                segment.poses
            }
            Strategy::Linear { rotation_fraction } => linear::linear_segment(
                (a, start),
                (b, end),
                rotation_fraction,
                config.axis,
                &timing,
            )?,
        };
        align_to_chords(&start, &mut interior, &end, config.axis);

        debug!(
            strategy = %config.strategy,
            frame_start = a,
            frame_end = b,
            "Rewrote waypoint segment"
        );
        poses[index(a) + 1..index(b)].copy_from_slice(&interior);
        segments_rewritten += 1;
    }

    let rebuilt = Trajectory::from_poses(f0, trajectory.sample_rate(), poses)?;
    let after = analyze(&rebuilt, &feasibility)?;
    if !after.is_feasible() {
        error!(
            strategy = %config.strategy,
            violations = after.violations,
            frames = %preview_frames(&after.violation_frames),
            "Reconstructed trajectory still slips"
        );
        return Err(PathError::InvariantFailure(format!(
            "{} reconstruction left {} slipping step(s) (frames {})",
            config.strategy,
            after.violations,
            preview_frames(&after.violation_frames)
        )));
    }

    info!(
        strategy = %config.strategy,
        segments = segments_rewritten,
        frames = rebuilt.len(),
        "Reconstructed slip-free trajectory"
    );
    Ok(Reconstruction {
        frames_baked: rebuilt.len(),
        trajectory: rebuilt,
        segments_rewritten,
        max_curvature,
        before,
        after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;
    const FPS: f64 = 24.0;

    fn config(strategy: Strategy, axis: ForwardAxis) -> ReconstructConfig {
        ReconstructConfig {
            strategy,
            speed_profile: SpeedProfile::default(),
            axis,
            track_width: 0.25,
            lateral_tolerance: 0.02,
        }
    }

    fn sease() -> Strategy {
        Strategy::SmoothCurve { tangent_scale: 0.35 }
    }

    fn linear() -> Strategy {
        Strategy::Linear { rotation_fraction: 0.25 }
    }

    /// Straight interpolation between two poses over `frames` frames starting at `first`.
    fn lerp(first: i32, frames: usize, from: Pose, to: Pose) -> Trajectory {
        let last = (frames - 1) as f64;
        let poses = (0..frames)
            .map(|i| {
                let u = i as f64 / last;
                Pose::new(
                    from.x + (to.x - from.x) * u,
                    from.y + (to.y - from.y) * u,
                    from.theta + (to.theta - from.theta) * u,
                )
            })
            .collect();
        Trajectory::from_poses(first, FPS, poses).unwrap()
    }

    fn sideways() -> Trajectory {
        lerp(1, 10, Pose::new(0.0, 0.0, 0.0), Pose::new(0.0, 1.0, 0.0))
    }

    fn assert_waypoints_kept(input: &Trajectory, output: &Trajectory, frames: &[i32]) {
        for &f in frames {
            assert_eq!(input.at(f), output.at(f), "waypoint {f} moved");
        }
    }

    #[test]
    fn test_smooth_curve_fixes_sideways_slide() {
        let input = sideways();
        let result = reconstruct(&input, &[1, 10], &config(sease(), ForwardAxis::PosX)).unwrap();
        assert_eq!(result.before.violations, 9);
        assert!(result.after.is_feasible());
        assert!(result.max_curvature <= 8.0);
        assert!(result.max_curvature > 0.0);
        assert_eq!(result.frames_baked, 10);
        assert_eq!(result.segments_rewritten, 1);
        assert_waypoints_kept(&input, &result.trajectory, &[1, 10]);

        // Re-analysis of the output is clean too.
        let again = analyze(&result.trajectory, &config(sease(), ForwardAxis::PosX).feasibility()).unwrap();
        assert_eq!(again.violations, 0);
    }

    #[test]
    fn test_linear_rotates_moves_rotates() {
        let input = sideways();
        let result = reconstruct(&input, &[1, 10], &config(linear(), ForwardAxis::PosX)).unwrap();
        assert!(result.after.is_feasible());
        assert_eq!(result.max_curvature, 0.0);
        assert_waypoints_kept(&input, &result.trajectory, &[1, 10]);

        let pose = |f: i32| result.trajectory.at(f).unwrap().pose;
        // floor(0.25 * 9) = 2 turning frames at each end.
        for f in [2, 3] {
            assert!(pose(f).x.abs() < EPSILON && pose(f).y.abs() < EPSILON);
        }
        assert!((pose(3).theta - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert!((pose(8).y - 1.0).abs() < EPSILON);
        for f in 4..8 {
            assert!(pose(f).x.abs() < 1e-9);
            assert!(pose(f).y > pose(f - 1).y);
        }
    }

    #[test]
    fn test_mirrored_axis_case() {
        // With +Y forward, driving along world X is the sideways case.
        let input = lerp(1, 10, Pose::new(0.0, 0.0, 0.0), Pose::new(1.0, 0.0, 0.0));
        for strategy in [sease(), linear()] {
            let result = reconstruct(&input, &[], &config(strategy, ForwardAxis::PosY)).unwrap();
            assert_eq!(result.before.violations, 9);
            assert!(result.after.is_feasible());
            assert!(result.max_curvature <= 8.0);
            assert_waypoints_kept(&input, &result.trajectory, &[1, 10]);
        }
    }

    #[test]
    fn test_feasible_input_is_left_alone() {
        let input = lerp(0, 24, Pose::new(0.0, 0.0, 0.0), Pose::new(1.0, 0.0, 0.0));
        for strategy in [sease(), linear()] {
            let result = reconstruct(&input, &[0, 12, 23], &config(strategy, ForwardAxis::PosX)).unwrap();
            assert!(!result.changed());
            assert_eq!(result.trajectory, input);
            assert_eq!(result.frames_baked, 24);
        }
    }

    #[test]
    fn test_only_slipping_segments_are_rewritten() {
        let drive = lerp(0, 11, Pose::new(0.0, 0.0, 0.0), Pose::new(1.0, 0.0, 0.0));
        let slide = lerp(10, 11, Pose::new(1.0, 0.0, 0.0), Pose::new(1.0, 1.0, 0.0));
        let mut poses = drive.plain_poses();
        poses.extend(slide.plain_poses().into_iter().skip(1));
        let input = Trajectory::from_poses(0, FPS, poses).unwrap();

        let result = reconstruct(&input, &[10], &config(sease(), ForwardAxis::PosX)).unwrap();
        assert_eq!(result.segments_rewritten, 1);
        assert!(result.after.is_feasible());
        for f in 0..=10 {
            assert_eq!(input.at(f), result.trajectory.at(f));
        }
        assert_waypoints_kept(&input, &result.trajectory, &[0, 10, 20]);
    }

    #[test]
    fn test_reverse_segment_keeps_heading() {
        // Weaving backwards along -X while facing +X.
        let poses = (0..10)
            .map(|i| {
                let u = i as f64 / 9.0;
                Pose::new(-u, 0.05 * (PI * u).sin(), 0.0)
            })
            .collect();
        let input = Trajectory::from_poses(0, FPS, poses).unwrap();
        let result = reconstruct(&input, &[], &config(sease(), ForwardAxis::PosX)).unwrap();
        assert!(result.after.is_feasible());
        assert!(result.max_curvature < 1e-6);
        for fp in result.trajectory.poses() {
            assert!(fp.pose.theta.abs() < 1e-9, "frame {} turned around", fp.frame);
            assert!(fp.pose.y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_every_profile_and_strategy_is_feasible() {
        let input = lerp(0, 49, Pose::new(0.0, 0.0, 0.3), Pose::new(-0.7, 1.2, -2.0));
        let profiles = [
            SpeedProfile::Constant { ramp_frames: 12 },
            SpeedProfile::GlobalEase { ease_frames: 15 },
            SpeedProfile::PerSegmentEase { ease_frames: 6 },
        ];
        for strategy in [sease(), linear()] {
            for speed_profile in profiles {
                let cfg = ReconstructConfig {
                    speed_profile,
                    lateral_tolerance: 0.0,
                    ..config(strategy, ForwardAxis::NegY)
                };
                let result = reconstruct(&input, &[16, 30], &cfg).unwrap();
                assert!(result.after.is_feasible(), "{strategy} / {speed_profile:?}");
                assert!(result.max_curvature <= cfg.max_curvature());
                assert_waypoints_kept(&input, &result.trajectory, &[0, 16, 30, 48]);
            }
        }
    }

    #[test]
    fn test_turn_on_the_spot() {
        // Same position at both ends, wobbling sideways in between.
        let poses = (0..8)
            .map(|i| Pose::new(0.0, if i % 2 == 1 { 0.05 } else { 0.0 }, 0.0))
            .chain(std::iter::once(Pose::new(0.0, 0.0, 1.0)))
            .collect();
        let input = Trajectory::from_poses(0, FPS, poses).unwrap();
        for strategy in [sease(), linear()] {
            let result = reconstruct(&input, &[], &config(strategy, ForwardAxis::PosX)).unwrap();
            assert!(result.after.is_feasible());
            let thetas: Vec<f64> = result.trajectory.poses().iter().map(|fp| fp.pose.theta).collect();
            for pair in thetas.windows(2) {
                assert!(pair[1] >= pair[0] - EPSILON);
            }
            assert!(result.trajectory.poses().iter().all(|fp| fp.pose.y == 0.0));
        }
    }

    #[test]
    fn test_adjacent_waypoints_cannot_be_fixed() {
        let input = sideways();
        let every_frame: Vec<i32> = (1..=10).collect();
        let err = reconstruct(&input, &every_frame, &config(linear(), ForwardAxis::PosX)).unwrap_err();
        assert!(matches!(err, PathError::Configuration(ref m) if m.contains("one frame apart")));
    }

    #[test]
    fn test_strategy_parameters_are_validated() {
        let bad = config(Strategy::SmoothCurve { tangent_scale: 3.0 }, ForwardAxis::PosX);
        assert!(matches!(reconstruct(&sideways(), &[], &bad), Err(PathError::Configuration(_))));
        let bad = config(Strategy::Linear { rotation_fraction: 0.5 }, ForwardAxis::PosX);
        assert!(bad.validate().is_err());
        let bad = ReconstructConfig {
            track_width: 0.0,
            ..config(linear(), ForwardAxis::PosX)
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_curvature_bound_follows_track_width() {
        let cfg = config(sease(), ForwardAxis::PosX);
        assert!((cfg.max_curvature() - 8.0).abs() < EPSILON);
        let wide = ReconstructConfig {
            track_width: 0.5,
            ..cfg
        };
        assert!((wide.max_curvature() - 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_split_phases() {
        let p = split_phases(0, 9, true, true, 0.25).unwrap();
        assert_eq!(p, Phases { start_turn: 2, travel: 5, end_turn: 2 });
        let p = split_phases(0, 9, false, true, 0.0).unwrap();
        assert_eq!(p, Phases { start_turn: 0, travel: 8, end_turn: 1 });
        let p = split_phases(0, 2, true, true, 0.45).unwrap();
        assert_eq!(p, Phases { start_turn: 1, travel: 1, end_turn: 0 });
        assert!(split_phases(0, 1, true, false, 0.25).is_err());
    }

    #[test]
    fn test_segment_bounds() {
        let traj = sideways();
        assert_eq!(segment_bounds(&traj, &[7, 0, 4, 4, 11]), vec![1, 4, 7, 10]);
    }
}
