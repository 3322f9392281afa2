//! Linear: rotate in place, drive straight, rotate in place.

use std::f64::consts::PI;

use roboanim_kinematics::{ForwardAxis, Pose};
use tracing::debug;

use super::{ANGLE_EPSILON, MIN_CHORD, rotate_in_place, split_phases, unwrap_near};
use crate::error::Result;
use crate::profile::Timing;

/// Total turning (rad) needed to drive from `start_yaw` on `travel_yaw` and settle on `end_yaw`.
fn turning_cost(start_yaw: f64, travel_yaw: f64, end_yaw: f64) -> f64 {
    (travel_yaw - start_yaw).abs() + Pose::normalize_angle(end_yaw - travel_yaw).abs()
}

/// Rebuild the frames strictly between waypoints `a` and `b` as turn, drive, turn.
///
/// The chassis drives forwards or in reverse, whichever needs less turning.
pub(super) fn linear_segment(
    (a, start): (i32, Pose),
    (b, end): (i32, Pose),
    rotation_fraction: f64,
    axis: ForwardAxis,
    timing: &Timing,
) -> Result<Vec<Pose>> {
    let (dx, dy) = start.displacement_to(&end);
    if dx.hypot(dy) < MIN_CHORD {
        return Ok(rotate_in_place(a, start, b, end, timing));
    }

    let facing = axis.yaw_for_direction(dx, dy);
    let ahead = unwrap_near(start.theta, facing);
    let behind = unwrap_near(start.theta, facing + PI);
    // Reverse only when it saves turning; ties drive forwards.
    let travel_yaw = if turning_cost(start.theta, behind, end.theta) + ANGLE_EPSILON
        < turning_cost(start.theta, ahead, end.theta)
    {
        behind
    } else {
        ahead
    };
    let first_turn = travel_yaw - start.theta;
    let last_turn = Pose::normalize_angle(end.theta - travel_yaw);

    let phases = split_phases(
        a,
        b,
        first_turn.abs() > ANGLE_EPSILON,
        last_turn.abs() > ANGLE_EPSILON,
        rotation_fraction,
    )?;
    let travel_start = a + phases.start_turn;
    let travel_end = travel_start + phases.travel;
    debug!(
        frame_start = a,
        frame_end = b,
        start_turn = phases.start_turn,
        travel = phases.travel,
        end_turn = phases.end_turn,
        reverse = travel_yaw == behind,
        "Planned rotate-move-rotate segment"
    );

    let poses = (a + 1..b)
        .map(|frame| {
            if frame <= travel_start {
                let s = timing.progress(a, travel_start, frame);
                Pose::new(start.x, start.y, start.theta + first_turn * s)
            } else if frame <= travel_end {
                let s = timing.progress(travel_start, travel_end, frame);
                Pose::new(start.x + dx * s, start.y + dy * s, travel_yaw)
            } else {
                let s = timing.progress(travel_end, b, frame);
                Pose::new(end.x, end.y, travel_yaw + last_turn * s)
            }
        })
        .collect();
    Ok(poses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SpeedProfile;

    const EPSILON: f64 = 1e-12;

    fn timing() -> Timing {
        Timing::new(SpeedProfile::Constant { ramp_frames: 0 }, 0, 10)
    }

    #[test]
    fn test_phases_follow_rotation_fraction() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let end = Pose::new(0.0, 1.0, 0.0);
        let poses = linear_segment((0, start), (10, end), 0.2, ForwardAxis::PosX, &timing()).unwrap();
        assert_eq!(poses.len(), 9);
        // 2 turning frames, 6 driving frames, 2 turning frames (the last on the waypoint).
        assert!((poses[0].theta - std::f64::consts::FRAC_PI_4).abs() < EPSILON);
        assert!((poses[1].theta - std::f64::consts::FRAC_PI_2).abs() < EPSILON);
        assert!(poses[1].y.abs() < EPSILON);
        for pose in &poses[2..7] {
            assert!((pose.theta - std::f64::consts::FRAC_PI_2).abs() < EPSILON);
        }
        assert!((poses[2].y - 1.0 / 6.0).abs() < EPSILON);
        assert!((poses[7].y - 1.0).abs() < EPSILON);
        assert!((poses[8].theta - std::f64::consts::FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn test_prefers_reverse_when_cheaper() {
        // Facing +X with the target behind: back straight up, no turning.
        let start = Pose::new(0.0, 0.0, 0.0);
        let end = Pose::new(-1.0, 0.0, 0.0);
        let poses = linear_segment((0, start), (10, end), 0.25, ForwardAxis::PosX, &timing()).unwrap();
        for (i, pose) in poses.iter().enumerate() {
            assert!(pose.theta.abs() < EPSILON);
            assert!((pose.x + (i + 1) as f64 / 10.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_zero_fraction_still_turns() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let end = Pose::new(1.0, 1.0, 0.0);
        let poses = linear_segment((0, start), (10, end), 0.0, ForwardAxis::PosX, &timing()).unwrap();
        // One frame to face the target, then drive.
        assert!((poses[0].theta - std::f64::consts::FRAC_PI_4).abs() < EPSILON);
        assert!(poses[0].x.abs() < EPSILON);
        assert!(poses[1].x > 0.0);
    }
}
