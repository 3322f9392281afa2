//! S-Ease: curvature-clamped Bezier segments.
//!
//! The segment leaves the first waypoint along its heading and arrives at the
//! second along its heading. When the chord points behind both headings the
//! chassis reverses along the curve instead. Handles start at
//! `tangent_scale * chord` and grow until the curvature fits under the clamp.
//! If no handle length fits, both end tangents are blended towards the chord
//! and the chassis pivots in place to meet them; a full blend is a straight
//! line, which always fits.

use nalgebra::{Rotation2, Vector2};
use roboanim_kinematics::{ForwardAxis, Pose, body_frame};
use tracing::{debug, warn};

use super::{ANGLE_EPSILON, MIN_CHORD, rotate_in_place, split_phases, unwrap_near};
use crate::bezier::{ARC_LENGTH_SAMPLES, ArcLengthTable, CubicBezier};
use crate::error::Result;
use crate::profile::Timing;

/// Factor applied to the handle length after a curvature miss.
const HANDLE_GROWTH: f64 = 1.25;

/// Handle growths tried per blend step.
const MAX_HANDLE_GROWTHS: u32 = 8;

/// Fractions of the end-tangent turn towards the chord, tried in order.
const BLEND_STEPS: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Fraction of a segment's frames spent on each pivot.
const PIVOT_FRACTION: f64 = 0.2;

/// Parameters sampled when measuring curvature.
const CURVATURE_SAMPLES: usize = 64;

/// In-between poses of one segment plus the curvature of the curve they follow.
pub(super) struct SmoothSegment {
    pub poses: Vec<Pose>,
    pub max_curvature: f64,
}

struct Candidate {
    curve: CubicBezier,
    blend: f64,
    curvature: f64,
}

fn forward_vector(yaw: f64, axis: ForwardAxis) -> Vector2<f64> {
    let (x, y) = body_frame(yaw, axis).forward;
    Vector2::new(x, y)
}

/// Signed angle (rad) turning unit vector `from` onto unit vector `to`.
fn signed_angle(from: &Vector2<f64>, to: &Vector2<f64>) -> f64 {
    from.perp(to).atan2(from.dot(to))
}

#[allow(clippy::too_many_arguments)]
fn fit_curve(
    pa: Vector2<f64>,
    da: Vector2<f64>,
    turn_a: f64,
    pb: Vector2<f64>,
    db: Vector2<f64>,
    turn_b: f64,
    handle: f64,
    max_curvature: f64,
) -> Candidate {
    let build = |blend: f64, handle: f64| {
        let ta = Rotation2::new(blend * turn_a) * da;
        let tb = Rotation2::new(blend * turn_b) * db;
        let curve = CubicBezier::with_tangents(pa, ta, pb, tb, handle);
        Candidate {
            curvature: curve.max_curvature(CURVATURE_SAMPLES),
            curve,
            blend,
        }
    };

    let mut best = build(BLEND_STEPS[0], handle);
    for blend in BLEND_STEPS {
        let mut length = handle;
        for _ in 0..=MAX_HANDLE_GROWTHS {
            let candidate = build(blend, length);
            if candidate.curvature <= max_curvature {
                return candidate;
            }
            if candidate.curvature < best.curvature {
                best = candidate;
            }
            length *= HANDLE_GROWTH;
        }
    }
    warn!(
        curvature = best.curvature,
        limit = max_curvature,
        "No curve fits under the curvature clamp; using the flattest one"
    );
    best
}

/// Rebuild the frames strictly between waypoints `a` and `b` along a Bezier.
pub(super) fn smooth_segment(
    (a, start): (i32, Pose),
    (b, end): (i32, Pose),
    tangent_scale: f64,
    max_curvature: f64,
    axis: ForwardAxis,
    timing: &Timing,
) -> Result<SmoothSegment> {
    let pa = Vector2::new(start.x, start.y);
    let pb = Vector2::new(end.x, end.y);
    let chord = pb - pa;
    let length = chord.norm();
    if length < MIN_CHORD {
        return Ok(SmoothSegment {
            poses: rotate_in_place(a, start, b, end, timing),
            max_curvature: 0.0,
        });
    }
    let dir = chord / length;

    let (ta, tb) = (forward_vector(start.theta, axis), forward_vector(end.theta, axis));
    let reverse = ta.dot(&dir) < 0.0 && tb.dot(&dir) < 0.0;
    let sign = if reverse { -1.0 } else { 1.0 };
    let (da, db) = (ta * sign, tb * sign);
    let (turn_a, turn_b) = (signed_angle(&da, &dir), signed_angle(&db, &dir));

    let fit = fit_curve(pa, da, turn_a, pb, db, turn_b, tangent_scale * length, max_curvature);
    let pivot_a = fit.blend * turn_a;
    let pivot_b = fit.blend * turn_b;
    let phases = split_phases(
        a,
        b,
        pivot_a.abs() > ANGLE_EPSILON,
        pivot_b.abs() > ANGLE_EPSILON,
        PIVOT_FRACTION,
    )?;
    debug!(
        frame_start = a,
        frame_end = b,
        reverse,
        blend = fit.blend,
        curvature = fit.curvature,
        pivot_frames = phases.start_turn + phases.end_turn,
        "Fitted S-Ease segment"
    );

    let travel_start = a + phases.start_turn;
    let travel_end = travel_start + phases.travel;
    let table = ArcLengthTable::new(&fit.curve, ARC_LENGTH_SAMPLES);

    let mut poses = Vec::with_capacity((b - a - 1) as usize);
    let mut yaw = start.theta;
    for frame in a + 1..b {
        let pose = if frame <= travel_start {
            yaw = start.theta + pivot_a * timing.progress(a, travel_start, frame);
            Pose::new(start.x, start.y, yaw)
        } else if frame <= travel_end {
            let s = timing.progress(travel_start, travel_end, frame);
            let t = table.param_at_fraction(s);
            let point = fit.curve.point(t);
            let drive = fit.curve.derivative(t) * sign;
            if drive.norm() > MIN_CHORD {
                yaw = unwrap_near(yaw, axis.yaw_for_direction(drive.x, drive.y));
            }
            Pose::new(point.x, point.y, yaw)
        } else {
            let settle = unwrap_near(yaw, end.theta);
            let s = timing.progress(travel_end, b, frame);
            Pose::new(end.x, end.y, yaw + (settle - yaw) * s)
        };
        poses.push(pose);
    }

    Ok(SmoothSegment {
        poses,
        max_curvature: fit.curvature,
    })
}
