//! Per-wheel angle and rate integration for a sampled chassis trajectory.
//!
//! Each step between consecutive poses is turned into chassis speeds measured
//! in the body frame held at the start of the step, mapped through the
//! inverse kinematics, capped, and integrated into absolute wheel angles.

use alloc::vec::Vec;
use core::f64::consts::PI;

use libm::fabs;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::basis::{ForwardAxis, body_frame};
use crate::error::KinematicsError;
use crate::{ChassisSpeeds, DifferentialDrive, Pose};

/// Convert revolutions per minute to rad/s.
pub fn rpm_to_rad_per_sec(rpm: f64) -> f64 {
    rpm * 2.0 * PI / 60.0
}

/// Convert rad/s to revolutions per minute.
pub fn rad_per_sec_to_rpm(rad_per_sec: f64) -> f64 {
    rad_per_sec * 60.0 / (2.0 * PI)
}

/// Rolling direction of each side, `+1.0` or `-1.0`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSigns {
    /// Multiplier for the left wheels.
    pub left: f64,
    /// Multiplier for the right wheels.
    pub right: f64,
}

impl WheelSigns {
    /// Both sides roll forward.
    pub const FORWARD: WheelSigns = WheelSigns {
        left: 1.0,
        right: 1.0,
    };

    /// Build from per-side inversion flags.
    pub const fn new(left_inverted: bool, right_inverted: bool) -> Self {
        WheelSigns {
            left: if left_inverted { -1.0 } else { 1.0 },
            right: if right_inverted { -1.0 } else { 1.0 },
        }
    }

    /// Flip both sides, for models whose wheels roll against the body's forward axis.
    pub const fn flipped(self) -> Self {
        WheelSigns {
            left: -self.left,
            right: -self.right,
        }
    }
}

impl Default for WheelSigns {
    fn default() -> Self {
        WheelSigns::FORWARD
    }
}

/// Hard caps on wheel motion. A value of `0.0` disables the cap.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelLimits {
    /// Maximum wheel speed (RPM).
    pub max_rpm: f64,
    /// Maximum change of wheel speed per second (RPM/s).
    pub max_ang_accel_rpm_per_s: f64,
}

/// Wheel angles and rates for every sample of a trajectory.
///
/// Index `i` corresponds to pose `i`. Sample 0 is the start of the motion:
/// angle 0 and rate 0.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WheelMotion {
    /// Absolute left wheel angle (rad).
    pub theta_l: Vec<f64>,
    /// Absolute right wheel angle (rad).
    pub theta_r: Vec<f64>,
    /// Left wheel rate over the step ending at this sample (rad/s).
    pub rate_l: Vec<f64>,
    /// Right wheel rate over the step ending at this sample (rad/s).
    pub rate_r: Vec<f64>,
    /// Largest left wheel speed after caps (RPM).
    pub max_rpm_l: f64,
    /// Largest right wheel speed after caps (RPM).
    pub max_rpm_r: f64,
    /// Steps scaled down by the speed cap.
    pub speed_clamped_steps: usize,
    /// Steps scaled down by the acceleration cap.
    pub accel_clamped_steps: usize,
}

impl WheelMotion {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.theta_l.len()
    }

    /// Returns `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.theta_l.is_empty()
    }
}

impl DifferentialDrive {
    /// Integrate per-wheel angles and rates along `poses`, sampled every `dt` seconds.
    ///
    /// Forward speed is the displacement projected on the forward vector of the
    /// previous pose (signed, so reversing yields negative wheel rates). Yaw rate
    /// uses the heading change wrapped to `(-π, π]`.
    ///
    /// Both caps act on the two wheels jointly: when either wheel exceeds a limit,
    /// both rates are scaled by the same factor so the commanded curvature is kept.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidTimeStep)` if `dt` is not positive.
    /// Returns `Err(KinematicsError::TooFewSamples)` if `poses` is empty.
    pub fn wheel_motion(
        &self,
        poses: &[Pose],
        dt: f64,
        axis: ForwardAxis,
        signs: WheelSigns,
        limits: WheelLimits,
    ) -> Result<WheelMotion, KinematicsError> {
        if !(dt > 0.0) {
            return Err(KinematicsError::InvalidTimeStep("must be positive"));
        }
        if poses.is_empty() {
            return Err(KinematicsError::TooFewSamples("need at least one pose"));
        }

        let n = poses.len();
        let mut motion = WheelMotion {
            theta_l: Vec::with_capacity(n),
            theta_r: Vec::with_capacity(n),
            rate_l: Vec::with_capacity(n),
            rate_r: Vec::with_capacity(n),
            ..WheelMotion::default()
        };
        motion.theta_l.push(0.0);
        motion.theta_r.push(0.0);
        motion.rate_l.push(0.0);
        motion.rate_r.push(0.0);

        let max_rate = rpm_to_rad_per_sec(limits.max_rpm);
        let max_rate_step = rpm_to_rad_per_sec(limits.max_ang_accel_rpm_per_s) * dt;

        let (mut prev_l, mut prev_r) = (0.0, 0.0);
        for pair in poses.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let (dx, dy) = prev.displacement_to(curr);
            let v = body_frame(prev.theta, axis).forward_component(dx, dy) / dt;
            let omega = Pose::normalize_angle(curr.theta - prev.theta) / dt;

            let speeds = self.inverse_kinematics(ChassisSpeeds::new(v, omega));
            let mut rate_l = speeds.omega_l * signs.left;
            let mut rate_r = speeds.omega_r * signs.right;

            if limits.max_rpm > 0.0 {
                let peak = fabs(rate_l).max(fabs(rate_r));
                if peak > max_rate {
                    let scale = max_rate / peak;
                    rate_l *= scale;
                    rate_r *= scale;
                    motion.speed_clamped_steps += 1;
                }
            }

            if limits.max_ang_accel_rpm_per_s > 0.0 {
                let (delta_l, delta_r) = (rate_l - prev_l, rate_r - prev_r);
                let peak = fabs(delta_l).max(fabs(delta_r));
                if peak > max_rate_step {
                    // Stays between the previous and the requested rate, so the speed cap still holds.
                    let scale = max_rate_step / peak;
                    rate_l = prev_l + delta_l * scale;
                    rate_r = prev_r + delta_r * scale;
                    motion.accel_clamped_steps += 1;
                }
            }

            let theta_l = motion.theta_l[motion.theta_l.len() - 1] + rate_l * dt;
            let theta_r = motion.theta_r[motion.theta_r.len() - 1] + rate_r * dt;
            motion.theta_l.push(theta_l);
            motion.theta_r.push(theta_r);
            motion.rate_l.push(rate_l);
            motion.rate_r.push(rate_r);
            motion.max_rpm_l = motion.max_rpm_l.max(rad_per_sec_to_rpm(fabs(rate_l)));
            motion.max_rpm_r = motion.max_rpm_r.max(rad_per_sec_to_rpm(fabs(rate_r)));

            prev_l = rate_l;
            prev_r = rate_r;
        }

        Ok(motion)
    }
}

/// Free-function form of [`DifferentialDrive::wheel_motion`].
///
/// # Errors
///
/// Propagates geometry validation from [`DifferentialDrive::new`] and the
/// input checks of [`DifferentialDrive::wheel_motion`].
pub fn compute_wheel_motion(
    poses: &[Pose],
    dt: f64,
    track_width: f64,
    wheel_radius: f64,
    axis: ForwardAxis,
    signs: WheelSigns,
    limits: WheelLimits,
) -> Result<WheelMotion, KinematicsError> {
    DifferentialDrive::new(wheel_radius, track_width)?.wheel_motion(poses, dt, axis, signs, limits)
}
