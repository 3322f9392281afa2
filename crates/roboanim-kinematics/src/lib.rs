#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for 2D differential-drive robot kinematics."]
#![doc = ""]
#![doc = "This crate provides poses, body-frame bases for a configurable forward axis,"]
#![doc = "forward and inverse kinematics, odometry, and per-wheel angle/rate integration."]

extern crate alloc;

use core::f64::consts::PI;
use core::fmt;
use libm::{cos, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod basis;
pub mod error;
pub mod wheels;

pub use basis::{BodyFrame, ForwardAxis, body_frame};
pub use error::KinematicsError;
pub use wheels::{
    WheelLimits, WheelMotion, WheelSigns, compute_wheel_motion, rad_per_sec_to_rpm,
    rpm_to_rad_per_sec,
};

/// A 2‑D pose `(x, y, θ)` in meters and radians (θ measured counter‑clockwise
/// from the x‑axis in the world frame).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World‑frame x position (m).
    pub x: f64,
    /// World‑frame y position (m).
    pub y: f64,
    /// Heading (rad). Not normalized: keyframed yaw may wind past ±π.
    pub theta: f64,
}

impl Pose {
    /// Pose at `(x, y)` facing `theta`.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Wrap `angle` into `(-PI, PI]`; `-PI` maps to `PI`.
    ///
    /// Used for per-step heading changes, never for stored headings.
    pub fn normalize_angle(angle: f64) -> f64 {
        let a = angle % (2.0 * PI);
        if a > PI {
            a - 2.0 * PI
        } else if a <= -PI {
            a + 2.0 * PI
        } else {
            a
        }
    }

    /// Planar displacement `(dx, dy)` from `self` to `other`.
    pub fn displacement_to(&self, other: &Pose) -> (f64, f64) {
        (other.x - self.x, other.y - self.y)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.2} rad)", self.x, self.y, self.theta)
    }
}

/// Left and right wheel angular velocities.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpeeds {
    /// Left wheel angular velocity (rad/s).
    pub omega_l: f64,
    /// Right wheel angular velocity (rad/s).
    pub omega_r: f64,
}

impl WheelSpeeds {
    /// Left and right rates in rad/s.
    pub const fn new(omega_l: f64, omega_r: f64) -> Self {
        WheelSpeeds { omega_l, omega_r }
    }
}

impl fmt::Display for WheelSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ωL: {:.2} rad/s, ωR: {:.2} rad/s)", self.omega_l, self.omega_r)
    }
}

/// Chassis velocity: speed along the forward axis and yaw rate.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Linear speed of the chassis center along its forward axis (m/s).
    pub v: f64,
    /// Angular speed of the chassis (rad/s).
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Signed forward speed (m/s) and yaw rate (rad/s).
    pub const fn new(v: f64, omega: f64) -> Self {
        ChassisSpeeds { v, omega }
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.2} m/s, ω: {:.2} rad/s)", self.v, self.omega)
    }
}

/// Wheel radius and track width of a two-wheeled chassis, with the
/// conversions between wheel rates and chassis motion.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDrive {
    /// Wheel radius (m).
    wheel_radius: f64,
    /// Distance between the two drive wheels (m).
    track_width: f64,
}

impl DifferentialDrive {
    /// Geometry in meters.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidWheelRadius)` if `wheel_radius` is not positive.
    /// Returns `Err(KinematicsError::InvalidTrackWidth)` if `track_width` is not positive.
    pub const fn new(wheel_radius: f64, track_width: f64) -> Result<Self, KinematicsError> {
        // `!(x > 0.0)` also rejects NaN.
        if !(wheel_radius > 0.0) {
            return Err(KinematicsError::InvalidWheelRadius("must be positive"));
        }
        if !(track_width > 0.0) {
            return Err(KinematicsError::InvalidTrackWidth("must be positive"));
        }
        Ok(DifferentialDrive {
            wheel_radius,
            track_width,
        })
    }

    /// Returns the wheel radius.
    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Returns the track width.
    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    /// Chassis velocity produced by `wheel_speeds` (forward kinematics).
    pub fn forward_kinematics(&self, wheel_speeds: WheelSpeeds) -> ChassisSpeeds {
        let v_l = wheel_speeds.omega_l * self.wheel_radius;
        let v_r = wheel_speeds.omega_r * self.wheel_radius;

        let v = (v_r + v_l) / 2.0;
        let omega = (v_r - v_l) / self.track_width;

        ChassisSpeeds::new(v, omega)
    }

    /// Wheel rates that produce `chassis_speeds` (inverse kinematics). A pure
    /// rotation spins the wheels in opposite directions.
    pub fn inverse_kinematics(&self, chassis_speeds: ChassisSpeeds) -> WheelSpeeds {
        let v_r = chassis_speeds.v + chassis_speeds.omega * (self.track_width / 2.0);
        let v_l = chassis_speeds.v - chassis_speeds.omega * (self.track_width / 2.0);

        let omega_r = v_r / self.wheel_radius;
        let omega_l = v_l / self.wheel_radius;

        WheelSpeeds::new(omega_l, omega_r)
    }

    /// Advance `current_pose` by `chassis_speeds` over `dt` seconds.
    ///
    /// The step drives along local +X at the heading held at the start of the
    /// step, the same body frame [`DifferentialDrive::wheel_motion`] measures
    /// against. The heading is left unwrapped so keyframed yaw stays continuous.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn update_pose(
        &self,
        current_pose: Pose,
        chassis_speeds: ChassisSpeeds,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }

        let delta_x = chassis_speeds.v * cos(current_pose.theta) * dt;
        let delta_y = chassis_speeds.v * sin(current_pose.theta) * dt;
        let delta_theta = chassis_speeds.omega * dt;

        Ok(Pose {
            x: current_pose.x + delta_x,
            y: current_pose.y + delta_y,
            theta: current_pose.theta + delta_theta,
        })
    }

    /// [`Self::update_pose`] driven by wheel rates.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn update_pose_from_wheel_speeds(
        &self,
        current_pose: Pose,
        wheel_speeds: WheelSpeeds,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        let chassis_speeds = self.forward_kinematics(wheel_speeds);
        self.update_pose(current_pose, chassis_speeds, dt)
    }
}

impl fmt::Display for DifferentialDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DifferentialDrive (r: {:.3} m, track: {:.3} m)",
            self.wheel_radius, self.track_width
        )
    }
}
