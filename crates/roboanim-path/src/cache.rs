//! Wheel kinematics cache and the sinks it feeds.
//!
//! The cache holds wheel angles and rates for every frame of a feasible
//! chassis trajectory. It is derived data: rebuild it whenever the chassis
//! keys or the wheel geometry change.

use roboanim_kinematics::{
    DifferentialDrive, ForwardAxis, Pose, WheelLimits, WheelMotion, WheelSigns,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PathError, Result};
use crate::trajectory::Trajectory;
use crate::units::ExportUnits;

/// Wheel layout of the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelGeometry {
    /// Distance between left and right wheels (m).
    pub track_width: f64,
    /// Wheel radius (m).
    pub wheel_radius: f64,
    /// Local axis treated as the chassis front.
    pub axis: ForwardAxis,
    /// Rolling direction per side.
    pub signs: WheelSigns,
}

/// Receives baked wheel angles, one call per frame.
pub trait BakeSink {
    /// Error raised by the sink.
    type Error;

    /// Record the wheel angles (rad) at `frame`.
    fn wheel_key(&mut self, frame: i32, theta_l: f64, theta_r: f64) -> std::result::Result<(), Self::Error>;
}

/// Receives engineering export rows in time order.
pub trait ExportSink {
    /// Error raised by the sink. Export setup errors convert into it.
    type Error: From<PathError>;

    /// Write one row.
    fn write_row(&mut self, row: &ExportRow) -> std::result::Result<(), Self::Error>;
}

/// How often export rows are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sampling {
    /// One row per animation frame.
    #[default]
    EveryFrame,
    /// Rows at a fixed rate (Hz), interpolated between frames.
    FixedRate(u32),
}

/// One exported sample, already converted to the requested units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportRow {
    /// Seconds since the first frame.
    pub t: f64,
    /// Chassis X.
    pub x: f64,
    /// Chassis Y.
    pub y: f64,
    /// Chassis yaw.
    pub yaw: f64,
    /// Right wheel angle.
    #[serde(rename = "thetaR")]
    pub theta_r: f64,
    /// Left wheel angle.
    #[serde(rename = "thetaL")]
    pub theta_l: f64,
    /// Right wheel rate.
    #[serde(rename = "rateR")]
    pub rate_r: f64,
    /// Left wheel rate.
    #[serde(rename = "rateL")]
    pub rate_l: f64,
}

/// Wheel angles and rates for every frame of a chassis trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelKinematicsCache {
    frame_start: i32,
    sample_rate: f64,
    geometry: WheelGeometry,
    limits: WheelLimits,
    poses: Vec<Pose>,
    motion: WheelMotion,
}

impl WheelKinematicsCache {
    /// Integrate wheel motion along `trajectory`.
    ///
    /// Capped steps are reported with a warning; they do not fail the build.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid geometry.
    pub fn build(trajectory: &Trajectory, geometry: WheelGeometry, limits: WheelLimits) -> Result<Self> {
        let drive = DifferentialDrive::new(geometry.wheel_radius, geometry.track_width)?;
        let poses = trajectory.plain_poses();
        let motion = drive.wheel_motion(&poses, trajectory.dt(), geometry.axis, geometry.signs, limits)?;

        if motion.speed_clamped_steps > 0 {
            warn!(
                steps = motion.speed_clamped_steps,
                max_rpm = limits.max_rpm,
                "Wheel speed capped"
            );
        }
        if motion.accel_clamped_steps > 0 {
            warn!(
                steps = motion.accel_clamped_steps,
                max_accel = limits.max_ang_accel_rpm_per_s,
                "Wheel acceleration capped"
            );
        }
        info!(
            radius = geometry.wheel_radius,
            track = geometry.track_width,
            max_rpm_l = motion.max_rpm_l,
            max_rpm_r = motion.max_rpm_r,
            "Built wheel kinematics cache"
        );

        Ok(WheelKinematicsCache {
            frame_start: trajectory.frame_start(),
            sample_rate: trajectory.sample_rate(),
            geometry,
            limits,
            poses,
            motion,
        })
    }

    /// First cached frame.
    pub fn frame_start(&self) -> i32 {
        self.frame_start
    }

    /// Last cached frame.
    pub fn frame_end(&self) -> i32 {
        self.frame_start + self.poses.len() as i32 - 1
    }

    /// Frames per second.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Geometry used for the build.
    pub fn geometry(&self) -> &WheelGeometry {
        &self.geometry
    }

    /// Caps used for the build.
    pub fn limits(&self) -> &WheelLimits {
        &self.limits
    }

    /// Per-frame wheel angles and rates.
    pub fn motion(&self) -> &WheelMotion {
        &self.motion
    }

    /// Largest left/right wheel speeds (RPM) after caps.
    pub fn max_rpm(&self) -> (f64, f64) {
        (self.motion.max_rpm_l, self.motion.max_rpm_r)
    }

    /// `true` if the cache was built from exactly this trajectory and setup.
    pub fn is_current(&self, trajectory: &Trajectory, geometry: &WheelGeometry, limits: &WheelLimits) -> bool {
        self.frame_start == trajectory.frame_start()
            && self.sample_rate == trajectory.sample_rate()
            && self.geometry == *geometry
            && self.limits == *limits
            && self.poses.len() == trajectory.len()
            && self.motion_matches_poses()
            && self.poses.iter().zip(trajectory.poses()).all(|(a, b)| *a == b.pose)
    }

    /// Every wheel series has one sample per pose.
    fn motion_matches_poses(&self) -> bool {
        let m = &self.motion;
        let n = self.poses.len();
        [m.theta_l.len(), m.theta_r.len(), m.rate_l.len(), m.rate_r.len()]
            .iter()
            .all(|&len| len == n)
    }

    /// Wheel angles (rad) at `frame`.
    pub fn theta_at(&self, frame: i32) -> Option<(f64, f64)> {
        let i = usize::try_from(frame - self.frame_start).ok()?;
        Some((*self.motion.theta_l.get(i)?, *self.motion.theta_r.get(i)?))
    }

    /// Send every frame's wheel angles to `sink`; returns the number of frames.
    ///
    /// # Errors
    ///
    /// Propagates sink errors.
    pub fn bake<S: BakeSink>(&self, sink: &mut S) -> std::result::Result<usize, S::Error> {
        for (i, (theta_l, theta_r)) in self.motion.theta_l.iter().zip(&self.motion.theta_r).enumerate() {
            sink.wheel_key(self.frame_start + i as i32, *theta_l, *theta_r)?;
        }
        Ok(self.motion.len())
    }

    /// Export rows in `units`, every frame or resampled to a fixed rate.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a fixed rate of 0 Hz.
    pub fn rows(&self, sampling: Sampling, units: ExportUnits) -> Result<Vec<ExportRow>> {
        let n = self.poses.len();
        let duration = (n.saturating_sub(1)) as f64 / self.sample_rate;
        let samples: Vec<f64> = match sampling {
            Sampling::EveryFrame => (0..n).map(|i| i as f64).collect(),
            Sampling::FixedRate(0) => {
                return Err(PathError::configuration("export rate must be at least 1 Hz"));
            }
            Sampling::FixedRate(hz) => {
                let hz = f64::from(hz);
                let count = (duration * hz + 1e-9).floor() as usize + 1;
                (0..count).map(|k| k as f64 / hz * self.sample_rate).collect()
            }
        };
        Ok(samples.into_iter().map(|u| self.row_at(u, units)).collect())
    }

    /// Write [`rows`](Self::rows) to `sink`; returns the number of rows.
    ///
    /// # Errors
    ///
    /// Returns setup errors from [`rows`](Self::rows) and propagates sink errors.
    pub fn export<S: ExportSink>(
        &self,
        sink: &mut S,
        sampling: Sampling,
        units: ExportUnits,
    ) -> std::result::Result<usize, S::Error> {
        let rows = self.rows(sampling, units)?;
        for row in &rows {
            sink.write_row(row)?;
        }
        Ok(rows.len())
    }

    /// Row at fractional sample index `u`, linearly interpolated.
    fn row_at(&self, u: f64, units: ExportUnits) -> ExportRow {
        let last = self.poses.len().saturating_sub(1);
        let i = (u.floor().max(0.0) as usize).min(last.saturating_sub(1));
        let j = (i + 1).min(last);
        let w = (u - i as f64).clamp(0.0, 1.0);
        let lerp = |values: &[f64]| values[i] + (values[j] - values[i]) * w;
        let (p, q) = (&self.poses[i], &self.poses[j]);
        let m = &self.motion;
        ExportRow {
            t: u / self.sample_rate,
            x: units.length.from_meters(p.x + (q.x - p.x) * w),
            y: units.length.from_meters(p.y + (q.y - p.y) * w),
            yaw: units.angle.from_radians(p.theta + (q.theta - p.theta) * w),
            theta_r: units.angle.from_radians(lerp(&m.theta_r)),
            theta_l: units.angle.from_radians(lerp(&m.theta_l)),
            rate_r: units.angular_rate.from_rad_per_sec(lerp(&m.rate_r)),
            rate_l: units.angular_rate.from_rad_per_sec(lerp(&m.rate_l)),
        }
    }
}
