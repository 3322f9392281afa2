//! Wheel objects and how baked wheel angles are written to them.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::BakeSink;
use crate::error::{PathError, Result};
use crate::keyframes::{ChannelKey, ChannelPath, KeyframeCurves};

/// Local axis a wheel spins about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WheelAxis {
    /// Local X.
    #[default]
    X,
    /// Local Y.
    Y,
    /// Local Z.
    Z,
}

impl WheelAxis {
    /// Component index (0, 1 or 2).
    pub const fn index(self) -> u8 {
        match self {
            WheelAxis::X => 0,
            WheelAxis::Y => 1,
            WheelAxis::Z => 2,
        }
    }

    fn unit(self) -> nalgebra::Unit<Vector3<f64>> {
        match self {
            WheelAxis::X => Vector3::x_axis(),
            WheelAxis::Y => Vector3::y_axis(),
            WheelAxis::Z => Vector3::z_axis(),
        }
    }
}

/// Rotation channels written on wheel objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationMode {
    /// One `rotation_euler` component.
    #[default]
    #[serde(rename = "EULER")]
    Euler,
    /// All four `rotation_quaternion` components.
    #[serde(rename = "QUAT")]
    Quaternion,
}

/// Channel values that put a wheel at angle `theta` (rad) about `axis`.
pub fn rotation_keys(theta: f64, axis: WheelAxis, mode: RotationMode) -> Vec<(ChannelKey, f64)> {
    match mode {
        RotationMode::Euler => vec![(ChannelKey::new(ChannelPath::RotationEuler, axis.index()), theta)],
        RotationMode::Quaternion => {
            let q = UnitQuaternion::from_axis_angle(&axis.unit(), theta);
            let key = |i| ChannelKey::new(ChannelPath::RotationQuaternion, i);
            vec![(key(0), q.w), (key(1), q.i), (key(2), q.j), (key(3), q.k)]
        }
    }
}

/// Remove every rotation channel of a wheel; returns the number of keys removed.
pub fn clear_rotation(curves: &mut KeyframeCurves) -> usize {
    curves.remove_where(ChannelKey::is_rotation)
}

/// Wheel radius from the bounding dimensions of the wheel objects.
///
/// Each wheel contributes half its largest dimension; the result is their
/// mean. Wheels without a positive dimension are skipped. Falls back to
/// `fallback` with a warning when no wheel qualifies.
pub fn detect_wheel_radius(dimensions: &[[f64; 3]], fallback: f64) -> f64 {
    let radii: Vec<f64> = dimensions
        .iter()
        .map(|d| d.iter().copied().fold(0.0, f64::max) / 2.0)
        .filter(|r| *r > 0.0)
        .collect();
    if radii.is_empty() {
        warn!(fallback, "No wheel dimensions to detect a radius from, using configured radius");
        return fallback;
    }
    let radius = radii.iter().sum::<f64>() / radii.len() as f64;
    debug!(radius, wheels = radii.len(), "Detected wheel radius");
    radius
}

/// Writes baked wheel angles as rotation keys on the wheel objects of each side.
pub struct CurveBakeSink<'a> {
    left: Vec<&'a mut KeyframeCurves>,
    right: Vec<&'a mut KeyframeCurves>,
    axis: WheelAxis,
    mode: RotationMode,
}

impl<'a> CurveBakeSink<'a> {
    /// Sink over the left and right wheel objects. With `swap`, left angles go
    /// to the right group and vice versa.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when both groups are empty.
    pub fn new(
        left: Vec<&'a mut KeyframeCurves>,
        right: Vec<&'a mut KeyframeCurves>,
        swap: bool,
        axis: WheelAxis,
        mode: RotationMode,
    ) -> Result<Self> {
        if left.is_empty() && right.is_empty() {
            return Err(PathError::configuration("no wheel objects to bake"));
        }
        let (left, right) = if swap { (right, left) } else { (left, right) };
        Ok(CurveBakeSink { left, right, axis, mode })
    }
}

impl BakeSink for CurveBakeSink<'_> {
    type Error = PathError;

    fn wheel_key(&mut self, frame: i32, theta_l: f64, theta_r: f64) -> Result<()> {
        for (wheels, theta) in [(&mut self.left, theta_l), (&mut self.right, theta_r)] {
            let keys = rotation_keys(theta, self.axis, self.mode);
            for wheel in wheels.iter_mut() {
                for (key, value) in &keys {
                    wheel.insert_key(*key, frame, *value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_euler_keys_use_the_axis_component() {
        let keys = rotation_keys(1.25, WheelAxis::Y, RotationMode::Euler);
        assert_eq!(keys, vec![(ChannelKey::new(ChannelPath::RotationEuler, 1), 1.25)]);
    }

    #[test]
    fn test_quaternion_keys_are_axis_angle() {
        let keys = rotation_keys(PI / 2.0, WheelAxis::X, RotationMode::Quaternion);
        let values: Vec<f64> = keys.iter().map(|(_, v)| *v).collect();
        let half = (PI / 4.0).cos();
        assert!((values[0] - half).abs() < EPSILON);
        assert!((values[1] - half).abs() < EPSILON);
        assert!(values[2].abs() < EPSILON && values[3].abs() < EPSILON);
        assert_eq!(keys[3].0, ChannelKey::new(ChannelPath::RotationQuaternion, 3));
    }

    #[test]
    fn test_sink_writes_each_side_and_swaps() {
        let mut l = KeyframeCurves::new();
        let mut r = KeyframeCurves::new();
        let euler_x = ChannelKey::new(ChannelPath::RotationEuler, 0);
        {
            let mut sink = CurveBakeSink::new(vec![&mut l], vec![&mut r], true, WheelAxis::X, RotationMode::Euler).unwrap();
            sink.wheel_key(3, 1.0, 2.0).unwrap();
        }
        // Swapped: the left angle lands on the right group.
        assert_eq!(r.evaluate(&euler_x, 3.0), Some(1.0));
        assert_eq!(l.evaluate(&euler_x, 3.0), Some(2.0));

        assert!(CurveBakeSink::new(Vec::new(), Vec::new(), false, WheelAxis::X, RotationMode::Euler).is_err());
    }

    #[test]
    fn test_clear_rotation_keeps_location() {
        let mut wheel = KeyframeCurves::new();
        wheel.insert_key(ChannelKey::LOCATION_X, 1, 0.0);
        wheel.insert_key(ChannelKey::new(ChannelPath::RotationEuler, 0), 1, 0.0);
        wheel.insert_key(ChannelKey::new(ChannelPath::RotationEuler, 0), 2, 1.0);
        wheel.insert_key(ChannelKey::new(ChannelPath::RotationQuaternion, 0), 1, 1.0);
        assert_eq!(clear_rotation(&mut wheel), 3);
        assert_eq!(clear_rotation(&mut wheel), 0);
        assert!(wheel.channel(&ChannelKey::LOCATION_X).is_some());
    }

    #[test]
    fn test_detect_wheel_radius() {
        let dims = [[0.02, 0.12, 0.12], [0.02, 0.10, 0.10], [0.0, 0.0, 0.0]];
        assert!((detect_wheel_radius(&dims, 0.06) - 0.055).abs() < EPSILON);
        assert_eq!(detect_wheel_radius(&[], 0.06), 0.06);
    }
}
