//! Units for exported engineering data.

use std::f64::consts::PI;

use roboanim_kinematics::rad_per_sec_to_rpm;
use serde::{Deserialize, Serialize};

/// Unit of exported positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LengthUnit {
    /// Meters.
    #[default]
    M,
    /// Centimeters.
    Cm,
}

impl LengthUnit {
    /// Convert from meters.
    pub fn from_meters(self, meters: f64) -> f64 {
        match self {
            LengthUnit::M => meters,
            LengthUnit::Cm => meters * 100.0,
        }
    }
}

/// Unit of exported angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AngleUnit {
    /// Radians.
    #[default]
    Rad,
    /// Degrees.
    Deg,
}

impl AngleUnit {
    /// Convert from radians.
    pub fn from_radians(self, radians: f64) -> f64 {
        match self {
            AngleUnit::Rad => radians,
            AngleUnit::Deg => radians.to_degrees(),
        }
    }
}

/// Unit of exported wheel rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AngularRateUnit {
    /// Revolutions per minute.
    #[default]
    Rpm,
    /// Revolutions per second.
    Rps,
    /// Degrees per second.
    Degs,
}

impl AngularRateUnit {
    /// Convert from rad/s.
    pub fn from_rad_per_sec(self, rate: f64) -> f64 {
        match self {
            AngularRateUnit::Rpm => rad_per_sec_to_rpm(rate),
            AngularRateUnit::Rps => rate / (2.0 * PI),
            AngularRateUnit::Degs => rate.to_degrees(),
        }
    }
}

/// Unit choice for an engineering export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportUnits {
    /// Positions.
    pub length: LengthUnit,
    /// Yaw and wheel angles.
    pub angle: AngleUnit,
    /// Wheel rates.
    pub angular_rate: AngularRateUnit,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_conversions() {
        assert!((LengthUnit::Cm.from_meters(0.25) - 25.0).abs() < EPSILON);
        assert!((AngleUnit::Deg.from_radians(PI) - 180.0).abs() < EPSILON);
        assert_eq!(AngleUnit::Rad.from_radians(1.5), 1.5);
        let one_rev_per_sec = 2.0 * PI;
        assert!((AngularRateUnit::Rpm.from_rad_per_sec(one_rev_per_sec) - 60.0).abs() < EPSILON);
        assert!((AngularRateUnit::Rps.from_rad_per_sec(one_rev_per_sec) - 1.0).abs() < EPSILON);
        assert!((AngularRateUnit::Degs.from_rad_per_sec(one_rev_per_sec) - 360.0).abs() < EPSILON);
    }

    #[test]
    fn test_labels_match_settings_values() {
        assert_eq!(serde_json::to_string(&LengthUnit::Cm).unwrap(), "\"CM\"");
        assert_eq!(serde_json::to_string(&AngularRateUnit::Degs).unwrap(), "\"DEGS\"");
        let unit: AngleUnit = serde_json::from_str("\"DEG\"").unwrap();
        assert_eq!(unit, AngleUnit::Deg);
    }
}
