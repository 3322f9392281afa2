//! Body-frame basis for a chassis heading.
//!
//! Models are not always built with their nose along local +X. [`ForwardAxis`]
//! names which local axis points forward at yaw 0; [`body_frame`] rotates that
//! reference by the yaw to get the world-space forward and lateral unit vectors.

use core::fmt;
use core::str::FromStr;

use libm::{atan2, cos, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::KinematicsError;

/// Local chassis axis that counts as "forward".
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForwardAxis {
    /// Local +X.
    #[cfg_attr(feature = "serde", serde(rename = "+X"))]
    PosX,
    /// Local -X.
    #[cfg_attr(feature = "serde", serde(rename = "-X"))]
    NegX,
    /// Local +Y.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "+Y"))]
    PosY,
    /// Local -Y.
    #[cfg_attr(feature = "serde", serde(rename = "-Y"))]
    NegY,
}

impl ForwardAxis {
    /// All four conventions.
    pub const ALL: [ForwardAxis; 4] = [
        ForwardAxis::PosX,
        ForwardAxis::NegX,
        ForwardAxis::PosY,
        ForwardAxis::NegY,
    ];

    /// World-space forward unit vector at yaw 0.
    pub const fn reference(self) -> (f64, f64) {
        match self {
            ForwardAxis::PosX => (1.0, 0.0),
            ForwardAxis::NegX => (-1.0, 0.0),
            ForwardAxis::PosY => (0.0, 1.0),
            ForwardAxis::NegY => (0.0, -1.0),
        }
    }

    /// Label as used in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            ForwardAxis::PosX => "+X",
            ForwardAxis::NegX => "-X",
            ForwardAxis::PosY => "+Y",
            ForwardAxis::NegY => "-Y",
        }
    }

    /// Yaw at which the forward vector points along `(dx, dy)`.
    ///
    /// The result is in `(-2π, 2π)`; callers that need continuity with a
    /// previous heading should unwrap it themselves.
    pub fn yaw_for_direction(self, dx: f64, dy: f64) -> f64 {
        let (rx, ry) = self.reference();
        atan2(dy, dx) - atan2(ry, rx)
    }
}

impl fmt::Display for ForwardAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForwardAxis {
    type Err = KinematicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+X" | "+x" | "X" | "x" => Ok(ForwardAxis::PosX),
            "-X" | "-x" => Ok(ForwardAxis::NegX),
            "+Y" | "+y" | "Y" | "y" => Ok(ForwardAxis::PosY),
            "-Y" | "-y" => Ok(ForwardAxis::NegY),
            _ => Err(KinematicsError::UnknownForwardAxis(
                "expected one of +X, -X, +Y, -Y",
            )),
        }
    }
}

/// Forward and lateral unit vectors of a chassis in the world plane.
///
/// `lateral` is `forward` rotated +90° (counter-clockwise).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyFrame {
    /// Unit vector the chassis drives along.
    pub forward: (f64, f64),
    /// Unit vector pointing to the chassis' left.
    pub lateral: (f64, f64),
}

impl BodyFrame {
    /// Component of a world displacement along the forward axis.
    pub fn forward_component(&self, dx: f64, dy: f64) -> f64 {
        dx * self.forward.0 + dy * self.forward.1
    }

    /// Component of a world displacement along the lateral axis.
    pub fn lateral_component(&self, dx: f64, dy: f64) -> f64 {
        dx * self.lateral.0 + dy * self.lateral.1
    }
}

/// Body frame for a chassis at `yaw` radians whose forward axis is `axis`.
pub fn body_frame(yaw: f64, axis: ForwardAxis) -> BodyFrame {
    let (c, s) = (cos(yaw), sin(yaw));
    let (rx, ry) = axis.reference();
    let forward = (c * rx - s * ry, s * rx + c * ry);
    let lateral = (-forward.1, forward.0);
    BodyFrame { forward, lateral }
}
