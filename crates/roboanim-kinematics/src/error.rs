#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! This module defines error types that can occur during kinematic calculations,
//! body-frame lookups and wheel motion integration.

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for invalid wheel radius.
    /// This variant is returned when a wheel radius is provided that is not positive.
    InvalidWheelRadius(&'static str),
    /// Error for invalid track width.
    /// This variant is returned when the distance between the drive wheels is not positive.
    InvalidTrackWidth(&'static str),
    /// Error for negative time delta.
    /// This variant is returned when a negative time delta is used for pose updates.
    NegativeTimeDelta(&'static str),
    /// Error for a non-positive sample interval when integrating wheel motion.
    InvalidTimeStep(&'static str),
    /// Error for a forward-axis label outside `+X`, `-X`, `+Y`, `-Y`.
    UnknownForwardAxis(&'static str),
    /// Error for a pose sequence that is too short to integrate.
    TooFewSamples(&'static str),
}

impl core::fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidWheelRadius(msg) => write!(f, "Invalid wheel radius: {}", msg),
            KinematicsError::InvalidTrackWidth(msg) => write!(f, "Invalid track width: {}", msg),
            KinematicsError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
            KinematicsError::InvalidTimeStep(msg) => write!(f, "Invalid time step: {}", msg),
            KinematicsError::UnknownForwardAxis(msg) => write!(f, "Unknown forward axis: {}", msg),
            KinematicsError::TooFewSamples(msg) => write!(f, "Too few samples: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
