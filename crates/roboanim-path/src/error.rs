//! This module defines the error types used by the `roboanim-path` crate.

use roboanim_kinematics::KinematicsError;
use thiserror::Error;

/// Number of offending frames listed in an infeasibility message.
pub const VIOLATION_PREVIEW_LEN: usize = 12;

/// Error type for trajectory analysis, reconstruction and storage.
#[derive(Error, Debug)]
pub enum PathError {
    /// User-fixable setup problem: missing chassis, bad geometry, bad frame range.
    /// Nothing is mutated when this is returned.
    #[error("{0}")]
    Configuration(String),

    /// The trajectory makes the chassis slide sideways.
    #[error("{violations} step(s) exceed sideways tolerance > {tolerance} (frames {preview})")]
    Infeasible {
        /// Steps over the tolerance.
        violations: usize,
        /// Sideways speed tolerance (m/s).
        tolerance: f64,
        /// First offending frames, comma separated.
        preview: String,
    },

    /// A reconstructed trajectory failed its own feasibility check.
    #[error("internal invariant failure: {0}")]
    InvariantFailure(String),

    /// An operation was requested in the wrong order (restore without backup,
    /// bake before the wheel cache exists, ...).
    #[error("{0}")]
    State(String),

    /// A persisted backup record could not be read or written.
    #[error("backup record error: {0}")]
    Record(#[from] serde_json::Error),
}

/// Result type alias for path operations.
pub type Result<T> = std::result::Result<T, PathError>;

impl PathError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a state error.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create an infeasibility error listing at most [`VIOLATION_PREVIEW_LEN`] frames.
    pub fn infeasible(violation_frames: &[i32], tolerance: f64) -> Self {
        Self::Infeasible {
            violations: violation_frames.len(),
            tolerance,
            preview: preview_frames(violation_frames),
        }
    }
}

impl From<KinematicsError> for PathError {
    fn from(e: KinematicsError) -> Self {
        // Every kinematics error stems from geometry or input the user controls.
        Self::Configuration(e.to_string())
    }
}

/// Comma-separated list of the first [`VIOLATION_PREVIEW_LEN`] frames, with a
/// trailing `" …"` when more were found.
pub fn preview_frames(frames: &[i32]) -> String {
    let head: Vec<String> = frames
        .iter()
        .take(VIOLATION_PREVIEW_LEN)
        .map(|f| f.to_string())
        .collect();
    let mut preview = head.join(", ");
    if frames.len() > VIOLATION_PREVIEW_LEN {
        preview.push_str(" …");
    }
    preview
}
