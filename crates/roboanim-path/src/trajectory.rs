//! Sampled chassis trajectories.
//!
//! A [`Trajectory`] is one pose per integer frame over a contiguous range,
//! sampled at a fixed rate. Hosts hand poses over through [`PoseSource`].

use std::ops::RangeInclusive;

use roboanim_kinematics::Pose;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PathError, Result};

/// A chassis pose at a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramePose {
    /// Frame index.
    pub frame: i32,
    /// World-space position (m) and yaw (rad).
    pub pose: Pose,
}

impl FramePose {
    /// Construct a frame pose.
    pub const fn new(frame: i32, pose: Pose) -> Self {
        FramePose { frame, pose }
    }
}

/// Poses for every frame of `[frame_start, frame_end]`, sampled at `sample_rate` Hz.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    sample_rate: f64,
    poses: Vec<FramePose>,
}

impl Trajectory {
    /// Build a trajectory from frame poses.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the sample rate is not positive, fewer
    /// than two poses are given, or frames do not increase by exactly one.
    pub fn new(sample_rate: f64, poses: Vec<FramePose>) -> Result<Self> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(PathError::configuration("sample rate must be positive"));
        }
        if poses.len() < 2 {
            return Err(PathError::configuration(
                "invalid frame range: need at least two frames",
            ));
        }
        for pair in poses.windows(2) {
            if pair[1].frame != pair[0].frame + 1 {
                return Err(PathError::configuration(format!(
                    "invalid frame range: frame {} follows frame {}",
                    pair[1].frame, pair[0].frame
                )));
            }
        }
        Ok(Trajectory { sample_rate, poses })
    }

    /// Build a trajectory from consecutive poses starting at `frame_start`.
    pub fn from_poses(frame_start: i32, sample_rate: f64, poses: Vec<Pose>) -> Result<Self> {
        let poses = poses
            .into_iter()
            .zip(frame_start..)
            .map(|(pose, frame)| FramePose::new(frame, pose))
            .collect();
        Self::new(sample_rate, poses)
    }

    /// Samples per second.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Seconds between consecutive samples.
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// All frame poses in order.
    pub fn poses(&self) -> &[FramePose] {
        &self.poses
    }

    /// Poses without frame indices, in order.
    pub fn plain_poses(&self) -> Vec<Pose> {
        self.poses.iter().map(|fp| fp.pose).collect()
    }

    /// First frame.
    pub fn frame_start(&self) -> i32 {
        self.poses[0].frame
    }

    /// Last frame.
    pub fn frame_end(&self) -> i32 {
        self.poses[self.poses.len() - 1].frame
    }

    /// Inclusive frame range.
    pub fn frame_range(&self) -> RangeInclusive<i32> {
        self.frame_start()..=self.frame_end()
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Always `false`; a trajectory holds at least two frames.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Pose at `frame`, if inside the range.
    pub fn at(&self, frame: i32) -> Option<&FramePose> {
        let index = usize::try_from(frame - self.frame_start()).ok()?;
        self.poses.get(index)
    }
}

/// Something that can report the chassis pose at a frame.
///
/// Hosts that evaluate transforms lazily must bring the chassis up to date
/// before returning.
pub trait PoseSource {
    /// Samples per second of the frame clock.
    fn sample_rate(&self) -> f64;

    /// World pose of the chassis at `frame`.
    fn pose_at(&mut self, frame: i32) -> Result<Pose>;
}

/// Sample `source` once per frame over `[frame_start, frame_end]`, in increasing order.
///
/// # Errors
///
/// Returns a configuration error for an empty or reversed range, and
/// propagates failures from the source.
pub fn sample_trajectory<S: PoseSource + ?Sized>(
    source: &mut S,
    frame_start: i32,
    frame_end: i32,
) -> Result<Trajectory> {
    if frame_end <= frame_start {
        return Err(PathError::configuration(format!(
            "invalid frame range: {}..{}",
            frame_start, frame_end
        )));
    }
    let mut poses = Vec::with_capacity((frame_end - frame_start + 1) as usize);
    for frame in frame_start..=frame_end {
        poses.push(FramePose::new(frame, source.pose_at(frame)?));
    }
    debug!(
        frame_start,
        frame_end,
        samples = poses.len(),
        "Sampled chassis trajectory"
    );
    Trajectory::new(source.sample_rate(), poses)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    struct Line {
        calls: Vec<i32>,
    }

    impl PoseSource for Line {
        fn sample_rate(&self) -> f64 {
            24.0
        }

        fn pose_at(&mut self, frame: i32) -> Result<Pose> {
            self.calls.push(frame);
            Ok(Pose::new(frame as f64 * 0.1, 0.0, 0.0))
        }
    }

    #[test]
    fn test_sample_visits_each_frame_once_in_order() {
        let mut source = Line { calls: Vec::new() };
        let traj = sample_trajectory(&mut source, 3, 7).unwrap();
        assert_eq!(source.calls, vec![3, 4, 5, 6, 7]);
        assert_eq!(traj.frame_range(), 3..=7);
        assert!((traj.dt() - 1.0 / 24.0).abs() < EPSILON);
        assert!((traj.at(5).unwrap().pose.x - 0.5).abs() < EPSILON);
        assert!(traj.at(8).is_none());
        assert!(traj.at(2).is_none());
    }

    #[test]
    fn test_invalid_ranges_are_rejected() {
        let mut source = Line { calls: Vec::new() };
        assert!(matches!(
            sample_trajectory(&mut source, 5, 5),
            Err(PathError::Configuration(_))
        ));
        assert!(source.calls.is_empty());
        assert!(Trajectory::from_poses(0, 24.0, vec![Pose::default()]).is_err());
    }

    #[test]
    fn test_frames_must_be_contiguous() {
        let poses = vec![
            FramePose::new(1, Pose::default()),
            FramePose::new(3, Pose::default()),
        ];
        let err = Trajectory::new(24.0, poses).unwrap_err();
        assert!(err.to_string().contains("frame 3 follows frame 1"));
    }

    #[test]
    fn test_sample_rate_must_be_positive() {
        let poses = vec![Pose::default(); 3];
        assert!(Trajectory::from_poses(0, 0.0, poses.clone()).is_err());
        assert!(Trajectory::from_poses(0, f64::NAN, poses).is_err());
    }
}
