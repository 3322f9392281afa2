#![warn(missing_docs)]
#![doc = "Nonholonomic feasibility checks and slip-free path reconstruction for"]
#![doc = "keyframed differential-drive trajectories."]
#![doc = ""]
#![doc = "A chassis trajectory is sampled once per frame, checked for sideways slip,"]
#![doc = "and, when needed, rebuilt through its keyed waypoints so that the chassis"]
#![doc = "only ever moves along its forward axis. Feasible trajectories are turned into"]
#![doc = "wheel angles and rates, baked onto wheel objects, or exported."]

pub mod autocorrect;
pub mod bezier;
pub mod cache;
pub mod error;
pub mod feasibility;
pub mod keyframes;
pub mod profile;
pub mod reconstruct;
pub mod rig;
pub mod store;
pub mod trajectory;
pub mod units;

pub use autocorrect::{AutocorrectOutcome, autocorrect};
pub use cache::{BakeSink, ExportRow, ExportSink, Sampling, WheelGeometry, WheelKinematicsCache};
pub use error::{PathError, Result};
pub use feasibility::{FeasibilityConfig, FeasibilityReport, analyze};
pub use keyframes::{ChannelKey, ChannelPath, CurveSampler, Keyframe, KeyframeCurves};
pub use profile::{SpeedProfile, Timing};
pub use reconstruct::{ReconstructConfig, Reconstruction, Strategy, reconstruct};
pub use rig::{CurveBakeSink, RotationMode, WheelAxis};
pub use store::{BackupHandle, ObjectId, TrajectoryStore};
pub use trajectory::{FramePose, PoseSource, Trajectory, sample_trajectory};
pub use units::{AngleUnit, AngularRateUnit, ExportUnits, LengthUnit};
