//! Analyze, reconstruct and bake a chassis in one all-or-nothing step.

use tracing::info;

use crate::error::{PathError, Result};
use crate::feasibility::FeasibilityReport;
use crate::keyframes::{CurveSampler, bake_poses, waypoint_frames};
use crate::reconstruct::{ReconstructConfig, reconstruct};
use crate::store::{BackupHandle, ObjectId, TrajectoryStore};
use crate::trajectory::sample_trajectory;

/// What [`autocorrect`] did.
#[derive(Debug, Clone)]
pub struct AutocorrectOutcome {
    /// Frames in the corrected range.
    pub frames_baked: usize,
    /// `false` when the chassis was already feasible and nothing was written.
    pub changed: bool,
    /// Backup that restores the keyframes from before the first correction.
    pub handle: Option<BackupHandle>,
    /// Largest curvature (1/m) of the synthesized path.
    pub max_curvature: f64,
    /// Feasibility before correction.
    pub before: FeasibilityReport,
    /// Feasibility after correction.
    pub after: FeasibilityReport,
}

/// Make the chassis `id` slip-free over `[frame_start, frame_end]`.
///
/// The chassis is sampled from its keyframes, waypoints are its keyed pose
/// frames, and the reconstructed poses are baked as one key per frame on
/// `location[0]`, `location[1]` and `rotation_euler[2]`. The original keys are
/// backed up before the first write. A feasible chassis is left untouched and
/// no backup is taken.
///
/// # Errors
///
/// Any error leaves the store unchanged:
/// - [`PathError::Configuration`] for a missing chassis or bad settings.
/// - [`PathError::InvariantFailure`] if reconstruction does not come out clean.
pub fn autocorrect(
    store: &mut TrajectoryStore,
    id: &ObjectId,
    frame_start: i32,
    frame_end: i32,
    sample_rate: f64,
    config: &ReconstructConfig,
) -> Result<AutocorrectOutcome> {
    config.validate()?;
    let curves = store
        .working(id)
        .ok_or_else(|| PathError::configuration("chassis not set"))?;

    let mut sampler = CurveSampler::new(curves, sample_rate);
    let trajectory = sample_trajectory(&mut sampler, frame_start, frame_end)?;
    let waypoints = waypoint_frames(curves, frame_start, frame_end);
    let result = reconstruct(&trajectory, &waypoints, config)?;

    if !result.changed() {
        return Ok(AutocorrectOutcome {
            frames_baked: result.frames_baked,
            changed: false,
            handle: store.backup_handle(id),
            max_curvature: result.max_curvature,
            before: result.before,
            after: result.after,
        });
    }

    let mut baked = curves.clone();
    bake_poses(&mut baked, &result.trajectory);
    let handle = store.commit(id, baked)?;
    info!(
        object = %id,
        strategy = %config.strategy,
        frames = result.frames_baked,
        fixed = result.before.violations,
        "Autocorrect baked chassis keyframes"
    );

    Ok(AutocorrectOutcome {
        frames_baked: result.frames_baked,
        changed: true,
        handle: Some(handle),
        max_curvature: result.max_curvature,
        before: result.before,
        after: result.after,
    })
}
