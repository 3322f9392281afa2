use roboanim_path::rig::{clear_rotation, detect_wheel_radius};
use roboanim_path::{
    AutocorrectOutcome, ChannelPath, CurveBakeSink, CurveSampler, FeasibilityReport, ObjectId,
    PathError, Result, Trajectory, TrajectoryStore, WheelGeometry, WheelKinematicsCache, analyze,
    sample_trajectory,
};
use tracing::{debug, info};

use crate::export::KeyframeRow;
use crate::scene::Scene;
use crate::settings::{AutocorrectMode, Settings};

const BUILD_CACHE_FIRST: &str = "Build Cache first (and pass validation).";

/// The operations of the command line, applied to one scene.
pub struct Session {
    settings: Settings,
    scene: Scene,
}

impl Session {
    pub fn new(settings: Settings, scene: Scene) -> Self {
        Session { settings, scene }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    fn chassis_id(&self) -> Result<ObjectId> {
        let name = self
            .settings
            .chassis
            .as_deref()
            .filter(|name| self.scene.objects.contains_key(*name))
            .ok_or_else(|| PathError::configuration("chassis not set"))?;
        Ok(ObjectId::new(self.scene.name.clone(), name))
    }

    fn trajectory(&self) -> Result<Trajectory> {
        let id = self.chassis_id()?;
        let curves = &self.scene.objects[&id.object].keyframes;
        let mut sampler = CurveSampler::new(curves, self.scene.fps);
        sample_trajectory(&mut sampler, self.scene.frame_start, self.scene.frame_end)
    }

    /// Store holding the chassis keys and its persisted backup, if any.
    fn store(&self, id: &ObjectId) -> Result<TrajectoryStore> {
        let mut store = TrajectoryStore::new();
        store.insert(id.clone(), self.scene.objects[&id.object].keyframes.clone());
        if let Some(text) = self.scene.records.get(&id.record_key()) {
            store.load_record(id, text)?;
        }
        Ok(store)
    }

    /// Write the store's chassis keys and backup back into the scene.
    fn absorb(&mut self, id: &ObjectId, store: &TrajectoryStore) -> Result<()> {
        let records = store.to_records()?;
        if let (Some(curves), Some(object)) = (store.working(id), self.scene.objects.get_mut(&id.object)) {
            object.keyframes = curves.clone();
        }
        self.scene.records.remove(&id.record_key());
        self.scene.records.extend(records);
        if self.scene.wheel_cache.take().is_some() {
            debug!("Wheel cache invalidated by chassis change");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<FeasibilityReport> {
        self.settings.validate()?;
        analyze(&self.trajectory()?, &self.settings.feasibility())
    }

    /// Autocorrect with `mode`, or the configured mode when `None`.
    pub fn autocorrect(&mut self, mode: Option<AutocorrectMode>) -> Result<AutocorrectOutcome> {
        self.settings.validate()?;
        let config = self
            .settings
            .reconstruct_config(mode.unwrap_or(self.settings.autocorrect_mode))?;
        let id = self.chassis_id()?;
        let mut store = self.store(&id)?;
        let outcome = roboanim_path::autocorrect(
            &mut store,
            &id,
            self.scene.frame_start,
            self.scene.frame_end,
            self.scene.fps,
            &config,
        )?;
        if outcome.changed {
            self.absorb(&id, &store)?;
        }
        Ok(outcome)
    }

    pub fn revert(&mut self) -> Result<()> {
        let id = self.chassis_id()?;
        let mut store = self.store(&id)?;
        store.restore_latest(&id)?;
        self.absorb(&id, &store)
    }

    fn wheel_names(&self) -> (Vec<String>, Vec<String>) {
        let names = |collection: &Option<String>| -> Vec<String> {
            self.scene
                .members(collection.as_deref())
                .into_iter()
                .map(str::to_owned)
                .collect()
        };
        (names(&self.settings.left_collection), names(&self.settings.right_collection))
    }

    fn geometry(&self) -> WheelGeometry {
        let wheel_radius = if self.settings.auto_radius {
            let (left, right) = self.wheel_names();
            let dims: Vec<[f64; 3]> = left
                .iter()
                .chain(&right)
                .filter_map(|name| self.scene.objects.get(name)?.dimensions)
                .collect();
            detect_wheel_radius(&dims, self.settings.wheel_radius)
        } else {
            self.settings.wheel_radius
        };
        WheelGeometry {
            track_width: self.settings.track_width,
            wheel_radius,
            axis: self.settings.body_forward_axis,
            signs: self.settings.wheel_signs(),
        }
    }

    /// Wheel motion for the current chassis; fails unless it is slip-free.
    fn fresh_cache(&self) -> Result<WheelKinematicsCache> {
        self.settings.validate()?;
        let trajectory = self.trajectory()?;
        analyze(&trajectory, &self.settings.feasibility())?.ensure_feasible()?;
        WheelKinematicsCache::build(&trajectory, self.geometry(), self.settings.limits())
    }

    /// The stored cache if it still matches the chassis and settings.
    fn current_cache(&self) -> Result<Option<&WheelKinematicsCache>> {
        let Some(cache) = &self.scene.wheel_cache else {
            return Ok(None);
        };
        let trajectory = self.trajectory()?;
        let current = cache.is_current(&trajectory, &self.geometry(), &self.settings.limits());
        Ok(current.then_some(cache))
    }

    pub fn build_cache(&mut self) -> Result<&WheelKinematicsCache> {
        let cache = self.fresh_cache()?;
        info!(tire_spacing = self.settings.tire_spacing, "Wheel cache ready");
        Ok(self.scene.wheel_cache.insert(cache))
    }

    /// Key wheel rotations from the stored cache; returns the number of frames.
    pub fn bake(&mut self) -> Result<usize> {
        let cache = self
            .current_cache()?
            .cloned()
            .ok_or_else(|| PathError::state(BUILD_CACHE_FIRST))?;
        let (left_names, right_names) = self.wheel_names();

        let mut left = Vec::new();
        let mut right = Vec::new();
        for (name, object) in self.scene.objects.iter_mut() {
            if left_names.contains(name) {
                left.push(&mut object.keyframes);
            } else if right_names.contains(name) {
                right.push(&mut object.keyframes);
            }
        }
        if left.is_empty() && right.is_empty() {
            return Err(PathError::configuration("no wheel objects to bake"));
        }
        for curves in left.iter_mut().chain(right.iter_mut()) {
            clear_rotation(curves);
        }
        let mut sink = CurveBakeSink::new(
            left,
            right,
            self.settings.swap_lr,
            self.settings.wheel_axis,
            self.settings.rotation_mode,
        )?;
        let frames = cache.bake(&mut sink)?;
        info!(frames, "Baked wheel rotations");
        Ok(frames)
    }

    /// Remove rotation keys from every wheel object; returns the number removed.
    pub fn clear(&mut self) -> usize {
        let (left, right) = self.wheel_names();
        let removed: usize = self
            .scene
            .objects
            .iter_mut()
            .filter(|(name, _)| left.contains(name) || right.contains(name))
            .map(|(_, object)| clear_rotation(&mut object.keyframes))
            .sum();
        info!(removed, "Cleared wheel rotation keyframes");
        removed
    }

    /// Cache for exporting: the stored one when current, otherwise rebuilt.
    pub fn export_cache(&self) -> Result<WheelKinematicsCache> {
        match self.current_cache()? {
            Some(cache) => Ok(cache.clone()),
            None => self.fresh_cache(),
        }
    }

    /// Chassis keys as rows, Euler angles in the keyframe export unit.
    pub fn keyframe_rows(&self) -> Result<Vec<KeyframeRow>> {
        let id = self.chassis_id()?;
        let unit = self.settings.other_angle_unit;
        let rows = self.scene.objects[&id.object]
            .keyframes
            .iter()
            .flat_map(|(key, keys)| {
                keys.iter().map(move |k| KeyframeRow {
                    channel: key.to_string(),
                    frame: k.frame,
                    value: if key.path == ChannelPath::RotationEuler {
                        unit.from_radians(k.value)
                    } else {
                        k.value
                    },
                })
            })
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::from_toml;
    use roboanim_path::{ChannelKey, KeyframeCurves};

    const EPSILON: f64 = 1e-9;

    /// Chassis driving 1 m along its +Y front over frames 1..=24, two wheels.
    const SCENE: &str = r#"{
        "name": "Scene",
        "fps": 24.0,
        "frame_start": 1,
        "frame_end": 24,
        "objects": {
            "Chassis": { "keyframes": { "location[1]": [[1, 0.0], [24, 1.0]] } },
            "WheelL": { "dimensions": [0.02, 0.12, 0.12] },
            "WheelR": { "dimensions": [0.02, 0.12, 0.12] }
        },
        "collections": { "Left": ["WheelL"], "Right": ["WheelR"] }
    }"#;

    const SETUP: &str = r#"
        chassis = "Chassis"
        left_collection = "Left"
        right_collection = "Right"
    "#;

    fn session() -> Session {
        Session::new(from_toml(SETUP), serde_json::from_str(SCENE).unwrap())
    }

    /// Same scene, but the chassis slides along its side (+X).
    fn sliding() -> Session {
        let mut s = session();
        let mut curves = KeyframeCurves::new();
        curves.insert_key(ChannelKey::LOCATION_X, 1, 0.0);
        curves.insert_key(ChannelKey::LOCATION_X, 24, 1.0);
        s.scene.objects.get_mut("Chassis").unwrap().keyframes = curves;
        s
    }

    #[test]
    fn test_validate() {
        assert!(session().validate().unwrap().is_feasible());
        let report = sliding().validate().unwrap();
        assert_eq!(report.violations, 23);
        assert!(matches!(report.ensure_feasible(), Err(PathError::Infeasible { .. })));
    }

    #[test]
    fn test_missing_chassis() {
        let s = Session::new(from_toml(""), serde_json::from_str(SCENE).unwrap());
        assert!(matches!(s.validate(), Err(PathError::Configuration(m)) if m == "chassis not set"));
    }

    #[test]
    fn test_autocorrect_then_revert() {
        let mut s = sliding();
        let original = s.scene.objects["Chassis"].keyframes.clone();
        let outcome = s.autocorrect(None).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.frames_baked, 24);
        assert!(s.validate().unwrap().is_feasible());
        assert!(s.scene.records.contains_key("SG_BACKUP_Scene_Chassis"));

        s.revert().unwrap();
        assert_eq!(s.scene.objects["Chassis"].keyframes, original);
        assert!(s.scene.records.is_empty());
        assert!(matches!(
            s.revert(),
            Err(PathError::State(m)) if m == "No backup found to restore."
        ));
    }

    #[test]
    fn test_off_mode_fails_without_changes() {
        let mut s = sliding();
        let before = s.scene.clone();
        assert!(s.autocorrect(Some(AutocorrectMode::Off)).is_err());
        assert_eq!(s.scene, before);
    }

    #[test]
    fn test_bake_needs_a_current_cache() {
        let mut s = session();
        assert!(matches!(s.bake(), Err(PathError::State(m)) if m == BUILD_CACHE_FIRST));

        let cache = s.build_cache().unwrap();
        // Auto radius: half of 0.12 m.
        assert!((cache.geometry().wheel_radius - 0.06).abs() < EPSILON);
        assert_eq!(s.bake().unwrap(), 24);
        let euler_x = ChannelKey::new(ChannelPath::RotationEuler, 0);
        let left = s.scene.objects["WheelL"].keyframes.channel(&euler_x).unwrap();
        assert_eq!(left.len(), 24);
        assert!(left[23].value > 0.0);

        // Moving the chassis makes the cache stale.
        s.scene
            .objects
            .get_mut("Chassis")
            .unwrap()
            .keyframes
            .insert_key(ChannelKey::LOCATION_Y, 24, 2.0);
        assert!(matches!(s.bake(), Err(PathError::State(_))));
    }

    #[test]
    fn test_build_cache_requires_feasible_motion() {
        let mut s = sliding();
        assert!(matches!(s.build_cache(), Err(PathError::Infeasible { .. })));
        assert!(s.scene.wheel_cache.is_none());
    }

    #[test]
    fn test_clear_reports_removed_keys() {
        let mut s = session();
        s.build_cache().unwrap();
        s.bake().unwrap();
        assert_eq!(s.clear(), 48);
        assert_eq!(s.clear(), 0);
    }

    #[test]
    fn test_autocorrect_drops_the_cache() {
        let mut s = sliding();
        s.scene.wheel_cache = session().fresh_cache().ok();
        assert!(s.scene.wheel_cache.is_some());
        s.autocorrect(Some(AutocorrectMode::Linear)).unwrap();
        assert!(s.scene.wheel_cache.is_none());
    }

    #[test]
    fn test_keyframe_rows_in_degrees() {
        let mut s = session();
        s.settings.other_angle_unit = roboanim_path::AngleUnit::Deg;
        s.scene
            .objects
            .get_mut("Chassis")
            .unwrap()
            .keyframes
            .insert_key(ChannelKey::YAW, 1, std::f64::consts::PI);
        let rows = s.keyframe_rows().unwrap();
        assert_eq!(rows.len(), 3);
        let yaw = rows.iter().find(|r| r.channel == "rotation_euler[2]").unwrap();
        assert!((yaw.value - 180.0).abs() < EPSILON);
    }
}
