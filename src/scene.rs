use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, bail};
use roboanim_path::{KeyframeCurves, WheelKinematicsCache};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// An animated object: its keyframes and, for wheels, its bounding size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<[f64; 3]>,
    #[serde(default)]
    pub keyframes: KeyframeCurves,
}

/// The scene document the command line operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    pub fps: f64,
    pub frame_start: i32,
    pub frame_end: i32,
    #[serde(default)]
    pub objects: BTreeMap<String, SceneObject>,
    /// Named groups of object names.
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<String>>,
    /// Persisted text records, such as keyframe backups.
    #[serde(default)]
    pub records: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheel_cache: Option<WheelKinematicsCache>,
}

impl Scene {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?;
        let scene: Scene = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse scene {}", path.display()))?;
        if !(scene.fps > 0.0) {
            bail!("scene fps must be positive, got {}", scene.fps);
        }
        if scene.frame_end < scene.frame_start {
            bail!(
                "scene frame range {}..{} is empty",
                scene.frame_start,
                scene.frame_end
            );
        }
        info!(
            scene = %scene.name,
            objects = scene.objects.len(),
            frames = scene.frame_end - scene.frame_start + 1,
            "Loaded scene"
        );
        Ok(scene)
    }

    /// Write the document next to `path`, then move it into place.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self).context("failed to serialize scene")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to replace scene {}", path.display()))?;
        debug!(path = %path.display(), "Saved scene");
        Ok(())
    }

    /// Objects of a collection that exist in the scene.
    pub fn members(&self, collection: Option<&str>) -> Vec<&str> {
        collection
            .and_then(|name| self.collections.get(name))
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|name| self.objects.contains_key(*name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roboanim_path::ChannelKey;

    const SCENE: &str = r#"{
        "name": "Scene",
        "fps": 24.0,
        "frame_start": 1,
        "frame_end": 48,
        "objects": {
            "Chassis": { "keyframes": { "location[0]": [[1, 0.0], [48, 2.0]] } },
            "WheelL": { "dimensions": [0.02, 0.12, 0.12] }
        },
        "collections": { "Left": ["WheelL", "Missing"] }
    }"#;

    #[test]
    fn test_parse_scene() {
        let scene: Scene = serde_json::from_str(SCENE).unwrap();
        let chassis = &scene.objects["Chassis"].keyframes;
        assert_eq!(chassis.evaluate(&ChannelKey::LOCATION_X, 48.0), Some(2.0));
        assert_eq!(scene.members(Some("Left")), vec!["WheelL"]);
        assert!(scene.members(None).is_empty());
        assert!(scene.wheel_cache.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let scene: Scene = serde_json::from_str(SCENE).unwrap();
        let dir = std::env::temp_dir().join(format!("roboanim-scene-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scene.json");
        scene.save(&path).unwrap();
        assert_eq!(Scene::load(&path).unwrap(), scene);
        assert!(!path.with_extension("json.tmp").exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
