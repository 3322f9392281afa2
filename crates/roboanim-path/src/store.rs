//! Working and backup keyframes per animated object.
//!
//! Each object has one backup slot. The first mutation snapshots the object's
//! location and Euler rotation channels; later snapshots hand back the same
//! [`BackupHandle`] instead of overwriting it. Restoring consumes the slot.
//! Backups persist as JSON text records keyed `SG_BACKUP_<scene>_<object>`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PathError, Result};
use crate::keyframes::{ChannelKey, KeyframeCurves};

/// Prefix of persisted backup record names.
pub const BACKUP_RECORD_PREFIX: &str = "SG_BACKUP";

/// An object within a scene.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    /// Scene name.
    pub scene: String,
    /// Object name.
    pub object: String,
}

impl ObjectId {
    /// Identify `object` in `scene`.
    pub fn new(scene: impl Into<String>, object: impl Into<String>) -> Self {
        ObjectId {
            scene: scene.into(),
            object: object.into(),
        }
    }

    /// Name of the persisted backup record for this object.
    pub fn record_key(&self) -> String {
        format!("{BACKUP_RECORD_PREFIX}_{}_{}", self.scene, self.object)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scene, self.object)
    }
}

/// Proof that a backup exists, valid until it is restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    id: ObjectId,
    version: u64,
}

impl BackupHandle {
    /// Object the backup belongs to.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Snapshot number, unique within a store.
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone)]
struct Backup {
    version: u64,
    curves: KeyframeCurves,
}

/// Working keyframes and single-slot backups of animated objects.
#[derive(Debug, Default)]
pub struct TrajectoryStore {
    working: BTreeMap<ObjectId, KeyframeCurves>,
    backups: BTreeMap<ObjectId, Backup>,
    next_version: u64,
}

impl TrajectoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working keyframes of `id`, returning the previous ones.
    pub fn insert(&mut self, id: ObjectId, curves: KeyframeCurves) -> Option<KeyframeCurves> {
        self.working.insert(id, curves)
    }

    /// Working keyframes of `id`.
    pub fn working(&self, id: &ObjectId) -> Option<&KeyframeCurves> {
        self.working.get(id)
    }

    /// `true` when `id` has a backup waiting to be restored.
    pub fn has_backup(&self, id: &ObjectId) -> bool {
        self.backups.contains_key(id)
    }

    /// Handle to the current backup of `id`, if any.
    pub fn backup_handle(&self, id: &ObjectId) -> Option<BackupHandle> {
        self.backups.get(id).map(|b| BackupHandle {
            id: id.clone(),
            version: b.version,
        })
    }

    /// Capture the location and rotation channels of `id`.
    ///
    /// An existing backup is never replaced; its handle is returned instead.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `id` has no working keyframes.
    pub fn snapshot(&mut self, id: &ObjectId) -> Result<BackupHandle> {
        if let Some(handle) = self.backup_handle(id) {
            debug!(object = %id, version = handle.version, "Backup already present");
            return Ok(handle);
        }
        let curves = self
            .working
            .get(id)
            .ok_or_else(|| PathError::configuration(format!("no keyframes for '{id}'")))?
            .transform_subset();
        let version = self.allocate_version();
        self.backups.insert(id.clone(), Backup { version, curves });
        info!(object = %id, version, "Backed up original keyframes");
        Ok(BackupHandle {
            id: id.clone(),
            version,
        })
    }

    /// Replace the working keyframes of `id`, snapshotting the old ones first
    /// if no backup exists yet.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `id` has no working keyframes.
    pub fn commit(&mut self, id: &ObjectId, curves: KeyframeCurves) -> Result<BackupHandle> {
        let handle = self.snapshot(id)?;
        self.working.insert(id.clone(), curves);
        Ok(handle)
    }

    /// Put the backed-up location and rotation channels back and clear the backup.
    ///
    /// Current location and Euler rotation channels are removed first; other
    /// channels are left alone.
    ///
    /// # Errors
    ///
    /// Returns a state error when no backup exists or `handle` refers to an
    /// older snapshot.
    pub fn restore(&mut self, handle: &BackupHandle) -> Result<()> {
        let backup = self
            .backups
            .get(&handle.id)
            .ok_or_else(|| PathError::state("No backup found to restore."))?;
        if backup.version != handle.version {
            return Err(PathError::state(format!(
                "backup handle for '{}' is stale (version {}, current {})",
                handle.id, handle.version, backup.version
            )));
        }

        let Some(backup) = self.backups.remove(&handle.id) else {
            return Err(PathError::state("No backup found to restore."));
        };
        let working = self.working.entry(handle.id.clone()).or_default();
        working.remove_where(ChannelKey::is_transform);
        for (key, keys) in backup.curves.iter() {
            working.set_channel(*key, keys.to_vec());
        }
        info!(object = %handle.id, version = handle.version, "Restored original keyframes");
        Ok(())
    }

    /// Restore whatever backup `id` currently has.
    ///
    /// # Errors
    ///
    /// Returns a state error when `id` has no backup.
    pub fn restore_latest(&mut self, id: &ObjectId) -> Result<()> {
        let handle = self
            .backup_handle(id)
            .ok_or_else(|| PathError::state("No backup found to restore."))?;
        self.restore(&handle)
    }

    /// Backups as text records, keyed by [`ObjectId::record_key`].
    ///
    /// # Errors
    ///
    /// Returns a record error if serialization fails.
    pub fn to_records(&self) -> Result<BTreeMap<String, String>> {
        self.backups
            .iter()
            .map(|(id, backup)| Ok((id.record_key(), serde_json::to_string(&backup.curves)?)))
            .collect()
    }

    /// Load a persisted backup record for `id`. Blank text means no backup.
    ///
    /// # Errors
    ///
    /// Returns a record error for malformed text and a state error if `id`
    /// already has a backup.
    pub fn load_record(&mut self, id: &ObjectId, text: &str) -> Result<Option<BackupHandle>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        if self.has_backup(id) {
            return Err(PathError::state(format!("'{id}' already has a backup")));
        }
        let curves: KeyframeCurves = serde_json::from_str(text)?;
        let version = self.allocate_version();
        self.backups.insert(id.clone(), Backup { version, curves });
        Ok(Some(BackupHandle {
            id: id.clone(),
            version,
        }))
    }

    fn allocate_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframes::{ChannelPath, Keyframe};

    fn chassis() -> ObjectId {
        ObjectId::new("Scene", "Chassis")
    }

    fn original() -> KeyframeCurves {
        let mut curves = KeyframeCurves::new();
        curves.insert_key(ChannelKey::LOCATION_X, 1, 0.0);
        curves.insert_key(ChannelKey::LOCATION_X, 48, 2.0);
        curves.insert_key(ChannelKey::YAW, 1, 0.0);
        curves.insert_key(ChannelKey::YAW, 48, 1.5);
        curves
    }

    fn edited() -> KeyframeCurves {
        let mut curves = KeyframeCurves::new();
        for f in 1..=48 {
            curves.insert_key(ChannelKey::LOCATION_X, f, f as f64 * 0.01);
            curves.insert_key(ChannelKey::LOCATION_Y, f, 0.5);
        }
        curves
    }

    #[test]
    fn test_restore_round_trip() {
        let mut store = TrajectoryStore::new();
        store.insert(chassis(), original());
        let handle = store.commit(&chassis(), edited()).unwrap();
        assert_eq!(store.working(&chassis()), Some(&edited()));

        store.restore(&handle).unwrap();
        assert_eq!(store.working(&chassis()), Some(&original()));
        assert!(!store.has_backup(&chassis()));
    }

    #[test]
    fn test_second_restore_fails() {
        let mut store = TrajectoryStore::new();
        store.insert(chassis(), original());
        let handle = store.snapshot(&chassis()).unwrap();
        store.restore(&handle).unwrap();
        let err = store.restore(&handle).unwrap_err();
        assert!(matches!(err, PathError::State(ref m) if m == "No backup found to restore."));
        assert!(store.restore_latest(&chassis()).is_err());
    }

    #[test]
    fn test_backup_is_never_overwritten() {
        let mut store = TrajectoryStore::new();
        store.insert(chassis(), original());
        let first = store.commit(&chassis(), edited()).unwrap();
        // A second edit keeps the very first keyframes as the backup.
        let second = store.commit(&chassis(), KeyframeCurves::new()).unwrap();
        assert_eq!(first, second);
        store.restore_latest(&chassis()).unwrap();
        assert_eq!(store.working(&chassis()), Some(&original()));
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut store = TrajectoryStore::new();
        store.insert(chassis(), original());
        let old = store.snapshot(&chassis()).unwrap();
        store.restore(&old).unwrap();
        let new = store.snapshot(&chassis()).unwrap();
        assert!(new.version() > old.version());
        assert!(matches!(store.restore(&old), Err(PathError::State(_))));
        store.restore(&new).unwrap();
    }

    #[test]
    fn test_restore_keeps_other_channels() {
        let mut store = TrajectoryStore::new();
        let quat = ChannelKey::new(ChannelPath::RotationQuaternion, 0);
        let mut curves = original();
        curves.insert_key(quat, 1, 1.0);
        store.insert(chassis(), curves);
        let handle = store.snapshot(&chassis()).unwrap();
        let mut changed = edited();
        changed.insert_key(quat, 5, 0.5);
        store.insert(chassis(), changed);
        store.restore(&handle).unwrap();

        let working = store.working(&chassis()).unwrap();
        assert_eq!(working.channel(&quat), Some(&[Keyframe::new(5, 0.5)][..]));
        assert!(working.channel(&ChannelKey::LOCATION_Y).is_none());
        assert_eq!(working.channel(&ChannelKey::YAW).map(<[Keyframe]>::len), Some(2));
    }

    #[test]
    fn test_records_round_trip() {
        let mut store = TrajectoryStore::new();
        store.insert(chassis(), original());
        store.snapshot(&chassis()).unwrap();
        let records = store.to_records().unwrap();
        let text = &records["SG_BACKUP_Scene_Chassis"];

        let mut reloaded = TrajectoryStore::new();
        reloaded.insert(chassis(), edited());
        let handle = reloaded.load_record(&chassis(), text).unwrap().unwrap();
        assert!(reloaded.load_record(&chassis(), text).is_err());
        reloaded.restore(&handle).unwrap();
        assert_eq!(reloaded.working(&chassis()), Some(&original()));

        assert!(reloaded.load_record(&chassis(), "  ").unwrap().is_none());
        assert!(matches!(
            reloaded.load_record(&chassis(), "{not json"),
            Err(PathError::Record(_))
        ));
    }

    #[test]
    fn test_snapshot_requires_keyframes() {
        let mut store = TrajectoryStore::new();
        assert!(matches!(
            store.snapshot(&chassis()),
            Err(PathError::Configuration(_))
        ));
    }
}
