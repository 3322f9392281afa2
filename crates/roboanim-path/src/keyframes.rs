//! Keyframe curves of an animated object.
//!
//! Curves are keyed by channel identifiers such as `location[0]` or
//! `rotation_euler[2]` and hold `(frame, value)` keys sorted by frame. The
//! chassis pose is read from `location[0]`, `location[1]` and
//! `rotation_euler[2]`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use roboanim_kinematics::Pose;
use serde::{Deserialize, Serialize};

use crate::error::{PathError, Result};
use crate::trajectory::{PoseSource, Trajectory};

/// Animated property of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelPath {
    /// World position, indices 0..3.
    Location,
    /// Euler rotation (XYZ order), indices 0..3.
    RotationEuler,
    /// Rotation quaternion `(w, x, y, z)`, indices 0..4.
    RotationQuaternion,
}

impl ChannelPath {
    /// Property name as written in channel identifiers.
    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelPath::Location => "location",
            ChannelPath::RotationEuler => "rotation_euler",
            ChannelPath::RotationQuaternion => "rotation_quaternion",
        }
    }

    /// Number of components.
    pub const fn width(self) -> u8 {
        match self {
            ChannelPath::Location | ChannelPath::RotationEuler => 3,
            ChannelPath::RotationQuaternion => 4,
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "location" => Some(ChannelPath::Location),
            "rotation_euler" => Some(ChannelPath::RotationEuler),
            "rotation_quaternion" => Some(ChannelPath::RotationQuaternion),
            _ => None,
        }
    }
}

/// One component of an animated property, e.g. `location[0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelKey {
    /// Property.
    pub path: ChannelPath,
    /// Component index.
    pub index: u8,
}

impl ChannelKey {
    /// World X of the chassis.
    pub const LOCATION_X: ChannelKey = ChannelKey::new(ChannelPath::Location, 0);
    /// World Y of the chassis.
    pub const LOCATION_Y: ChannelKey = ChannelKey::new(ChannelPath::Location, 1);
    /// Chassis yaw.
    pub const YAW: ChannelKey = ChannelKey::new(ChannelPath::RotationEuler, 2);
    /// Channels that define the planar chassis pose.
    pub const POSE: [ChannelKey; 3] = [Self::LOCATION_X, Self::LOCATION_Y, Self::YAW];

    /// Build a channel key.
    pub const fn new(path: ChannelPath, index: u8) -> Self {
        ChannelKey { path, index }
    }

    /// `true` for location and Euler rotation channels.
    pub fn is_transform(&self) -> bool {
        matches!(self.path, ChannelPath::Location | ChannelPath::RotationEuler)
    }

    /// `true` for any rotation channel.
    pub fn is_rotation(&self) -> bool {
        matches!(
            self.path,
            ChannelPath::RotationEuler | ChannelPath::RotationQuaternion
        )
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.path.as_str(), self.index)
    }
}

impl FromStr for ChannelKey {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PathError::configuration(format!("unknown animation channel '{s}'"));
        let (name, rest) = s.split_once('[').ok_or_else(invalid)?;
        let index = rest.strip_suffix(']').ok_or_else(invalid)?;
        let path = ChannelPath::parse(name).ok_or_else(invalid)?;
        let index: u8 = index.parse().map_err(|_| invalid())?;
        if index >= path.width() {
            return Err(invalid());
        }
        Ok(ChannelKey::new(path, index))
    }
}

impl TryFrom<String> for ChannelKey {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ChannelKey> for String {
    fn from(key: ChannelKey) -> Self {
        key.to_string()
    }
}

/// A key: value at a frame. Serialized as `[frame, value]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(i32, f64)", into = "(i32, f64)")]
pub struct Keyframe {
    /// Frame index.
    pub frame: i32,
    /// Channel value.
    pub value: f64,
}

impl Keyframe {
    /// Build a key.
    pub const fn new(frame: i32, value: f64) -> Self {
        Keyframe { frame, value }
    }
}

impl From<(i32, f64)> for Keyframe {
    fn from((frame, value): (i32, f64)) -> Self {
        Keyframe::new(frame, value)
    }
}

impl From<Keyframe> for (i32, f64) {
    fn from(key: Keyframe) -> Self {
        (key.frame, key.value)
    }
}

/// Keyframes of one object, per channel.
///
/// Deserialized channels go through [`KeyframeCurves::set_channel`], so keys
/// read from a document come out sorted with one key per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ChannelKey, Vec<Keyframe>>", into = "BTreeMap<ChannelKey, Vec<Keyframe>>")]
pub struct KeyframeCurves {
    channels: BTreeMap<ChannelKey, Vec<Keyframe>>,
}

impl From<BTreeMap<ChannelKey, Vec<Keyframe>>> for KeyframeCurves {
    fn from(channels: BTreeMap<ChannelKey, Vec<Keyframe>>) -> Self {
        let mut curves = KeyframeCurves::new();
        for (key, keys) in channels {
            curves.set_channel(key, keys);
        }
        curves
    }
}

impl From<KeyframeCurves> for BTreeMap<ChannelKey, Vec<Keyframe>> {
    fn from(curves: KeyframeCurves) -> Self {
        curves.channels
    }
}

impl KeyframeCurves {
    /// No channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when no channel is animated.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChannelKey, &[Keyframe])> {
        self.channels.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Keys of `key`, sorted by frame.
    pub fn channel(&self, key: &ChannelKey) -> Option<&[Keyframe]> {
        self.channels.get(key).map(Vec::as_slice)
    }

    /// Insert or replace the key at `frame`.
    pub fn insert_key(&mut self, key: ChannelKey, frame: i32, value: f64) {
        let keys = self.channels.entry(key).or_default();
        match keys.binary_search_by_key(&frame, |k| k.frame) {
            Ok(i) => keys[i].value = value,
            Err(i) => keys.insert(i, Keyframe::new(frame, value)),
        }
    }

    /// Replace a whole channel. Keys are sorted; of duplicate frames the last wins.
    pub fn set_channel(&mut self, key: ChannelKey, keys: Vec<Keyframe>) {
        let mut by_frame = BTreeMap::new();
        for k in keys {
            by_frame.insert(k.frame, k.value);
        }
        let keys = by_frame
            .into_iter()
            .map(|(frame, value)| Keyframe::new(frame, value))
            .collect();
        self.channels.insert(key, keys);
    }

    /// Remove a channel.
    pub fn remove(&mut self, key: &ChannelKey) -> Option<Vec<Keyframe>> {
        self.channels.remove(key)
    }

    /// Remove every channel matching `pred`; returns how many keys went with them.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&ChannelKey) -> bool) -> usize {
        let mut removed = 0;
        self.channels.retain(|key, keys| {
            if pred(key) {
                removed += keys.len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Copy of the channels matching `pred`.
    pub fn subset(&self, mut pred: impl FnMut(&ChannelKey) -> bool) -> KeyframeCurves {
        KeyframeCurves {
            channels: self
                .channels
                .iter()
                .filter(|&(key, _)| pred(key))
                .map(|(key, keys)| (*key, keys.clone()))
                .collect(),
        }
    }

    /// Location and Euler rotation channels.
    pub fn transform_subset(&self) -> KeyframeCurves {
        self.subset(ChannelKey::is_transform)
    }

    /// Value of `key` at `frame`: linear between keys, held before the first
    /// and after the last. `None` for an unanimated channel.
    pub fn evaluate(&self, key: &ChannelKey, frame: f64) -> Option<f64> {
        let keys = self.channels.get(key)?;
        let first = keys.first()?;
        let last = keys.last()?;
        if frame <= f64::from(first.frame) {
            return Some(first.value);
        }
        if frame >= f64::from(last.frame) {
            return Some(last.value);
        }
        let i = keys.partition_point(|k| f64::from(k.frame) <= frame);
        let (k0, k1) = (keys[i - 1], keys[i]);
        let u = (frame - f64::from(k0.frame)) / f64::from(k1.frame - k0.frame);
        Some(k0.value + (k1.value - k0.value) * u)
    }

    /// Planar chassis pose at `frame`. Unanimated channels read as 0.
    pub fn sample(&self, frame: i32) -> Pose {
        let at = |key: &ChannelKey| self.evaluate(key, f64::from(frame)).unwrap_or(0.0);
        Pose::new(
            at(&ChannelKey::LOCATION_X),
            at(&ChannelKey::LOCATION_Y),
            at(&ChannelKey::YAW),
        )
    }

    /// Frames in `[frame_start, frame_end]` keyed on any of `keys`.
    pub fn key_frames(&self, keys: &[ChannelKey], frame_start: i32, frame_end: i32) -> BTreeSet<i32> {
        keys.iter()
            .filter_map(|key| self.channels.get(key))
            .flatten()
            .map(|k| k.frame)
            .filter(|f| (frame_start..=frame_end).contains(f))
            .collect()
    }
}

/// Waypoints of a chassis: frames keyed on its pose channels inside the
/// range, plus both range ends.
pub fn waypoint_frames(curves: &KeyframeCurves, frame_start: i32, frame_end: i32) -> Vec<i32> {
    let mut frames = curves.key_frames(&ChannelKey::POSE, frame_start, frame_end);
    frames.insert(frame_start);
    frames.insert(frame_end);
    frames.into_iter().collect()
}

/// Write `trajectory` as one key per frame on the pose channels.
///
/// Keys outside the trajectory's range are kept.
pub fn bake_poses(curves: &mut KeyframeCurves, trajectory: &Trajectory) {
    let range = trajectory.frame_range();
    for key in ChannelKey::POSE {
        let keys = curves.channels.entry(key).or_default();
        keys.retain(|k| !range.contains(&k.frame));
    }
    for fp in trajectory.poses() {
        curves.insert_key(ChannelKey::LOCATION_X, fp.frame, fp.pose.x);
        curves.insert_key(ChannelKey::LOCATION_Y, fp.frame, fp.pose.y);
        curves.insert_key(ChannelKey::YAW, fp.frame, fp.pose.theta);
    }
}

/// Reads chassis poses straight from keyframe curves.
#[derive(Debug, Clone, Copy)]
pub struct CurveSampler<'a> {
    curves: &'a KeyframeCurves,
    sample_rate: f64,
}

impl<'a> CurveSampler<'a> {
    /// Sample `curves` on a clock of `sample_rate` frames per second.
    pub fn new(curves: &'a KeyframeCurves, sample_rate: f64) -> Self {
        CurveSampler { curves, sample_rate }
    }
}

impl PoseSource for CurveSampler<'_> {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn pose_at(&mut self, frame: i32) -> Result<Pose> {
        Ok(self.curves.sample(frame))
    }
}
