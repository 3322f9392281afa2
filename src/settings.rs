use std::path::Path;

use clap::ValueEnum;
use config::{Config, ConfigError, Environment, File, FileFormat};
use roboanim_kinematics::{ForwardAxis, WheelLimits, WheelSigns};
use roboanim_path::reconstruct::{ROTATION_FRACTION_RANGE, TANGENT_SCALE_RANGE};
use roboanim_path::{
    AngleUnit, AngularRateUnit, ExportUnits, FeasibilityConfig, LengthUnit, PathError,
    ReconstructConfig, RotationMode, Sampling, SpeedProfile, Strategy, WheelAxis,
};
use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "ROBOANIM";

/// Rolling direction of one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sign {
    Plus,
    Minus,
}

/// Path geometry used by `autocorrect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum AutocorrectMode {
    Off,
    Sease,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeedProfileKind {
    Constant,
    GlobalEase,
    PerKeyEase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SampleMode {
    Frame,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Every user option, flat, as loaded from the layered configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub chassis: Option<String>,
    pub left_collection: Option<String>,
    pub right_collection: Option<String>,
    pub swap_lr: bool,

    pub track_width: f64,
    pub tire_spacing: f64,
    pub auto_radius: bool,
    pub wheel_radius: f64,
    pub wheel_axis: WheelAxis,
    pub rotation_mode: RotationMode,
    pub sign_r: Sign,
    pub sign_l: Sign,
    pub wheel_forward_invert: bool,

    pub body_forward_axis: ForwardAxis,
    pub side_tol: f64,
    pub autocorrect_mode: AutocorrectMode,
    pub bezier_tangent_scale: f64,
    pub linear_rotation_fraction: f64,

    pub speed_profile: SpeedProfileKind,
    pub constant_ramp_frames: u32,
    pub timeline_ease_frames: u32,
    pub segment_ease_frames: u32,

    pub csv_path: String,
    pub sample_mode: SampleMode,
    pub fixed_rate: u32,
    pub angle_unit: AngleUnit,
    pub angrate_unit: AngularRateUnit,
    pub length_unit: LengthUnit,

    pub max_rpm: f64,
    pub max_ang_accel_rpm_s: f64,

    pub other_export_path: String,
    pub other_export_format: ExportFormat,
    pub other_angle_unit: AngleUnit,
}

/// Load `config/default.toml`, then `user` if given, then `ROBOANIM_*` variables.
pub fn load_settings(user: Option<&Path>) -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let mut builder = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true));
    if let Some(path) = user {
        info!("Layering user configuration from {}", path.display());
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }
    let settings = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .and_then(|config| config.try_deserialize::<Settings>());

    match settings {
        Ok(settings) => {
            info!("Successfully loaded configuration");
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

impl Settings {
    /// Check ranges that deserialization cannot express.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first bad option.
    pub fn validate(&self) -> roboanim_path::Result<()> {
        let positive = [("track_width", self.track_width), ("wheel_radius", self.wheel_radius)];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(PathError::configuration(format!("{name} must be positive")));
            }
        }
        let non_negative = [
            ("tire_spacing", self.tire_spacing),
            ("side_tol", self.side_tol),
            ("max_rpm", self.max_rpm),
            ("max_ang_accel_rpm_s", self.max_ang_accel_rpm_s),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(PathError::configuration(format!("{name} must not be negative")));
            }
        }
        let (lo, hi) = TANGENT_SCALE_RANGE;
        if !(lo..=hi).contains(&self.bezier_tangent_scale) {
            return Err(PathError::configuration(format!(
                "bezier_tangent_scale must be between {lo} and {hi}"
            )));
        }
        let (lo, hi) = ROTATION_FRACTION_RANGE;
        if !(lo..=hi).contains(&self.linear_rotation_fraction) {
            return Err(PathError::configuration(format!(
                "linear_rotation_fraction must be between {lo} and {hi}"
            )));
        }
        if self.fixed_rate == 0 {
            return Err(PathError::configuration("fixed_rate must be at least 1 Hz"));
        }
        Ok(())
    }

    pub fn feasibility(&self) -> FeasibilityConfig {
        FeasibilityConfig {
            axis: self.body_forward_axis,
            track_width: self.track_width,
            lateral_tolerance: self.side_tol,
        }
    }

    pub fn speed_profile(&self) -> SpeedProfile {
        match self.speed_profile {
            SpeedProfileKind::Constant => SpeedProfile::Constant {
                ramp_frames: self.constant_ramp_frames,
            },
            SpeedProfileKind::GlobalEase => SpeedProfile::GlobalEase {
                ease_frames: self.timeline_ease_frames,
            },
            SpeedProfileKind::PerKeyEase => SpeedProfile::PerSegmentEase {
                ease_frames: self.segment_ease_frames,
            },
        }
    }

    /// Reconstruction settings for `mode`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `mode` is [`AutocorrectMode::Off`].
    pub fn reconstruct_config(&self, mode: AutocorrectMode) -> roboanim_path::Result<ReconstructConfig> {
        let strategy = match mode {
            AutocorrectMode::Sease => Strategy::SmoothCurve {
                tangent_scale: self.bezier_tangent_scale,
            },
            AutocorrectMode::Linear => Strategy::Linear {
                rotation_fraction: self.linear_rotation_fraction,
            },
            AutocorrectMode::Off => {
                return Err(PathError::configuration("Set Autocorrect Mode to S-Ease or Linear."));
            }
        };
        Ok(ReconstructConfig {
            strategy,
            speed_profile: self.speed_profile(),
            axis: self.body_forward_axis,
            track_width: self.track_width,
            lateral_tolerance: self.side_tol,
        })
    }

    pub fn wheel_signs(&self) -> WheelSigns {
        let signs = WheelSigns::new(self.sign_l == Sign::Minus, self.sign_r == Sign::Minus);
        if self.wheel_forward_invert { signs.flipped() } else { signs }
    }

    pub fn limits(&self) -> WheelLimits {
        WheelLimits {
            max_rpm: self.max_rpm,
            max_ang_accel_rpm_per_s: self.max_ang_accel_rpm_s,
        }
    }

    pub fn export_units(&self) -> ExportUnits {
        ExportUnits {
            length: self.length_unit,
            angle: self.angle_unit,
            angular_rate: self.angrate_unit,
        }
    }

    pub fn sampling(&self) -> Sampling {
        match self.sample_mode {
            SampleMode::Frame => Sampling::EveryFrame,
            SampleMode::Fixed => Sampling::FixedRate(self.fixed_rate),
        }
    }
}

/// Settings from the shipped defaults with `overrides` layered on top.
#[cfg(test)]
pub(crate) fn from_toml(overrides: &str) -> Settings {
    Config::builder()
        .add_source(File::from_str(include_str!("../config/default.toml"), FileFormat::Toml))
        .add_source(File::from_str(overrides, FileFormat::Toml))
        .build()
        .and_then(|config| config.try_deserialize())
        .unwrap()
}
