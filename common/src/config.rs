use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub video: VideoConfig,
    pub vision: VisionConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    pub serial: SerialConfig,
    pub sync: SyncConfig,
    #[serde(default = "default_internal_config")]
    pub internal_config: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    /// Directory holding the decoded frames, played back in file-name order.
    pub frames_dir: PathBuf,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    pub lower_hsv: [u8; 3],
    pub upper_hsv: [u8; 3],
    /// Optional two-line `h,s,v` file written by the tuning tool. Overrides the
    /// inline range when it exists.
    #[serde(default)]
    pub color_file: Option<PathBuf>,
    /// Diameters (pixels) mapped to -90 and +90 degrees on the tilt axis.
    pub diameter_bounds: [f64; 2],
    #[serde(default = "default_moving_average_strength")]
    pub moving_average_strength: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    #[serde(default = "default_recording_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_base_name")]
    pub base_name: String,
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            dir: default_recording_dir(),
            base_name: default_base_name(),
            min_interval_secs: default_min_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// When false the tracker runs without an actuator (view/edit only).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub brokers: String,
    pub topic_prefix: String,
    #[serde(default = "default_group_prefix")]
    pub group_prefix: String,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Response curve used by the player to map recorded angles to actuator units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveShape {
    #[default]
    Linear,
    Logarithmic,
    Exponential,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AxisConfig {
    /// Output range `[min, max]`; every mapped value is clamped into it.
    pub range: [f64; 2],
    #[serde(default)]
    pub curve: CurveShape,
    /// `(input, output)` pairs the curve is fitted against. Defaults to the
    /// range endpoints at -90/+90 degrees.
    #[serde(default)]
    pub reference: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    pub serial: SerialConfig,
    pub files: Vec<PathBuf>,
    pub x: AxisConfig,
    pub y: AxisConfig,
    /// Clamp recorded angles to [-90, 90] before mapping. Off by default.
    #[serde(default)]
    pub clamp_input: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let [min, max] = self.vision.diameter_bounds;
        if !(min < max) {
            return Err(ConfigError::Invalid(format!(
                "diameter_bounds must satisfy min < max, got [{min}, {max}]"
            )));
        }
        if self.vision.moving_average_strength < 1 {
            return Err(ConfigError::Invalid(
                "moving_average_strength must be at least 1".into(),
            ));
        }
        let min_interval = self.recording.min_interval_secs;
        if !(min_interval >= 0.0) || Duration::try_from_secs_f64(min_interval).is_err() {
            return Err(ConfigError::Invalid(format!(
                "recording.min_interval_secs must be a finite, non-negative number of seconds, got {min_interval}"
            )));
        }
        let fps = self.video.fps;
        if !(fps > 0.0) || !fps.is_finite() || self.video.frame_period().is_none() {
            return Err(ConfigError::Invalid(format!(
                "video.fps must be positive and finite, got {fps}"
            )));
        }
        Ok(())
    }
}

impl VideoConfig {
    /// Time between frames, or `None` when `fps` does not yield a non-zero,
    /// representable period.
    pub fn frame_period(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(1.0 / self.fps)
            .ok()
            .filter(|period| !period.is_zero())
    }
}

impl RecordingConfig {
    /// Minimum spacing between recorded rows. Unrepresentable values fall back to zero.
    pub fn min_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.min_interval_secs.max(0.0)).unwrap_or_default()
    }
}

impl PlayerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: PlayerConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        for (name, axis) in [("x", &config.x), ("y", &config.y)] {
            let [min, max] = axis.range;
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "{name}.range must satisfy min <= max, got [{min}, {max}]"
                )));
            }
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to write config file {0}: {1}")]
    WriteFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_internal_config() -> PathBuf {
    PathBuf::from("internal.toml")
}
fn default_fps() -> f64 {
    30.0
}
fn default_frame_width() -> u32 {
    600
}
fn default_moving_average_strength() -> u32 {
    10
}
fn default_recording_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_base_name() -> String {
    "angles".into()
}
fn default_min_interval() -> f64 {
    0.1
}
fn default_baud_rate() -> u32 {
    115_200
}
fn default_write_timeout_ms() -> u64 {
    100
}
fn default_true() -> bool {
    true
}
fn default_group_prefix() -> String {
    "servo-track".into()
}
fn default_publish_timeout_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".into()
}
