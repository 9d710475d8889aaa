use handplay_core::DetectorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration: defaults, then an optional TOML file, then
/// `HANDPLAY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture size; the driver may pick another.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Game ticks per second.
    pub tick_rate: u32,
    /// Frames discarded at startup while auto-exposure settles.
    pub warmup_frames: usize,
    /// Flip frames left-to-right so the view acts like a mirror.
    pub mirror: bool,
    /// Skip frames where more than this fraction of pixels is near black.
    pub dark_threshold: f32,
    /// Game RNG seed; random when unset.
    pub seed: Option<u64>,
    pub detector: DetectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            frame_width: 640,
            frame_height: 480,
            tick_rate: 60,
            warmup_frames: 4,
            mirror: true,
            dark_threshold: 0.95,
            seed: None,
            detector: DetectorConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration, reading `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `HANDPLAY_*` variables. Unparseable values are
    /// logged and ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(device) = lookup("HANDPLAY_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        if let Some(width) = env_parse(&lookup, "HANDPLAY_FRAME_WIDTH") {
            self.frame_width = width;
        }
        if let Some(height) = env_parse(&lookup, "HANDPLAY_FRAME_HEIGHT") {
            self.frame_height = height;
        }
        if let Some(rate) = env_parse(&lookup, "HANDPLAY_TICK_RATE") {
            self.tick_rate = rate;
        }
        if let Some(count) = env_parse(&lookup, "HANDPLAY_WARMUP_FRAMES") {
            self.warmup_frames = count;
        }
        if let Some(area) = env_parse(&lookup, "HANDPLAY_MIN_HAND_AREA") {
            self.detector.min_contour_area = area;
        }
        if let Some(mirror) = lookup("HANDPLAY_MIRROR") {
            self.mirror = mirror != "0";
        }
        if let Some(seed) = env_parse(&lookup, "HANDPLAY_SEED") {
            self.seed = Some(seed);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame size {}x{} is empty",
                self.frame_width, self.frame_height
            )));
        }
        if !(0.0..=1.0).contains(&self.dark_threshold) {
            return Err(ConfigError::Invalid(format!(
                "dark_threshold {} is outside [0, 1]",
                self.dark_threshold
            )));
        }
        Ok(())
    }

    /// Seconds per game tick.
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}
