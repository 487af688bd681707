use anyhow::{Context, Result};
use facemark_vision::{DetectorParams, LandmarkParams, MarkerStyle};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> =
    Lazy::new(|| Path::new(option_env!("FACEMARK_CONFIG_PATH").unwrap_or("facemark.toml")));

/// Runtime override for [`CONFIG_PATH`].
pub const CONFIG_ENV: &str = "FACEMARK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera device, video file or image file.
    pub source: String,
    pub models: ModelsConfig,
    pub detector: DetectorParams,
    pub landmarks: LandmarkParams,
    pub marker: MarkerStyle,
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "talking_face.avi".to_string(),
            models: ModelsConfig::default(),
            detector: DetectorParams::default(),
            landmarks: LandmarkParams::default(),
            marker: MarkerStyle::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Model file locations; relative paths resolve against the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    pub landmark: PathBuf,
    pub cascade: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("DetectionCascades"),
            landmark: PathBuf::from("landmarks.onnx"),
            cascade: PathBuf::from("seeta_fd_frontal_v1.0.bin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Halve each captured frame before annotating it.
    pub downscale: bool,
    /// Consecutive unreadable frames tolerated before giving up.
    pub max_read_failures: u32,
    /// Delay between frames in the display loop.
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            downscale: true,
            max_read_failures: 30,
            poll_interval_ms: 10,
        }
    }
}

/// Explicit path, then `$FACEMARK_CONFIG`, then the built-in default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => CONFIG_PATH.to_path_buf(),
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = config_path(path);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = config_path(path);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}
