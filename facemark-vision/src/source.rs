use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::ffmpeg::VideoFile;
use crate::video::Camera;

/// Anything that yields color frames one capture tick at a time.
pub trait FrameSource {
    /// `Ok(None)` once the source is exhausted; `Err` for an unreadable tick.
    fn read(&mut self) -> Result<Option<RgbImage>>;
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm", "ppm", "tif", "tiff"];

/// Where frames come from, parsed from a single string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// V4L2 device node, e.g. `/dev/video0` or `camera:0`.
    Camera(String),
    VideoFile(PathBuf),
    StillImage(PathBuf),
}

impl SourceSpec {
    pub fn parse(spec: &str) -> Self {
        if let Some(index) = spec.strip_prefix("camera:") {
            return Self::Camera(format!("/dev/video{}", index));
        }
        if spec.starts_with("/dev/video") {
            return Self::Camera(spec.to_string());
        }

        let path = PathBuf::from(spec);
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image {
            Self::StillImage(path)
        } else {
            Self::VideoFile(path)
        }
    }

    pub fn open(&self) -> Result<Box<dyn FrameSource>> {
        Ok(match self {
            Self::Camera(device) => Box::new(Camera::open(device)?),
            Self::VideoFile(path) => Box::new(VideoFile::open(path)?),
            Self::StillImage(path) => Box::new(StillImage::open(path)?),
        })
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera(device) => write!(f, "camera {}", device),
            Self::VideoFile(path) => write!(f, "video {}", path.display()),
            Self::StillImage(path) => write!(f, "image {}", path.display()),
        }
    }
}

/// A single image file, yielded once.
pub struct StillImage {
    frame: Option<RgbImage>,
}

impl StillImage {
    pub fn open(path: &Path) -> Result<Self> {
        let frame = image::open(path)
            .with_context(|| format!("open image {}", path.display()))?
            .to_rgb8();
        Ok(Self::from_frame(frame))
    }

    pub fn from_frame(frame: RgbImage) -> Self {
        Self { frame: Some(frame) }
    }
}

impl FrameSource for StillImage {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frame.take())
    }
}
