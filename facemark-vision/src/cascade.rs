use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::detector::FaceDetector;
use crate::region::FaceRegion;

/// Smallest window the SeetaFace cascade accepts.
const MIN_WINDOW: u32 = 20;

/// Fixed tuning constants for the face cascade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Growth of the search window between pyramid levels.
    pub scale_factor: f32,
    /// Smallest face, in pixels, that is searched for.
    pub min_size: u32,
    /// Sliding-window step at each pyramid level, in pixels.
    pub window_step: u32,
    pub score_threshold: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.2,
            min_size: 100,
            window_step: 4,
            score_threshold: 2.0,
        }
    }
}

impl DetectorParams {
    /// Rejects values the cascade backend would panic on.
    pub fn validate(&self) -> Result<()> {
        let pyramid = self.pyramid_factor();
        if !(0.01..=0.99).contains(&pyramid) {
            anyhow::bail!(
                "scale_factor must be between {:.3} and 100, got {}",
                1.0 / 0.99,
                self.scale_factor
            );
        }
        if self.min_size < MIN_WINDOW {
            anyhow::bail!(
                "min_size must be at least {}, got {}",
                MIN_WINDOW,
                self.min_size
            );
        }
        if self.window_step == 0 {
            anyhow::bail!("window_step must be positive");
        }
        if !(self.score_threshold > 0.0) {
            anyhow::bail!(
                "score_threshold must be positive, got {}",
                self.score_threshold
            );
        }
        Ok(())
    }

    /// The backend shrinks the image instead of growing the window.
    pub fn pyramid_factor(&self) -> f32 {
        1.0 / self.scale_factor
    }
}

/// Face detector backed by the SeetaFace funnel-structured cascade.
///
/// Overlapping candidate windows are merged by the cascade itself, so
/// results are passed through without further filtering.
pub struct CascadeDetector {
    inner: Box<dyn rustface::Detector>,
    params: DetectorParams,
}

impl CascadeDetector {
    pub fn load(path: &Path, params: DetectorParams) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening face cascade {}", path.display()))?;
        let model = rustface::read_model(BufReader::new(file))
            .with_context(|| format!("parsing face cascade {}", path.display()))?;
        Self::with_model(model, params)
    }

    pub fn with_model(model: rustface::Model, params: DetectorParams) -> Result<Self> {
        params.validate().context("invalid detector parameters")?;

        let mut inner = rustface::create_detector_with_model(model);
        inner.set_min_face_size(params.min_size);
        inner.set_score_thresh(params.score_threshold);
        inner.set_pyramid_scale_factor(params.pyramid_factor());
        inner.set_slide_window_step(params.window_step, params.window_step);

        Ok(Self { inner, params })
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&mut self, gray: &GrayImage) -> Vec<FaceRegion> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let image = rustface::ImageData::new(gray.as_raw(), width, height);
        let faces = self.inner.detect(&image).into_iter().map(|face| {
            let bbox = face.bbox();
            FaceRegion::new(bbox.x(), bbox.y(), bbox.width(), bbox.height())
                .with_score(face.score())
        });
        at_least(faces, self.params.min_size)
    }
}

/// Keeps regions whose sides both reach `min_size`.
///
/// The cascade stores its minimum face size but does not bound the pyramid
/// with it, so small windows still come back from `detect`.
fn at_least(faces: impl IntoIterator<Item = FaceRegion>, min_size: u32) -> Vec<FaceRegion> {
    faces
        .into_iter()
        .filter(|face| face.width >= min_size && face.height >= min_size)
        .collect()
}
