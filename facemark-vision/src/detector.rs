//! Seams for the two external detectors.
//!
//! The annotator only talks to these traits, so the cascade and the landmark
//! runtime can be swapped (or faked in tests) without touching the pipeline.

use anyhow::Result;
use image::GrayImage;

use crate::landmarks::LandmarkBuffer;
use crate::region::{BoundingPolygon, FaceRegion};

/// Multi-scale face detector over an equalized grayscale frame.
pub trait FaceDetector {
    fn detect(&mut self, gray: &GrayImage) -> Vec<FaceRegion>;
}

/// Landmark localizer bound to one pre-trained model.
pub trait LandmarkDetector {
    /// Number of points the bound model produces per face.
    fn landmark_count(&self) -> usize;

    /// Locate landmarks inside `bbox`.
    ///
    /// Returns `[x0, y0, x1, y1, ...]` in the pixel space of `image`, with at
    /// least `2 * landmark_count()` values.
    fn detect_optimized(
        &mut self,
        image: &LandmarkBuffer,
        bbox: &BoundingPolygon,
    ) -> Result<&[f64]>;
}
