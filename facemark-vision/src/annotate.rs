use std::time::Instant;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::detector::{FaceDetector, LandmarkDetector};
use crate::landmarks::{LandmarkBuffer, LandmarkSet};
use crate::preprocess::equalized_gray;
use crate::region::FaceRegion;

/// How landmarks are drawn onto the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    pub radius: i32,
    /// RGB
    pub color: [u8; 3],
    /// Also outline each detected face.
    pub draw_boxes: bool,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            radius: 2,
            color: [255, 0, 0],
            draw_boxes: false,
        }
    }
}

/// What one call to [`Annotator::annotate`] found and drew.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub faces: Vec<FaceRegion>,
    pub landmarks: Vec<LandmarkSet>,
    pub markers: usize,
}

/// Per-frame pipeline: equalized grayscale → faces → landmarks → overlay.
pub struct Annotator {
    face: Box<dyn FaceDetector>,
    landmarks: Box<dyn LandmarkDetector>,
    style: MarkerStyle,
}

impl Annotator {
    pub fn new(
        face: Box<dyn FaceDetector>,
        landmarks: Box<dyn LandmarkDetector>,
        style: MarkerStyle,
    ) -> Self {
        Self {
            face,
            landmarks,
            style,
        }
    }

    pub fn style(&self) -> &MarkerStyle {
        &self.style
    }

    pub fn landmark_count(&self) -> usize {
        self.landmarks.landmark_count()
    }

    /// Detect faces and their landmarks, drawing markers onto `frame`.
    ///
    /// An empty frame is returned untouched without calling either detector.
    /// A face whose landmark call fails is logged and skipped.
    pub fn annotate(&mut self, frame: &mut RgbImage) -> FrameReport {
        let mut report = FrameReport::default();
        if frame.width() == 0 || frame.height() == 0 {
            return report;
        }

        let start = Instant::now();
        let gray = equalized_gray(frame);
        report.faces = self.face.detect(&gray);

        let count = self.landmarks.landmark_count();
        for region in &report.faces {
            let polygon = region.polygon();

            let buffer = LandmarkBuffer::from_gray(&gray);
            let detected = self
                .landmarks
                .detect_optimized(&buffer, &polygon)
                .and_then(|coords| LandmarkSet::from_flat(coords, count));
            drop(buffer);

            let set = match detected {
                Ok(set) => set,
                Err(e) => {
                    log::warn!("landmark detection failed for {:?}: {:#}", region, e);
                    continue;
                }
            };

            if self.style.draw_boxes {
                draw_region(frame, region, self.style.color);
            }
            report.markers += draw_markers(frame, &set, &self.style);
            report.landmarks.push(set);
        }

        log::debug!(
            "{} face(s), {} marker(s) in {:.1} ms",
            report.faces.len(),
            report.markers,
            start.elapsed().as_secs_f64() * 1000.0
        );
        report
    }
}

/// Draws one filled circle per landmark; returns the number drawn.
pub fn draw_markers(frame: &mut RgbImage, set: &LandmarkSet, style: &MarkerStyle) -> usize {
    let color = Rgb(style.color);
    for &(x, y) in set.points() {
        draw_filled_circle_mut(frame, (x as i32, y as i32), style.radius, color);
    }
    set.len()
}

fn draw_region(frame: &mut RgbImage, region: &FaceRegion, color: [u8; 3]) {
    if region.width == 0 || region.height == 0 {
        return;
    }
    let rect = Rect::at(region.x, region.y).of_size(region.width, region.height);
    draw_hollow_rect_mut(frame, rect, Rgb(color));
}
