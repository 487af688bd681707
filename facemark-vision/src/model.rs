use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::Value,
};
use serde::{Deserialize, Serialize};

use crate::detector::LandmarkDetector;
use crate::landmarks::LandmarkBuffer;
use crate::region::BoundingPolygon;

#[cfg_attr(not(any(feature = "openvino", feature = "cuda")), allow(unused_mut))]
pub fn session_builder() -> Result<SessionBuilder> {
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    {
        use ort::ep::{self, ExecutionProvider};
        let ep = ep::OpenVINO::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("openvino feature is enabled, onnx runtime not compiled with openvino")
        }
    }

    #[cfg(feature = "cuda")]
    {
        use ort::ep::{self, ExecutionProvider};
        let ep = ep::CUDA::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("cuda feature is enabled, onnx runtime not compiled with cuda")
        }
    }

    Ok(builder)
}

/// Shape of the landmark regression model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkParams {
    /// Points predicted per face.
    pub points: usize,
    /// Side of the square model input, in pixels.
    pub input_size: u32,
    /// Input channels; grayscale is replicated when the model wants 3.
    pub channels: usize,
    /// Fraction of the face box added on every side before cropping.
    pub margin: f32,
}

impl Default for LandmarkParams {
    fn default() -> Self {
        Self {
            points: 68,
            input_size: 112,
            channels: 1,
            margin: 0.1,
        }
    }
}

impl LandmarkParams {
    pub fn validate(&self) -> Result<()> {
        if self.points == 0 {
            anyhow::bail!("landmark model must predict at least one point");
        }
        if self.input_size == 0 {
            anyhow::bail!("landmark input_size must be positive");
        }
        if self.channels != 1 && self.channels != 3 {
            anyhow::bail!("landmark channels must be 1 or 3, got {}", self.channels);
        }
        if !(0.0..=1.0).contains(&self.margin) {
            anyhow::bail!("landmark margin must be within 0..=1, got {}", self.margin);
        }
        Ok(())
    }
}

/// Crop window inside the landmark buffer, in buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crop {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Crop {
    /// Expands the polygon's bounds by `margin` and clamps to the buffer.
    pub fn around(
        bbox: &BoundingPolygon,
        margin: f32,
        width: usize,
        height: usize,
    ) -> Option<Self> {
        let (x0, y0, x1, y1) = bbox.bounds();
        let pad_x = (x1 - x0) as f32 * margin;
        let pad_y = (y1 - y0) as f32 * margin;

        let left = (x0 as f32 - pad_x).max(0.0);
        let top = (y0 as f32 - pad_y).max(0.0);
        let right = (x1 as f32 + pad_x).min(width as f32);
        let bottom = (y1 as f32 + pad_y).min(height as f32);

        if right - left < 1.0 || bottom - top < 1.0 {
            return None;
        }
        Some(Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }
}

/// Bilinear resample of `crop` into a `size`×`size` grid scaled to `[0, 1]`,
/// laid out row-major.
pub fn sample_crop(buffer: &LandmarkBuffer, crop: &Crop, size: u32) -> Vec<f32> {
    let width = buffer.width();
    let height = buffer.height();
    let samples = buffer.samples();
    let step_x = crop.width / size as f32;
    let step_y = crop.height / size as f32;

    let mut out = Vec::with_capacity((size * size) as usize);
    for out_y in 0..size {
        for out_x in 0..size {
            // Pixel centers of the output map onto the crop
            let in_x = (crop.x + (out_x as f32 + 0.5) * step_x - 0.5)
                .clamp(0.0, (width - 1) as f32);
            let in_y = (crop.y + (out_y as f32 + 0.5) * step_y - 0.5)
                .clamp(0.0, (height - 1) as f32);

            let x0 = in_x.floor() as usize;
            let y0 = in_y.floor() as usize;
            let x1 = (x0 + 1).min(width - 1);
            let y1 = (y0 + 1).min(height - 1);
            let fx = in_x - x0 as f32;
            let fy = in_y - y0 as f32;

            let p00 = samples[[x0, y0]] as f32;
            let p10 = samples[[x1, y0]] as f32;
            let p01 = samples[[x0, y1]] as f32;
            let p11 = samples[[x1, y1]] as f32;

            let value = p00 * (1.0 - fx) * (1.0 - fy)
                + p10 * fx * (1.0 - fy)
                + p01 * (1.0 - fx) * fy
                + p11 * fx * fy;
            out.push(value / 255.0);
        }
    }
    out
}

/// Maps crop-normalized model output back into buffer pixel space.
pub fn map_to_frame(normalized: &[f32], crop: &Crop, out: &mut Vec<f64>) {
    out.clear();
    out.extend(normalized.chunks_exact(2).flat_map(|pair| {
        [
            (crop.x + pair[0] * crop.width) as f64,
            (crop.y + pair[1] * crop.height) as f64,
        ]
    }));
}

/// Landmark detector running an ONNX regression model.
///
/// The model takes `[1, C, S, S]` intensities in `[0, 1]` and outputs
/// `2 * points` coordinates normalized to the crop.
pub struct OnnxLandmarkDetector {
    session: Session,
    params: LandmarkParams,
    landmarks: Vec<f64>,
}

impl OnnxLandmarkDetector {
    pub fn load(path: &Path, params: LandmarkParams) -> Result<Self> {
        params.validate().context("invalid landmark parameters")?;
        let session = session_builder()?
            .commit_from_file(path)
            .with_context(|| format!("load landmark model {}", path.display()))?;
        Ok(Self {
            session,
            params,
            landmarks: Vec::with_capacity(params.points * 2),
        })
    }

    pub fn params(&self) -> &LandmarkParams {
        &self.params
    }

    fn input_tensor(&self, buffer: &LandmarkBuffer, crop: &Crop) -> Result<Array4<f32>> {
        let size = self.params.input_size;
        let plane = sample_crop(buffer, crop, size);
        let channels = self.params.channels;

        let mut data = Vec::with_capacity(plane.len() * channels);
        for _ in 0..channels {
            data.extend_from_slice(&plane);
        }
        Ok(Array4::from_shape_vec(
            (1, channels, size as usize, size as usize),
            data,
        )?)
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn landmark_count(&self) -> usize {
        self.params.points
    }

    fn detect_optimized(
        &mut self,
        image: &LandmarkBuffer,
        bbox: &BoundingPolygon,
    ) -> Result<&[f64]> {
        let crop = Crop::around(bbox, self.params.margin, image.width(), image.height())
            .ok_or_else(|| anyhow::anyhow!("face box {:?} lies outside the frame", bbox))?;

        let input = self.input_tensor(image, &crop)?;
        let input_tensor = Value::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let expected = self.params.points * 2;
        if data.len() < expected {
            anyhow::bail!(
                "landmark model produced {} values, expected {}",
                data.len(),
                expected
            );
        }

        map_to_frame(&data[..expected], &crop, &mut self.landmarks);
        log::trace!("landmarks for {:?}: {} points", bbox, self.params.points);
        Ok(&self.landmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_crop_expands_and_clamps() {
        let bbox = BoundingPolygon::from([10, 10, 110, 10, 110, 110, 10, 110]);
        let crop = Crop::around(&bbox, 0.1, 200, 115).unwrap();
        assert_eq!(crop.x, 0.0);
        assert_eq!(crop.y, 0.0);
        assert_eq!(crop.width, 120.0);
        assert_eq!(crop.height, 115.0);
    }

    #[test]
    fn test_crop_outside_buffer() {
        let bbox = BoundingPolygon::from([300, 300, 400, 300, 400, 400, 300, 400]);
        assert!(Crop::around(&bbox, 0.0, 200, 200).is_none());
    }

    #[test]
    fn test_sample_uniform_crop() {
        let gray = GrayImage::from_pixel(40, 30, Luma([51]));
        let buffer = LandmarkBuffer::from_gray(&gray);
        let crop = Crop {
            x: 5.0,
            y: 5.0,
            width: 20.0,
            height: 20.0,
        };
        let plane = sample_crop(&buffer, &crop, 8);
        assert_eq!(plane.len(), 64);
        assert!(plane.iter().all(|v| (v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_sample_follows_columns() {
        // Left half dark, right half bright
        let gray = GrayImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 0 } else { 255 }]));
        let buffer = LandmarkBuffer::from_gray(&gray);
        let crop = Crop {
            x: 0.0,
            y: 0.0,
            width: 20.0,
            height: 10.0,
        };
        let plane = sample_crop(&buffer, &crop, 4);
        assert_eq!(&plane[0..4], &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_map_to_frame() {
        let crop = Crop {
            x: 100.0,
            y: 50.0,
            width: 200.0,
            height: 100.0,
        };
        let mut out = Vec::new();
        map_to_frame(&[0.0, 0.0, 0.5, 0.5, 1.0, 1.0], &crop, &mut out);
        assert_eq!(out, vec![100.0, 50.0, 200.0, 100.0, 300.0, 150.0]);
    }

    #[test]
    fn test_landmark_params_validation() {
        assert!(LandmarkParams::default().validate().is_ok());
        let bad = LandmarkParams {
            channels: 2,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = LandmarkParams {
            points: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
