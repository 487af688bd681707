use anyhow::Result;
use image::GrayImage;
use ndarray::Array2;

/// Column-addressed intensity grid handed to landmark detectors.
///
/// Samples are indexed `[[x, y]]`, so the array shape is `(width, height)`.
/// One copy is built per detected face and dropped once that face is done.
#[derive(Debug, Clone)]
pub struct LandmarkBuffer {
    samples: Array2<u8>,
}

impl LandmarkBuffer {
    pub fn from_gray(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let samples = Array2::from_shape_fn((width as usize, height as usize), |(x, y)| {
            gray.get_pixel(x as u32, y as u32)[0]
        });
        Self { samples }
    }

    pub fn width(&self) -> usize {
        self.samples.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.samples.shape()[1]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        self.samples.get([x, y]).copied()
    }

    pub fn samples(&self) -> &Array2<u8> {
        &self.samples
    }
}

/// Landmark points for one face, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<(f64, f64)>,
}

impl LandmarkSet {
    /// Takes `count` points from a flat `[x0, y0, x1, y1, ...]` sequence.
    pub fn from_flat(coords: &[f64], count: usize) -> Result<Self> {
        if coords.len() < count * 2 {
            anyhow::bail!(
                "expected {} landmark coordinates, got {}",
                count * 2,
                coords.len()
            );
        }
        let points = coords[..count * 2]
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
