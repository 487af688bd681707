/// Face rectangle reported by a [`FaceDetector`](crate::detector::FaceDetector).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub score: f64,
}

impl FaceRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: 0.0,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Four-corner form expected by landmark detectors.
    pub fn polygon(&self) -> BoundingPolygon {
        BoundingPolygon([
            self.x,
            self.y,
            self.right(),
            self.y,
            self.right(),
            self.bottom(),
            self.x,
            self.bottom(),
        ])
    }
}

/// Corners of a face region as 8 values: top-left, top-right, bottom-right,
/// bottom-left, each as `x, y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingPolygon([i32; 8]);

impl BoundingPolygon {
    pub fn as_array(&self) -> &[i32; 8] {
        &self.0
    }

    pub fn corners(&self) -> [(i32, i32); 4] {
        let p = &self.0;
        [(p[0], p[1]), (p[2], p[3]), (p[4], p[5]), (p[6], p[7])]
    }

    /// Axis-aligned extent `(x0, y0, x1, y1)` covering all four corners.
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        let corners = self.corners();
        let x0 = corners.iter().map(|c| c.0).min().unwrap_or(0);
        let y0 = corners.iter().map(|c| c.1).min().unwrap_or(0);
        let x1 = corners.iter().map(|c| c.0).max().unwrap_or(0);
        let y1 = corners.iter().map(|c| c.1).max().unwrap_or(0);
        (x0, y0, x1, y1)
    }
}

impl From<[i32; 8]> for BoundingPolygon {
    fn from(values: [i32; 8]) -> Self {
        Self(values)
    }
}
