use anyhow::Result;
use facemark_vision::{
    Annotator, BoundingPolygon, FaceDetector, FaceRegion, FrameSource, LandmarkBuffer,
    LandmarkDetector, MarkerStyle, SourceSpec,
};
use image::{GrayImage, Rgb, RgbImage};

/// Reports one face in the middle of every frame.
struct Centered;

impl FaceDetector for Centered {
    fn detect(&mut self, gray: &GrayImage) -> Vec<FaceRegion> {
        let (w, h) = gray.dimensions();
        vec![FaceRegion::new((w / 4) as i32, (h / 4) as i32, w / 2, h / 2)]
    }
}

/// Places a single landmark at the brightest sample of the buffer.
struct Brightest {
    coords: Vec<f64>,
}

impl LandmarkDetector for Brightest {
    fn landmark_count(&self) -> usize {
        1
    }

    fn detect_optimized(
        &mut self,
        image: &LandmarkBuffer,
        _bbox: &BoundingPolygon,
    ) -> Result<&[f64]> {
        let mut best = (0, 0, 0u8);
        for x in 0..image.width() {
            for y in 0..image.height() {
                let v = image.get(x, y).unwrap_or(0);
                if v > best.2 {
                    best = (x, y, v);
                }
            }
        }
        self.coords = vec![best.0 as f64, best.1 as f64];
        Ok(&self.coords)
    }
}

#[test]
fn test_still_image_annotated_once() -> Result<()> {
    env_logger::try_init().ok();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("still.png");
    let mut still = RgbImage::from_pixel(64, 48, Rgb([20, 20, 20]));
    still.put_pixel(40, 30, Rgb([250, 250, 250]));
    still.save(&path)?;

    let spec = SourceSpec::parse(path.to_str().unwrap());
    assert!(matches!(spec, SourceSpec::StillImage(_)));
    let mut source = spec.open()?;

    let mut annotator = Annotator::new(
        Box::new(Centered),
        Box::new(Brightest { coords: Vec::new() }),
        MarkerStyle::default(),
    );

    let mut frame = source.read()?.expect("still image yields a frame");
    let report = annotator.annotate(&mut frame);

    assert_eq!(report.faces, vec![FaceRegion::new(16, 12, 32, 24)]);
    assert_eq!(report.landmarks.len(), 1);
    assert_eq!(report.landmarks[0].points(), &[(40.0, 30.0)]);
    assert_eq!(frame.get_pixel(41, 31), &Rgb([255, 0, 0]));

    assert!(source.read()?.is_none());
    Ok(())
}
