use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::Result;
use facemark::config::{Config, PipelineConfig};
use facemark::player::run_headless;
use facemark::{launch, Annotator, FrameSource, Player, StartupError, Step};
use facemark_vision::{
    BoundingPolygon, FaceDetector, FaceRegion, LandmarkBuffer, LandmarkDetector, MarkerStyle,
};
use image::{GrayImage, Rgb, RgbImage};

/// Replays a fixed script of capture results.
struct Scripted {
    ticks: VecDeque<Result<Option<RgbImage>>>,
}

impl Scripted {
    fn new(ticks: Vec<Result<Option<RgbImage>>>) -> Box<Self> {
        Box::new(Self {
            ticks: ticks.into(),
        })
    }
}

impl FrameSource for Scripted {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        self.ticks.pop_front().unwrap_or(Ok(None))
    }
}

struct OneFace {
    calls: Rc<Cell<usize>>,
}

impl FaceDetector for OneFace {
    fn detect(&mut self, gray: &GrayImage) -> Vec<FaceRegion> {
        self.calls.set(self.calls.get() + 1);
        let (w, h) = gray.dimensions();
        vec![FaceRegion::new(0, 0, w / 2, h / 2)]
    }
}

struct Corners {
    coords: Vec<f64>,
}

impl LandmarkDetector for Corners {
    fn landmark_count(&self) -> usize {
        4
    }

    fn detect_optimized(
        &mut self,
        _image: &LandmarkBuffer,
        bbox: &BoundingPolygon,
    ) -> Result<&[f64]> {
        self.coords = bbox.as_array().iter().map(|&v| v as f64).collect();
        Ok(&self.coords)
    }
}

fn player(
    ticks: Vec<Result<Option<RgbImage>>>,
    pipeline: PipelineConfig,
) -> (Player, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let annotator = Annotator::new(
        Box::new(OneFace {
            calls: calls.clone(),
        }),
        Box::new(Corners { coords: Vec::new() }),
        MarkerStyle::default(),
    );
    (Player::new(Scripted::new(ticks), annotator, pipeline), calls)
}

fn frame(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([90, 90, 90]))
}

#[test]
fn test_frames_are_downscaled_then_annotated() {
    let (mut player, calls) = player(
        vec![Ok(Some(frame(200, 100)))],
        PipelineConfig::default(),
    );

    match player.step() {
        Step::Frame(frame, report) => {
            assert_eq!(frame.dimensions(), (100, 50));
            assert_eq!(report.faces, vec![FaceRegion::new(0, 0, 50, 25)]);
            assert_eq!(report.markers, 4);
            assert_eq!(frame.get_pixel(50, 25), &Rgb([255, 0, 0]));
        }
        other => panic!("expected a frame, got {:?}", other),
    }
    assert_eq!(calls.get(), 1);
    assert!(matches!(player.step(), Step::Finished));
    assert_eq!(player.frames(), 1);
}

#[test]
fn test_empty_frame_is_skipped_without_detection() {
    let (mut player, calls) = player(
        vec![Ok(Some(RgbImage::new(0, 0))), Ok(Some(frame(40, 40)))],
        PipelineConfig::default(),
    );

    assert!(matches!(player.step(), Step::Skipped));
    assert_eq!(calls.get(), 0);
    assert!(matches!(player.step(), Step::Frame(..)));
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_read_failures_are_tolerated_up_to_limit() {
    let pipeline = PipelineConfig {
        max_read_failures: 2,
        ..Default::default()
    };
    let (mut player, _) = player(
        vec![
            Err(anyhow::anyhow!("dropped")),
            Err(anyhow::anyhow!("dropped")),
            Ok(Some(frame(10, 10))),
            Err(anyhow::anyhow!("dropped")),
            Err(anyhow::anyhow!("dropped")),
            Err(anyhow::anyhow!("dropped")),
        ],
        pipeline,
    );

    assert!(matches!(player.step(), Step::Skipped));
    assert!(matches!(player.step(), Step::Skipped));
    // A good frame resets the failure count
    assert!(matches!(player.step(), Step::Frame(..)));
    assert!(matches!(player.step(), Step::Skipped));
    assert!(matches!(player.step(), Step::Skipped));
    assert!(matches!(player.step(), Step::Finished));
}

#[test]
fn test_headless_writes_each_frame() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineConfig {
        downscale: false,
        ..Default::default()
    };
    let (mut player, _) = player(
        vec![
            Ok(Some(frame(30, 20))),
            Ok(Some(RgbImage::new(0, 0))),
            Ok(Some(frame(30, 20))),
            Ok(Some(frame(30, 20))),
        ],
        pipeline,
    );

    let written = run_headless(&mut player, Some(dir.path()), Some(2)).unwrap();

    assert_eq!(written, 2);
    let first = image::open(dir.path().join("frame_000000.png")).unwrap();
    assert_eq!((first.width(), first.height()), (30, 20));
    assert!(dir.path().join("frame_000001.png").exists());
    assert!(!dir.path().join("frame_000002.png").exists());
}

#[test]
fn test_model_failure_never_opens_source() {
    let dir = tempfile::tempdir().unwrap();
    let opened = Cell::new(false);

    let result = launch(&Config::default(), dir.path(), |_spec| {
        opened.set(true);
        Ok(Scripted::new(Vec::new()) as Box<dyn FrameSource>)
    });

    let err = result.err().expect("launch should fail without models");
    assert!(matches!(
        err.downcast_ref::<StartupError>(),
        Some(StartupError::MissingModel(_))
    ));
    assert!(!opened.get());
}

#[test]
fn test_corrupt_model_never_opens_source() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("DetectionCascades");
    std::fs::create_dir_all(&models).unwrap();
    std::fs::write(models.join("landmarks.onnx"), b"garbage").unwrap();
    std::fs::write(models.join("seeta_fd_frontal_v1.0.bin"), [1, 0, 0, 0]).unwrap();
    let opened = Cell::new(false);

    let result = launch(&Config::default(), dir.path(), |_spec| {
        opened.set(true);
        Ok(Scripted::new(Vec::new()) as Box<dyn FrameSource>)
    });

    let err = result.err().expect("launch should fail on a corrupt model");
    assert!(matches!(
        err.downcast_ref::<StartupError>(),
        Some(StartupError::LandmarkModel { .. })
    ));
    assert!(!opened.get());
}
