use std::path::Path;

use anyhow::{Context, Result};
use facemark_vision::preprocess::downscale;
use facemark_vision::{Annotator, FrameReport, FrameSource, SourceSpec};
use image::RgbImage;
use log::{debug, error, info, warn};

use crate::config::{Config, PipelineConfig};
use crate::models;

/// Outcome of one capture tick.
#[derive(Debug)]
pub enum Step {
    Frame(RgbImage, FrameReport),
    /// Nothing to show this tick; keep going.
    Skipped,
    Finished,
}

/// Capture loop state: one source, one annotator.
pub struct Player {
    source: Box<dyn FrameSource>,
    annotator: Annotator,
    pipeline: PipelineConfig,
    failures: u32,
    frames: u64,
}

/// Loads both models and only then opens the video source.
pub fn launch<F>(cfg: &Config, cwd: &Path, open_source: F) -> Result<Player>
where
    F: FnOnce(&SourceSpec) -> Result<Box<dyn FrameSource>>,
{
    let annotator = models::load_models(cfg, cwd)?;

    let spec = SourceSpec::parse(&cfg.source);
    info!("opening {}", spec);
    let source = open_source(&spec).with_context(|| format!("opening {}", spec))?;

    Ok(Player::new(source, annotator, cfg.pipeline.clone()))
}

impl Player {
    pub fn new(
        source: Box<dyn FrameSource>,
        annotator: Annotator,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            source,
            annotator,
            pipeline,
            failures: 0,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn step(&mut self) -> Step {
        let frame = match self.source.read() {
            Ok(Some(frame)) => {
                self.failures = 0;
                frame
            }
            Ok(None) => {
                info!("source exhausted after {} frame(s)", self.frames);
                return Step::Finished;
            }
            Err(e) => {
                self.failures += 1;
                warn!("cannot read frame: {:#}", e);
                if self.failures > self.pipeline.max_read_failures {
                    error!("giving up after {} unreadable frames", self.failures);
                    return Step::Finished;
                }
                return Step::Skipped;
            }
        };

        if frame.width() == 0 || frame.height() == 0 {
            warn!("wrong input: empty frame");
            return Step::Skipped;
        }

        let mut frame = if self.pipeline.downscale {
            downscale(&frame)
        } else {
            frame
        };
        let report = self.annotator.annotate(&mut frame);
        self.frames += 1;
        debug!(
            "frame {}: {}x{}, {} face(s)",
            self.frames,
            frame.width(),
            frame.height(),
            report.faces.len()
        );
        Step::Frame(frame, report)
    }
}

/// Runs the loop without a window, optionally writing each annotated frame
/// as `frame_NNNNNN.png` under `output`. Returns the number of frames shown.
pub fn run_headless(
    player: &mut Player,
    output: Option<&Path>,
    max_frames: Option<u64>,
) -> Result<u64> {
    if let Some(dir) = output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let mut written: u64 = 0;
    loop {
        if max_frames.is_some_and(|max| written >= max) {
            break;
        }
        match player.step() {
            Step::Frame(frame, report) => {
                if let Some(dir) = output {
                    let path = dir.join(format!("frame_{:06}.png", written));
                    frame
                        .save(&path)
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                info!(
                    "frame {}: {} face(s), {} marker(s)",
                    written + 1,
                    report.faces.len(),
                    report.markers
                );
                written += 1;
            }
            Step::Skipped => {}
            Step::Finished => break,
        }
    }
    Ok(written)
}
