use std::path::{Path, PathBuf};
use std::time::Instant;

use facemark_vision::{Annotator, CascadeDetector, OnnxLandmarkDetector};
use log::info;
use thiserror::Error;

use crate::config::{Config, ModelsConfig};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("model file not found: {}", .0.display())]
    MissingModel(PathBuf),
    #[error("could not load the landmark model {}", .path.display())]
    LandmarkModel {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not load face detection cascade {}", .path.display())]
    FaceCascade {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Absolute locations of the two model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub dir: PathBuf,
    pub landmark: PathBuf,
    pub cascade: PathBuf,
}

impl ModelPaths {
    /// Relative entries resolve as `cwd/dir/file`; absolute ones are kept.
    pub fn resolve(models: &ModelsConfig, cwd: &Path) -> Self {
        let dir = cwd.join(&models.dir);
        Self {
            landmark: dir.join(&models.landmark),
            cascade: dir.join(&models.cascade),
            dir,
        }
    }
}

fn require(path: &Path) -> Result<(), StartupError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StartupError::MissingModel(path.to_path_buf()))
    }
}

/// Loads the landmark model, then the face cascade, and binds them into an
/// [`Annotator`].
pub fn load_models(cfg: &Config, cwd: &Path) -> Result<Annotator, StartupError> {
    let paths = ModelPaths::resolve(&cfg.models, cwd);
    info!("model directory: {}", paths.dir.display());

    require(&paths.landmark)?;
    let start = Instant::now();
    let landmarks = OnnxLandmarkDetector::load(&paths.landmark, cfg.landmarks).map_err(
        |source| StartupError::LandmarkModel {
            path: paths.landmark.clone(),
            source,
        },
    )?;
    info!(
        "landmark model loaded in {:.0} ms ({} points)",
        start.elapsed().as_secs_f64() * 1000.0,
        cfg.landmarks.points
    );

    let cascade = load_cascade(&paths.cascade, cfg)?;
    info!("face cascade loaded from {}", paths.cascade.display());

    Ok(Annotator::new(
        Box::new(cascade),
        Box::new(landmarks),
        cfg.marker,
    ))
}

fn load_cascade(path: &Path, cfg: &Config) -> Result<CascadeDetector, StartupError> {
    require(path)?;
    CascadeDetector::load(path, cfg.detector).map_err(|source| StartupError::FaceCascade {
        path: path.to_path_buf(),
        source,
    })
}
