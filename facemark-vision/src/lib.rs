pub mod annotate;
pub mod cascade;
pub mod detector;
pub mod ffmpeg;
pub mod landmarks;
pub mod model;
pub mod preprocess;
pub mod region;
pub mod source;
pub mod video;

// Re-export commonly used types
pub use annotate::{Annotator, FrameReport, MarkerStyle};
pub use cascade::{CascadeDetector, DetectorParams};
pub use detector::{FaceDetector, LandmarkDetector};
pub use landmarks::{LandmarkBuffer, LandmarkSet};
pub use model::{LandmarkParams, OnnxLandmarkDetector};
pub use region::{BoundingPolygon, FaceRegion};
pub use source::{FrameSource, SourceSpec, StillImage};
pub use video::Camera;
