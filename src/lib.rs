pub mod config;
pub mod display;
pub mod models;
pub mod player;

// Re-export vision types for convenience
pub use facemark_vision::{
    annotate, source, Annotator, FrameReport, FrameSource, LandmarkSet, SourceSpec,
};
pub use models::StartupError;
pub use player::{launch, Player, Step};
