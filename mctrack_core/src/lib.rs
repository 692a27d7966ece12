//! MCTrack Viewer Core - LiDAR point clouds and tracking results over a timeline
//!
//! Given a frame index, this library decides what geometry is visible:
//! 1. **Frames**: ordinal frame → nuScenes sample via the forward-linked chain
//! 2. **Point clouds**: raw `x, y, z, intensity, ring` records coloured by intensity
//! 3. **Tracking**: oriented box wireframes and fading per-track trails
//!
//! The [`controller::Viewer`] ties these together behind a command surface and
//! hands geometry to a [`scene::SceneSink`].

pub mod config;
pub mod controller;
pub mod dataset;
pub mod error;
pub mod frames;
pub mod geometry;
pub mod playback;
pub mod pointcloud;
pub mod scene;
pub mod tracking;
pub mod trajectory;

#[cfg(feature = "visualization")]
pub mod visualization;

#[cfg(feature = "dashboard")]
pub mod dashboard;

// Re-export key types for convenience
pub use config::{CameraFraming, DisplaySettings, ViewerConfig};
pub use controller::{Notice, NoticeLevel, SceneState, Viewer, ViewerCommand};
pub use dataset::{NuScenes, Sample, SampleSource};
pub use error::{Result, ViewerError};
pub use frames::FrameIndex;
pub use geometry::{build_box, BoxWireframe, Orientation};
pub use playback::{Clock, ManualClock, Playback, SystemClock, TickOutcome};
pub use pointcloud::{load_point_cloud, IntensityColormap, PointCloud};
pub use scene::{LogSink, MemorySink, SceneOrchestrator, SceneSink};
pub use tracking::{TrackedBox, TrackingResultSet};
pub use trajectory::{build_trajectory, ColorPalette, Trajectory};

#[cfg(feature = "visualization")]
pub use visualization::RerunSink;
