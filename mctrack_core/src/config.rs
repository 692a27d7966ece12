//! Viewer configuration and per-refresh display settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ViewerError};

/// Dataset versions tried in order when opening a nuScenes root.
pub const DEFAULT_DATASET_VERSIONS: [&str; 3] = ["v1.0-trainval", "v1.0-mini", "v1.0-test"];

// ============================================================================
// VIEWER CONFIGURATION
// ============================================================================

/// Startup configuration for the viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// nuScenes dataset root (default: data/nuScenes/datasets)
    pub nuscenes_path: PathBuf,

    /// MCTrack results file (default: results/nuscenes/latest/results.json)
    pub tracking_results: PathBuf,

    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,

    /// Version directories tried in order under the dataset root
    pub dataset_versions: Vec<String>,

    /// Sensor channel whose file is rendered as the point cloud
    pub lidar_channel: String,

    /// Scene shown after a dataset load (default: 0, the first scene)
    pub scene_index: usize,

    /// Frame interval at 1x playback speed in milliseconds (default: 100 = 10 Hz keyframes)
    pub base_frame_interval_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            nuscenes_path: PathBuf::from("data/nuScenes/datasets"),
            tracking_results: PathBuf::from("results/nuscenes/latest/results.json"),
            width: 1920,
            height: 1080,
            dataset_versions: DEFAULT_DATASET_VERSIONS.iter().map(|v| v.to_string()).collect(),
            lidar_channel: "LIDAR_TOP".to_string(),
            scene_index: 0,
            base_frame_interval_ms: 100,
        }
    }
}

impl ViewerConfig {
    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ViewerError::PathNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Frame interval at 1x speed.
    pub fn base_frame_interval(&self) -> Duration {
        Duration::from_millis(self.base_frame_interval_ms)
    }

    /// Viewport aspect ratio, used for camera framing.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

// ============================================================================
// DISPLAY SETTINGS
// ============================================================================

/// How the first frame after a data load frames the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraFraming {
    /// Fixed volume [-50,-50,-5]..[50,50,5] around the origin
    #[default]
    FixedVolume,
    /// Bounds of the point cloud shown on that frame
    FitPointCloud,
}

/// Layer toggles and material parameters read on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub show_point_cloud: bool,
    pub show_tracking_boxes: bool,
    pub show_trajectories: bool,

    /// Point size in pixels (slider range 0.5..=10)
    pub point_size: f32,

    /// Box wireframe width in pixels
    pub box_line_width: f32,

    /// Trajectory line width in pixels
    pub trajectory_line_width: f32,

    /// Look-back window in frames (slider range 5..=50)
    pub trajectory_length: usize,

    /// Number of hue-spaced colours assigned to track ids
    pub palette_size: usize,

    pub camera_framing: CameraFraming,
}

impl DisplaySettings {
    pub const POINT_SIZE_RANGE: (f32, f32) = (0.5, 10.0);
    pub const TRAJECTORY_LENGTH_RANGE: (usize, usize) = (5, 50);

    pub fn set_point_size(&mut self, size: f32) {
        let (lo, hi) = Self::POINT_SIZE_RANGE;
        self.point_size = size.clamp(lo, hi);
    }

    pub fn set_trajectory_length(&mut self, length: usize) {
        let (lo, hi) = Self::TRAJECTORY_LENGTH_RANGE;
        self.trajectory_length = length.clamp(lo, hi);
    }

    /// Whether any enabled layer reads tracking results.
    pub fn wants_tracking(&self) -> bool {
        self.show_tracking_boxes || self.show_trajectories
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_point_cloud: true,
            show_tracking_boxes: true,
            show_trajectories: true,
            point_size: 2.0,
            box_line_width: 2.0,
            trajectory_line_width: 1.5,
            trajectory_length: 20,
            palette_size: 50,
            camera_framing: CameraFraming::FixedVolume,
        }
    }
}
