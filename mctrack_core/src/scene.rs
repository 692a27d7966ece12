//! Per-frame scene refresh.
//!
//! The orchestrator turns one frame of data into named geometry and hands it
//! to a [`SceneSink`]. Names are unique within the sink at all times: every
//! refresh removes the previous frame's names before adding new ones.
//!
//! Refresh pipeline:
//! 0. Announce the frame to the sink
//! 1. Remove every registered geometry
//! 2. Point cloud (or the synthetic fallback)
//! 3. One wireframe per tracked box at the sample
//! 4. One trail per track in the look-back window
//! 5. Camera framing, once per data load

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::{CameraFraming, DisplaySettings};
use crate::error::{Result, ViewerError};
use crate::geometry::build_box;
use crate::pointcloud::{load_or_fallback, IntensityColormap, PointCloud};
use crate::tracking::TrackedBox;
use crate::trajectory::{build_trajectories, window, ColorPalette, Trajectory};

pub const POINT_CLOUD_NAME: &str = "point_cloud";

pub fn box_name(track_id: u64, index: usize) -> String {
    format!("bbox_{}_{}", track_id, index)
}

pub fn trajectory_name(track_id: u64) -> String {
    format!("trajectory_{}", track_id)
}

// ============================================================================
// RENDERABLE GEOMETRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shader {
    UnlitPoints,
    UnlitLine,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub shader: Shader,
    pub point_size: f32,
    pub line_width: f32,
}

impl Material {
    pub fn points(point_size: f32) -> Self {
        Self {
            shader: Shader::UnlitPoints,
            point_size,
            line_width: 1.0,
        }
    }

    pub fn lines(line_width: f32) -> Self {
        Self {
            shader: Shader::UnlitLine,
            point_size: 1.0,
            line_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryKind {
    /// One colour per point
    Points {
        positions: Vec<[f32; 3]>,
        colors: Vec<[f32; 3]>,
    },
    /// One colour per line
    Lines {
        positions: Vec<[f32; 3]>,
        lines: Vec<[u32; 2]>,
        colors: Vec<[f32; 3]>,
    },
}

/// A named visual object that lives for exactly one displayed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableGeometry {
    pub name: String,
    pub kind: GeometryKind,
    pub material: Material,
}

impl RenderableGeometry {
    pub fn point_cloud(cloud: PointCloud, point_size: f32) -> Self {
        Self {
            name: POINT_CLOUD_NAME.to_string(),
            kind: GeometryKind::Points {
                positions: cloud.positions,
                colors: cloud.colors,
            },
            material: Material::points(point_size),
        }
    }

    /// Wireframe of one tracked box, painted a single colour.
    pub fn tracked_box(name: String, tracked: &TrackedBox, color: [f32; 3], line_width: f32) -> Self {
        let wire = build_box(tracked.center, tracked.size, &tracked.orientation);
        Self {
            name,
            kind: GeometryKind::Lines {
                positions: wire.vertices.to_vec(),
                lines: wire.edges.to_vec(),
                colors: vec![color; wire.edges.len()],
            },
            material: Material::lines(line_width),
        }
    }

    pub fn trajectory(trajectory: Trajectory, line_width: f32) -> Self {
        let lines = trajectory.segments();
        Self {
            name: trajectory_name(trajectory.track_id),
            kind: GeometryKind::Lines {
                positions: trajectory.points,
                lines,
                colors: trajectory.segment_colors,
            },
            material: Material::lines(line_width),
        }
    }

    /// Number of points (point sets) or lines (line sets).
    pub fn element_count(&self) -> usize {
        match &self.kind {
            GeometryKind::Points { positions, .. } => positions.len(),
            GeometryKind::Lines { lines, .. } => lines.len(),
        }
    }
}

/// Camera placement issued on the first frame after a data load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRequest {
    pub field_of_view_deg: f32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub center: [f32; 3],
    pub aspect_ratio: f32,
}

impl CameraRequest {
    pub const DEFAULT_FOV_DEG: f32 = 60.0;
    pub const DEFAULT_MIN: [f32; 3] = [-50.0, -50.0, -5.0];
    pub const DEFAULT_MAX: [f32; 3] = [50.0, 50.0, 5.0];

    /// Fixed volume around the ego origin.
    pub fn fixed(aspect_ratio: f32) -> Self {
        Self {
            field_of_view_deg: Self::DEFAULT_FOV_DEG,
            bounds_min: Self::DEFAULT_MIN,
            bounds_max: Self::DEFAULT_MAX,
            center: [0.0, 0.0, 0.0],
            aspect_ratio,
        }
    }

    /// Volume of the given bounds, looking at their center.
    pub fn fit(min: [f32; 3], max: [f32; 3], aspect_ratio: f32) -> Self {
        Self {
            field_of_view_deg: Self::DEFAULT_FOV_DEG,
            bounds_min: min,
            bounds_max: max,
            center: [
                (min[0] + max[0]) / 2.0,
                (min[1] + max[1]) / 2.0,
                (min[2] + max[2]) / 2.0,
            ],
            aspect_ratio,
        }
    }
}

// ============================================================================
// RENDERING COLLABORATOR
// ============================================================================

/// Scene graph that geometry is mirrored into.
pub trait SceneSink {
    /// Registers a geometry under its name.
    fn add_geometry(&mut self, geometry: &RenderableGeometry) -> Result<()>;

    /// Drops a geometry by name.
    fn remove_geometry(&mut self, name: &str) -> Result<()>;

    /// Replaces the material of a registered geometry.
    fn update_material(&mut self, name: &str, material: &Material) -> Result<()>;

    fn setup_camera(&mut self, request: &CameraRequest) -> Result<()>;

    /// Called at the start of every refresh, before the previous frame's
    /// geometry is removed.
    fn begin_frame(&mut self, _frame: usize, _sample_token: &str) {}
}

/// Operation recorded by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    Frame(usize),
    Add(String),
    Remove(String),
    Material(String),
    Camera(CameraRequest),
}

/// In-memory scene graph that enforces name uniqueness.
#[derive(Debug, Default)]
pub struct MemorySink {
    geometries: Vec<RenderableGeometry>,
    pub ops: Vec<SinkOp>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.geometries.iter().map(|g| g.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RenderableGeometry> {
        self.geometries.iter().find(|g| g.name == name)
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn camera_requests(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SinkOp::Camera(_)))
            .count()
    }
}

impl SceneSink for MemorySink {
    fn add_geometry(&mut self, geometry: &RenderableGeometry) -> Result<()> {
        if self.get(&geometry.name).is_some() {
            return Err(ViewerError::render(format!(
                "geometry {} already registered",
                geometry.name
            )));
        }
        self.ops.push(SinkOp::Add(geometry.name.clone()));
        self.geometries.push(geometry.clone());
        Ok(())
    }

    fn remove_geometry(&mut self, name: &str) -> Result<()> {
        let before = self.geometries.len();
        self.geometries.retain(|g| g.name != name);
        if self.geometries.len() == before {
            return Err(ViewerError::render(format!("geometry {} not registered", name)));
        }
        self.ops.push(SinkOp::Remove(name.to_string()));
        Ok(())
    }

    fn update_material(&mut self, name: &str, material: &Material) -> Result<()> {
        let geometry = self
            .geometries
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| ViewerError::render(format!("geometry {} not registered", name)))?;
        geometry.material = *material;
        self.ops.push(SinkOp::Material(name.to_string()));
        Ok(())
    }

    fn setup_camera(&mut self, request: &CameraRequest) -> Result<()> {
        self.ops.push(SinkOp::Camera(*request));
        Ok(())
    }

    fn begin_frame(&mut self, frame: usize, _sample_token: &str) {
        self.ops.push(SinkOp::Frame(frame));
    }
}

/// Sink that only reports geometry through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink {
    registered: BTreeSet<String>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SceneSink for LogSink {
    fn add_geometry(&mut self, geometry: &RenderableGeometry) -> Result<()> {
        debug!(
            "add {} ({:?}, {} elements)",
            geometry.name,
            geometry.material.shader,
            geometry.element_count()
        );
        self.registered.insert(geometry.name.clone());
        Ok(())
    }

    fn remove_geometry(&mut self, name: &str) -> Result<()> {
        self.registered.remove(name);
        Ok(())
    }

    fn update_material(&mut self, name: &str, material: &Material) -> Result<()> {
        debug!("material {} -> point size {:.1}", name, material.point_size);
        Ok(())
    }

    fn setup_camera(&mut self, request: &CameraRequest) -> Result<()> {
        debug!(
            "camera: fov {}° bounds {:?}..{:?}",
            request.field_of_view_deg, request.bounds_min, request.bounds_max
        );
        Ok(())
    }

    fn begin_frame(&mut self, frame: usize, sample_token: &str) {
        debug!("frame {} ({}) replacing {} geometries", frame, sample_token, self.registered.len());
    }
}

// ============================================================================
// FRAME DATA
// ============================================================================

/// What the orchestrator reads for a frame.
pub trait FrameData {
    fn frame_count(&self) -> usize;

    fn sample_token(&self, frame: usize) -> Option<&str>;

    /// Point file of the frame's sample, if it has one.
    fn lidar_path(&self, frame: usize) -> Option<PathBuf>;

    /// Tracked boxes at the frame; `None` when no results are loaded.
    fn boxes(&self, frame: usize) -> Option<&[TrackedBox]>;
}

/// Outcome of one refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub frame: usize,
    pub removed: usize,
    pub points: usize,
    pub used_fallback_cloud: bool,
    pub boxes: usize,
    pub trajectories: usize,
    pub camera_framed: bool,
    /// Sink operations that failed; the refresh carried on past them
    pub sink_errors: usize,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Owns the names currently registered in the sink.
pub struct SceneOrchestrator {
    registered: Vec<String>,
    needs_camera: bool,
    colormap: IntensityColormap,
    palette: ColorPalette,
    rng: StdRng,
    aspect_ratio: f32,
}

impl SceneOrchestrator {
    pub fn new(colormap: IntensityColormap, palette_size: usize) -> Self {
        Self {
            registered: Vec::new(),
            needs_camera: true,
            colormap,
            palette: ColorPalette::new(palette_size),
            rng: StdRng::from_entropy(),
            aspect_ratio: 16.0 / 9.0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(IntensityColormap::default(), DisplaySettings::default().palette_size)
    }

    /// Seeds the fallback point generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: f32) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// The next refresh issues a camera request again.
    pub fn reset_camera(&mut self) {
        self.needs_camera = true;
    }

    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    pub fn palette(&self) -> &ColorPalette {
        &self.palette
    }

    /// Removes every registered geometry.
    pub fn clear<S: SceneSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        let mut removed = 0;
        for name in self.registered.drain(..) {
            match sink.remove_geometry(&name) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", name, e),
            }
        }
        removed
    }

    /// Rebuilds the scene for `frame`.
    ///
    /// Fails only for a frame outside the data; problems inside a step are
    /// logged and counted in the report.
    pub fn refresh<D, S>(
        &mut self,
        data: &D,
        frame: usize,
        settings: &DisplaySettings,
        sink: &mut S,
    ) -> Result<RefreshReport>
    where
        D: FrameData + ?Sized,
        S: SceneSink + ?Sized,
    {
        let token = data.sample_token(frame).ok_or(ViewerError::OutOfRange {
            index: frame,
            len: data.frame_count(),
        })?;
        if self.palette.len() != settings.palette_size.max(1) {
            self.palette = ColorPalette::new(settings.palette_size);
        }

        let mut report = RefreshReport {
            frame,
            ..Default::default()
        };

        // Timeline first, so removals are stamped at the new frame.
        sink.begin_frame(frame, token);

        // 1. Clear before add
        report.removed = self.clear(sink);

        // 2. Point cloud
        let mut cloud_bounds = None;
        if settings.show_point_cloud {
            let path = data.lidar_path(frame);
            let (cloud, fallback) = load_or_fallback(path.as_deref(), &self.colormap, &mut self.rng);
            report.points = cloud.len();
            report.used_fallback_cloud = fallback;
            if !fallback {
                cloud_bounds = cloud.bounds();
            }
            let geometry = RenderableGeometry::point_cloud(cloud, settings.point_size);
            self.register(sink, geometry, &mut report);
        }

        // 3. Boxes at this sample
        if settings.show_tracking_boxes {
            if let Some(boxes) = data.boxes(frame) {
                for (index, tracked) in boxes.iter().enumerate() {
                    let track_id = tracked.track_id.unwrap_or(index as u64);
                    let geometry = RenderableGeometry::tracked_box(
                        box_name(track_id, index),
                        tracked,
                        self.palette.color_for(track_id),
                        settings.box_line_width,
                    );
                    if self.register(sink, geometry, &mut report) {
                        report.boxes += 1;
                    }
                }
            }
        }

        // 4. Trails over the look-back window
        if settings.show_trajectories {
            let frames: Option<Vec<&[TrackedBox]>> = (0..=frame)
                .map(|f| {
                    if window(frame, settings.trajectory_length).contains(&f) {
                        data.boxes(f)
                    } else {
                        Some(&[][..])
                    }
                })
                .collect();
            if let Some(frames) = frames {
                let trajectories =
                    build_trajectories(&frames, frame, settings.trajectory_length, &self.palette);
                for trajectory in trajectories {
                    let geometry =
                        RenderableGeometry::trajectory(trajectory, settings.trajectory_line_width);
                    if self.register(sink, geometry, &mut report) {
                        report.trajectories += 1;
                    }
                }
            }
        }

        // 5. Camera, once per load
        if self.needs_camera {
            let request = match (settings.camera_framing, cloud_bounds) {
                (CameraFraming::FitPointCloud, Some((min, max))) => {
                    CameraRequest::fit(min, max, self.aspect_ratio)
                }
                _ => CameraRequest::fixed(self.aspect_ratio),
            };
            match sink.setup_camera(&request) {
                Ok(()) => {
                    self.needs_camera = false;
                    report.camera_framed = true;
                }
                Err(e) => {
                    warn!("Camera setup failed: {}", e);
                    report.sink_errors += 1;
                }
            }
        }

        debug!(
            "Frame {}: {} points, {} boxes, {} trails ({} removed)",
            frame, report.points, report.boxes, report.trajectories, report.removed
        );
        Ok(report)
    }

    /// Pushes the current point size to the registered cloud.
    pub fn apply_point_size<S: SceneSink + ?Sized>(
        &self,
        settings: &DisplaySettings,
        sink: &mut S,
    ) -> Result<bool> {
        if !self.registered.iter().any(|n| n == POINT_CLOUD_NAME) {
            return Ok(false);
        }
        sink.update_material(POINT_CLOUD_NAME, &Material::points(settings.point_size))?;
        Ok(true)
    }

    fn register<S: SceneSink + ?Sized>(
        &mut self,
        sink: &mut S,
        geometry: RenderableGeometry,
        report: &mut RefreshReport,
    ) -> bool {
        if self.registered.contains(&geometry.name) {
            warn!("Duplicate geometry name {}, skipping", geometry.name);
            report.sink_errors += 1;
            return false;
        }
        match sink.add_geometry(&geometry) {
            Ok(()) => {
                self.registered.push(geometry.name);
                true
            }
            Err(e) => {
                warn!("Failed to add {}: {}", geometry.name, e);
                report.sink_errors += 1;
                false
            }
        }
    }
}

impl Default for SceneOrchestrator {
    fn default() -> Self {
        Self::with_defaults()
    }
}
