//! Rerun scene sink.
//!
//! Geometry is logged under `world/<name>` on the `frame` timeline:
//! - point sets as `Points3D`
//! - line sets as `LineStrips3D`, one two-point strip per line
//! - removal as a flat `Clear`
//!
//! Enable with the `visualization` feature flag.

use rerun::{RecordingStream, RecordingStreamBuilder};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{Result, ViewerError};
use crate::scene::{CameraRequest, GeometryKind, Material, RenderableGeometry, SceneSink};

pub const APP_ID: &str = "mctrack_viewer";

/// Scene sink backed by a Rerun recording.
pub struct RerunSink {
    rec: RecordingStream,
    /// Logged geometry, kept so material changes can be re-logged
    logged: HashMap<String, RenderableGeometry>,
}

impl RerunSink {
    /// Spawns a Rerun viewer and streams to it.
    pub fn spawn(app_id: &str) -> Result<Self> {
        let rec = RecordingStreamBuilder::new(app_id)
            .spawn()
            .map_err(ViewerError::render)?;
        info!("Streaming to a spawned Rerun viewer");
        Self::with_stream(rec)
    }

    /// Writes the recording to an `.rrd` file.
    pub fn save(app_id: &str, path: &Path) -> Result<Self> {
        let rec = RecordingStreamBuilder::new(app_id)
            .save(path)
            .map_err(ViewerError::render)?;
        info!("Recording to {}", path.display());
        Self::with_stream(rec)
    }

    fn with_stream(rec: RecordingStream) -> Result<Self> {
        rec.log_static("world", &rerun::ViewCoordinates::RIGHT_HAND_Z_UP())
            .map_err(ViewerError::render)?;
        Ok(Self {
            rec,
            logged: HashMap::new(),
        })
    }

    fn log(&self, geometry: &RenderableGeometry) -> Result<()> {
        let path = entity_path(&geometry.name);
        let result = match &geometry.kind {
            GeometryKind::Points { positions, colors } => self.rec.log(
                path,
                &rerun::Points3D::new(positions.iter().copied())
                    .with_colors(colors.iter().map(|c| to_rgba(*c)))
                    .with_radii([rerun::Radius::new_ui_points(geometry.material.point_size)]),
            ),
            GeometryKind::Lines {
                positions,
                lines,
                colors,
            } => {
                let strips: Vec<Vec<[f32; 3]>> = lines
                    .iter()
                    .filter_map(|[a, b]| {
                        Some(vec![
                            *positions.get(*a as usize)?,
                            *positions.get(*b as usize)?,
                        ])
                    })
                    .collect();
                self.rec.log(
                    path,
                    &rerun::LineStrips3D::new(strips)
                        .with_colors(colors.iter().map(|c| to_rgba(*c)))
                        .with_radii([rerun::Radius::new_ui_points(geometry.material.line_width)]),
                )
            }
        };
        result.map_err(ViewerError::render)
    }
}

impl SceneSink for RerunSink {
    fn add_geometry(&mut self, geometry: &RenderableGeometry) -> Result<()> {
        self.log(geometry)?;
        self.logged.insert(geometry.name.clone(), geometry.clone());
        Ok(())
    }

    fn remove_geometry(&mut self, name: &str) -> Result<()> {
        self.logged.remove(name);
        self.rec
            .log(entity_path(name), &rerun::Clear::flat())
            .map_err(ViewerError::render)
    }

    fn update_material(&mut self, name: &str, material: &Material) -> Result<()> {
        let mut geometry = self
            .logged
            .get(name)
            .cloned()
            .ok_or_else(|| ViewerError::render(format!("geometry {} not logged", name)))?;
        geometry.material = *material;
        self.log(&geometry)?;
        self.logged.insert(name.to_string(), geometry);
        Ok(())
    }

    /// Rerun frames the view itself; the requested volume is logged as a
    /// static reference box so the initial view covers it.
    fn setup_camera(&mut self, request: &CameraRequest) -> Result<()> {
        let size = [
            request.bounds_max[0] - request.bounds_min[0],
            request.bounds_max[1] - request.bounds_min[1],
            request.bounds_max[2] - request.bounds_min[2],
        ];
        self.rec
            .log_static(
                "world/reference_volume",
                &rerun::Boxes3D::from_centers_and_sizes([request.center], [size])
                    .with_colors([[60, 60, 60, 100]]),
            )
            .map_err(ViewerError::render)
    }

    fn begin_frame(&mut self, frame: usize, _sample_token: &str) {
        self.rec.set_time_sequence("frame", frame as i64);
    }
}

fn entity_path(name: &str) -> String {
    format!("world/{}", name)
}

fn to_rgba(color: [f32; 3]) -> [u8; 4] {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(color[0]), channel(color[1]), channel(color[2]), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rgba() {
        assert_eq!(to_rgba([1.0, 0.0, 0.5]), [255, 0, 128, 255]);
        assert_eq!(to_rgba([2.0, -1.0, f32::NAN]), [255, 0, 0, 255]);
    }

    #[test]
    fn test_entity_path() {
        assert_eq!(entity_path("bbox_3_0"), "world/bbox_3_0");
    }
}
