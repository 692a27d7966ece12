//! Oriented bounding box wireframes.

use nalgebra::{Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Corner index pairs: bottom face, top face, verticals.
pub const BOX_EDGES: [[u32; 2]; 12] = [
    [0, 1], [1, 2], [2, 3], [3, 0],
    [4, 5], [5, 6], [6, 7], [7, 4],
    [0, 4], [1, 5], [2, 6], [3, 7],
];

/// Box orientation as delivered by the tracker, decided once at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Orientation {
    /// Quaternion in nuScenes order `[w, x, y, z]`
    Quaternion([f32; 4]),
    /// Intrinsic X-Y-Z angles in radians `[roll, pitch, yaw]`
    Euler([f32; 3]),
}

impl Orientation {
    /// Dispatches on component count: 4 → quaternion, 3 → Euler.
    pub fn from_components(components: &[f32]) -> Option<Self> {
        match *components {
            [w, x, y, z] => Some(Self::Quaternion([w, x, y, z])),
            [roll, pitch, yaw] => Some(Self::Euler([roll, pitch, yaw])),
            _ => None,
        }
    }

    /// Heading about +Z only.
    pub fn from_yaw(yaw: f32) -> Self {
        Self::Euler([0.0, 0.0, yaw])
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        match *self {
            Self::Quaternion([w, x, y, z]) => {
                UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f32::EPSILON)
                    .unwrap_or_else(|| {
                        warn!("Degenerate quaternion [{w}, {x}, {y}, {z}], using identity");
                        UnitQuaternion::identity()
                    })
            }
            // Intrinsic XYZ: rotate about x, then the new y, then the new z.
            Self::Euler([roll, pitch, yaw]) => {
                UnitQuaternion::from_axis_angle(&Vector3::x_axis(), roll)
                    * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), pitch)
                    * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw)
            }
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::Quaternion([1.0, 0.0, 0.0, 0.0])
    }
}

/// Eight corners and the fixed edge list of a cuboid.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxWireframe {
    pub vertices: [[f32; 3]; 8],
    pub edges: [[u32; 2]; 12],
}

/// Corners of a box of `extent` (length, width, height) around the origin.
pub fn local_corners(extent: [f32; 3]) -> [Point3<f32>; 8] {
    let (l, w, h) = (extent[0] / 2.0, extent[1] / 2.0, extent[2] / 2.0);
    [
        Point3::new(-l, -w, -h),
        Point3::new(l, -w, -h),
        Point3::new(l, w, -h),
        Point3::new(-l, w, -h),
        Point3::new(-l, -w, h),
        Point3::new(l, -w, h),
        Point3::new(l, w, h),
        Point3::new(-l, w, h),
    ]
}

/// Rotates the local corners by `orientation`, then translates to `center`.
///
/// Extents are not validated; zero or negative values collapse or mirror
/// the box.
pub fn build_box(center: [f32; 3], extent: [f32; 3], orientation: &Orientation) -> BoxWireframe {
    let rotation = orientation.rotation();
    let translation = Translation3::new(center[0], center[1], center[2]);
    let corners = local_corners(extent);

    let mut vertices = [[0.0f32; 3]; 8];
    for (out, corner) in vertices.iter_mut().zip(corners.iter()) {
        let p = translation * (rotation * corner);
        *out = [p.x, p.y, p.z];
    }

    BoxWireframe {
        vertices,
        edges: BOX_EDGES,
    }
}
