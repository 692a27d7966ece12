//! LiDAR point cloud loading.
//!
//! nuScenes `.pcd.bin` sweeps are headerless little-endian `f32` records of
//! `x, y, z, intensity, ring`. Colours come from min/max-normalized
//! intensity mapped through [`IntensityColormap`].

use rand::Rng;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, ViewerError};

/// Guards the normalization against an all-equal intensity channel.
pub const INTENSITY_EPSILON: f32 = 1e-8;

/// Colour of clouds without an intensity channel.
pub const UNIFORM_COLOR: [f32; 3] = [0.5, 0.5, 0.5];

/// Colour of the synthetic fallback cloud.
pub const FALLBACK_COLOR: [f32; 3] = [0.7, 0.7, 0.7];

pub const FALLBACK_POINT_COUNT: usize = 1000;

/// Half edge of the cube the fallback points are drawn from.
pub const FALLBACK_HALF_EXTENT: f32 = 25.0;

/// Per-record float layout of a binary point file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLayout {
    /// x, y, z
    Xyz,
    /// x, y, z, intensity (KITTI velodyne)
    Xyzi,
    /// x, y, z, intensity, ring (nuScenes)
    NuScenes,
}

impl PointLayout {
    /// Floats per record.
    pub fn stride(self) -> usize {
        match self {
            Self::Xyz => 3,
            Self::Xyzi => 4,
            Self::NuScenes => 5,
        }
    }

    pub fn record_bytes(self) -> usize {
        self.stride() * std::mem::size_of::<f32>()
    }

    pub fn has_intensity(self) -> bool {
        self.stride() >= 4
    }

    /// Every `.bin` sweep is read as nuScenes unless the name says `.xyz.bin`
    /// or `.xyzi.bin`.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".xyz.bin") {
            Self::Xyz
        } else if name.ends_with(".xyzi.bin") {
            Self::Xyzi
        } else {
            Self::NuScenes
        }
    }
}

/// Per-channel scale applied to normalized intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityColormap {
    pub scale: [f32; 3],
}

impl IntensityColormap {
    /// Warm ramp: R = 1.0·n, G = 0.5·n, B = 0.3·n.
    pub const WARM: Self = Self {
        scale: [1.0, 0.5, 0.3],
    };

    /// Colour for a normalized intensity, clamped to [0, 1] per channel.
    pub fn color(&self, normalized: f32) -> [f32; 3] {
        let n = if normalized.is_finite() { normalized } else { 0.0 };
        [
            (n * self.scale[0]).clamp(0.0, 1.0),
            (n * self.scale[1]).clamp(0.0, 1.0),
            (n * self.scale[2]).clamp(0.0, 1.0),
        ]
    }
}

impl Default for IntensityColormap {
    fn default() -> Self {
        Self::WARM
    }
}

/// Positions and matching per-point colours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Axis-aligned bounds `(min, max)`, `None` for an empty cloud.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold((first, first), |(mut lo, mut hi), p| {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(p[axis]);
                hi[axis] = hi[axis].max(p[axis]);
            }
            (lo, hi)
        }))
    }
}

/// `(v - min) / (max - min + ε)` over the whole channel.
pub fn normalize_intensities(values: &[f32]) -> Vec<f32> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min + INTENSITY_EPSILON;
    values.iter().map(|&v| (v - min) / range).collect()
}

/// Decodes raw little-endian records.
///
/// `origin` only names the source in errors.
pub fn parse_points(
    bytes: &[u8],
    layout: PointLayout,
    colormap: &IntensityColormap,
    origin: &Path,
) -> Result<PointCloud> {
    let record = layout.record_bytes();
    if bytes.len() % record != 0 {
        return Err(ViewerError::malformed(
            origin,
            format!(
                "{} bytes is not a multiple of the {}-byte record",
                bytes.len(),
                record
            ),
        ));
    }

    let count = bytes.len() / record;
    let mut positions = Vec::with_capacity(count);
    let mut intensities = Vec::with_capacity(if layout.has_intensity() { count } else { 0 });

    for chunk in bytes.chunks_exact(record) {
        let field = |i: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&chunk[i * 4..i * 4 + 4]);
            f32::from_le_bytes(raw)
        };
        positions.push([field(0), field(1), field(2)]);
        if layout.has_intensity() {
            intensities.push(field(3));
        }
    }

    let colors = if layout.has_intensity() {
        normalize_intensities(&intensities)
            .into_iter()
            .map(|n| colormap.color(n))
            .collect()
    } else {
        vec![UNIFORM_COLOR; count]
    };

    Ok(PointCloud { positions, colors })
}

/// Reads a point file, inferring the layout from its name.
pub fn load_point_cloud(path: &Path, colormap: &IntensityColormap) -> Result<PointCloud> {
    if !path.exists() {
        return Err(ViewerError::PathNotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    let cloud = parse_points(&bytes, PointLayout::from_path(path), colormap, path)?;
    debug!("Loaded point cloud: {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}

/// Uniform random points in a cube, painted neutral gray.
pub fn fallback_cloud<R: Rng>(rng: &mut R, count: usize, half_extent: f32) -> PointCloud {
    let positions: Vec<[f32; 3]> = (0..count)
        .map(|_| {
            [
                rng.gen_range(-half_extent..half_extent),
                rng.gen_range(-half_extent..half_extent),
                rng.gen_range(-half_extent..half_extent),
            ]
        })
        .collect();
    PointCloud {
        colors: vec![FALLBACK_COLOR; positions.len()],
        positions,
    }
}

/// Loads `path`, or substitutes the synthetic cloud when it is missing or
/// unreadable. The flag reports whether the fallback was used.
pub fn load_or_fallback<R: Rng>(
    path: Option<&Path>,
    colormap: &IntensityColormap,
    rng: &mut R,
) -> (PointCloud, bool) {
    let result = match path {
        Some(path) => load_point_cloud(path, colormap),
        None => Err(ViewerError::malformed("<sample>", "no LiDAR file for this sample")),
    };

    match result {
        Ok(cloud) => (cloud, false),
        Err(e) => {
            warn!("Point cloud unavailable ({}), showing test cloud", e);
            (
                fallback_cloud(rng, FALLBACK_POINT_COUNT, FALLBACK_HALF_EXTENT),
                true,
            )
        }
    }
}
