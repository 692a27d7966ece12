//! Fading trajectory trails over a bounded look-back window.
//!
//! Each track's centers across frames `[max(0, current - window), current]`
//! become a polyline; segment `i` of `n` is drawn at `(i + 1) / n` of the
//! track colour so the newest segment is brightest.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::tracking::TrackedBox;

// ============================================================================
// TRACK COLOURS
// ============================================================================

/// Hue-spaced colours indexed by `track_id mod len`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    colors: Vec<[f32; 3]>,
}

impl ColorPalette {
    pub const SATURATION: f32 = 0.8;
    pub const VALUE: f32 = 0.9;

    /// `count` colours evenly spaced around the hue wheel.
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        let colors = (0..count)
            .map(|i| hsv_to_rgb(i as f32 / count as f32, Self::SATURATION, Self::VALUE))
            .collect();
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color_for(&self, track_id: u64) -> [f32; 3] {
        self.colors[(track_id % self.colors.len() as u64) as usize]
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::new(50)
    }
}

/// HSV → RGB with all channels in [0, 1].
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    if s == 0.0 {
        return [v, v, v];
    }
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u32 % 6 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

// ============================================================================
// TRAJECTORIES
// ============================================================================

/// Polyline of a track's recent centers with one colour per segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub track_id: u64,
    pub points: Vec<[f32; 3]>,
    /// `points.len() - 1` entries, oldest segment first
    pub segment_colors: Vec<[f32; 3]>,
}

impl Trajectory {
    pub fn segment_count(&self) -> usize {
        self.segment_colors.len()
    }

    /// Index pairs `[i, i + 1]` for each segment.
    pub fn segments(&self) -> Vec<[u32; 2]> {
        (0..self.segment_colors.len() as u32).map(|i| [i, i + 1]).collect()
    }
}

/// Frames inside the look-back window ending at `current_frame`.
pub fn window(current_frame: usize, window_length: usize) -> RangeInclusive<usize> {
    current_frame.saturating_sub(window_length)..=current_frame
}

/// Brightness factor of segment `index` out of `count`.
pub fn fade(index: usize, count: usize) -> f32 {
    (index + 1) as f32 / count as f32
}

fn fade_colors(base_color: [f32; 3], segments: usize) -> Vec<[f32; 3]> {
    (0..segments)
        .map(|i| {
            let alpha = fade(i, segments);
            [base_color[0] * alpha, base_color[1] * alpha, base_color[2] * alpha]
        })
        .collect()
}

/// Trail of one track.
///
/// `frames[i]` holds the boxes of frame `i`; frames past the end of the
/// slice are ignored. Returns `None` when fewer than two centers fall in the
/// window.
pub fn build_trajectory(
    track_id: u64,
    frames: &[&[TrackedBox]],
    current_frame: usize,
    window_length: usize,
    base_color: [f32; 3],
) -> Option<Trajectory> {
    let points: Vec<[f32; 3]> = window(current_frame, window_length)
        .filter_map(|frame| frames.get(frame))
        .flat_map(|boxes| boxes.iter())
        .filter(|b| b.track_id == Some(track_id))
        .map(|b| b.center)
        .collect();

    if points.len() < 2 {
        return None;
    }

    let segment_colors = fade_colors(base_color, points.len() - 1);
    Some(Trajectory {
        track_id,
        points,
        segment_colors,
    })
}

/// Trails of every track seen in the window, ascending by track id.
///
/// Boxes without a track id are skipped.
pub fn build_trajectories(
    frames: &[&[TrackedBox]],
    current_frame: usize,
    window_length: usize,
    palette: &ColorPalette,
) -> Vec<Trajectory> {
    let mut centers: BTreeMap<u64, Vec<[f32; 3]>> = BTreeMap::new();
    for boxes in window(current_frame, window_length).filter_map(|frame| frames.get(frame)) {
        for b in boxes.iter() {
            if let Some(track_id) = b.track_id {
                centers.entry(track_id).or_default().push(b.center);
            }
        }
    }

    centers
        .into_iter()
        .filter(|(_, points)| points.len() >= 2)
        .map(|(track_id, points)| {
            let segment_colors = fade_colors(palette.color_for(track_id), points.len() - 1);
            Trajectory {
                track_id,
                points,
                segment_colors,
            }
        })
        .collect()
}
