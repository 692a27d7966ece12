//! MCTrack / nuScenes tracking results.
//!
//! Accepts both the submission layout `{ "meta": …, "results": { token: [box…] } }`
//! and a bare `{ token: [box…] }` map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

use crate::error::{Result, ViewerError};
use crate::geometry::Orientation;

/// One tracked object at one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedBox {
    /// Persistent identity across samples; absent for untracked detections
    pub track_id: Option<u64>,
    pub center: [f32; 3],
    /// Length, width, height
    pub size: [f32; 3],
    pub orientation: Orientation,
    pub category: String,
    pub score: Option<f32>,
}

// ============================================================================
// JSON INGESTION
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTrackId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawBox {
    translation: [f32; 3],
    size: [f32; 3],
    rotation: Vec<f32>,
    #[serde(default)]
    tracking_id: Option<RawTrackId>,
    #[serde(default)]
    tracking_name: Option<String>,
    #[serde(default)]
    tracking_score: Option<f32>,
}

impl RawBox {
    fn into_box(self, origin: &Path, token: &str) -> Result<TrackedBox> {
        let orientation = Orientation::from_components(&self.rotation).ok_or_else(|| {
            ViewerError::malformed(
                origin,
                format!(
                    "sample {}: rotation has {} components, expected 3 or 4",
                    token,
                    self.rotation.len()
                ),
            )
        })?;

        // Negative ids are the "untracked" sentinel some trackers emit.
        let track_id = match self.tracking_id {
            None => None,
            Some(RawTrackId::Number(id)) => u64::try_from(id).ok(),
            Some(RawTrackId::Text(text)) => Some(text.trim().parse::<u64>().map_err(|_| {
                ViewerError::malformed(
                    origin,
                    format!("sample {}: tracking_id {:?} is not numeric", token, text),
                )
            })?),
        };

        Ok(TrackedBox {
            track_id,
            center: self.translation,
            size: self.size,
            orientation,
            category: self.tracking_name.unwrap_or_else(|| "unknown".to_string()),
            score: self.tracking_score,
        })
    }
}

// ============================================================================
// RESULT SET
// ============================================================================

/// Sample token → ordered boxes; read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct TrackingResultSet {
    frames: HashMap<String, Vec<TrackedBox>>,
}

impl TrackingResultSet {
    /// Reads a results file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ViewerError::PathNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let set = Self::from_json_str(&text, path)?;
        info!(
            "Loaded tracking results: {} samples, {} boxes, {} tracks from {}",
            set.sample_count(),
            set.box_count(),
            set.track_ids().len(),
            path.display()
        );
        Ok(set)
    }

    /// Parses results text; `origin` names the source in errors.
    pub fn from_json_str(text: &str, origin: &Path) -> Result<Self> {
        let mut value: Value = serde_json::from_str(text)?;
        let results = if value.get("results").is_some() {
            value["results"].take()
        } else {
            value
        };
        let raw: HashMap<String, Vec<RawBox>> = serde_json::from_value(results)
            .map_err(|e| ViewerError::malformed(origin, e.to_string()))?;

        let mut frames = HashMap::with_capacity(raw.len());
        for (token, boxes) in raw {
            let boxes = boxes
                .into_iter()
                .map(|b| b.into_box(origin, &token))
                .collect::<Result<Vec<_>>>()?;
            frames.insert(token, boxes);
        }

        Ok(Self { frames })
    }

    /// Builds a set directly from boxes.
    pub fn from_frames(frames: HashMap<String, Vec<TrackedBox>>) -> Self {
        Self { frames }
    }

    /// Boxes at a sample; empty when the tracker reported nothing there.
    pub fn boxes(&self, sample_token: &str) -> &[TrackedBox] {
        self.frames
            .get(sample_token)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sample_count(&self) -> usize {
        self.frames.len()
    }

    pub fn box_count(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn track_ids(&self) -> BTreeSet<u64> {
        self.frames
            .values()
            .flatten()
            .filter_map(|b| b.track_id)
            .collect()
    }
}
