//! nuScenes table access.
//!
//! Only the tables needed to walk a scene and find sensor files are read:
//! `scene`, `sample`, `sample_data` and, when present, `calibrated_sensor`
//! and `sensor` (used to name the channel of each sample_data record).
//!
//! Layout on disk:
//! ```text
//! <root>/
//!   v1.0-mini/
//!     scene.json  sample.json  sample_data.json  calibrated_sensor.json  sensor.json
//!   samples/LIDAR_TOP/*.pcd.bin
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, ViewerError};

// ============================================================================
// TABLE ROWS
// ============================================================================

/// One recorded drive segment.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneRecord {
    pub token: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nbr_samples: usize,
    pub first_sample_token: String,
    #[serde(default)]
    pub last_sample_token: String,
}

#[derive(Debug, Deserialize)]
struct SampleRow {
    token: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    next: String,
    #[serde(default)]
    scene_token: String,
}

/// One sensor file captured for a sample.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleData {
    pub token: String,
    pub sample_token: String,
    #[serde(default)]
    pub calibrated_sensor_token: String,
    pub filename: String,
    #[serde(default = "default_key_frame")]
    pub is_key_frame: bool,
    #[serde(default)]
    pub timestamp: i64,
}

fn default_key_frame() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct CalibratedSensorRow {
    token: String,
    sensor_token: String,
}

#[derive(Debug, Deserialize)]
struct SensorRow {
    token: String,
    channel: String,
}

// ============================================================================
// SAMPLE
// ============================================================================

/// One synchronized capture instant within a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub token: String,
    pub timestamp: i64,
    /// Following sample in the scene, `None` at the end of the chain
    pub next: Option<String>,
    pub scene_token: String,
    /// Sensor channel → sample_data token (key frames only)
    pub data: HashMap<String, String>,
}

impl Sample {
    /// Creates a sample with no sensor data attached.
    pub fn new(token: impl Into<String>, next: Option<String>) -> Self {
        Self {
            token: token.into(),
            timestamp: 0,
            next,
            scene_token: String::new(),
            data: HashMap::new(),
        }
    }
}

impl From<SampleRow> for Sample {
    fn from(row: SampleRow) -> Self {
        Self {
            token: row.token,
            timestamp: row.timestamp,
            next: Some(row.next).filter(|n| !n.is_empty()),
            scene_token: row.scene_token,
            data: HashMap::new(),
        }
    }
}

/// Random access from sample token to sample record.
pub trait SampleSource {
    fn sample(&self, token: &str) -> Option<&Sample>;
}

impl SampleSource for HashMap<String, Sample> {
    fn sample(&self, token: &str) -> Option<&Sample> {
        self.get(token)
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// A loaded nuScenes version.
#[derive(Debug)]
pub struct NuScenes {
    root: PathBuf,
    version: String,
    scenes: Vec<SceneRecord>,
    samples: HashMap<String, Sample>,
    sample_data: HashMap<String, SampleData>,
}

impl NuScenes {
    /// Opens the dataset at `root`, trying each version directory in order.
    pub fn open<S: AsRef<str>>(root: &Path, versions: &[S]) -> Result<Self> {
        if !root.exists() {
            return Err(ViewerError::PathNotFound(root.to_path_buf()));
        }

        let mut tried = Vec::with_capacity(versions.len());
        for version in versions {
            let version = version.as_ref();
            match Self::load_version(root, version) {
                Ok(dataset) => {
                    info!(
                        "Loaded nuScenes {} ({} scenes, {} samples)",
                        version,
                        dataset.scenes.len(),
                        dataset.samples.len()
                    );
                    return Ok(dataset);
                }
                Err(e) => {
                    debug!("nuScenes {} not loadable: {}", version, e);
                    tried.push(version.to_string());
                }
            }
        }

        Err(ViewerError::UnsupportedDatasetVersion { tried })
    }

    /// Loads a single version directory.
    pub fn load_version(root: &Path, version: &str) -> Result<Self> {
        let dir = root.join(version);
        if !dir.is_dir() {
            return Err(ViewerError::PathNotFound(dir));
        }

        let scenes: Vec<SceneRecord> = read_table(&dir, "scene")?;
        let sample_rows: Vec<SampleRow> = read_table(&dir, "sample")?;
        let data_rows: Vec<SampleData> = read_table(&dir, "sample_data")?;
        let calibrated: Vec<CalibratedSensorRow> = read_optional_table(&dir, "calibrated_sensor")?;
        let sensors: Vec<SensorRow> = read_optional_table(&dir, "sensor")?;

        let sensor_channels: HashMap<String, String> =
            sensors.into_iter().map(|s| (s.token, s.channel)).collect();
        let calibrated_channels: HashMap<String, String> = calibrated
            .into_iter()
            .filter_map(|c| {
                sensor_channels
                    .get(&c.sensor_token)
                    .map(|channel| (c.token, channel.clone()))
            })
            .collect();

        let mut samples: HashMap<String, Sample> = sample_rows
            .into_iter()
            .map(|row| (row.token.clone(), Sample::from(row)))
            .collect();

        for sd in data_rows.iter().filter(|sd| sd.is_key_frame) {
            let channel = calibrated_channels
                .get(&sd.calibrated_sensor_token)
                .cloned()
                .or_else(|| channel_from_filename(&sd.filename));
            if let (Some(channel), Some(sample)) = (channel, samples.get_mut(&sd.sample_token)) {
                sample.data.insert(channel, sd.token.clone());
            }
        }

        let sample_data = data_rows
            .into_iter()
            .map(|sd| (sd.token.clone(), sd))
            .collect();

        Ok(Self {
            root: root.to_path_buf(),
            version: version.to_string(),
            scenes,
            samples,
            sample_data,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scenes(&self) -> &[SceneRecord] {
        &self.scenes
    }

    /// Scene by position in the scene table.
    pub fn scene(&self, index: usize) -> Result<&SceneRecord> {
        if self.scenes.is_empty() {
            return Err(ViewerError::EmptyDataset(format!(
                "nuScenes {} has no scenes",
                self.version
            )));
        }
        self.scenes.get(index).ok_or(ViewerError::OutOfRange {
            index,
            len: self.scenes.len(),
        })
    }

    /// Absolute path of the file a sample captured on `channel`.
    pub fn sensor_path(&self, sample: &Sample, channel: &str) -> Option<PathBuf> {
        let sd_token = sample.data.get(channel)?;
        let sd = self.sample_data.get(sd_token)?;
        Some(self.root.join(&sd.filename))
    }
}

impl SampleSource for NuScenes {
    fn sample(&self, token: &str) -> Option<&Sample> {
        self.samples.get(token)
    }
}

/// `samples/LIDAR_TOP/xxx.pcd.bin` → `LIDAR_TOP`
fn channel_from_filename(filename: &str) -> Option<String> {
    let mut parts = filename.split('/');
    match parts.next() {
        Some("samples") | Some("sweeps") => parts.next().map(str::to_string),
        _ => None,
    }
}

fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>> {
    let path = dir.join(format!("{}.json", name));
    if !path.exists() {
        return Err(ViewerError::PathNotFound(path));
    }
    let reader = BufReader::new(File::open(&path)?);
    serde_json::from_reader(reader).map_err(|e| ViewerError::malformed(&path, e.to_string()))
}

fn read_optional_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>> {
    if dir.join(format!("{}.json", name)).exists() {
        read_table(dir, name)
    } else {
        Ok(Vec::new())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Writes a one-scene mini dataset with `frames` samples and a LiDAR file
    /// reference per sample. Returns the dataset root.
    pub(crate) fn write_mini_dataset(dir: &Path, frames: usize) -> PathBuf {
        let root = dir.join("nuscenes");
        let version_dir = root.join("v1.0-mini");
        std::fs::create_dir_all(&version_dir).unwrap();

        let tokens: Vec<String> = (0..frames).map(|i| format!("sample_token_{:03}", i)).collect();
        let scenes = json!([{
            "token": "scene_a",
            "name": "scene-0061",
            "description": "Parked truck, construction, intersection",
            "nbr_samples": frames,
            "first_sample_token": tokens.first().cloned().unwrap_or_default(),
            "last_sample_token": tokens.last().cloned().unwrap_or_default(),
        }]);
        let samples: Vec<_> = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| {
                json!({
                    "token": t,
                    "timestamp": 1_532_402_927_647_951i64 + i as i64 * 500_000,
                    "prev": if i == 0 { String::new() } else { tokens[i - 1].clone() },
                    "next": tokens.get(i + 1).cloned().unwrap_or_default(),
                    "scene_token": "scene_a",
                })
            })
            .collect();
        let sample_data: Vec<_> = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| {
                json!({
                    "token": format!("sd_{:03}", i),
                    "sample_token": t,
                    "calibrated_sensor_token": "cs_lidar",
                    "filename": format!("samples/LIDAR_TOP/frame_{:03}.pcd.bin", i),
                    "is_key_frame": true,
                })
            })
            .collect();
        let calibrated = json!([{ "token": "cs_lidar", "sensor_token": "sensor_lidar" }]);
        let sensors = json!([{ "token": "sensor_lidar", "channel": "LIDAR_TOP", "modality": "lidar" }]);

        for (name, value) in [
            ("scene", scenes),
            ("sample", json!(samples)),
            ("sample_data", json!(sample_data)),
            ("calibrated_sensor", calibrated),
            ("sensor", sensors),
        ] {
            std::fs::write(version_dir.join(format!("{}.json", name)), value.to_string()).unwrap();
        }
        std::fs::create_dir_all(root.join("samples/LIDAR_TOP")).unwrap();
        root
    }

    #[test]
    fn test_open_tries_versions() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_mini_dataset(dir.path(), 4);

        let ds = NuScenes::open(&root, &["v1.0-trainval", "v1.0-mini"]).unwrap();
        assert_eq!(ds.version(), "v1.0-mini");
        assert_eq!(ds.scenes().len(), 1);
        assert_eq!(ds.scene(0).unwrap().name, "scene-0061");
    }

    #[test]
    fn test_open_missing_root() {
        let err = NuScenes::open(Path::new("/no/such/nuscenes"), &["v1.0-mini"]).unwrap_err();
        assert!(matches!(err, ViewerError::PathNotFound(_)));
    }

    #[test]
    fn test_open_no_loadable_version() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_mini_dataset(dir.path(), 2);

        let err = NuScenes::open(&root, &["v1.0-trainval", "v1.0-test"]).unwrap_err();
        match err {
            ViewerError::UnsupportedDatasetVersion { tried } => {
                assert_eq!(tried, vec!["v1.0-trainval", "v1.0-test"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sample_chain_and_lidar_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_mini_dataset(dir.path(), 3);
        let ds = NuScenes::load_version(&root, "v1.0-mini").unwrap();

        let first = ds.sample("sample_token_000").unwrap();
        assert_eq!(first.next.as_deref(), Some("sample_token_001"));
        let last = ds.sample("sample_token_002").unwrap();
        assert_eq!(last.next, None);

        let path = ds.sensor_path(first, "LIDAR_TOP").unwrap();
        assert_eq!(path, root.join("samples/LIDAR_TOP/frame_000.pcd.bin"));
        assert!(ds.sensor_path(first, "CAM_FRONT").is_none());
    }

    #[test]
    fn test_channel_from_filename() {
        assert_eq!(
            channel_from_filename("samples/LIDAR_TOP/n015.pcd.bin").as_deref(),
            Some("LIDAR_TOP")
        );
        assert_eq!(
            channel_from_filename("sweeps/RADAR_FRONT/x.pcd").as_deref(),
            Some("RADAR_FRONT")
        );
        assert_eq!(channel_from_filename("maps/x.png"), None);
    }

    #[test]
    fn test_scene_index_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_mini_dataset(dir.path(), 2);
        let ds = NuScenes::load_version(&root, "v1.0-mini").unwrap();

        assert!(matches!(
            ds.scene(1),
            Err(ViewerError::OutOfRange { index: 1, len: 1 })
        ));
    }
}
