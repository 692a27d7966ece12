//! Viewer controller: owns loaded data, display settings and playback, and
//! turns user commands into scene refreshes.
//!
//! State machine:
//! - `Idle`: no frame sequence, or tracking required by an enabled layer
//!   is missing. Frame commands only move the cursor.
//! - `Ready`: every frame change refreshes the scene.
//!
//! A failed load leaves all previously loaded state in place.

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{DisplaySettings, ViewerConfig};
use crate::dataset::{NuScenes, SampleSource, SceneRecord};
use crate::error::{Result, ViewerError};
use crate::frames::FrameIndex;
use crate::playback::{Clock, Playback, TickOutcome};
use crate::pointcloud::IntensityColormap;
use crate::scene::{FrameData, RefreshReport, SceneOrchestrator, SceneSink};
use crate::tracking::{TrackedBox, TrackingResultSet};

// ============================================================================
// COMMANDS AND NOTICES
// ============================================================================

/// Everything a user can ask the viewer to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    LoadDataset(PathBuf),
    LoadTracking(PathBuf),
    SeekFrame(usize),
    PrevFrame,
    NextFrame,
    TogglePlay,
    SetSpeed(f64),
    SetShowPointCloud(bool),
    SetShowBoxes(bool),
    SetShowTrajectories(bool),
    SetPointSize(f32),
    SetTrajectoryLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Message that a desktop viewer would show as a dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, err: &ViewerError) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Idle,
    Ready,
}

// ============================================================================
// LOADED DATA
// ============================================================================

/// A dataset with one scene's frames resolved.
#[derive(Debug)]
struct LoadedScene {
    dataset: NuScenes,
    scene_name: String,
    description: String,
    frames: FrameIndex,
}

impl LoadedScene {
    fn open(path: &Path, config: &ViewerConfig) -> Result<Self> {
        let dataset = NuScenes::open(path, &config.dataset_versions)?;
        let scene = dataset.scene(config.scene_index)?;
        let frames = FrameIndex::build(&dataset, &scene.first_sample_token)?;
        if frames.is_empty() {
            return Err(ViewerError::EmptyDataset(format!(
                "scene {} has no samples",
                scene.name
            )));
        }
        if let Some(mismatch) = chain_mismatch(scene, &frames) {
            warn!("Scene {} sample chain disagrees with scene table: {}", scene.name, mismatch);
        }
        let scene_name = scene.name.clone();
        let description = scene.description.clone();
        Ok(Self {
            dataset,
            scene_name,
            description,
            frames,
        })
    }
}

/// Compares a walked chain against the scene table's own bookkeeping.
fn chain_mismatch(scene: &SceneRecord, frames: &FrameIndex) -> Option<String> {
    if scene.nbr_samples > 0 && scene.nbr_samples != frames.len() {
        return Some(format!(
            "{} samples listed, {} reachable",
            scene.nbr_samples,
            frames.len()
        ));
    }
    let last = frames.len().checked_sub(1).and_then(|i| frames.get(i).ok())?;
    if !scene.last_sample_token.is_empty() && scene.last_sample_token != last {
        return Some(format!(
            "chain ends at {}, table says {}",
            last, scene.last_sample_token
        ));
    }
    None
}

/// Borrowed view handed to the orchestrator for one refresh.
struct FrameView<'a> {
    scene: &'a LoadedScene,
    tracking: Option<&'a TrackingResultSet>,
    lidar_channel: &'a str,
}

impl FrameData for FrameView<'_> {
    fn frame_count(&self) -> usize {
        self.scene.frames.len()
    }

    fn sample_token(&self, frame: usize) -> Option<&str> {
        self.scene.frames.get(frame).ok()
    }

    fn lidar_path(&self, frame: usize) -> Option<PathBuf> {
        let token = self.scene.frames.get(frame).ok()?;
        let sample = self.scene.dataset.sample(token)?;
        self.scene.dataset.sensor_path(sample, self.lidar_channel)
    }

    fn boxes(&self, frame: usize) -> Option<&[TrackedBox]> {
        let tracking = self.tracking?;
        Some(
            self.scene
                .frames
                .get(frame)
                .map(|token| tracking.boxes(token))
                .unwrap_or(&[]),
        )
    }
}

// ============================================================================
// VIEWER
// ============================================================================

pub struct Viewer<S: SceneSink, C: Clock> {
    config: ViewerConfig,
    settings: DisplaySettings,
    scene: Option<LoadedScene>,
    tracking: Option<TrackingResultSet>,
    current_frame: usize,
    orchestrator: SceneOrchestrator,
    playback: Playback,
    sink: S,
    clock: C,
    last_report: Option<RefreshReport>,
    notices: Vec<Notice>,
}

impl<S: SceneSink, C: Clock> Viewer<S, C> {
    pub fn new(config: ViewerConfig, settings: DisplaySettings, sink: S, clock: C) -> Self {
        let orchestrator = SceneOrchestrator::new(IntensityColormap::default(), settings.palette_size)
            .with_aspect_ratio(config.aspect_ratio());
        let playback = Playback::new(config.base_frame_interval());
        Self {
            config,
            settings,
            scene: None,
            tracking: None,
            current_frame: 0,
            orchestrator,
            playback,
            sink,
            clock,
            last_report: None,
            notices: Vec::new(),
        }
    }

    /// Replaces the orchestrator, e.g. to seed the fallback cloud.
    pub fn with_orchestrator(mut self, orchestrator: SceneOrchestrator) -> Self {
        self.orchestrator = orchestrator.with_aspect_ratio(self.config.aspect_ratio());
        self
    }

    pub fn state(&self) -> SceneState {
        let tracking_ok = !self.settings.wants_tracking() || self.tracking.is_some();
        if self.scene.is_some() && tracking_ok {
            SceneState::Ready
        } else {
            SceneState::Idle
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn frame_count(&self) -> usize {
        self.scene.as_ref().map_or(0, |s| s.frames.len())
    }

    pub fn dataset_version(&self) -> Option<&str> {
        self.scene.as_ref().map(|s| s.dataset.version())
    }

    pub fn scene_name(&self) -> Option<&str> {
        self.scene.as_ref().map(|s| s.scene_name.as_str())
    }

    pub fn tracking(&self) -> Option<&TrackingResultSet> {
        self.tracking.as_ref()
    }

    pub fn orchestrator(&self) -> &SceneOrchestrator {
        &self.orchestrator
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn last_report(&self) -> Option<&RefreshReport> {
        self.last_report.as_ref()
    }

    /// Every notice raised so far, oldest first.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn error_count(&self) -> usize {
        self.notices.iter().filter(|n| n.is_error()).count()
    }

    /// Applies one command. Returns the notice it raised, if any.
    pub fn handle(&mut self, command: ViewerCommand) -> Option<Notice> {
        let notice = match command {
            ViewerCommand::LoadDataset(path) => Some(self.load_dataset(&path)),
            ViewerCommand::LoadTracking(path) => Some(self.load_tracking(&path)),
            ViewerCommand::SeekFrame(frame) => self.seek(frame),
            ViewerCommand::PrevFrame => {
                let frame = self.current_frame.saturating_sub(1);
                self.seek(frame)
            }
            ViewerCommand::NextFrame => {
                let last = self.frame_count().saturating_sub(1);
                self.seek((self.current_frame + 1).min(last))
            }
            ViewerCommand::TogglePlay => {
                if self.state() == SceneState::Ready {
                    self.playback.toggle(&self.clock);
                } else {
                    warn!("Nothing to play, load data first");
                }
                None
            }
            ViewerCommand::SetSpeed(speed) => {
                self.playback.set_speed(speed);
                None
            }
            ViewerCommand::SetShowPointCloud(show) => {
                self.settings.show_point_cloud = show;
                self.refresh()
            }
            ViewerCommand::SetShowBoxes(show) => {
                self.settings.show_tracking_boxes = show;
                self.refresh()
            }
            ViewerCommand::SetShowTrajectories(show) => {
                self.settings.show_trajectories = show;
                self.refresh()
            }
            ViewerCommand::SetPointSize(size) => {
                self.settings.set_point_size(size);
                if let Err(e) = self.orchestrator.apply_point_size(&self.settings, &mut self.sink) {
                    warn!("Point size update failed: {}", e);
                }
                None
            }
            ViewerCommand::SetTrajectoryLength(length) => {
                self.settings.set_trajectory_length(length);
                self.refresh()
            }
        };

        if let Some(notice) = &notice {
            self.notices.push(notice.clone());
        }
        notice
    }

    /// Drives playback; refreshes when a new frame is due.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state() != SceneState::Ready {
            return TickOutcome::Stopped;
        }
        let outcome = self.playback.tick(&self.clock, self.current_frame, self.frame_count());
        if let TickOutcome::Advance(frame) = outcome {
            self.current_frame = frame;
            if let Some(notice) = self.refresh() {
                self.notices.push(notice);
            }
        }
        outcome
    }

    /// Scene-info panel text.
    pub fn info_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.scene {
            Some(scene) => {
                let total = scene.frames.len();
                lines.push(format!("Dataset: nuScenes {}", scene.dataset.version()));
                lines.push(format!("Scenes: {}", scene.dataset.scenes().len()));
                lines.push(format!("Scene: {}", scene.scene_name));
                if !scene.description.is_empty() {
                    lines.push(format!("Description: {}", scene.description));
                }
                lines.push(format!("Total frames: {}", total));
                lines.push(format!("Current frame: {}/{}", self.current_frame + 1, total));
            }
            None => lines.push("Dataset: not loaded".to_string()),
        }
        match &self.tracking {
            Some(tracking) => lines.push(format!(
                "Tracking results: loaded ({} tracks)",
                tracking.track_ids().len()
            )),
            None => lines.push("Tracking results: not loaded".to_string()),
        }
        lines
    }

    fn load_dataset(&mut self, path: &Path) -> Notice {
        match LoadedScene::open(path, &self.config) {
            Ok(scene) => {
                let message = format!(
                    "nuScenes {}: scene {} with {} frames",
                    scene.dataset.version(),
                    scene.scene_name,
                    scene.frames.len()
                );
                info!("{}", message);
                self.playback.stop();
                self.scene = Some(scene);
                self.current_frame = 0;
                self.orchestrator.clear(&mut self.sink);
                self.orchestrator.reset_camera();
                self.refresh();
                Notice::info("Dataset loaded", message)
            }
            Err(e) => {
                error!("Failed to load dataset {}: {}", path.display(), e);
                Notice::error("Failed to load dataset", &e)
            }
        }
    }

    fn load_tracking(&mut self, path: &Path) -> Notice {
        match TrackingResultSet::load(path) {
            Ok(tracking) => {
                let message = format!(
                    "{} samples, {} tracks",
                    tracking.sample_count(),
                    tracking.track_ids().len()
                );
                self.tracking = Some(tracking);
                if self.scene.is_some() {
                    self.playback.stop();
                    self.current_frame = 0;
                    self.orchestrator.reset_camera();
                    self.refresh();
                }
                Notice::info("Tracking results loaded", message)
            }
            Err(e) => {
                error!("Failed to load tracking results {}: {}", path.display(), e);
                Notice::error("Failed to load tracking results", &e)
            }
        }
    }

    fn seek(&mut self, frame: usize) -> Option<Notice> {
        let total = self.frame_count();
        if self.scene.is_none() {
            return None;
        }
        if frame >= total {
            let err = ViewerError::OutOfRange { index: frame, len: total };
            warn!("Seek rejected: {}", err);
            return Some(Notice::error("Invalid frame", &err));
        }
        self.current_frame = frame;
        self.refresh()
    }

    /// Rebuilds the scene for the current frame when `Ready`.
    fn refresh(&mut self) -> Option<Notice> {
        if self.state() != SceneState::Ready {
            // Idle shows nothing.
            if !self.orchestrator.registered().is_empty() {
                let removed = self.orchestrator.clear(&mut self.sink);
                self.last_report = None;
                info!("Scene idle, removed {} geometries", removed);
            }
            return None;
        }
        let scene = self.scene.as_ref()?;
        let view = FrameView {
            scene,
            tracking: self.tracking.as_ref(),
            lidar_channel: &self.config.lidar_channel,
        };
        match self
            .orchestrator
            .refresh(&view, self.current_frame, &self.settings, &mut self.sink)
        {
            Ok(report) => {
                self.last_report = Some(report);
                None
            }
            Err(e) => {
                warn!("Refresh of frame {} failed: {}", self.current_frame, e);
                e.is_user_facing().then(|| Notice::error("Refresh failed", &e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::write_mini_dataset;
    use crate::playback::ManualClock;
    use crate::pointcloud::tests::encode_records;
    use crate::scene::{box_name, trajectory_name, MemorySink, SinkOp, POINT_CLOUD_NAME};
    use std::collections::BTreeSet;
    use crate::tracking::tests::mock_results;
    use tempfile::TempDir;

    type TestViewer = Viewer<MemorySink, ManualClock>;

    struct Fixture {
        _dir: TempDir,
        dataset: PathBuf,
        results: PathBuf,
    }

    /// Five-frame scene, three tracks in every frame, one real LiDAR file.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_mini_dataset(dir.path(), 5);
        std::fs::write(
            dataset.join("samples/LIDAR_TOP/frame_000.pcd.bin"),
            encode_records(&[[1.0, 2.0, 3.0, 4.0, 0.0], [4.0, 5.0, 6.0, 8.0, 1.0]]),
        )
        .unwrap();
        let results = dir.path().join("results.json");
        std::fs::write(&results, mock_results(5, 3).to_string()).unwrap();
        Fixture {
            _dir: dir,
            dataset,
            results,
        }
    }

    fn viewer() -> TestViewer {
        Viewer::new(
            ViewerConfig::default(),
            DisplaySettings::default(),
            MemorySink::new(),
            ManualClock::new(),
        )
        .with_orchestrator(SceneOrchestrator::with_defaults().with_seed(7))
    }

    fn loaded(fx: &Fixture) -> TestViewer {
        let mut viewer = viewer();
        assert!(!viewer.handle(ViewerCommand::LoadDataset(fx.dataset.clone())).unwrap().is_error());
        assert!(!viewer.handle(ViewerCommand::LoadTracking(fx.results.clone())).unwrap().is_error());
        viewer
    }

    #[test]
    fn test_idle_until_tracking_loaded() {
        let fx = fixture();
        let mut viewer = viewer();
        assert_eq!(viewer.state(), SceneState::Idle);

        viewer.handle(ViewerCommand::LoadDataset(fx.dataset.clone()));
        assert_eq!(viewer.state(), SceneState::Idle);
        assert_eq!(viewer.frame_count(), 5);
        assert!(viewer.sink().is_empty());

        viewer.handle(ViewerCommand::LoadTracking(fx.results.clone()));
        assert_eq!(viewer.state(), SceneState::Ready);
        assert_eq!(viewer.current_frame(), 0);

        let report = viewer.last_report().unwrap();
        assert!(!report.used_fallback_cloud);
        assert_eq!(report.points, 2);
        assert_eq!(report.boxes, 3);
        assert!(viewer.sink().get(POINT_CLOUD_NAME).is_some());
        assert!(viewer.sink().get(&box_name(2, 2)).is_some());
        assert_eq!(viewer.sink().camera_requests(), 1);
    }

    #[test]
    fn test_point_cloud_only_is_ready_without_tracking() {
        let fx = fixture();
        let mut viewer = viewer();
        viewer.handle(ViewerCommand::SetShowBoxes(false));
        viewer.handle(ViewerCommand::SetShowTrajectories(false));
        viewer.handle(ViewerCommand::LoadDataset(fx.dataset.clone()));

        assert_eq!(viewer.state(), SceneState::Ready);
        assert_eq!(viewer.sink().len(), 1);
    }

    #[test]
    fn test_seek_and_step() {
        let fx = fixture();
        let mut viewer = loaded(&fx);

        assert!(viewer.handle(ViewerCommand::SeekFrame(3)).is_none());
        assert_eq!(viewer.current_frame(), 3);
        assert!(viewer.last_report().unwrap().used_fallback_cloud);
        assert!(viewer.sink().get(&trajectory_name(0)).is_some());

        viewer.handle(ViewerCommand::NextFrame);
        viewer.handle(ViewerCommand::NextFrame);
        assert_eq!(viewer.current_frame(), 4);

        viewer.handle(ViewerCommand::SeekFrame(0));
        viewer.handle(ViewerCommand::PrevFrame);
        assert_eq!(viewer.current_frame(), 0);
        assert!(viewer.sink().get(&trajectory_name(0)).is_none());
    }

    #[test]
    fn test_seek_out_of_range() {
        let fx = fixture();
        let mut viewer = loaded(&fx);
        viewer.handle(ViewerCommand::SeekFrame(2));

        let notice = viewer.handle(ViewerCommand::SeekFrame(5)).unwrap();
        assert!(notice.is_error());
        assert_eq!(viewer.current_frame(), 2);
    }

    #[test]
    fn test_failed_load_keeps_state() {
        let fx = fixture();
        let mut viewer = loaded(&fx);
        viewer.handle(ViewerCommand::SeekFrame(2));
        let names = viewer.sink().names();

        let notice = viewer
            .handle(ViewerCommand::LoadDataset(PathBuf::from("/no/such/dataset")))
            .unwrap();
        assert!(notice.is_error());
        assert!(notice.message.contains("Path not found"));

        let bad = fx.results.with_file_name("bad.json");
        std::fs::write(&bad, "{ \"results\": [1, 2] }").unwrap();
        assert!(viewer.handle(ViewerCommand::LoadTracking(bad)).unwrap().is_error());

        assert_eq!(viewer.state(), SceneState::Ready);
        assert_eq!(viewer.current_frame(), 2);
        assert_eq!(viewer.sink().names(), names);
        assert_eq!(viewer.tracking().unwrap().sample_count(), 5);
        assert_eq!(viewer.error_count(), 2);
    }

    #[test]
    fn test_unsupported_version_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut viewer = viewer();
        let notice = viewer
            .handle(ViewerCommand::LoadDataset(dir.path().to_path_buf()))
            .unwrap();
        assert!(notice.is_error());
        assert!(notice.message.contains("v1.0-trainval"));
        assert_eq!(viewer.state(), SceneState::Idle);
    }

    #[test]
    fn test_empty_scene_notice() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_mini_dataset(dir.path(), 0);
        let mut viewer = viewer();

        let notice = viewer.handle(ViewerCommand::LoadDataset(dataset)).unwrap();
        assert!(notice.is_error());
        assert!(notice.message.starts_with("Empty dataset"));
        assert_eq!(viewer.frame_count(), 0);
    }

    #[test]
    fn test_playback_advances_and_finishes() {
        let fx = fixture();
        let mut viewer = loaded(&fx);
        viewer.handle(ViewerCommand::SetSpeed(2.0));
        viewer.handle(ViewerCommand::TogglePlay);
        assert!(viewer.playback().is_playing());

        viewer.clock().advance_ms(20);
        assert!(matches!(viewer.tick(), TickOutcome::Waiting(_)));
        for expected in 1..5 {
            viewer.clock().advance_ms(50);
            assert_eq!(viewer.tick(), TickOutcome::Advance(expected));
            assert_eq!(viewer.last_report().unwrap().frame, expected);
        }
        viewer.clock().advance_ms(50);
        assert_eq!(viewer.tick(), TickOutcome::Finished);
        assert!(!viewer.playback().is_playing());
        assert_eq!(viewer.current_frame(), 4);
    }

    #[test]
    fn test_toggle_play_when_idle() {
        let mut viewer = viewer();
        viewer.handle(ViewerCommand::TogglePlay);
        assert!(!viewer.playback().is_playing());
        assert_eq!(viewer.tick(), TickOutcome::Stopped);
    }

    #[test]
    fn test_display_commands() {
        let fx = fixture();
        let mut viewer = loaded(&fx);

        viewer.handle(ViewerCommand::SetPointSize(25.0));
        assert_eq!(viewer.settings().point_size, 10.0);
        assert_eq!(
            viewer.sink().get(POINT_CLOUD_NAME).unwrap().material.point_size,
            10.0
        );

        viewer.handle(ViewerCommand::SetTrajectoryLength(1));
        assert_eq!(viewer.settings().trajectory_length, 5);

        viewer.handle(ViewerCommand::SetShowPointCloud(false));
        assert!(viewer.sink().get(POINT_CLOUD_NAME).is_none());
        assert_eq!(viewer.sink().len(), 3);
    }

    #[test]
    fn test_info_lines() {
        let viewer = viewer();
        assert_eq!(
            viewer.info_lines(),
            vec!["Dataset: not loaded", "Tracking results: not loaded"]
        );

        let fx = fixture();
        let mut viewer = loaded(&fx);
        viewer.handle(ViewerCommand::SeekFrame(1));
        let lines = viewer.info_lines();
        assert_eq!(lines[0], "Dataset: nuScenes v1.0-mini");
        assert_eq!(lines[1], "Scenes: 1");
        assert_eq!(lines[2], "Scene: scene-0061");
        assert_eq!(lines[3], "Description: Parked truck, construction, intersection");
        assert_eq!(lines[4], "Total frames: 5");
        assert_eq!(lines[5], "Current frame: 2/5");
        assert_eq!(lines[6], "Tracking results: loaded (3 tracks)");
    }

    fn scene_record(nbr_samples: usize, last: &str) -> SceneRecord {
        SceneRecord {
            token: "scene_token".to_string(),
            name: "scene-0061".to_string(),
            description: String::new(),
            nbr_samples,
            first_sample_token: "a".to_string(),
            last_sample_token: last.to_string(),
        }
    }

    #[test]
    fn test_chain_mismatch() {
        let frames = FrameIndex::from_tokens(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(chain_mismatch(&scene_record(3, "c"), &frames), None);
        // Older tables may omit the bookkeeping.
        assert_eq!(chain_mismatch(&scene_record(0, ""), &frames), None);

        let short = chain_mismatch(&scene_record(5, "c"), &frames).unwrap();
        assert!(short.contains("5 samples listed, 3 reachable"));
        let wrong_end = chain_mismatch(&scene_record(3, "z"), &frames).unwrap();
        assert!(wrong_end.contains("chain ends at c"));
    }

    #[test]
    fn test_turning_on_boxes_without_tracking_clears_scene() {
        let fx = fixture();
        let mut viewer = Viewer::new(
            ViewerConfig::default(),
            DisplaySettings {
                show_tracking_boxes: false,
                show_trajectories: false,
                ..DisplaySettings::default()
            },
            MemorySink::new(),
            ManualClock::new(),
        )
        .with_orchestrator(SceneOrchestrator::with_defaults().with_seed(7));

        viewer.handle(ViewerCommand::LoadDataset(fx.dataset.clone()));
        assert_eq!(viewer.state(), SceneState::Ready);
        assert_eq!(viewer.sink().names(), BTreeSet::from([POINT_CLOUD_NAME.to_string()]));

        viewer.handle(ViewerCommand::SetShowBoxes(true));
        assert_eq!(viewer.state(), SceneState::Idle);
        assert!(viewer.sink().is_empty());
        assert!(viewer.orchestrator().registered().is_empty());
        assert!(viewer.last_report().is_none());

        // Seeking while idle moves the cursor but shows nothing.
        viewer.handle(ViewerCommand::SeekFrame(4));
        assert!(viewer.sink().is_empty());

        viewer.handle(ViewerCommand::LoadTracking(fx.results.clone()));
        assert_eq!(viewer.state(), SceneState::Ready);
        assert!(viewer.sink().names().contains(&box_name(0, 0)));
        assert_eq!(viewer.sink().len(), viewer.orchestrator().registered().len());
    }

    #[test]
    fn test_seek_replaces_every_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_mini_dataset(dir.path(), 10);
        let results = dir.path().join("results.json");
        std::fs::write(&results, mock_results(10, 1).to_string()).unwrap();

        let mut viewer = viewer();
        viewer.handle(ViewerCommand::LoadDataset(dataset));
        viewer.handle(ViewerCommand::LoadTracking(results));
        assert_eq!(viewer.current_frame(), 0);
        let frame0 = viewer.sink().names();
        assert!(frame0.contains(&box_name(0, 0)));

        viewer.sink_mut().ops.clear();
        assert!(viewer.handle(ViewerCommand::SeekFrame(9)).is_none());
        assert_eq!(viewer.current_frame(), 9);

        let ops = &viewer.sink().ops;
        let first_add = ops.iter().position(|op| matches!(op, SinkOp::Add(_))).unwrap();
        let removed: BTreeSet<String> = ops[..first_add]
            .iter()
            .filter_map(|op| match op {
                SinkOp::Remove(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(removed, frame0);
        assert!(ops[first_add..].iter().all(|op| !matches!(op, SinkOp::Remove(_))));
        assert_eq!(viewer.sink().len(), viewer.orchestrator().registered().len());
    }
}
