//! MCTrack Viewer CLI
//!
//! Loads a nuScenes scene and MCTrack results, then shows frames through a
//! Rerun viewer (`visualization` feature) or the log, optionally driven by a
//! terminal control panel (`dashboard` feature).

use clap::Parser;
use mctrack_core::{
    DisplaySettings, NoticeLevel, SceneSink, SystemClock, TickOutcome, Viewer, ViewerCommand,
    ViewerConfig,
};
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "mctrack-viewer")]
#[command(about = "Visualize nuScenes LiDAR point clouds with MCTrack tracking results", long_about = None)]
struct Args {
    /// nuScenes dataset root [default: data/nuScenes/datasets]
    #[arg(long)]
    nuscenes_path: Option<PathBuf>,

    /// MCTrack results file [default: results/nuscenes/latest/results.json]
    #[arg(long)]
    tracking_results: Option<PathBuf>,

    /// Viewport width [default: 1920]
    #[arg(long)]
    width: Option<u32>,

    /// Viewport height [default: 1080]
    #[arg(long)]
    height: Option<u32>,

    /// Scene index within the dataset
    #[arg(long)]
    scene: Option<usize>,

    /// Frame shown after loading
    #[arg(short, long, default_value = "0")]
    frame: usize,

    /// Play through the scene after loading
    #[arg(short, long)]
    play: bool,

    /// Playback speed multiplier (0.1 - 3.0)
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Save the recording to an .rrd file instead of spawning a viewer
    #[arg(long)]
    save: Option<PathBuf>,

    /// Open the terminal control panel
    #[arg(long)]
    dashboard: bool,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn viewer_config(&self) -> mctrack_core::Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::from_file(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(path) = &self.nuscenes_path {
            config.nuscenes_path = path.clone();
        }
        if let Some(path) = &self.tracking_results {
            config.tracking_results = path.clone();
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(scene) = self.scene {
            config.scene_index = scene;
        }
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("MCTrack Viewer v{}", env!("CARGO_PKG_VERSION"));

    let config = match args.viewer_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    match serde_json::to_string(&config) {
        Ok(json) => debug!("Effective config: {}", json),
        Err(e) => debug!("Config not serializable: {}", e),
    }

    let code = run_with_backend(&args, config);
    std::process::exit(code);
}

#[cfg(feature = "visualization")]
fn run_with_backend(args: &Args, config: ViewerConfig) -> i32 {
    use mctrack_core::visualization::{RerunSink, APP_ID};

    let sink = match &args.save {
        Some(path) => RerunSink::save(APP_ID, path),
        None => RerunSink::spawn(APP_ID),
    };
    match sink {
        Ok(sink) => run(args, config, sink),
        Err(e) => {
            error!("Failed to start Rerun: {}", e);
            1
        }
    }
}

#[cfg(not(feature = "visualization"))]
fn run_with_backend(args: &Args, config: ViewerConfig) -> i32 {
    if args.save.is_some() {
        tracing::warn!("--save needs the `visualization` feature; logging geometry instead");
    }
    run(args, config, mctrack_core::LogSink::new())
}

/// Loads the data and drives the viewer; returns the process exit code.
fn run<S: SceneSink>(args: &Args, config: ViewerConfig, sink: S) -> i32 {
    let dataset = config.nuscenes_path.clone();
    let tracking = config.tracking_results.clone();
    let mut viewer = Viewer::new(config, DisplaySettings::default(), sink, SystemClock::new());

    viewer.handle(ViewerCommand::SetSpeed(args.speed));
    for command in [
        ViewerCommand::LoadDataset(dataset.clone()),
        ViewerCommand::LoadTracking(tracking.clone()),
    ] {
        if let Some(notice) = viewer.handle(command) {
            match notice.level {
                NoticeLevel::Info => info!("{}: {}", notice.title, notice.message),
                NoticeLevel::Error => error!("{}: {}", notice.title, notice.message),
            }
        }
    }
    if args.frame > 0 {
        if let Some(notice) = viewer.handle(ViewerCommand::SeekFrame(args.frame)) {
            error!("{}: {}", notice.title, notice.message);
        }
    }

    if args.dashboard {
        run_dashboard(&mut viewer, dataset, tracking);
    } else if args.play {
        play_to_end(&mut viewer);
    }

    for line in viewer.info_lines() {
        info!("{}", line);
    }

    if viewer.error_count() > 0 {
        1
    } else {
        0
    }
}

/// Headless playback until the last frame.
fn play_to_end<S: SceneSink>(viewer: &mut Viewer<S, SystemClock>) {
    viewer.handle(ViewerCommand::TogglePlay);
    loop {
        match viewer.tick() {
            TickOutcome::Waiting(remaining) => std::thread::sleep(remaining),
            TickOutcome::Advance(frame) => debug!("Frame {}", frame + 1),
            TickOutcome::Finished | TickOutcome::Stopped => break,
        }
    }
}

#[cfg(feature = "dashboard")]
fn run_dashboard<S: SceneSink>(viewer: &mut Viewer<S, SystemClock>, dataset: PathBuf, tracking: PathBuf) {
    use mctrack_core::dashboard::{ControlPanel, PanelPaths};

    let paths = PanelPaths { dataset, tracking };
    if let Err(e) = ControlPanel::new(viewer, paths).run() {
        error!("Control panel failed: {}", e);
    }
}

#[cfg(not(feature = "dashboard"))]
fn run_dashboard<S: SceneSink>(viewer: &mut Viewer<S, SystemClock>, _dataset: PathBuf, _tracking: PathBuf) {
    tracing::warn!("--dashboard needs the `dashboard` feature; playing headless instead");
    play_to_end(viewer);
}
