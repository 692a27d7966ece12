//! MCTrack Viewer TUI Control Panel
//! ================================
//!
//! Terminal control panel standing in for the desktop side panel.
//! Uses Ratatui for rendering and Crossterm for input.
//!
//! Enable with the `dashboard` feature flag.
//!
//! Features:
//! - Timeline gauge (current frame / total)
//! - Layer toggles and material settings
//! - Scene info and notice log
//! - Key bindings mapped to viewer commands; the input poll drives playback

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame, Terminal,
};

use crate::controller::{NoticeLevel, Viewer, ViewerCommand};
use crate::playback::Clock;
use crate::scene::SceneSink;

/// Input poll timeout; also the playback tick period.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

const POINT_SIZE_STEP: f32 = 0.5;
const TRAJECTORY_LENGTH_STEP: usize = 5;
const SPEED_STEP: f64 = 0.25;
const NOTICE_LOG_LEN: usize = 8;

const KEY_HELP: &str = "space play/pause  ←/→ step  home/end jump  p/b/t layers  \
                        +/- point size  [/] trail  </> speed  d/r reload  q quit";

// =============================================================================
// KEY BINDINGS
// =============================================================================

/// What a key press asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Quit,
    Command(ViewerCommand),
    Ignore,
}

/// Maps a key to an action given the viewer's current state.
pub fn command_for_key<S: SceneSink, C: Clock>(
    code: KeyCode,
    viewer: &Viewer<S, C>,
    paths: &PanelPaths,
) -> KeyAction {
    let settings = viewer.settings();
    let command = match code {
        KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
        KeyCode::Char(' ') => ViewerCommand::TogglePlay,
        KeyCode::Left => ViewerCommand::PrevFrame,
        KeyCode::Right => ViewerCommand::NextFrame,
        KeyCode::Home => ViewerCommand::SeekFrame(0),
        KeyCode::End => ViewerCommand::SeekFrame(viewer.frame_count().saturating_sub(1)),
        KeyCode::Char('p') => ViewerCommand::SetShowPointCloud(!settings.show_point_cloud),
        KeyCode::Char('b') => ViewerCommand::SetShowBoxes(!settings.show_tracking_boxes),
        KeyCode::Char('t') => ViewerCommand::SetShowTrajectories(!settings.show_trajectories),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            ViewerCommand::SetPointSize(settings.point_size + POINT_SIZE_STEP)
        }
        KeyCode::Char('-') => ViewerCommand::SetPointSize(settings.point_size - POINT_SIZE_STEP),
        KeyCode::Char(']') => {
            ViewerCommand::SetTrajectoryLength(settings.trajectory_length + TRAJECTORY_LENGTH_STEP)
        }
        KeyCode::Char('[') => ViewerCommand::SetTrajectoryLength(
            settings.trajectory_length.saturating_sub(TRAJECTORY_LENGTH_STEP),
        ),
        KeyCode::Char('>') | KeyCode::Char('.') => {
            ViewerCommand::SetSpeed(viewer.playback().speed() + SPEED_STEP)
        }
        KeyCode::Char('<') | KeyCode::Char(',') => {
            ViewerCommand::SetSpeed(viewer.playback().speed() - SPEED_STEP)
        }
        KeyCode::Char('d') => ViewerCommand::LoadDataset(paths.dataset.clone()),
        KeyCode::Char('r') => ViewerCommand::LoadTracking(paths.tracking.clone()),
        _ => return KeyAction::Ignore,
    };
    KeyAction::Command(command)
}

/// Files the reload keys point at.
#[derive(Debug, Clone)]
pub struct PanelPaths {
    pub dataset: PathBuf,
    pub tracking: PathBuf,
}

// =============================================================================
// CONTROL PANEL
// =============================================================================

pub struct ControlPanel<'a, S: SceneSink, C: Clock> {
    viewer: &'a mut Viewer<S, C>,
    paths: PanelPaths,
}

impl<'a, S: SceneSink, C: Clock> ControlPanel<'a, S, C> {
    pub fn new(viewer: &'a mut Viewer<S, C>, paths: PanelPaths) -> Self {
        Self { viewer, paths }
    }

    /// Run the TUI main loop (blocks until 'q' pressed)
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        loop {
            self.viewer.tick();
            terminal.draw(|f| self.ui(f))?;

            if event::poll(POLL_INTERVAL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match command_for_key(key.code, self.viewer, &self.paths) {
                        KeyAction::Quit => return Ok(()),
                        KeyAction::Command(command) => {
                            self.viewer.handle(command);
                        }
                        KeyAction::Ignore => {}
                    }
                }
            }
        }
    }

    fn ui(&self, f: &mut Frame) {
        let viewer = &*self.viewer;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(3), // Timeline
                Constraint::Length(8), // Toggles + info
                Constraint::Min(4),    // Notices
                Constraint::Length(1), // Key help
            ])
            .split(f.area());

        // === HEADER ===
        let (play_text, play_color) = if viewer.playback().is_playing() {
            ("▶ PLAYING", Color::Green)
        } else {
            ("⏸ PAUSED", Color::Yellow)
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled("MCTrack Viewer", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  |  "),
            Span::styled(play_text, Style::default().fg(play_color)),
            Span::raw("  |  "),
            Span::styled(
                format!("{:.2}x", viewer.playback().speed()),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  |  "),
            Span::raw(viewer.scene_name().unwrap_or("no scene").to_string()),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));
        f.render_widget(header, chunks[0]);

        // === TIMELINE ===
        let total = viewer.frame_count();
        let ratio = if total == 0 {
            0.0
        } else {
            (viewer.current_frame() + 1) as f64 / total as f64
        };
        let timeline = Gauge::default()
            .block(Block::default().title("Frame").borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(ratio.clamp(0.0, 1.0))
            .label(if total == 0 {
                "-".to_string()
            } else {
                format!("{}/{}", viewer.current_frame() + 1, total)
            });
        f.render_widget(timeline, chunks[1]);

        // === TOGGLES + INFO ===
        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[2]);

        let settings = viewer.settings();
        let checkbox = |on: bool| if on { "[x]" } else { "[ ]" };
        let toggles = Paragraph::new(vec![
            Line::from(format!("{} Point cloud", checkbox(settings.show_point_cloud))),
            Line::from(format!("{} Tracking boxes", checkbox(settings.show_tracking_boxes))),
            Line::from(format!("{} Trajectories", checkbox(settings.show_trajectories))),
            Line::from(format!("Point size: {:.1}", settings.point_size)),
            Line::from(format!("Trail length: {}", settings.trajectory_length)),
        ])
        .block(Block::default().title("Display").borders(Borders::ALL));
        f.render_widget(toggles, middle[0]);

        let info: Vec<Line> = viewer.info_lines().into_iter().map(Line::from).collect();
        let info = Paragraph::new(info)
            .style(Style::default().fg(Color::Cyan))
            .block(Block::default().title("Scene Info").borders(Borders::ALL));
        f.render_widget(info, middle[1]);

        // === NOTICES ===
        let items: Vec<ListItem> = viewer
            .notices()
            .iter()
            .rev()
            .take(NOTICE_LOG_LEN)
            .map(|notice| {
                let color = match notice.level {
                    NoticeLevel::Info => Color::Green,
                    NoticeLevel::Error => Color::Red,
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{}: ", notice.title),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(notice.message.clone()),
                ]))
            })
            .collect();
        let notices = List::new(items).block(Block::default().title("Notices").borders(Borders::ALL));
        f.render_widget(notices, chunks[3]);

        // === KEY HELP ===
        let footer = Paragraph::new(KEY_HELP).style(Style::default().fg(Color::DarkGray));
        f.render_widget(footer, chunks[4]);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DisplaySettings, ViewerConfig};
    use crate::playback::ManualClock;
    use crate::scene::MemorySink;

    fn viewer() -> Viewer<MemorySink, ManualClock> {
        Viewer::new(
            ViewerConfig::default(),
            DisplaySettings::default(),
            MemorySink::new(),
            ManualClock::new(),
        )
    }

    fn paths() -> PanelPaths {
        PanelPaths {
            dataset: PathBuf::from("data/nuScenes/datasets"),
            tracking: PathBuf::from("results.json"),
        }
    }

    #[test]
    fn test_quit_keys() {
        let viewer = viewer();
        assert_eq!(command_for_key(KeyCode::Char('q'), &viewer, &paths()), KeyAction::Quit);
        assert_eq!(command_for_key(KeyCode::Esc, &viewer, &paths()), KeyAction::Quit);
        assert_eq!(command_for_key(KeyCode::Char('z'), &viewer, &paths()), KeyAction::Ignore);
    }

    #[test]
    fn test_toggle_keys_flip_current_settings() {
        let mut viewer = viewer();
        assert_eq!(
            command_for_key(KeyCode::Char('p'), &viewer, &paths()),
            KeyAction::Command(ViewerCommand::SetShowPointCloud(false))
        );

        viewer.handle(ViewerCommand::SetShowPointCloud(false));
        assert_eq!(
            command_for_key(KeyCode::Char('p'), &viewer, &paths()),
            KeyAction::Command(ViewerCommand::SetShowPointCloud(true))
        );
    }

    #[test]
    fn test_step_keys() {
        let viewer = viewer();
        assert_eq!(
            command_for_key(KeyCode::Char('+'), &viewer, &paths()),
            KeyAction::Command(ViewerCommand::SetPointSize(2.5))
        );
        assert_eq!(
            command_for_key(KeyCode::Char('['), &viewer, &paths()),
            KeyAction::Command(ViewerCommand::SetTrajectoryLength(15))
        );
        assert_eq!(
            command_for_key(KeyCode::Char('>'), &viewer, &paths()),
            KeyAction::Command(ViewerCommand::SetSpeed(1.25))
        );
        assert_eq!(
            command_for_key(KeyCode::End, &viewer, &paths()),
            KeyAction::Command(ViewerCommand::SeekFrame(0))
        );
    }

    #[test]
    fn test_reload_keys_use_panel_paths() {
        let viewer = viewer();
        assert_eq!(
            command_for_key(KeyCode::Char('r'), &viewer, &paths()),
            KeyAction::Command(ViewerCommand::LoadTracking(PathBuf::from("results.json")))
        );
    }
}
