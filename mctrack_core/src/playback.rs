//! Frame playback driven by an injectable clock.
//!
//! Playback never sleeps or spawns. The owner calls [`Playback::tick`] from
//! its own loop and advances the frame when told to. Stopping flips a shared
//! cancellation flag, so a tick already scheduled elsewhere observes the stop.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

// ============================================================================
// CLOCKS
// ============================================================================

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

// ============================================================================
// PLAYBACK STATE
// ============================================================================

/// Result of one playback tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing
    Stopped,
    /// Too early; the next frame is due after this long
    Waiting(Duration),
    /// Show this frame next
    Advance(usize),
    /// Reached the last frame and stopped
    Finished,
}

#[derive(Debug)]
pub struct Playback {
    playing: bool,
    speed: f64,
    base_interval: Duration,
    last_advance: Duration,
    cancelled: Arc<AtomicBool>,
}

impl Playback {
    pub const SPEED_RANGE: (f64, f64) = (0.1, 3.0);
    /// nuScenes keyframes arrive at 10 Hz
    pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(base_interval: Duration) -> Self {
        Self {
            playing: false,
            speed: 1.0,
            base_interval,
            last_advance: Duration::ZERO,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing && !self.cancelled.load(Ordering::SeqCst)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Sets the speed multiplier, clamped to [0.1, 3.0]. Returns the value kept.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        let (lo, hi) = Self::SPEED_RANGE;
        self.speed = if speed.is_nan() { 1.0 } else { speed.clamp(lo, hi) };
        self.speed
    }

    /// Time between frames at the current speed.
    pub fn interval(&self) -> Duration {
        self.base_interval.div_f64(self.speed)
    }

    /// Handle that stops playback when set from elsewhere.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn start<C: Clock + ?Sized>(&mut self, clock: &C) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.playing = true;
        self.last_advance = clock.now();
        info!("Playback started at {:.1}x", self.speed);
    }

    pub fn stop(&mut self) {
        if self.playing {
            info!("Playback stopped");
        }
        self.playing = false;
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Starts or stops playback; returns whether it is now playing.
    pub fn toggle<C: Clock + ?Sized>(&mut self, clock: &C) -> bool {
        if self.is_playing() {
            self.stop();
        } else {
            self.start(clock);
        }
        self.is_playing()
    }

    /// Decides whether `current` should advance.
    pub fn tick<C: Clock + ?Sized>(&mut self, clock: &C, current: usize, total: usize) -> TickOutcome {
        if !self.is_playing() {
            self.playing = false;
            return TickOutcome::Stopped;
        }

        let elapsed = clock.now().saturating_sub(self.last_advance);
        let interval = self.interval();
        if elapsed < interval {
            return TickOutcome::Waiting(interval - elapsed);
        }

        if current + 1 >= total {
            self.stop();
            debug!("Playback reached the last frame");
            return TickOutcome::Finished;
        }

        self.last_advance = clock.now();
        TickOutcome::Advance(current + 1)
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stopped_by_default() {
        let clock = ManualClock::new();
        let mut playback = Playback::default();
        clock.advance_ms(1_000);
        assert_eq!(playback.tick(&clock, 0, 10), TickOutcome::Stopped);
    }

    #[test]
    fn test_advances_on_interval() {
        let clock = ManualClock::new();
        let mut playback = Playback::default();
        playback.start(&clock);

        clock.advance_ms(40);
        assert_eq!(
            playback.tick(&clock, 0, 10),
            TickOutcome::Waiting(Duration::from_millis(60))
        );
        clock.advance_ms(60);
        assert_eq!(playback.tick(&clock, 0, 10), TickOutcome::Advance(1));
        // Interval restarts from the advance.
        clock.advance_ms(50);
        assert!(matches!(playback.tick(&clock, 1, 10), TickOutcome::Waiting(_)));
    }

    #[test]
    fn test_speed_scales_interval() {
        let clock = ManualClock::new();
        let mut playback = Playback::default();
        assert_relative_eq!(playback.set_speed(2.0), 2.0);
        playback.start(&clock);

        clock.advance_ms(50);
        assert_eq!(playback.tick(&clock, 3, 10), TickOutcome::Advance(4));
    }

    #[test]
    fn test_speed_clamped() {
        let mut playback = Playback::default();
        assert_relative_eq!(playback.set_speed(10.0), 3.0);
        assert_relative_eq!(playback.set_speed(0.0), 0.1);
        assert_eq!(playback.interval(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_finishes_at_last_frame() {
        let clock = ManualClock::new();
        let mut playback = Playback::default();
        playback.start(&clock);

        clock.advance_ms(100);
        assert_eq!(playback.tick(&clock, 9, 10), TickOutcome::Finished);
        assert!(!playback.is_playing());
        clock.advance_ms(100);
        assert_eq!(playback.tick(&clock, 9, 10), TickOutcome::Stopped);
    }

    #[test]
    fn test_cancel_handle_stops_playback() {
        let clock = ManualClock::new();
        let mut playback = Playback::default();
        playback.start(&clock);
        let cancel = playback.cancel_handle();

        cancel.store(true, Ordering::SeqCst);
        clock.advance_ms(500);
        assert_eq!(playback.tick(&clock, 0, 10), TickOutcome::Stopped);
        assert!(!playback.is_playing());

        // Restarting clears the flag.
        assert!(playback.toggle(&clock));
        clock.advance_ms(100);
        assert_eq!(playback.tick(&clock, 0, 10), TickOutcome::Advance(1));
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
