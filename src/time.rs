//! Frame clock for the simulation loop.
//!
//! [`FrameClock::tick`] is called once per frame and yields the step size
//! and the simulation time fed to
//! [`SmokeSystem::frame`](crate::simulation::SmokeSystem::frame).
//!
//! ```ignore
//! let mut clock = FrameClock::new();
//! loop {
//!     let tick = clock.tick();
//!     smoke.frame(tick.delta, tick.time, &mut rng, &view);
//! }
//! ```

use std::time::{Duration, Instant};

/// Longest step handed to the simulation. Longer frames (window drags,
/// debugger pauses) are truncated.
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// One frame's timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Step size in seconds, scaled and clamped.
    pub delta: f32,
    /// Simulation time in seconds (sum of all deltas).
    pub time: f32,
    pub frame: u64,
}

/// Monotonic clock producing per-frame deltas.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    time: f32,
    delta: f32,
    frame: u64,
    max_delta: f32,
    fixed_delta: Option<f32>,
    time_scale: f32,
    paused: bool,
    fps: f32,
    fps_frames: u64,
    fps_since: Instant,
}

impl FrameClock {
    const FPS_WINDOW: Duration = Duration::from_millis(500);

    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            time: 0.0,
            delta: 0.0,
            frame: 0,
            max_delta: MAX_FRAME_DELTA,
            fixed_delta: None,
            time_scale: 1.0,
            paused: false,
            fps: 0.0,
            fps_frames: 0,
            fps_since: now,
        }
    }

    /// Advance to now. While paused the delta is zero and time stands still.
    pub fn tick(&mut self) -> FrameTick {
        let now = Instant::now();
        let raw = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.delta = if self.paused {
            0.0
        } else {
            self.fixed_delta.unwrap_or(raw).min(self.max_delta) * self.time_scale
        };
        self.time += self.delta;
        self.frame += 1;

        self.fps_frames += 1;
        let window = now.duration_since(self.fps_since);
        if window >= Self::FPS_WINDOW {
            self.fps = self.fps_frames as f32 / window.as_secs_f32();
            self.fps_frames = 0;
            self.fps_since = now;
        }

        FrameTick {
            delta: self.delta,
            time: self.time,
            frame: self.frame,
        }
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Frames per second over the last half second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Use a constant step instead of wall time. `None` restores wall time.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta.map(|d| d.max(0.0));
    }

    /// Clamped to be non-negative.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_max_delta(&mut self, max_delta: f32) {
        self.max_delta = max_delta.max(0.0);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
