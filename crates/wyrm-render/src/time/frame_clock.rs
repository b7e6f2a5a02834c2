use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous frame tick, in seconds.
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,

    /// Exponentially smoothed frames-per-second estimate.
    pub fps: f32,
}

/// Frame clock producing `FrameTime` snapshots.
///
/// Delta time is clamped to avoid pathological values when the application is
/// paused by a debugger, minimized, or stalls.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
    fps: f32,
}

impl FrameClock {
    /// Creates a new clock. Ticks report at least 0.1 ms and at most 250 ms
    /// of elapsed time, whatever the wall clock did in between.
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min: Duration::from_micros(100), // 0.0001s
            dt_max: Duration::from_millis(250), // 0.25s
            fps: 0.0,
        }
    }

    /// Resets the baseline so the next tick does not see the gap.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let mut dt = now.saturating_duration_since(self.last);

        if dt < self.dt_min {
            dt = self.dt_min;
        } else if dt > self.dt_max {
            dt = self.dt_max;
        }

        self.last = now;

        let dt_s = dt.as_secs_f32();
        let inst = 1.0 / dt_s;
        self.fps = if self.fps == 0.0 {
            inst
        } else {
            self.fps * 0.95 + inst * 0.05
        };

        let ft = FrameTime {
            dt: dt_s,
            now,
            frame_index: self.frame_index,
            fps: self.fps,
        };

        self.frame_index = self.frame_index.wrapping_add(1);

        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
