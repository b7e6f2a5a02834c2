//! Frame timing. One `FrameClock` lives with the window; `tick()` once
//! per redraw yields the clamped delta, the frame index, and the smoothed
//! FPS the HUD shows.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
