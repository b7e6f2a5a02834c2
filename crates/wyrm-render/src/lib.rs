//! Wyrm render crate.
//!
//! Owns the platform + GPU pieces of the game: device management, the grid
//! cell renderer, the cached text renderer, the bloom/post-processing chain
//! and the facade (`Renderer`) the game loop talks to.

pub mod device;
pub mod time;

pub mod logging;
pub mod coords;
pub mod render;

mod renderer;

pub use render::DebugView;
pub use renderer::{Renderer, RendererConfig};
