//! Coordinate and color types shared across the renderer and the game.
//!
//! Canonical CPU spaces:
//! - Grid cells: integer coordinates, origin top-left, +X right, +Y down.
//! - Overlay geometry: logical pixels, origin top-left, +Y down.
//!
//! Shaders convert to NDC using per-pipeline uniforms.

mod cell;
mod color;

pub use cell::Cell;
pub use color::Color;
