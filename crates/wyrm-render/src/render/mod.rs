//! Frame rendering: grid cell draws into the scene and HDR bloom targets,
//! cached text, screen-space overlays, and the post-processing chain that
//! carries the result to the surface.

mod common;
mod mipmap;
mod targets;

pub(crate) mod bloom;
pub(crate) mod grid;
pub(crate) mod overlay;
pub(crate) mod post;
pub(crate) mod text;

pub(crate) use mipmap::MipmapGenerator;
pub(crate) use targets::FrameTargets;

pub use post::DebugView;
