//! GPU device and surface lifecycle: instance/adapter/device/queue
//! bring-up, surface (swapchain) configuration, per-frame texture
//! acquisition, and the recovery policy for surface errors.

mod gpu;

pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
