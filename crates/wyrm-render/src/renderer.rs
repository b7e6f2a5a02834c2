//! The renderer facade the game loop talks to.
//!
//! One frame is: `start_frame`, any number of draw calls, `bloom_pass`,
//! `present`. Everything records into a single command encoder that is
//! submitted exactly once, at present. All pipelines and static buffers are
//! created in `new`; nothing is built lazily on the draw path.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::coords::{Cell, Color};
use crate::device::{Gpu, GpuFrame};
use crate::render::bloom::BloomQueue;
use crate::render::grid::{border_cells, GridRenderer};
use crate::render::overlay::OverlayRenderer;
use crate::render::post::{Compositor, PresentArgs};
use crate::render::text::TextRenderer;
use crate::render::{DebugView, FrameTargets, MipmapGenerator};

/// Scene clear color: a near-black neutral the vignette can sink into.
const SCENE_CLEAR: wgpu::Color = wgpu::Color { r: 0.05, g: 0.05, b: 0.05, a: 1.0 };

/// Static renderer options, fixed at construction.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Playfield width in cells.
    pub grid_w: u32,
    /// Playfield height in cells.
    pub grid_h: u32,
    /// Inset on each cell quad, as a fraction of the cell.
    pub cell_padding: f32,
    /// Rasterized strings kept alive in the text cache.
    pub text_cache_capacity: usize,
    /// Explicit typeface; `None` probes the system list.
    pub font_path: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            grid_w: 24,
            grid_h: 24,
            cell_padding: 0.05,
            text_cache_capacity: 128,
            font_path: None,
        }
    }
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    grid_size: (u32, u32),

    targets: FrameTargets,
    mips: MipmapGenerator,
    grid: GridRenderer,
    text: TextRenderer,
    overlay: OverlayRenderer,
    bloom: BloomQueue,
    post: Compositor,

    frame: Option<GpuFrame>,

    /// Luma cutoff for the bright pass.
    pub bloom_threshold: f32,
    /// RGB multiplier applied to glowing cells before HDR accumulation.
    pub bloom_gain: f32,
    /// Kawase blur instead of Gaussian.
    pub use_kawase: bool,
    pub exposure: f32,
    /// Lens-dirt modulation strength in the composite.
    pub dirt_strength: f32,
    pub chroma_enabled: bool,
    /// Maximum chromatic aberration offset, in uv units.
    pub chroma_amount: f32,
    /// Falloff exponent of the aberration toward the screen edges.
    pub chroma_bias: f32,
    pub debug_view: DebugView,
}

impl Renderer {
    /// Builds every pipeline, target, sampler and static buffer up front.
    /// Fails only when no usable typeface exists.
    pub fn new(gpu: &Gpu, config: &RendererConfig) -> Result<Self> {
        let device = gpu.device().clone();
        let queue = gpu.queue().clone();
        let size = gpu.size();
        let format = gpu.surface_format();

        let targets = FrameTargets::new(&device, &queue, format, size.width, size.height);
        let mips = MipmapGenerator::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb);
        let grid = GridRenderer::new(
            &device,
            format,
            config.grid_w,
            config.grid_h,
            config.cell_padding,
        );
        let text = TextRenderer::new(
            &device,
            &queue,
            format,
            config.text_cache_capacity,
            config.font_path.as_deref(),
            size.width,
            size.height,
        )?;
        let overlay = OverlayRenderer::new(&device, &queue, format, size.width, size.height);
        let post = Compositor::new(&device, &targets);

        Ok(Self {
            device,
            queue,
            grid_size: (config.grid_w, config.grid_h),
            targets,
            mips,
            grid,
            text,
            overlay,
            bloom: BloomQueue::new(),
            post,
            frame: None,
            bloom_threshold: 0.85,
            bloom_gain: 1.4,
            use_kawase: true,
            exposure: 1.0,
            dirt_strength: 1.0,
            chroma_enabled: true,
            chroma_amount: 0.02,
            chroma_bias: 1.0,
            debug_view: DebugView::Off,
        })
    }

    // ── frame lifecycle ───────────────────────────────────────────────────

    /// Acquires the next surface frame, clears the scene target and resets
    /// the per-frame arenas. On error, route the value through
    /// [`Gpu::handle_surface_error`] and skip the frame unless it is fatal.
    pub fn start_frame(&mut self, gpu: &Gpu) -> Result<(), wgpu::SurfaceError> {
        let mut frame = gpu.begin_frame()?;

        frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("wyrm scene clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.targets.scene.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(SCENE_CLEAR),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        self.grid.begin_frame();
        self.text.begin_frame();
        self.overlay.begin_frame();
        self.frame = Some(frame);
        Ok(())
    }

    /// Replays everything queued for glow into the HDR bloom target. Runs
    /// every frame so the target never carries stale light; the queue is
    /// emptied even when no frame is open.
    pub fn bloom_pass(&mut self) {
        let groups = self.bloom.take_groups();
        let Some(frame) = self.frame.as_mut() else { return };
        self.grid.draw_bloom_groups(
            &self.queue,
            &mut frame.encoder,
            &self.targets.bloom.view,
            &groups,
        );
    }

    /// Runs the post chain, submits the frame's commands once and presents
    /// the surface. Without an open frame this is a no-op.
    pub fn present(&mut self, bloom: bool, bloom_strength: f32, bloom_radius: f32) {
        let Some(frame) = self.frame.take() else { return };
        let GpuFrame { surface_texture, view, mut encoder } = frame;

        let args = PresentArgs {
            bloom,
            strength: bloom_strength,
            radius: bloom_radius,
            threshold: self.bloom_threshold,
            use_kawase: self.use_kawase,
            exposure: self.exposure,
            dirt_strength: self.dirt_strength,
            chroma_enabled: self.chroma_enabled,
            chroma_amount: self.chroma_amount,
            chroma_bias: self.chroma_bias,
            debug: self.debug_view,
        };
        self.post
            .record_present(&self.queue, &mut encoder, &self.targets, &view, &args);

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
    }

    // ── scene draws ───────────────────────────────────────────────────────

    /// Draws the snake body and queues it for bloom with `bloom_gain`
    /// applied. `shake` jitters each segment by up to that many cells per
    /// axis. An empty body draws nothing and queues nothing.
    pub fn draw_snake(&mut self, segments: &[Cell], color: Color, shake: f32) {
        if segments.is_empty() {
            return;
        }
        let Some(frame) = self.frame.as_mut() else { return };
        self.grid.draw_cells(
            &self.queue,
            &mut frame.encoder,
            &self.targets.scene.view,
            segments,
            color.to_array(),
            shake,
        );
        self.bloom
            .push_cells(segments, color.boosted(self.bloom_gain).to_array());
    }

    /// Draws the apple cell; apples glow and shake like the snake does.
    pub fn draw_apple(&mut self, cell: Cell, color: Color, shake: f32) {
        let Some(frame) = self.frame.as_mut() else { return };
        self.grid.draw_cells(
            &self.queue,
            &mut frame.encoder,
            &self.targets.scene.view,
            &[cell],
            color.to_array(),
            shake,
        );
        self.bloom
            .push_cells(&[cell], color.boosted(self.bloom_gain).to_array());
    }

    /// Draws a border ring of `thickness` cells into the scene. Border
    /// cells never glow.
    pub fn draw_border(&mut self, thickness: u32, color: Color) {
        if thickness == 0 {
            return;
        }
        let cells = border_cells(self.grid_size.0, self.grid_size.1, thickness);
        let Some(frame) = self.frame.as_mut() else { return };
        self.grid.draw_cells(
            &self.queue,
            &mut frame.encoder,
            &self.targets.scene.view,
            &cells,
            color.to_array(),
            0.0,
        );
    }

    // ── overlay draws ─────────────────────────────────────────────────────

    /// Rounded rectangle in logical pixels, top-left origin.
    pub fn draw_rect(&mut self, pos: (f32, f32), size: (f32, f32), color: Color, radius: f32) {
        let Some(frame) = self.frame.as_mut() else { return };
        self.overlay.draw_rect(
            &self.queue,
            &mut frame.encoder,
            &self.targets.scene.view,
            pos,
            size,
            color.to_array(),
            radius,
        );
    }

    /// Blends a flat color over the whole scene.
    pub fn draw_tint(&mut self, color: Color) {
        let Some(frame) = self.frame.as_mut() else { return };
        self.overlay.draw_tint(
            &self.queue,
            &mut frame.encoder,
            &self.targets.scene.view,
            color.to_array(),
        );
    }

    /// Radial edge darkening; 5.0 is the usual intensity.
    pub fn draw_vignette(&mut self, intensity: f32) {
        let Some(frame) = self.frame.as_mut() else { return };
        self.overlay.draw_vignette(
            &self.queue,
            &mut frame.encoder,
            &self.targets.scene.view,
            intensity,
        );
    }

    /// Draws `text` at `pos` in logical pixels; `size` is the line height
    /// in pixels and `color` is baked in at rasterization time.
    pub fn draw_text(&mut self, text: &str, pos: (f32, f32), size: u32, color: Color) {
        let Some(frame) = self.frame.as_mut() else { return };
        self.text.draw(
            &self.device,
            &self.queue,
            &mut frame.encoder,
            &self.targets.scene.view,
            &self.mips,
            text,
            size,
            color.to_bytes(),
            pos,
        );
    }

    // ── out-of-band ───────────────────────────────────────────────────────

    /// Pixel width `text` occupies at `size`, without drawing it.
    pub fn text_width(&mut self, text: &str, size: u32) -> u32 {
        self.text.measure(text, size).0
    }

    /// Pixel height `text` occupies at `size`, without drawing it.
    pub fn text_height(&mut self, text: &str, size: u32) -> u32 {
        self.text.measure(text, size).1
    }

    /// Destroys every cached text texture.
    pub fn clear_text_cache(&mut self) {
        self.text.clear();
    }

    /// Rebuilds the offscreen targets for a new surface size. Call after
    /// the device layer has reconfigured the surface.
    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.targets.resize(&self.device, width, height);
        self.text.set_screen_size(&self.queue, width, height);
        self.overlay.set_screen_size(&self.queue, width, height);
    }

    /// Loads a lens-dirt image into the composite. Idempotent per path;
    /// failure logs once and the composite runs without dirt.
    pub fn set_dirt(&mut self, path: impl AsRef<Path>) {
        self.post
            .set_dirt(&self.device, &self.queue, &mut self.targets, &self.mips, path.as_ref());
    }
}
