//! Post-processing: bright-pass extraction, the half-resolution blur chain
//! (Kawase or separable Gaussian), lens-dirt composite with tone mapping,
//! chromatic aberration, and the debug taps into intermediate targets.
//!
//! Every pass gets its own pre-created uniform buffer, so all parameter
//! writes for a frame can land before any pass plays back.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::common::{fullscreen_pipeline, params_bind_group_layout, PARAMS_SIZE};
use super::mipmap::{mip_level_count, MipmapGenerator};
use super::targets::{FrameTargets, RenderTex};

/// Which image reaches the screen. `Off` runs the normal present path; the
/// rest bypass it and blit one intermediate target instead. The blur taps
/// show whatever the previous bloom frame left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugView {
    #[default]
    Off,
    /// HDR bloom accumulation target.
    Bloom,
    /// Bright-pass output (half resolution).
    Bright,
    /// After the horizontal blur pass.
    BlurH,
    /// After the vertical blur pass.
    BlurV,
    /// Final blurred result fed to the composite.
    BlurFinal,
}

/// Which half-resolution target holds the blur result going into the
/// composite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HalfBuf {
    Ping,
    Pong,
}

/// Route a frame takes to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PresentPath {
    Debug(DebugView),
    /// Bloom disabled: scene straight to the surface.
    Direct { chroma: bool },
    /// Full bloom chain, then to the surface.
    Bloom { chroma: bool },
}

/// Debug bypass wins over everything; chroma only counts when it is both
/// enabled and visibly nonzero.
fn select_path(
    debug: DebugView,
    bloom: bool,
    chroma_enabled: bool,
    chroma_amount: f32,
) -> PresentPath {
    if debug != DebugView::Off {
        return PresentPath::Debug(debug);
    }
    let chroma = chroma_enabled && chroma_amount > 0.0;
    if bloom {
        PresentPath::Bloom { chroma }
    } else {
        PresentPath::Direct { chroma }
    }
}

/// A dirt path is uploaded at most once; a path that failed to decode is
/// remembered and not retried until a different path is requested.
fn dirt_needs_load(loaded: Option<&Path>, failed: Option<&Path>, path: &Path) -> bool {
    loaded != Some(path) && failed != Some(path)
}

// ── pass parameters ───────────────────────────────────────────────────────

/// One vec4 uniform buffer with its bind group, owned by a single pass so
/// per-frame writes never alias.
struct PassParams {
    ubo: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

fn pass_params(
    device: &wgpu::Device,
    label: &str,
    bgl: &wgpu::BindGroupLayout,
) -> PassParams {
    let ubo = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: PARAMS_SIZE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: bgl,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: ubo.as_entire_binding(),
        }],
    });
    PassParams { ubo, bind_group }
}

// ── compositor ────────────────────────────────────────────────────────────

/// Per-present tunables, snapshotted from the renderer's public fields.
pub(crate) struct PresentArgs {
    pub bloom: bool,
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
    pub use_kawase: bool,
    pub exposure: f32,
    pub dirt_strength: f32,
    pub chroma_enabled: bool,
    pub chroma_amount: f32,
    pub chroma_bias: f32,
    pub debug: DebugView,
}

pub(crate) struct Compositor {
    blit_pipeline: wgpu::RenderPipeline,
    bright_pipeline: wgpu::RenderPipeline,
    kawase_pipeline: wgpu::RenderPipeline,
    /// `None` when the device rejected the pipeline; the blur stage then
    /// degrades to passing the bright output through unblurred.
    gaussian_pipeline: Option<wgpu::RenderPipeline>,
    composite_pipeline: wgpu::RenderPipeline,
    chroma_pipeline: wgpu::RenderPipeline,

    bright: PassParams,
    kawase: [PassParams; 3],
    gaussian: [PassParams; 6],
    composite: PassParams,
    chroma: PassParams,

    dirt_path: Option<PathBuf>,
    dirt_failed: Option<PathBuf>,
    last_blur: HalfBuf,
}

impl Compositor {
    pub fn new(device: &wgpu::Device, targets: &FrameTargets) -> Self {
        let module = |label: &str, src: &'static str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(src.into()),
            })
        };
        let blit_shader = module("wyrm blit shader", include_str!("shaders/blit.wgsl"));
        let bright_shader = module("wyrm bright shader", include_str!("shaders/bright.wgsl"));
        let kawase_shader = module("wyrm kawase shader", include_str!("shaders/kawase.wgsl"));
        let composite_shader =
            module("wyrm composite shader", include_str!("shaders/composite.wgsl"));
        let chroma_shader = module("wyrm chroma shader", include_str!("shaders/chroma.wgsl"));

        let params_bgl = params_bind_group_layout(device, "wyrm post params bgl", false);

        let blit_pipeline = fullscreen_pipeline(
            device,
            "wyrm blit pipeline",
            &blit_shader,
            &[&targets.tex_bgl],
            targets.format,
            None,
        );
        let bright_pipeline = fullscreen_pipeline(
            device,
            "wyrm bright pipeline",
            &bright_shader,
            &[&targets.tex_bgl, &params_bgl],
            targets.format,
            None,
        );
        let kawase_pipeline = fullscreen_pipeline(
            device,
            "wyrm kawase pipeline",
            &kawase_shader,
            &[&targets.tex_bgl, &params_bgl],
            targets.format,
            None,
        );

        // Scope covers both the module compile and the pipeline build.
        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let gaussian_shader =
            module("wyrm gaussian shader", include_str!("shaders/gaussian.wgsl"));
        let gaussian_candidate = fullscreen_pipeline(
            device,
            "wyrm gaussian pipeline",
            &gaussian_shader,
            &[&targets.tex_bgl, &params_bgl],
            targets.format,
            None,
        );
        let gaussian_pipeline = match pollster::block_on(error_scope.pop()) {
            None => Some(gaussian_candidate),
            Some(err) => {
                log::warn!("gaussian blur unavailable, bright pass will go unblurred: {err}");
                None
            }
        };

        let composite_pipeline = fullscreen_pipeline(
            device,
            "wyrm composite pipeline",
            &composite_shader,
            &[&targets.composite_bgl, &params_bgl],
            targets.format,
            None,
        );
        let chroma_pipeline = fullscreen_pipeline(
            device,
            "wyrm chroma pipeline",
            &chroma_shader,
            &[&targets.tex_bgl, &params_bgl],
            targets.format,
            None,
        );

        let bright = pass_params(device, "wyrm bright params", &params_bgl);
        let kawase: [PassParams; 3] = std::array::from_fn(|i| {
            pass_params(device, &format!("wyrm kawase params {i}"), &params_bgl)
        });
        let gaussian: [PassParams; 6] = std::array::from_fn(|i| {
            pass_params(device, &format!("wyrm gaussian params {i}"), &params_bgl)
        });
        let composite = pass_params(device, "wyrm composite params", &params_bgl);
        let chroma = pass_params(device, "wyrm chroma params", &params_bgl);

        Self {
            blit_pipeline,
            bright_pipeline,
            kawase_pipeline,
            gaussian_pipeline,
            composite_pipeline,
            chroma_pipeline,
            bright,
            kawase,
            gaussian,
            composite,
            chroma,
            dirt_path: None,
            dirt_failed: None,
            last_blur: HalfBuf::Ping,
        }
    }

    /// Records everything between the scene draws and the surface: either a
    /// debug blit, a plain present, or the full bloom chain.
    pub fn record_present(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: &FrameTargets,
        surface_view: &wgpu::TextureView,
        args: &PresentArgs,
    ) {
        match select_path(args.debug, args.bloom, args.chroma_enabled, args.chroma_amount) {
            PresentPath::Debug(view) => {
                // `Off` never selects the debug path.
                let input = match view {
                    DebugView::Bloom => &targets.bloom_bg,
                    DebugView::BlurH => &targets.small_pong_bg,
                    _ => &targets.small_ping_bg,
                };
                run_pass(
                    encoder,
                    "wyrm debug blit",
                    surface_view,
                    wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    &self.blit_pipeline,
                    input,
                    None,
                );
            }
            PresentPath::Direct { chroma } => {
                self.to_surface(queue, encoder, targets, &targets.scene_bg, surface_view, chroma, args);
            }
            PresentPath::Bloom { chroma } => {
                self.record_bloom_chain(queue, encoder, targets, args);
                self.to_surface(queue, encoder, targets, &targets.pong_bg, surface_view, chroma, args);
            }
        }
    }

    fn record_bloom_chain(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: &FrameTargets,
        args: &PresentArgs,
    ) {
        // Stage 1: clear both half-res targets so stale blur never leaks in.
        clear_pass(encoder, "wyrm half clear (ping)", &targets.small_ping.view);
        clear_pass(encoder, "wyrm half clear (pong)", &targets.small_pong.view);

        // Stage 2: threshold the HDR accumulation down into half-ping.
        queue.write_buffer(
            &self.bright.ubo,
            0,
            bytemuck::bytes_of(&[args.threshold, 0.0, 0.0, 0.0f32]),
        );
        run_pass(
            encoder,
            "wyrm bright pass",
            &targets.small_ping.view,
            wgpu::LoadOp::Load,
            &self.bright_pipeline,
            &targets.bloom_bg,
            Some(&self.bright.bind_group),
        );

        // Stage 3: blur, ping-ponging between the half-res targets.
        let texel = [1.0 / targets.half.0 as f32, 1.0 / targets.half.1 as f32];
        if args.use_kawase {
            const OFFSETS: [f32; 3] = [1.0, 2.0, 4.0];
            for (params, offset) in self.kawase.iter().zip(OFFSETS) {
                queue.write_buffer(
                    &params.ubo,
                    0,
                    bytemuck::bytes_of(&[offset, texel[0], texel[1], 0.0f32]),
                );
            }
            let mut src_is_ping = true;
            for params in &self.kawase {
                let (src_bg, dst) = if src_is_ping {
                    (&targets.small_ping_bg, &targets.small_pong.view)
                } else {
                    (&targets.small_pong_bg, &targets.small_ping.view)
                };
                run_pass(
                    encoder,
                    "wyrm kawase pass",
                    dst,
                    wgpu::LoadOp::Load,
                    &self.kawase_pipeline,
                    src_bg,
                    Some(&params.bind_group),
                );
                src_is_ping = !src_is_ping;
            }
            // Odd pass count: the result sits in pong.
            self.last_blur = HalfBuf::Pong;
        } else if let Some(gaussian_pipeline) = &self.gaussian_pipeline {
            for i in 0..3 {
                let radius = args.radius * (1.0 + i as f32 * 0.6);
                queue.write_buffer(
                    &self.gaussian[i * 2].ubo,
                    0,
                    bytemuck::bytes_of(&[texel[0], 0.0, radius, 0.0f32]),
                );
                queue.write_buffer(
                    &self.gaussian[i * 2 + 1].ubo,
                    0,
                    bytemuck::bytes_of(&[0.0, texel[1], radius, 0.0f32]),
                );
            }
            for i in 0..3 {
                run_pass(
                    encoder,
                    "wyrm gaussian h",
                    &targets.small_pong.view,
                    wgpu::LoadOp::Load,
                    gaussian_pipeline,
                    &targets.small_ping_bg,
                    Some(&self.gaussian[i * 2].bind_group),
                );
                run_pass(
                    encoder,
                    "wyrm gaussian v",
                    &targets.small_ping.view,
                    wgpu::LoadOp::Load,
                    gaussian_pipeline,
                    &targets.small_pong_bg,
                    Some(&self.gaussian[i * 2 + 1].bind_group),
                );
            }
            self.last_blur = HalfBuf::Ping;
        } else {
            // Degraded: the bright output in ping feeds the composite as-is.
            self.last_blur = HalfBuf::Ping;
        }

        // Stage 4: composite scene + blur + dirt into full-res pong.
        queue.write_buffer(
            &self.composite.ubo,
            0,
            bytemuck::bytes_of(&[
                args.strength,
                args.exposure,
                if targets.has_dirt() { 1.0 } else { 0.0 },
                args.dirt_strength,
            ]),
        );
        let composite_in = match self.last_blur {
            HalfBuf::Ping => &targets.composite_in_ping,
            HalfBuf::Pong => &targets.composite_in_pong,
        };
        run_pass(
            encoder,
            "wyrm composite pass",
            &targets.pong.view,
            wgpu::LoadOp::Load,
            &self.composite_pipeline,
            composite_in,
            Some(&self.composite.bind_group),
        );
    }

    /// Stage 5 (and the whole of the direct path): one pass onto the
    /// surface, through the chroma shader or the plain blit.
    #[allow(clippy::too_many_arguments)]
    fn to_surface(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: &FrameTargets,
        input: &wgpu::BindGroup,
        surface_view: &wgpu::TextureView,
        chroma: bool,
        args: &PresentArgs,
    ) {
        if chroma {
            queue.write_buffer(
                &self.chroma.ubo,
                0,
                bytemuck::bytes_of(&[
                    args.chroma_amount,
                    args.chroma_bias,
                    targets.size.0 as f32,
                    targets.size.1 as f32,
                ]),
            );
            run_pass(
                encoder,
                "wyrm chroma pass",
                surface_view,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                &self.chroma_pipeline,
                input,
                Some(&self.chroma.bind_group),
            );
        } else {
            run_pass(
                encoder,
                "wyrm present blit",
                surface_view,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                &self.blit_pipeline,
                input,
                None,
            );
        }
    }

    /// Loads a lens-dirt image and swaps it into the composite inputs. A
    /// repeated path (loaded or failed) is a no-op; a decode failure clears
    /// the dirt slot and logs once.
    pub fn set_dirt(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        targets: &mut FrameTargets,
        mips: &MipmapGenerator,
        path: &Path,
    ) {
        if !dirt_needs_load(self.dirt_path.as_deref(), self.dirt_failed.as_deref(), path) {
            return;
        }
        match load_dirt(device, queue, mips, path) {
            Ok(tex) => {
                targets.set_dirt_texture(device, Some(tex));
                self.dirt_path = Some(path.to_owned());
                self.dirt_failed = None;
            }
            Err(err) => {
                log::warn!("lens dirt disabled: {err:#}");
                targets.set_dirt_texture(device, None);
                self.dirt_path = None;
                self.dirt_failed = Some(path.to_owned());
            }
        }
    }
}

/// Decodes `path`, uploads it as RGBA8 sRGB with a full mip chain, and
/// submits the mip generation on its own encoder.
fn load_dirt(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    mips: &MipmapGenerator,
    path: &Path,
) -> Result<RenderTex> {
    let image = image::open(path)
        .with_context(|| format!("failed to load dirt image {}", path.display()))?
        .to_rgba8();
    let (w, h) = image.dimensions();

    let mip_count = mip_level_count(w, h);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("wyrm dirt texture"),
        size: wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
        mip_level_count: mip_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(w * 4),
            rows_per_image: Some(h),
        },
        wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
    );

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("wyrm dirt mips"),
    });
    mips.generate(device, &mut encoder, &texture, mip_count);
    queue.submit(std::iter::once(encoder.finish()));

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(RenderTex { texture, view })
}

// ── pass helpers ──────────────────────────────────────────────────────────

/// One fullscreen-triangle pass: `input` at group 0, optional params at
/// group 1.
fn run_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
    pipeline: &wgpu::RenderPipeline,
    input: &wgpu::BindGroup,
    params: Option<&wgpu::BindGroup>,
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
    rpass.set_pipeline(pipeline);
    rpass.set_bind_group(0, input, &[]);
    if let Some(params) = params {
        rpass.set_bind_group(1, params, &[]);
    }
    rpass.draw(0..3, 0..1);
}

/// Clears `view` to transparent black with an empty pass.
fn clear_pass(encoder: &mut wgpu::CommandEncoder, label: &str, view: &wgpu::TextureView) {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
}

// ── tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{dirt_needs_load, select_path, DebugView, PresentPath};

    // ── present path selection ────────────────────────────────────────────

    #[test]
    fn bloom_off_chroma_off_is_one_plain_blit() {
        let path = select_path(DebugView::Off, false, false, 0.02);
        assert_eq!(path, PresentPath::Direct { chroma: false });
    }

    #[test]
    fn zero_chroma_amount_counts_as_off() {
        let path = select_path(DebugView::Off, false, true, 0.0);
        assert_eq!(path, PresentPath::Direct { chroma: false });
    }

    #[test]
    fn chroma_applies_to_both_present_routes() {
        assert_eq!(
            select_path(DebugView::Off, false, true, 0.02),
            PresentPath::Direct { chroma: true }
        );
        assert_eq!(
            select_path(DebugView::Off, true, true, 0.02),
            PresentPath::Bloom { chroma: true }
        );
    }

    #[test]
    fn debug_view_bypasses_everything() {
        let path = select_path(DebugView::Bright, true, true, 0.02);
        assert_eq!(path, PresentPath::Debug(DebugView::Bright));
    }

    // ── dirt idempotence ──────────────────────────────────────────────────

    #[test]
    fn repeated_dirt_path_loads_once() {
        let p = Path::new("assets/dirt.jpg");
        assert!(dirt_needs_load(None, None, p));
        assert!(!dirt_needs_load(Some(p), None, p));
    }

    #[test]
    fn failed_dirt_path_is_not_retried() {
        let p = Path::new("missing.png");
        assert!(!dirt_needs_load(None, Some(p), p));
    }

    #[test]
    fn new_dirt_path_reloads_after_failure() {
        let failed = Path::new("missing.png");
        let next = Path::new("assets/dirt.jpg");
        assert!(dirt_needs_load(None, Some(failed), next));
        assert!(dirt_needs_load(Some(failed), None, next));
    }

    // ── shader sources ────────────────────────────────────────────────────

    // `fullscreen_pipeline` binds these entry points by name; a renamed or
    // missing one only surfaces as a validation error at pipeline build.
    #[test]
    fn post_shaders_declare_the_fullscreen_entry_points() {
        for (name, src) in [
            ("blit", include_str!("shaders/blit.wgsl")),
            ("bright", include_str!("shaders/bright.wgsl")),
            ("kawase", include_str!("shaders/kawase.wgsl")),
            ("gaussian", include_str!("shaders/gaussian.wgsl")),
            ("composite", include_str!("shaders/composite.wgsl")),
            ("chroma", include_str!("shaders/chroma.wgsl")),
        ] {
            assert!(src.contains("fn vs_main"), "{name}.wgsl lost its vs_main entry point");
            assert!(src.contains("fn fs_main"), "{name}.wgsl lost its fs_main entry point");
        }
    }
}
