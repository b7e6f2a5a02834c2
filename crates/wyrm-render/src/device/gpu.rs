use anyhow::{Context, Result};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Options for bringing up the GPU layer. `Default` suits the game; the
/// fields exist for the settings that reach the surface (vsync).
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when the surface offers one.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). FIFO is vsync; Immediate/Mailbox uncap
    /// the frame rate where supported.
    pub present_mode: wgpu::PresentMode,

    /// Alpha mode preference; an unsupported choice falls back to whatever
    /// the surface reports first.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Features the device must have. Empty keeps the widest reach.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Frame latency hint for the surface; backends may ignore it.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

/// The wgpu core objects plus the live surface configuration. One of these
/// exists per window, and the window must outlive it (`'w`).
pub struct Gpu<'w> {
    /// Kept alive for the lifetime of the surface it created.
    instance: wgpu::Instance,

    surface: wgpu::Surface<'w>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Active surface configuration; mutated by resize and present-mode
    /// changes, then reapplied via `Surface::configure`.
    config: wgpu::SurfaceConfiguration,

    /// Current drawable size in physical pixels.
    size: PhysicalSize<u32>,
}

/// One acquired surface frame: texture, view, and the frame's encoder.
/// Holding it blocks further acquisitions, so it should not outlive the
/// redraw that created it.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

/// What the caller should do after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Unrecoverable (out of memory or a backend fault); shut down.
    Fatal,
}

impl<'w> Gpu<'w> {
    /// Creates a GPU context bound to a window. Adapter and device requests
    /// are async under wgpu; callers block on this once at startup.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        log::info!("adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("wyrm device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&surface_caps, init.prefer_srgb)
            .context("no supported surface formats")?;

        let alpha_mode = init
            .alpha_mode
            .filter(|m| surface_caps.alpha_modes.contains(m))
            .unwrap_or_else(|| {
                surface_caps
                    .alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto)
            });

        let present_mode = if surface_caps.present_modes.contains(&init.present_mode) {
            init.present_mode
        } else {
            wgpu::PresentMode::Fifo
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };

        surface.configure(&device, &config);

        Ok(Gpu {
            instance,
            surface,
            adapter,
            device,
            queue,
            config,
            size,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Current drawable size in physical pixels.
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Reconfigures the surface for a new size. A 0x0 size cannot be
    /// configured; the state is recorded and configuration waits for the
    /// next nonzero resize.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            self.size = new_size;
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Switches the present mode (vsync on/off) and reconfigures the surface.
    /// Unsupported modes fall back to FIFO, which every surface provides.
    pub fn set_present_mode(&mut self, mode: wgpu::PresentMode) {
        let caps = self.surface.get_capabilities(&self.adapter);
        let mode = if caps.present_modes.contains(&mode) {
            mode
        } else {
            log::warn!("present mode {mode:?} unsupported; falling back to Fifo");
            wgpu::PresentMode::Fifo
        };

        if self.config.present_mode == mode {
            return;
        }

        self.config.present_mode = mode;
        if self.size.width > 0 && self.size.height > 0 {
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Acquires the next surface texture and opens the frame's encoder.
    /// After submitting the encoder, call `SurfaceTexture::present` to
    /// display the frame.
    pub fn begin_frame(&self) -> std::result::Result<GpuFrame, SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("wyrm frame encoder"),
            });

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
        })
    }

    /// Classifies a surface error and performs whatever recovery it allows.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => {
                if self.size.width > 0 && self.size.height > 0 {
                    self.surface.configure(&self.device, &self.config);
                }
                SurfaceErrorAction::Reconfigured
            }
            SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
            SurfaceError::OutOfMemory | SurfaceError::Other => SurfaceErrorAction::Fatal,
        }
    }
}

/// Picks the surface format: the first sRGB format from the preference
/// list when asked for, else whatever the surface reports first.
fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if prefer_srgb {
        let srgb = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ]
        .into_iter()
        .find(|f| caps.formats.contains(f));
        if srgb.is_some() {
            return srgb;
        }
    }
    caps.formats.first().copied()
}
