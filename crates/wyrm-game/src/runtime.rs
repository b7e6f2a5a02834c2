//! Window runtime: event loop, window/GPU lifetime, frame scheduling.
//!
//! The surface borrows the window, so both live together in a
//! self-referencing entry. The renderer owns cloned device/queue handles
//! and lives beside it. Everything else (input translation, settings
//! application, the redraw drive) goes through [`Runtime`].

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Fullscreen, Window, WindowId};
use wyrm_render::device::{Gpu, GpuInit, SurfaceErrorAction};
use wyrm_render::time::FrameClock;
use wyrm_render::{Renderer, RendererConfig};

use crate::app::{App, AppFlow};
use crate::config::{self, Settings};
use crate::input;

/// Builds the window and runs the event loop until the game exits.
pub fn run(settings: Settings) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create the event loop")?;
    let mut runtime = Runtime {
        app: App::new(settings),
        entry: None,
        renderer: None,
    };
    event_loop
        .run_app(&mut runtime)
        .context("event loop terminated with an error")?;
    Ok(())
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,
    window: Window,
    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct Runtime {
    app: App,
    entry: Option<WindowEntry>,
    renderer: Option<Renderer>,
}

impl Runtime {
    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let settings = &self.app.settings;
        let (w, h) = settings.resolution;
        let mut attrs = Window::default_attributes()
            .with_title("Wyrm")
            .with_inner_size(PhysicalSize::new(w, h));
        if settings.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = GpuInit {
            present_mode: present_mode_for(settings.vsync),
            ..GpuInit::default()
        };
        let entry = WindowEntryBuilder {
            clock: FrameClock::default(),
            window,
            gpu_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init))
                    .expect("GPU initialization failed for window")
            },
        }
        .build();

        let renderer_config = RendererConfig {
            grid_w: config::GRID_W,
            grid_h: config::GRID_H,
            cell_padding: config::CELL_PADDING,
            ..RendererConfig::default()
        };
        let renderer = entry.with_gpu(|gpu| Renderer::new(gpu, &renderer_config))?;

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(action) = input::translate_key(code) else {
            return;
        };

        let before = self.display_settings();
        if self.app.handle_action(action, input::Source::Keyboard) == AppFlow::Exit {
            self.app.persist_settings();
            event_loop.exit();
            return;
        }
        self.apply_display_changes(before);
    }

    fn display_settings(&self) -> (bool, bool, (u32, u32)) {
        let s = &self.app.settings;
        (s.vsync, s.fullscreen, s.resolution)
    }

    /// Applies window-level settings the app cannot reach itself. A
    /// resolution change only requests the new inner size; the resulting
    /// `Resized` event drives the actual surface and target reallocation.
    fn apply_display_changes(&mut self, before: (bool, bool, (u32, u32))) {
        let (vsync, fullscreen, resolution) = self.display_settings();
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        if vsync != before.0 {
            entry.with_gpu_mut(|gpu| gpu.set_present_mode(present_mode_for(vsync)));
        }
        if fullscreen != before.1 {
            entry.with_window(|w| {
                w.set_fullscreen(fullscreen.then(|| Fullscreen::Borderless(None)));
            });
        }
        if resolution != before.2 {
            entry.with_window(|w| {
                let _ = w.request_inner_size(PhysicalSize::new(resolution.0, resolution.1));
            });
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let (Some(entry), Some(renderer)) = (self.entry.as_mut(), self.renderer.as_mut()) else {
            return;
        };
        entry.with_gpu_mut(|gpu| gpu.resize(new_size));
        renderer.set_screen_size(new_size.width, new_size.height);
        entry.with_window(|w| w.request_redraw());
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        // Split borrows so the ouroboros closure does not capture `self`.
        let (app, entry, renderer) = (&mut self.app, &mut self.entry, &mut self.renderer);
        let (Some(entry), Some(renderer)) = (entry.as_mut(), renderer.as_mut()) else {
            return;
        };

        let mut fatal = false;
        entry.with_mut(|fields| {
            let ft = fields.clock.tick();
            app.update(ft.dt);

            match renderer.start_frame(fields.gpu) {
                Ok(()) => {
                    let size = fields.gpu.size();
                    app.draw_frame(renderer, (size.width, size.height), ft.fps);
                    renderer.bloom_pass();
                    let (bloom, strength, radius) = app.present_params();
                    fields.window.pre_present_notify();
                    renderer.present(bloom, strength, radius);
                }
                Err(err) => match fields.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Reconfigured => {
                        let size = fields.gpu.size();
                        renderer.set_screen_size(size.width, size.height);
                    }
                    SurfaceErrorAction::SkipFrame => {}
                    SurfaceErrorAction::Fatal => fatal = true,
                },
            }
        });

        if fatal {
            log::error!("surface lost beyond recovery, shutting down");
            self.app.persist_settings();
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for Runtime {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }
        if let Err(err) = self.create_window(event_loop) {
            log::error!("failed to create the game window: {err:#}");
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        // Continuous redraw: the simulation and menu effects animate every
        // frame, so each presented frame immediately requests the next.
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.app.persist_settings();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => self.resize(new_size),
            WindowEvent::ScaleFactorChanged { .. } => {
                let Some(entry) = self.entry.as_ref() else {
                    return;
                };
                let new_size = entry.with_window(|w| w.inner_size());
                self.resize(new_size);
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, event),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

fn present_mode_for(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}
