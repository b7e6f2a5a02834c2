//! Screen-space overlay draws: full-screen tints, the vignette, and
//! rounded-corner UI rectangles. All of them land in the scene target on
//! top of whatever the grid and text passes left there.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::common::{
    fullscreen_pipeline, params_bind_group_layout, params_min_binding_size,
    straight_alpha_blend, QuadVertex, PARAMS_SIZE, QUAD_INDICES, QUAD_VERTICES, UNIFORM_STRIDE,
};

/// Tint plus vignette draws available per frame.
const PARAMS_SLOTS: u32 = 32;
/// Rectangle draws available per frame.
const RECT_SLOTS: u32 = 64;

pub(crate) struct OverlayRenderer {
    tint_pipeline: wgpu::RenderPipeline,
    vignette_pipeline: wgpu::RenderPipeline,
    rect_pipeline: wgpu::RenderPipeline,

    params_ubo: wgpu::Buffer,
    params_bg: wgpu::BindGroup,
    params_cursor: u32,
    warned_params_overflow: bool,

    screen_ubo: wgpu::Buffer,
    screen_bg: wgpu::BindGroup,

    quad_vbo: wgpu::Buffer,
    quad_ibo: wgpu::Buffer,
    rect_vbo: wgpu::Buffer,
    rect_cursor: u32,
    warned_rect_overflow: bool,
}

impl OverlayRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        screen_w: u32,
        screen_h: u32,
    ) -> Self {
        let tint_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wyrm tint shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/tint.wgsl").into()),
        });
        let vignette_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wyrm vignette shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/vignette.wgsl").into()),
        });
        let rect_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wyrm rect shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/rect.wgsl").into()),
        });

        let params_bgl = params_bind_group_layout(device, "wyrm overlay params bgl", true);
        let screen_bgl = params_bind_group_layout(device, "wyrm rect screen bgl", false);

        let tint_pipeline = fullscreen_pipeline(
            device,
            "wyrm tint pipeline",
            &tint_shader,
            &[&params_bgl],
            surface_format,
            Some(straight_alpha_blend()),
        );
        let vignette_pipeline = fullscreen_pipeline(
            device,
            "wyrm vignette pipeline",
            &vignette_shader,
            &[&params_bgl],
            surface_format,
            Some(straight_alpha_blend()),
        );

        let rect_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("wyrm rect pipeline layout"),
            bind_group_layouts: &[&screen_bgl],
            immediate_size: 0,
        });
        let rect_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("wyrm rect pipeline"),
            layout: Some(&rect_layout),
            vertex: wgpu::VertexState {
                module: &rect_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[QuadVertex::layout(), RectInstance::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &rect_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(straight_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let params_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wyrm overlay params arena"),
            size: u64::from(PARAMS_SLOTS) * UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wyrm overlay params bind group"),
            layout: &params_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &params_ubo,
                    offset: 0,
                    size: Some(params_min_binding_size()),
                }),
            }],
        });

        let screen_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wyrm rect screen ubo"),
            size: PARAMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &screen_ubo,
            0,
            bytemuck::bytes_of(&[screen_w as f32, screen_h as f32, 0.0, 0.0f32]),
        );
        let screen_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wyrm rect screen bind group"),
            layout: &screen_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_ubo.as_entire_binding(),
            }],
        });

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wyrm overlay quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wyrm overlay quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let rect_vbo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wyrm rect instance arena"),
            size: u64::from(RECT_SLOTS) * std::mem::size_of::<RectInstance>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            tint_pipeline,
            vignette_pipeline,
            rect_pipeline,
            params_ubo,
            params_bg,
            params_cursor: 0,
            warned_params_overflow: false,
            screen_ubo,
            screen_bg,
            quad_vbo,
            quad_ibo,
            rect_vbo,
            rect_cursor: 0,
            warned_rect_overflow: false,
        }
    }

    /// Resets the per-frame arenas.
    pub fn begin_frame(&mut self) {
        self.params_cursor = 0;
        self.rect_cursor = 0;
    }

    pub fn set_screen_size(&mut self, queue: &wgpu::Queue, width: u32, height: u32) {
        queue.write_buffer(
            &self.screen_ubo,
            0,
            bytemuck::bytes_of(&[width as f32, height as f32, 0.0, 0.0f32]),
        );
    }

    /// Blends a flat color over the whole scene.
    pub fn draw_tint(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene_view: &wgpu::TextureView,
        color: [f32; 4],
    ) {
        let Some(offset) = self.alloc_params(queue, color) else { return };
        let mut rpass = overlay_pass(encoder, "wyrm tint pass", scene_view);
        rpass.set_pipeline(&self.tint_pipeline);
        rpass.set_bind_group(0, &self.params_bg, &[offset]);
        rpass.draw(0..3, 0..1);
    }

    /// Darkens the scene edges. Alpha grows with the fourth power of the
    /// distance from center, capped so the corners never go fully black.
    pub fn draw_vignette(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene_view: &wgpu::TextureView,
        intensity: f32,
    ) {
        let Some(offset) = self.alloc_params(queue, [intensity, 0.0, 0.0, 0.0]) else { return };
        let mut rpass = overlay_pass(encoder, "wyrm vignette pass", scene_view);
        rpass.set_pipeline(&self.vignette_pipeline);
        rpass.set_bind_group(0, &self.params_bg, &[offset]);
        rpass.draw(0..3, 0..1);
    }

    /// Draws a rounded rectangle in logical pixels, top-left origin.
    pub fn draw_rect(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene_view: &wgpu::TextureView,
        pos: (f32, f32),
        size: (f32, f32),
        color: [f32; 4],
        radius: f32,
    ) {
        if self.rect_cursor >= RECT_SLOTS {
            if !self.warned_rect_overflow {
                log::warn!("rect instance arena full ({RECT_SLOTS} draws); skipping");
                self.warned_rect_overflow = true;
            }
            return;
        }
        let slot = self.rect_cursor;
        self.rect_cursor += 1;

        let instance = RectInstance {
            origin: [pos.0, pos.1],
            size: [size.0, size.1],
            color,
            radius,
        };
        queue.write_buffer(
            &self.rect_vbo,
            u64::from(slot) * std::mem::size_of::<RectInstance>() as u64,
            bytemuck::bytes_of(&instance),
        );

        let mut rpass = overlay_pass(encoder, "wyrm rect pass", scene_view);
        rpass.set_pipeline(&self.rect_pipeline);
        rpass.set_bind_group(0, &self.screen_bg, &[]);
        rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
        rpass.set_vertex_buffer(1, self.rect_vbo.slice(..));
        rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..6, 0, slot..slot + 1);
    }

    fn alloc_params(&mut self, queue: &wgpu::Queue, params: [f32; 4]) -> Option<u32> {
        if self.params_cursor >= PARAMS_SLOTS {
            if !self.warned_params_overflow {
                log::warn!("overlay params arena full ({PARAMS_SLOTS} draws); skipping");
                self.warned_params_overflow = true;
            }
            return None;
        }
        let slot = self.params_cursor;
        self.params_cursor += 1;
        let offset = slot * UNIFORM_STRIDE as u32;
        queue.write_buffer(&self.params_ubo, u64::from(offset), bytemuck::bytes_of(&params));
        Some(offset)
    }
}

fn overlay_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    view: &wgpu::TextureView,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct RectInstance {
    origin: [f32; 2],
    size: [f32; 2],
    color: [f32; 4],
    radius: f32,
}

impl RectInstance {
    const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        1 => Float32x2, // origin
        2 => Float32x2, // size
        3 => Float32x4, // color
        4 => Float32    // corner radius
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<RectInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}
