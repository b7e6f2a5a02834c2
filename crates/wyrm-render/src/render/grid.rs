//! Instanced grid-cell rendering: snake segments, apples, border cells, and
//! the bloom replay pass.
//!
//! All per-draw state goes through per-frame arenas. Queued buffer writes
//! execute before any render pass plays back, so a draw must never reuse a
//! buffer region written by an earlier draw in the same frame: instances
//! advance through a fixed vertex arena and colors through a dynamic-offset
//! uniform arena, both reset in `begin_frame`.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use wgpu::util::DeviceExt;

use crate::coords::Cell;

use super::common::{
    additive_blend, params_bind_group_layout, params_min_binding_size, straight_alpha_blend,
    QuadVertex, QUAD_INDICES, QUAD_VERTICES, UNIFORM_STRIDE,
};
use super::targets::HDR_FORMAT;

/// Distinct per-draw colors available per frame.
const COLOR_SLOTS: u32 = 64;

/// Frame capacity of the instance arena, in grid-fulls. A single draw is
/// clamped to one grid-full; a frame gets this many of them.
const INSTANCE_SLOTS: u32 = 8;

// ── border geometry ───────────────────────────────────────────────────────

/// Analytic perimeter cells for a border of `thickness` rings: the full top
/// and bottom runs first, then the left and right columns between them.
pub(crate) fn border_cells(grid_w: u32, grid_h: u32, thickness: u32) -> Vec<Cell> {
    let (w, h) = (grid_w as i32, grid_h as i32);
    let t = thickness as i32;
    let mut cells = Vec::new();
    for x in 0..w {
        for k in 0..t {
            cells.push(Cell::new(x, k));
            cells.push(Cell::new(x, h - 1 - k));
        }
    }
    for y in t..h - t {
        for k in 0..t {
            cells.push(Cell::new(k, y));
            cells.push(Cell::new(w - 1 - k, y));
        }
    }
    cells
}

/// Cell position with an optional uniform random offset per axis, in cell
/// units.
fn jittered(rng: &mut SmallRng, cell: Cell, jitter: f32) -> [f32; 2] {
    if jitter > 0.0 {
        [
            cell.x as f32 + rng.gen_range(-jitter..=jitter),
            cell.y as f32 + rng.gen_range(-jitter..=jitter),
        ]
    } else {
        [cell.x as f32, cell.y as f32]
    }
}

// ── renderer ──────────────────────────────────────────────────────────────

pub(crate) struct GridRenderer {
    scene_pipeline: wgpu::RenderPipeline,
    bloom_pipeline: wgpu::RenderPipeline,

    grid_bg: wgpu::BindGroup,
    color_ubo: wgpu::Buffer,
    color_bg: wgpu::BindGroup,
    color_cursor: u32,

    quad_vbo: wgpu::Buffer,
    quad_ibo: wgpu::Buffer,

    instance_vbo: wgpu::Buffer,
    /// Per-draw position cap; one grid's worth of cells.
    instance_capacity: u32,
    instance_cursor: u32,

    rng: SmallRng,
    scratch: Vec<CellInstance>,

    warned_instance_overflow: bool,
    warned_color_overflow: bool,
}

impl GridRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        grid_w: u32,
        grid_h: u32,
        cell_padding: f32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wyrm cell shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/cell.wgsl").into()),
        });

        let grid_bgl = params_bind_group_layout(device, "wyrm grid bgl", false);
        let color_bgl = params_bind_group_layout(device, "wyrm cell color bgl", true);

        let scene_pipeline = cell_pipeline(
            device,
            "wyrm cell scene pipeline",
            &shader,
            &grid_bgl,
            &color_bgl,
            surface_format,
            straight_alpha_blend(),
        );
        let bloom_pipeline = cell_pipeline(
            device,
            "wyrm cell bloom pipeline",
            &shader,
            &grid_bgl,
            &color_bgl,
            HDR_FORMAT,
            additive_blend(),
        );

        let grid_ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wyrm grid ubo"),
            contents: bytemuck::cast_slice(&[grid_w as f32, grid_h as f32, cell_padding, 0.0]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let grid_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wyrm grid bind group"),
            layout: &grid_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: grid_ubo.as_entire_binding(),
            }],
        });

        let color_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wyrm cell color arena"),
            size: COLOR_SLOTS as u64 * UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let color_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wyrm cell color bind group"),
            layout: &color_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &color_ubo,
                    offset: 0,
                    size: Some(params_min_binding_size()),
                }),
            }],
        });

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wyrm cell quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wyrm cell quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let instance_capacity = grid_w * grid_h;
        let instance_vbo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wyrm cell instance arena"),
            size: (instance_capacity * INSTANCE_SLOTS) as u64
                * std::mem::size_of::<CellInstance>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            scene_pipeline,
            bloom_pipeline,
            grid_bg,
            color_ubo,
            color_bg,
            color_cursor: 0,
            quad_vbo,
            quad_ibo,
            instance_vbo,
            instance_capacity,
            instance_cursor: 0,
            rng: SmallRng::from_entropy(),
            scratch: Vec::new(),
            warned_instance_overflow: false,
            warned_color_overflow: false,
        }
    }

    /// Resets both per-frame arenas.
    pub fn begin_frame(&mut self) {
        self.color_cursor = 0;
        self.instance_cursor = 0;
    }

    /// Draws `cells` into the scene target with alpha blending, jittering
    /// each position by up to `jitter` cells per axis.
    pub fn draw_cells(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene_view: &wgpu::TextureView,
        cells: &[Cell],
        color: [f32; 4],
        jitter: f32,
    ) {
        if cells.is_empty() {
            return;
        }
        let Some(range) = self.write_instances(queue, cells, jitter) else { return };
        let Some(color_offset) = self.alloc_color(queue, color) else { return };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("wyrm cell pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: scene_view,
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
        });
        rpass.set_pipeline(&self.scene_pipeline);
        rpass.set_bind_group(0, &self.grid_bg, &[]);
        rpass.set_bind_group(1, &self.color_bg, &[color_offset]);
        rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
        rpass.set_vertex_buffer(1, self.instance_vbo.slice(..));
        rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..6, 0, range);
    }

    /// Replays the frame's bloom groups into the HDR target: clear to
    /// transparent black, then one additive instanced draw per color group.
    /// Positions are replayed without jitter. An empty `groups` still
    /// records the clear.
    pub fn draw_bloom_groups(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        bloom_view: &wgpu::TextureView,
        groups: &[([f32; 4], Vec<Cell>)],
    ) {
        // All buffer writes land before pass playback, so stage every
        // group's instances and color before opening the pass.
        let mut draws: Vec<(Range<u32>, u32)> = Vec::new();
        for (color, cells) in groups {
            if cells.is_empty() {
                continue;
            }
            let Some(range) = self.write_instances(queue, cells, 0.0) else { continue };
            let opaque = [color[0], color[1], color[2], 1.0];
            let Some(offset) = self.alloc_color(queue, opaque) else { continue };
            draws.push((range, offset));
        }

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("wyrm bloom pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: bloom_view,
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
        rpass.set_pipeline(&self.bloom_pipeline);
        rpass.set_bind_group(0, &self.grid_bg, &[]);
        rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
        rpass.set_vertex_buffer(1, self.instance_vbo.slice(..));
        rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
        for (range, offset) in draws {
            rpass.set_bind_group(1, &self.color_bg, &[offset]);
            rpass.draw_indexed(0..6, 0, range);
        }
    }

    /// Uploads positions into the next instance arena region, clamped to
    /// one grid's worth per draw. Returns the written instance range, or
    /// `None` when the frame arena is exhausted.
    fn write_instances(
        &mut self,
        queue: &wgpu::Queue,
        cells: &[Cell],
        jitter: f32,
    ) -> Option<Range<u32>> {
        let n = (cells.len() as u32).min(self.instance_capacity);
        let total = self.instance_capacity * INSTANCE_SLOTS;
        if self.instance_cursor + n > total {
            if !self.warned_instance_overflow {
                log::warn!("cell instance arena full ({total} positions); skipping draw");
                self.warned_instance_overflow = true;
            }
            return None;
        }

        self.scratch.clear();
        for &cell in &cells[..n as usize] {
            let pos = jittered(&mut self.rng, cell, jitter);
            self.scratch.push(CellInstance { pos });
        }

        let offset = self.instance_cursor as u64 * std::mem::size_of::<CellInstance>() as u64;
        queue.write_buffer(&self.instance_vbo, offset, bytemuck::cast_slice(&self.scratch));
        let range = self.instance_cursor..self.instance_cursor + n;
        self.instance_cursor += n;
        Some(range)
    }

    /// Writes one color into the next dynamic-offset slot and returns the
    /// byte offset to bind, or `None` when every slot is taken.
    fn alloc_color(&mut self, queue: &wgpu::Queue, color: [f32; 4]) -> Option<u32> {
        if self.color_cursor >= COLOR_SLOTS {
            if !self.warned_color_overflow {
                log::warn!("cell color arena full ({COLOR_SLOTS} slots); skipping draw");
                self.warned_color_overflow = true;
            }
            return None;
        }
        let offset = self.color_cursor * UNIFORM_STRIDE as u32;
        queue.write_buffer(&self.color_ubo, offset as u64, bytemuck::bytes_of(&color));
        self.color_cursor += 1;
        Some(offset)
    }
}

fn cell_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    grid_bgl: &wgpu::BindGroupLayout,
    color_bgl: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[grid_bgl, color_bgl],
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[QuadVertex::layout(), CellInstance::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
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
    })
}

// ── GPU types ─────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CellInstance {
    pos: [f32; 2],
}

impl CellInstance {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CellInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

// ── tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::{border_cells, jittered};
    use crate::coords::Cell;

    #[test]
    fn border_ring_on_ten_grid_is_thirty_six_cells() {
        let cells = border_cells(10, 10, 1);
        let distinct: HashSet<_> = cells.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(distinct.len(), 36);
        for c in &cells {
            let interior = (1..9).contains(&c.x) && (1..9).contains(&c.y);
            assert!(!interior, "interior cell {c:?} in border");
        }
    }

    #[test]
    fn thick_border_stays_distinct() {
        let cells = border_cells(24, 24, 2);
        let distinct: HashSet<_> = cells.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(cells.len(), distinct.len());
        assert_eq!(cells.len(), 176);
    }

    #[test]
    fn zero_thickness_is_empty() {
        assert!(border_cells(10, 10, 0).is_empty());
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut rng = SmallRng::seed_from_u64(7);
        let cell = Cell::new(4, 9);
        for _ in 0..200 {
            let [x, y] = jittered(&mut rng, cell, 0.3);
            assert!((3.7..=4.3).contains(&x));
            assert!((8.7..=9.3).contains(&y));
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let mut rng = SmallRng::seed_from_u64(7);
        assert_eq!(jittered(&mut rng, Cell::new(2, 3), 0.0), [2.0, 3.0]);
    }
}
