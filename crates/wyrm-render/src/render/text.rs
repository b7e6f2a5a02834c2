//! Cached text rendering.
//!
//! Strings are rasterized to standalone RGBA textures (full mip chain) and
//! kept in an LRU cache keyed by string, byte color, and pixel size, so a
//! HUD label that changes every frame only costs one rasterization per
//! distinct value. Eviction destroys the texture immediately.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use fontdue::layout::{CoordinateSystem, GlyphPosition, Layout, LayoutSettings, TextStyle};
use fontdue::Font;
use lru::LruCache;
use wgpu::util::DeviceExt;

use super::common::{
    params_bind_group_layout, straight_alpha_blend, texture_bind_group,
    texture_bind_group_layout, QuadVertex, QUAD_INDICES, QUAD_VERTICES,
};
use super::mipmap::{mip_level_count, MipmapGenerator};

/// Text draws available per frame.
const TEXT_INSTANCE_SLOTS: u32 = 64;

/// System typefaces probed when no explicit font path is given.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
];

// ── cache ─────────────────────────────────────────────────────────────────

/// Cache key: the string, its byte color, and the integer pixel size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TextKey {
    pub text: String,
    pub color: [u8; 3],
    pub size: u32,
}

/// LRU cache over rasterized text. Generic over the entry type so the
/// eviction policy is testable without a GPU.
pub(crate) struct TextCache<T> {
    entries: LruCache<TextKey, T>,
}

impl<T> TextCache<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity =
            NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1");
        Self { entries: LruCache::new(capacity) }
    }

    /// Looks up an entry and promotes it to most recently used.
    pub fn get(&mut self, key: &TextKey) -> Option<&T> {
        self.entries.get(key)
    }

    /// Inserts an entry, returning the evicted least-recently-used entry
    /// when the cache is full.
    pub fn insert(&mut self, key: TextKey, value: T) -> Option<(TextKey, T)> {
        self.entries.push(key, value)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(TextKey, T)> {
        self.entries.pop_lru()
    }

    /// Membership test that does not touch the recency order.
    pub fn contains(&self, key: &TextKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// One cached string: its texture, the bind group that samples it, and the
/// pixel extent of the rasterized canvas.
pub(crate) struct CachedText {
    pub texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
    pub width: u32,
    pub height: u32,
}

// ── font store ────────────────────────────────────────────────────────────

/// The loaded typeface plus a lazily filled map from pixel size to line
/// height. Sizes are never evicted; the set of distinct sizes a game uses
/// is tiny.
pub(crate) struct FontStore {
    font: Font,
    heights: HashMap<u32, f32>,
    layout: Layout<()>,
}

impl FontStore {
    /// Loads `custom` when given, else probes the system typeface list.
    /// A broken custom path degrades to the probe with a warning; only a
    /// machine with no usable typeface at all is an error.
    pub fn load(custom: Option<&Path>) -> Result<Self> {
        if let Some(path) = custom {
            match std::fs::read(path) {
                Ok(bytes) => match Font::from_bytes(bytes, fontdue::FontSettings::default()) {
                    Ok(font) => return Ok(Self::with_font(font)),
                    Err(err) => {
                        log::warn!(
                            "failed to parse typeface {}: {err}; probing system fonts",
                            path.display()
                        );
                    }
                },
                Err(err) => {
                    log::warn!(
                        "failed to read typeface {}: {err}; probing system fonts",
                        path.display()
                    );
                }
            }
        }

        let bytes = FONT_CANDIDATES
            .iter()
            .find_map(|p| std::fs::read(p).ok())
            .context("no usable typeface found; install DejaVu Sans or Noto Sans, or pass an explicit font path")?;
        let font = Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|err| anyhow::anyhow!("failed to parse system typeface: {err}"))?;
        Ok(Self::with_font(font))
    }

    fn with_font(font: Font) -> Self {
        Self {
            font,
            heights: HashMap::new(),
            layout: Layout::new(CoordinateSystem::PositiveYDown),
        }
    }

    /// Line height at `size` pixels, cached per distinct size.
    fn line_height(&mut self, size: u32) -> f32 {
        if let Some(&h) = self.heights.get(&size) {
            return h;
        }
        let h = self
            .font
            .horizontal_line_metrics(size as f32)
            .map_or(size as f32, |m| m.new_line_size);
        self.heights.insert(size, h);
        h
    }

    /// Lays out `text` at the origin and snapshots the glyph placements.
    fn layout_glyphs(&mut self, text: &str, size: u32) -> Vec<GlyphPosition> {
        self.layout.reset(&LayoutSettings::default());
        self.layout.append(&[&self.font], &TextStyle::new(text, size as f32, 0));
        self.layout.glyphs().clone()
    }

    fn rasterize_glyph(&self, key: fontdue::layout::GlyphRasterConfig) -> (fontdue::Metrics, Vec<u8>) {
        self.font.rasterize_config(key)
    }
}

/// Pixel extent of a laid-out string: glyph extents for width, the larger
/// of glyph extent and line height for height. Empty layouts get a 1x1
/// canvas so the texture is always valid.
fn canvas_extent(glyphs: &[GlyphPosition], line_height: f32) -> (u32, u32) {
    if glyphs.is_empty() {
        return (1, 1);
    }
    let mut w = 0.0f32;
    let mut h = line_height;
    for g in glyphs {
        w = w.max(g.x + g.width as f32);
        h = h.max(g.y + g.height as f32);
    }
    (w.ceil().max(1.0) as u32, h.ceil().max(1.0) as u32)
}

// ── renderer ──────────────────────────────────────────────────────────────

pub(crate) struct TextRenderer {
    pipeline: wgpu::RenderPipeline,

    screen_ubo: wgpu::Buffer,
    screen_bg: wgpu::BindGroup,
    tex_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    quad_vbo: wgpu::Buffer,
    quad_ibo: wgpu::Buffer,
    instance_vbo: wgpu::Buffer,
    instance_cursor: u32,
    warned_overflow: bool,

    font: FontStore,
    cache: TextCache<CachedText>,
}

impl TextRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        cache_capacity: usize,
        font_path: Option<&Path>,
        screen_w: u32,
        screen_h: u32,
    ) -> Result<Self> {
        let font = FontStore::load(font_path)?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wyrm text shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/text.wgsl").into()),
        });

        let screen_bgl = params_bind_group_layout(device, "wyrm text screen bgl", false);
        let tex_bgl = texture_bind_group_layout(device, "wyrm text bgl");

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("wyrm text pipeline layout"),
            bind_group_layouts: &[&screen_bgl, &tex_bgl],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("wyrm text pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[QuadVertex::layout(), TextInstance::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
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

        let screen_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wyrm text screen ubo"),
            size: super::common::PARAMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &screen_ubo,
            0,
            bytemuck::bytes_of(&[screen_w as f32, screen_h as f32, 0.0, 0.0f32]),
        );
        let screen_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wyrm text screen bind group"),
            layout: &screen_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_ubo.as_entire_binding(),
            }],
        });

        let sampler = super::common::linear_clamp_sampler(device, "wyrm text sampler");

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wyrm text quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wyrm text quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instance_vbo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wyrm text instance arena"),
            size: TEXT_INSTANCE_SLOTS as u64 * std::mem::size_of::<TextInstance>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            screen_ubo,
            screen_bg,
            tex_bgl,
            sampler,
            quad_vbo,
            quad_ibo,
            instance_vbo,
            instance_cursor: 0,
            warned_overflow: false,
            font,
            cache: TextCache::new(cache_capacity),
        })
    }

    /// Resets the per-frame instance arena.
    pub fn begin_frame(&mut self) {
        self.instance_cursor = 0;
    }

    pub fn set_screen_size(&mut self, queue: &wgpu::Queue, width: u32, height: u32) {
        queue.write_buffer(
            &self.screen_ubo,
            0,
            bytemuck::bytes_of(&[width as f32, height as f32, 0.0, 0.0f32]),
        );
    }

    /// Draws `text` at `pos` (logical pixels, top-left origin). Cache hit
    /// promotes the entry; miss rasterizes, inserts, and destroys whatever
    /// the insertion evicted.
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene_view: &wgpu::TextureView,
        mips: &MipmapGenerator,
        text: &str,
        size_px: u32,
        color: [u8; 3],
        pos: (f32, f32),
    ) {
        let key = TextKey { text: text.to_owned(), color, size: size_px };

        if self.cache.get(&key).is_none() {
            let entry = self.rasterize(device, queue, encoder, mips, text, size_px, color);
            if let Some((_, old)) = self.cache.insert(key.clone(), entry) {
                old.texture.destroy();
            }
        }

        if self.instance_cursor >= TEXT_INSTANCE_SLOTS {
            if !self.warned_overflow {
                log::warn!("text instance arena full ({TEXT_INSTANCE_SLOTS} draws); skipping");
                self.warned_overflow = true;
            }
            return;
        }
        let slot = self.instance_cursor;
        self.instance_cursor += 1;

        let Some(entry) = self.cache.get(&key) else { return };

        let instance = TextInstance {
            dst_min: [pos.0, pos.1],
            dst_max: [pos.0 + entry.width as f32, pos.1 + entry.height as f32],
        };
        queue.write_buffer(
            &self.instance_vbo,
            u64::from(slot) * std::mem::size_of::<TextInstance>() as u64,
            bytemuck::bytes_of(&instance),
        );

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("wyrm text pass"),
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
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.screen_bg, &[]);
        rpass.set_bind_group(1, &entry.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
        rpass.set_vertex_buffer(1, self.instance_vbo.slice(..));
        rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..6, 0, slot..slot + 1);
    }

    /// Pixel extent the string would occupy, without caching or drawing.
    pub fn measure(&mut self, text: &str, size_px: u32) -> (u32, u32) {
        let line_height = self.font.line_height(size_px);
        let glyphs = self.font.layout_glyphs(text, size_px);
        canvas_extent(&glyphs, line_height)
    }

    /// Destroys every cached entry.
    pub fn clear(&mut self) {
        while let Some((_, entry)) = self.cache.pop_lru() {
            entry.texture.destroy();
        }
    }

    fn rasterize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        mips: &MipmapGenerator,
        text: &str,
        size_px: u32,
        color: [u8; 3],
    ) -> CachedText {
        let line_height = self.font.line_height(size_px);
        let glyphs = self.font.layout_glyphs(text, size_px);
        let (w, h) = canvas_extent(&glyphs, line_height);

        // Fill the whole canvas with the text color at zero alpha, so
        // linear filtering at glyph edges never bleeds toward black.
        let mut pixels = vec![0u8; (w * h * 4) as usize];
        for px in pixels.chunks_exact_mut(4) {
            px[..3].copy_from_slice(&color);
        }

        for g in &glyphs {
            if !g.char_data.rasterize() || g.width == 0 || g.height == 0 {
                continue;
            }
            let (metrics, bitmap) = self.font.rasterize_glyph(g.key);
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let coverage = bitmap[row * metrics.width + col];
                    if coverage == 0 {
                        continue;
                    }
                    let px = g.x as i32 + col as i32;
                    let py = g.y as i32 + row as i32;
                    if px < 0 || py < 0 || px >= w as i32 || py >= h as i32 {
                        continue;
                    }
                    let idx = ((py as u32 * w + px as u32) * 4) as usize;
                    // Overlapping glyphs keep the stronger coverage.
                    pixels[idx + 3] = pixels[idx + 3].max(coverage);
                }
            }
        }

        let mip_count = mip_level_count(w, h);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("wyrm text texture"),
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
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(w * 4),
                rows_per_image: Some(h),
            },
            wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
        );
        mips.generate(device, encoder, &texture, mip_count);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group =
            texture_bind_group(device, "wyrm text entry", &self.tex_bgl, &view, &self.sampler);
        CachedText { texture, bind_group, width: w, height: h }
    }
}

// ── GPU types ─────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct TextInstance {
    dst_min: [f32; 2],
    dst_max: [f32; 2],
}

impl TextInstance {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        1 => Float32x2, // dst_min
        2 => Float32x2  // dst_max
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TextInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

// ── tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::{TextCache, TextKey};

    fn key(s: &str) -> TextKey {
        TextKey { text: s.to_owned(), color: [255, 255, 255], size: 24 }
    }

    #[test]
    fn eviction_removes_least_recent() {
        let mut cache: TextCache<u32> = TextCache::new(2);
        assert!(cache.insert(key("a"), 1).is_none());
        assert!(cache.insert(key("b"), 2).is_none());

        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(cache.get(&key("a")), Some(&1));

        let evicted = cache.insert(key("c"), 3);
        assert_eq!(evicted.map(|(k, v)| (k.text, v)), Some(("b".to_owned(), 2)));
        assert!(cache.contains(&key("a")));
        assert!(cache.contains(&key("c")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn color_and_size_are_part_of_the_key() {
        let mut cache: TextCache<u32> = TextCache::new(8);
        cache.insert(TextKey { text: "hi".into(), color: [255, 0, 0], size: 24 }, 1);
        cache.insert(TextKey { text: "hi".into(), color: [0, 255, 0], size: 24 }, 2);
        cache.insert(TextKey { text: "hi".into(), color: [255, 0, 0], size: 32 }, 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let mut cache: TextCache<u32> = TextCache::new(0);
        assert!(cache.insert(key("a"), 1).is_none());
        let evicted = cache.insert(key("b"), 2);
        assert_eq!(evicted.map(|(k, _)| k.text), Some("a".to_owned()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn drain_empties_the_cache() {
        let mut cache: TextCache<u32> = TextCache::new(4);
        cache.insert(key("a"), 1);
        cache.insert(key("b"), 2);
        let mut drained = Vec::new();
        while let Some((k, _)) = cache.pop_lru() {
            drained.push(k.text);
        }
        assert_eq!(drained, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(cache.len(), 0);
    }
}
