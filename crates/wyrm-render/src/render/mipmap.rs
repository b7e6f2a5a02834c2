//! GPU mip chain generation.
//!
//! wgpu has no built-in mipmap generation, so each level is filled by a
//! half-resolution blit from the level above it, recorded into the frame
//! encoder.

use super::common::{
    fullscreen_pipeline, linear_clamp_sampler, texture_bind_group, texture_bind_group_layout,
};

/// Number of mip levels for a full chain down to 1x1.
pub(crate) fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

pub(crate) struct MipmapGenerator {
    pipeline: wgpu::RenderPipeline,
    bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl MipmapGenerator {
    /// `format` must match the textures later passed to [`generate`];
    /// text and dirt textures share `Rgba8UnormSrgb`.
    ///
    /// [`generate`]: MipmapGenerator::generate
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wyrm mipmap shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });
        let bgl = texture_bind_group_layout(device, "wyrm mipmap bgl");
        let pipeline =
            fullscreen_pipeline(device, "wyrm mipmap pipeline", &shader, &[&bgl], format, None);
        let sampler = linear_clamp_sampler(device, "wyrm mipmap sampler");
        Self { pipeline, bgl, sampler }
    }

    /// Fills levels `1..mip_count` of `texture` from level 0, one blit per
    /// level. The texture needs `RENDER_ATTACHMENT | TEXTURE_BINDING` usage.
    pub fn generate(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        mip_count: u32,
    ) {
        for level in 1..mip_count {
            let src = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("wyrm mip src"),
                base_mip_level: level - 1,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let dst = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("wyrm mip dst"),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let bind_group =
                texture_bind_group(device, "wyrm mip blit", &self.bgl, &src, &self.sampler);

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("wyrm mip pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst,
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
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }
    }
}

// ── tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mip_level_count;

    #[test]
    fn full_chain_reaches_one_by_one() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(1920, 1080), 11);
    }

    #[test]
    fn non_square_uses_longest_axis() {
        assert_eq!(mip_level_count(300, 200), 9);
        assert_eq!(mip_level_count(1, 64), 7);
    }

    #[test]
    fn zero_extent_degenerates_to_one_level() {
        assert_eq!(mip_level_count(0, 0), 1);
    }
}
