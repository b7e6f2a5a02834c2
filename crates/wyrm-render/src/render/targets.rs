//! Offscreen render targets and the pass-input bind groups that read them.
//!
//! All six targets live here and are reallocated together on resize, so a
//! pass can never observe a half-resized set. The bind groups that sample
//! them (including both composite variants and the lens-dirt slot) are
//! rebuilt in the same step.

use super::common::{linear_clamp_sampler, texture_bind_group, texture_bind_group_layout};

/// Format of the HDR bloom accumulation target. Everything else uses the
/// surface format.
pub(crate) const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Half-resolution extent for the blur chain, clamped away from zero.
pub(crate) fn half_extent(dim: u32) -> u32 {
    (dim / 2).max(1)
}

// ── render texture ────────────────────────────────────────────────────────

pub(crate) struct RenderTex {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl RenderTex {
    fn target(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// 1x1 opaque white texture bound in the dirt slot while no dirt image is
/// loaded, so the composite bind group is always complete.
fn white_fallback(device: &wgpu::Device, queue: &wgpu::Queue) -> RenderTex {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("wyrm dirt fallback"),
        size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[0xff; 4],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    RenderTex { texture, view }
}

// ── frame targets ─────────────────────────────────────────────────────────

/// Every offscreen target the frame renders through, plus the shared linear
/// clamp sampler and the pre-built bind groups that feed the post passes.
pub(crate) struct FrameTargets {
    pub format: wgpu::TextureFormat,
    pub size: (u32, u32),
    pub half: (u32, u32),

    pub scene: RenderTex,
    pub bloom: RenderTex,
    pub ping: RenderTex,
    pub pong: RenderTex,
    pub small_ping: RenderTex,
    pub small_pong: RenderTex,

    pub sampler: wgpu::Sampler,
    /// Layout for single-input passes (blit, bright, blur, chroma).
    pub tex_bgl: wgpu::BindGroupLayout,
    /// Layout for the composite pass: scene + blur + dirt + sampler.
    pub composite_bgl: wgpu::BindGroupLayout,

    pub scene_bg: wgpu::BindGroup,
    pub bloom_bg: wgpu::BindGroup,
    pub small_ping_bg: wgpu::BindGroup,
    pub small_pong_bg: wgpu::BindGroup,
    pub pong_bg: wgpu::BindGroup,

    /// Composite inputs with the blur result in `small_ping`.
    pub composite_in_ping: wgpu::BindGroup,
    /// Composite inputs with the blur result in `small_pong`.
    pub composite_in_pong: wgpu::BindGroup,

    dirt: Option<RenderTex>,
    dirt_fallback: RenderTex,
}

impl FrameTargets {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let sampler = linear_clamp_sampler(device, "wyrm target sampler");
        let tex_bgl = texture_bind_group_layout(device, "wyrm pass input bgl");
        let composite_bgl = composite_bind_group_layout(device);
        let dirt_fallback = white_fallback(device, queue);

        let set = TargetSet::alloc(device, format, width, height, &tex_bgl, &sampler);
        let (composite_in_ping, composite_in_pong) = composite_pair(
            device,
            &composite_bgl,
            &sampler,
            &set.scene.view,
            &set.small_ping.view,
            &set.small_pong.view,
            &dirt_fallback.view,
        );

        Self {
            format,
            size: (width, height),
            half: (half_extent(width), half_extent(height)),
            scene: set.scene,
            bloom: set.bloom,
            ping: set.ping,
            pong: set.pong,
            small_ping: set.small_ping,
            small_pong: set.small_pong,
            sampler,
            tex_bgl,
            composite_bgl,
            scene_bg: set.scene_bg,
            bloom_bg: set.bloom_bg,
            small_ping_bg: set.small_ping_bg,
            small_pong_bg: set.small_pong_bg,
            pong_bg: set.pong_bg,
            composite_in_ping,
            composite_in_pong,
            dirt: None,
            dirt_fallback,
        }
    }

    /// Drops and recreates every target and every bind group that samples
    /// one. The old textures are destroyed explicitly once nothing here
    /// refers to them.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let set = TargetSet::alloc(device, self.format, width, height, &self.tex_bgl, &self.sampler);
        let (composite_in_ping, composite_in_pong) = composite_pair(
            device,
            &self.composite_bgl,
            &self.sampler,
            &set.scene.view,
            &set.small_ping.view,
            &set.small_pong.view,
            self.dirt_view(),
        );

        let old = [
            std::mem::replace(&mut self.scene, set.scene),
            std::mem::replace(&mut self.bloom, set.bloom),
            std::mem::replace(&mut self.ping, set.ping),
            std::mem::replace(&mut self.pong, set.pong),
            std::mem::replace(&mut self.small_ping, set.small_ping),
            std::mem::replace(&mut self.small_pong, set.small_pong),
        ];
        self.scene_bg = set.scene_bg;
        self.bloom_bg = set.bloom_bg;
        self.small_ping_bg = set.small_ping_bg;
        self.small_pong_bg = set.small_pong_bg;
        self.pong_bg = set.pong_bg;
        self.composite_in_ping = composite_in_ping;
        self.composite_in_pong = composite_in_pong;
        self.size = (width, height);
        self.half = (half_extent(width), half_extent(height));

        for tex in old {
            tex.texture.destroy();
        }
    }

    /// Swaps the lens-dirt texture and rebuilds both composite bind groups.
    /// `None` rebinds the white fallback.
    pub fn set_dirt_texture(&mut self, device: &wgpu::Device, dirt: Option<RenderTex>) {
        if let Some(old) = self.dirt.take() {
            old.texture.destroy();
        }
        self.dirt = dirt;
        let (in_ping, in_pong) = composite_pair(
            device,
            &self.composite_bgl,
            &self.sampler,
            &self.scene.view,
            &self.small_ping.view,
            &self.small_pong.view,
            self.dirt_view(),
        );
        self.composite_in_ping = in_ping;
        self.composite_in_pong = in_pong;
    }

    pub fn has_dirt(&self) -> bool {
        self.dirt.is_some()
    }

    fn dirt_view(&self) -> &wgpu::TextureView {
        self.dirt.as_ref().map_or(&self.dirt_fallback.view, |d| &d.view)
    }
}

// ── allocation helpers ────────────────────────────────────────────────────

struct TargetSet {
    scene: RenderTex,
    bloom: RenderTex,
    ping: RenderTex,
    pong: RenderTex,
    small_ping: RenderTex,
    small_pong: RenderTex,
    scene_bg: wgpu::BindGroup,
    bloom_bg: wgpu::BindGroup,
    small_ping_bg: wgpu::BindGroup,
    small_pong_bg: wgpu::BindGroup,
    pong_bg: wgpu::BindGroup,
}

impl TargetSet {
    fn alloc(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        tex_bgl: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
    ) -> Self {
        let (hw, hh) = (half_extent(width), half_extent(height));

        let scene = RenderTex::target(device, "wyrm scene target", width, height, format);
        let bloom = RenderTex::target(device, "wyrm bloom target", width, height, HDR_FORMAT);
        let ping = RenderTex::target(device, "wyrm ping target", width, height, format);
        let pong = RenderTex::target(device, "wyrm pong target", width, height, format);
        let small_ping = RenderTex::target(device, "wyrm small ping target", hw, hh, format);
        let small_pong = RenderTex::target(device, "wyrm small pong target", hw, hh, format);

        let scene_bg =
            texture_bind_group(device, "wyrm scene input", tex_bgl, &scene.view, sampler);
        let bloom_bg =
            texture_bind_group(device, "wyrm bloom input", tex_bgl, &bloom.view, sampler);
        let small_ping_bg =
            texture_bind_group(device, "wyrm small ping input", tex_bgl, &small_ping.view, sampler);
        let small_pong_bg =
            texture_bind_group(device, "wyrm small pong input", tex_bgl, &small_pong.view, sampler);
        let pong_bg = texture_bind_group(device, "wyrm pong input", tex_bgl, &pong.view, sampler);

        Self {
            scene,
            bloom,
            ping,
            pong,
            small_ping,
            small_pong,
            scene_bg,
            bloom_bg,
            small_ping_bg,
            small_pong_bg,
            pong_bg,
        }
    }
}

fn composite_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("wyrm composite bgl"),
        entries: &[
            texture_entry(0),
            texture_entry(1),
            texture_entry(2),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn composite_pair(
    device: &wgpu::Device,
    bgl: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    scene: &wgpu::TextureView,
    small_ping: &wgpu::TextureView,
    small_pong: &wgpu::TextureView,
    dirt: &wgpu::TextureView,
) -> (wgpu::BindGroup, wgpu::BindGroup) {
    let build = |label, blur: &wgpu::TextureView| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(blur),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(dirt),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    };
    (
        build("wyrm composite inputs (ping)", small_ping),
        build("wyrm composite inputs (pong)", small_pong),
    )
}

// ── tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::half_extent;

    #[test]
    fn half_extent_rounds_down() {
        assert_eq!(half_extent(1920), 960);
        assert_eq!(half_extent(1080), 540);
        assert_eq!(half_extent(3), 1);
    }

    #[test]
    fn half_extent_never_hits_zero() {
        assert_eq!(half_extent(1), 1);
        assert_eq!(half_extent(0), 1);
        assert_eq!(half_extent(2), 1);
    }
}
